//! Handlers for the browser facing pages.
use crate::config::ConfigurationError;
use crate::errors::DIDLoginHTTPError;
use crate::middleware::SessionContext;
use crate::pages;
use crate::state::AppState;
use crate::{CONTENT_PARAM, SESSION_COOKIE};
use axum::extract::State;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use didlogin_core::action::{Action, ActionHandler};
use didlogin_core::agent::{DataStore, IdentityManager};
use didlogin_core::credential::{credential_with_claim, presentation};
use didlogin_core::guard::{guard, Access};
use didlogin_core::sdr::{issue_login_request, login_claims};
use didlogin_core::session::{increment_views, update_session, Session, Update};
use log::info;
use serde_json::{Map, Value};
use std::sync::Arc;

const KYC_ID: &str = "123XZY";
const PROFILE_NAME: &str = "DAF Demo";
const PROFILE_DESCRIPTION: &str = "Demo application";
const PROFILE_IMAGE: &str = "https://i.imgur.com/IMn3dIg.png";

/// Increments the view counter of the request session and returns the stored session.
async fn count_view(
    state: &AppState,
    session: &SessionContext,
) -> Result<Session, DIDLoginHTTPError> {
    match increment_views(state.sessions.as_ref(), &session.id).await? {
        Update::Updated(current) | Update::Unchanged(current) => Ok(current),
        Update::Missing => Err(DIDLoginHTTPError::SessionNotFound),
    }
}

/// Wallet deep link carrying a JWT.
fn wallet_url(state: &AppState, jwt: &str) -> Result<String, DIDLoginHTTPError> {
    Ok(state
        .config
        .endpoint(&format!("/?{CONTENT_PARAM}={jwt}"))?)
}

pub async fn index() -> Redirect {
    Redirect::to("/home")
}

pub async fn home(
    State(state): State<Arc<AppState>>,
    session: SessionContext,
) -> Result<Response, DIDLoginHTTPError> {
    let current = count_view(&state, &session).await?;
    let did = match guard(Some(&current)) {
        Access::Allow(did) => did,
        Access::Redirect(route) => return Ok(Redirect::to(route).into_response()),
    };
    let name = state.agent.short_id(&did).await?;
    Ok(Html(pages::home(&did, &name, current.views)).into_response())
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    session: SessionContext,
) -> Result<Response, DIDLoginHTTPError> {
    let current = count_view(&state, &session).await?;
    let did = match guard(Some(&current)) {
        Access::Allow(did) => did,
        Access::Redirect(route) => return Ok(Redirect::to(route).into_response()),
    };
    let name = state.agent.short_id(&did).await?;
    let messages = state.agent.find_messages(&did).await?;
    Ok(Html(pages::history(&did, &name, current.views, &messages)).into_response())
}

/// Issues a login request tagged with the session id.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: SessionContext,
) -> Result<Html<String>, DIDLoginHTTPError> {
    let current = count_view(&state, &session).await?;
    let identity = state.agent.identity();
    let valid_for = state.config.request_validity()?;
    let token = issue_login_request(
        state.agent.as_ref(),
        &identity.did,
        &session.id,
        login_claims(),
        valid_for,
    )
    .await?;
    let expires = Utc::now().checked_add_signed(valid_for).ok_or(
        ConfigurationError::InvalidRequestValidity(state.config.request_validity_secs),
    )?;
    update_session(state.sessions.as_ref(), &session.id, |pending| {
        Some(Session {
            login_request_expires: Some(expires),
            ..pending.clone()
        })
    })
    .await?;
    Ok(Html(pages::login(
        &wallet_url(&state, token.as_str())?,
        current.views,
    )))
}

/// Issues name and KYC credentials to the logged in DID, wrapped in a presentation.
pub async fn credential(
    State(state): State<Arc<AppState>>,
    session: SessionContext,
) -> Result<Response, DIDLoginHTTPError> {
    let current = count_view(&state, &session).await?;
    let did = match guard(Some(&current)) {
        Access::Allow(did) => did,
        Access::Redirect(route) => return Ok(Redirect::to(route).into_response()),
    };
    let name = state.agent.short_id(&did).await?;
    let issuer = state.agent.identity().did;

    let name_jwt = state
        .agent
        .handle_action(Action::SignVc {
            issuer: issuer.to_owned(),
            subject: did.to_owned(),
            credential: credential_with_claim("name", name)?,
        })
        .await?;
    let kyc_jwt = state
        .agent
        .handle_action(Action::SignVc {
            issuer: issuer.to_owned(),
            subject: did.to_owned(),
            credential: credential_with_claim("kycId", KYC_ID)?,
        })
        .await?;
    let vp_jwt = state
        .agent
        .handle_action(Action::SignVp {
            issuer,
            audience: did,
            tag: None,
            presentation: presentation(vec![name_jwt, kyc_jwt]),
        })
        .await?;
    Ok(Html(pages::credential(&wallet_url(&state, &vp_jwt)?, current.views)).into_response())
}

pub async fn about(
    State(state): State<Arc<AppState>>,
    session: SessionContext,
) -> Result<Html<String>, DIDLoginHTTPError> {
    let current = count_view(&state, &session).await?;
    let url = state.config.endpoint("/public-profile")?;
    Ok(Html(pages::about(&url, current.views)))
}

/// A credential describing the service identity, as raw JWT text.
pub async fn public_profile(
    State(state): State<Arc<AppState>>,
) -> Result<String, DIDLoginHTTPError> {
    let did = state.agent.identity().did;
    let mut subject = Map::new();
    subject.insert("name".to_string(), Value::from(PROFILE_NAME));
    subject.insert("description".to_string(), Value::from(PROFILE_DESCRIPTION));
    subject.insert("profileImage".to_string(), Value::from(PROFILE_IMAGE));
    Ok(state
        .agent
        .handle_action(Action::SignVc {
            issuer: did.to_owned(),
            subject: did,
            credential: didlogin_core::credential::credential(subject)?,
        })
        .await?)
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: SessionContext,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), DIDLoginHTTPError> {
    state.sessions.destroy(&session.id).await?;
    info!("Session {} logged out.", session.id);
    let removal = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    Ok((jar.remove(removal), Redirect::to("/")))
}
