//! Middleware for didlogin HTTP.
use crate::config::ConfigurationError;
use crate::errors::DIDLoginHTTPError;
use crate::state::AppState;
use crate::SESSION_COOKIE;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use didlogin_core::guard::{guard, Access};
use didlogin_core::resolver::did_method;
use didlogin_core::session::Session;
use log::{debug, error};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Session of the current request, inserted by [`load_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub id: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for SessionContext {
    type Rejection = DIDLoginHTTPError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionContext>().cloned().ok_or_else(|| {
            error!("No session for request to {}", parts.uri.path());
            ConfigurationError::SessionNotConfigured.into()
        })
    }
}

fn session_cookie(id: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, id)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

/// Loads the session named by the session cookie, creating one (and the cookie) if needed.
pub async fn load_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, DIDLoginHTTPError> {
    let existing = match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.sessions.get(cookie.value()).await?,
        None => None,
    };
    let (id, jar) = match existing {
        Some(session) => (session.id, jar),
        None => {
            let session = Session::new(&Uuid::new_v4().to_string());
            state.sessions.set(session.clone()).await?;
            debug!("Created session {}", session.id);
            let jar = jar.add(session_cookie(session.id.to_owned()));
            (session.id, jar)
        }
    };
    request.extensions_mut().insert(SessionContext { id });
    let response = next.run(request).await;
    Ok((jar, response).into_response())
}

/// Redirects to the login page unless the session is authenticated.
pub async fn require_login(
    State(state): State<Arc<AppState>>,
    session: SessionContext,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, DIDLoginHTTPError> {
    let current = state.sessions.get(&session.id).await?;
    match guard(current.as_ref()) {
        Access::Allow(did) => {
            tracing::debug!(session = %session.id, did = %did);
            Ok(next.run(request).await)
        }
        Access::Redirect(route) => Ok(Redirect::to(route).into_response()),
    }
}

/// Rejects path DIDs without a method and method-specific identifier.
pub async fn validate_did(
    Path(did): Path<String>,
    request: Request<Body>,
    next: Next<Body>,
) -> impl IntoResponse {
    tracing::info!(did);
    if let Err(err) = did_method(&did) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        ));
    }
    Ok(next.run(request).await)
}
