//! Selective disclosure requests used to log in a session.
use crate::action::{Action, ActionHandler, SigningError};
use chrono::Duration;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error relating to constructing a selective disclosure request.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SdrError {
    /// The session tag is empty.
    #[error("Request tag must not be empty.")]
    EmptyTag,
    /// No claims were requested.
    #[error("Request must ask for at least one claim.")]
    NoClaims,
}

/// A single claim asked of the holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub essential: bool,
    pub claim_type: String,
}

impl ClaimRequest {
    pub fn new(claim_type: &str) -> Self {
        Self {
            reason: None,
            essential: false,
            claim_type: claim_type.to_owned(),
        }
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_owned());
        self
    }

    pub fn essential(mut self) -> Self {
        self.essential = true;
        self
    }
}

/// A request for a holder to disclose claims, tagged with the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectiveDisclosureRequest {
    /// Correlation tag, echoed back by the holder as the response's thread id.
    pub tag: String,
    pub claims: Vec<ClaimRequest>,
}

impl SelectiveDisclosureRequest {
    pub fn new(tag: &str, claims: Vec<ClaimRequest>) -> Result<Self, SdrError> {
        if tag.is_empty() {
            return Err(SdrError::EmptyTag);
        }
        if claims.is_empty() {
            return Err(SdrError::NoClaims);
        }
        Ok(Self {
            tag: tag.to_owned(),
            claims,
        })
    }
}

/// Claims requested when logging in.
pub fn login_claims() -> Vec<ClaimRequest> {
    vec![ClaimRequest::new("name")
        .with_reason("We need this information")
        .essential()]
}

/// A signed selective disclosure request as a compact JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequestToken(String);

impl SignedRequestToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SignedRequestToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SignedRequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SignedRequestToken> for String {
    fn from(token: SignedRequestToken) -> Self {
        token.0
    }
}

/// Signs a login request tagged with `session_tag` on behalf of `issuer`.
pub async fn issue_login_request<S: ActionHandler + ?Sized>(
    signer: &S,
    issuer: &str,
    session_tag: &str,
    claims: Vec<ClaimRequest>,
    valid_for: Duration,
) -> Result<SignedRequestToken, SigningError> {
    let request = SelectiveDisclosureRequest::new(session_tag, claims)?;
    debug!("Signing login request for session: {}", session_tag);
    let jwt = signer
        .handle_action(Action::SignSdr {
            issuer: issuer.to_owned(),
            request,
            valid_for,
        })
        .await?;
    Ok(SignedRequestToken(jwt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::always;

    mock! {
        pub Signer {}
        #[async_trait]
        impl ActionHandler for Signer {
            async fn handle_action(&self, action: Action) -> Result<String, SigningError>;
        }
    }

    #[test]
    fn test_new_request_validation() {
        assert_eq!(
            SelectiveDisclosureRequest::new("", login_claims()),
            Err(SdrError::EmptyTag)
        );
        assert_eq!(
            SelectiveDisclosureRequest::new("sess-123", vec![]),
            Err(SdrError::NoClaims)
        );
        assert!(SelectiveDisclosureRequest::new("sess-123", login_claims()).is_ok());
    }

    #[test]
    fn test_claims_serialization() {
        let request = SelectiveDisclosureRequest::new("sess-123", login_claims()).unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "tag": "sess-123",
                "claims": [{
                    "reason": "We need this information",
                    "essential": true,
                    "claimType": "name"
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_issue_login_request_embeds_tag() {
        let mut signer = MockSigner::new();
        signer
            .expect_handle_action()
            .withf(|action| match action {
                Action::SignSdr {
                    issuer, request, ..
                } => {
                    issuer == "did:example:issuer"
                        && request.tag == "sess-123"
                        && request.claims == vec![ClaimRequest::new("name")]
                }
                _ => false,
            })
            .times(1)
            .returning(|_| Ok("header.payload.signature".to_string()));

        let token = issue_login_request(
            &signer,
            "did:example:issuer",
            "sess-123",
            vec![ClaimRequest::new("name")],
            Duration::seconds(60),
        )
        .await
        .unwrap();
        assert_eq!(token.as_str(), "header.payload.signature");
    }

    #[tokio::test]
    async fn test_issue_login_request_signing_error() {
        let mut signer = MockSigner::new();
        signer
            .expect_handle_action()
            .with(always())
            .returning(|action| Err(SigningError::KeyUnavailable(action.issuer().to_owned())));

        let result = issue_login_request(
            &signer,
            "did:example:issuer",
            "sess-123",
            login_claims(),
            Duration::seconds(60),
        )
        .await;
        assert!(matches!(result, Err(SigningError::KeyUnavailable(did)) if did == "did:example:issuer"));
    }

    #[tokio::test]
    async fn test_issue_login_request_rejects_empty_tag() {
        let mut signer = MockSigner::new();
        signer.expect_handle_action().never();
        let result = issue_login_request(
            &signer,
            "did:example:issuer",
            "",
            login_claims(),
            Duration::seconds(60),
        )
        .await;
        assert!(matches!(
            result,
            Err(SigningError::InvalidRequest(SdrError::EmptyTag))
        ));
    }
}
