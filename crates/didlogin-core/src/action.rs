//! Signing actions understood by an agent.
use crate::sdr::{SdrError, SelectiveDisclosureRequest};
use async_trait::async_trait;
use chrono::Duration;
use ssi::vc::{Credential, Presentation};
use thiserror::Error;

/// An error relating to signing an action.
#[derive(Error, Debug)]
pub enum SigningError {
    /// No signing key is held for the issuer.
    #[error("No signing key available for issuer: {0}")]
    KeyUnavailable(String),
    /// The signer refused the payload.
    #[error("Signer rejected payload: {0}")]
    Rejected(String),
    /// The request to sign is invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] SdrError),
    /// Wrapped serialization error.
    #[error("Wrapped serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// An operation requiring a signature from an issuer identity.
#[derive(Debug, Clone)]
pub enum Action {
    /// Signs a selective disclosure request, valid for the given window.
    SignSdr {
        issuer: String,
        request: SelectiveDisclosureRequest,
        valid_for: Duration,
    },
    /// Signs a verifiable credential about `subject`.
    SignVc {
        issuer: String,
        subject: String,
        credential: Credential,
    },
    /// Signs a verifiable presentation for `audience`, optionally answering the request `tag`.
    SignVp {
        issuer: String,
        audience: String,
        tag: Option<String>,
        presentation: Presentation,
    },
}

impl Action {
    pub fn issuer(&self) -> &str {
        match self {
            Action::SignSdr { issuer, .. }
            | Action::SignVc { issuer, .. }
            | Action::SignVp { issuer, .. } => issuer,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::SignSdr { .. } => "sign.sdr",
            Action::SignVc { .. } => "sign.w3c.vc",
            Action::SignVp { .. } => "sign.w3c.vp",
        }
    }
}

/// Performs actions, returning the resulting compact JWT.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle_action(&self, action: Action) -> Result<String, SigningError>;
}
