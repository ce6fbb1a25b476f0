use crate::config::ConfigurationError;
use axum::response::IntoResponse;
use axum::Json;
use didlogin_core::action::SigningError;
use didlogin_core::agent::{DataStoreError, ServiceEndpointPublicationError};
use didlogin_core::credential::CredentialError;
use didlogin_core::message::ValidationError;
use didlogin_core::resolver::ResolverError;
use didlogin_core::session::SessionError;
use didlogin_jwt::agent::JwtAgentError;
use didlogin_jwt::key_manager::KeyManagerError;
use hyper::StatusCode;
use log::error;
use serde_json::json;
use thiserror::Error;

/// didlogin HTTP error type.
#[derive(Error, Debug)]
pub enum DIDLoginHTTPError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// Displayed unwrapped to message senders.
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error("Session not found.")]
    SessionNotFound,
    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),
    #[error("Data store error: {0}")]
    DataStore(#[from] DataStoreError),
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),
}

// Make DIDLoginHTTPError suitable for axum responses.
impl IntoResponse for DIDLoginHTTPError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            DIDLoginHTTPError::Validation(err) => {
                return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
            }
            DIDLoginHTTPError::Configuration(_) => {
                error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DIDLoginHTTPError::Signing(_)
            | DIDLoginHTTPError::Session(_)
            | DIDLoginHTTPError::DataStore(_)
            | DIDLoginHTTPError::Credential(_)
            | DIDLoginHTTPError::Resolver(ResolverError::Failed(..)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DIDLoginHTTPError::SessionNotFound => StatusCode::UNAUTHORIZED,
            DIDLoginHTTPError::Resolver(ResolverError::UnsupportedMethod(_))
            | DIDLoginHTTPError::Resolver(ResolverError::InvalidDID(_)) => StatusCode::BAD_REQUEST,
            DIDLoginHTTPError::Resolver(_) => StatusCode::NOT_FOUND,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Fatal errors while starting the server.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Key manager error: {0}")]
    KeyManager(#[from] KeyManagerError),
    #[error("Agent error: {0}")]
    Agent(#[from] JwtAgentError),
    #[error("Service endpoint not published: {0}")]
    ServiceEndpoint(#[from] ServiceEndpointPublicationError),
    #[error("Server error: {0}")]
    Server(#[from] hyper::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_validation_error_is_plain_text() {
        let response = DIDLoginHTTPError::from(ValidationError::EmptyMessage).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(body, ValidationError::EmptyMessage.to_string());
    }

    #[tokio::test]
    async fn test_other_errors_are_json() {
        let err = DIDLoginHTTPError::from(ConfigurationError::SessionNotConfigured);
        let expected = json!({ "error": err.to_string() }).to_string();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(body, expected);

        let response =
            DIDLoginHTTPError::from(ResolverError::InvalidDID("did:x".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response =
            DIDLoginHTTPError::from(ResolverError::NonExistentDID("did:x:y".to_string()))
                .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
