//! Agent capabilities consumed by the login service.
use crate::action::ActionHandler;
use crate::message::{Message, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ssi::did_resolve::DIDResolver;
use thiserror::Error;

/// An error relating to the agent's message store.
#[derive(Error, Debug)]
pub enum DataStoreError {
    #[error("Message store unavailable: {0}")]
    Unavailable(String),
}

/// An error publishing the identity's messaging service endpoint.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ServiceEndpointPublicationError {
    /// Endpoint is not an absolute http(s) URL.
    #[error("Invalid service endpoint: {0}")]
    InvalidEndpoint(String),
    /// The DID method rejected the update.
    #[error("Service endpoint not published for {did}: {reason}")]
    NotPublished { did: String, reason: String },
}

/// The identity an agent acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub did: String,
    /// Published messaging service endpoint.
    pub service_endpoint: Option<String>,
}

/// Validates raw inbound messages.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Validates a raw message, saves it and notifies "message saved" subscribers.
    async fn handle_message(&self, raw: &str) -> Result<Message, ValidationError>;
}

/// Read access to messages held by the agent.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Human readable display name for a DID.
    async fn short_id(&self, did: &str) -> Result<String, DataStoreError>;
    /// Messages sent by `sender`, oldest first.
    async fn find_messages(&self, sender: &str) -> Result<Vec<Message>, DataStoreError>;
}

/// Management of the agent's own identity.
#[async_trait]
pub trait IdentityManager: Send + Sync {
    fn identity(&self) -> Identity;
    /// Publishes `endpoint` as the identity's messaging service endpoint.
    async fn set_service_endpoint(
        &self,
        endpoint: &str,
    ) -> Result<(), ServiceEndpointPublicationError>;
}

/// The complete set of capabilities required from an agent.
pub trait Agent: MessageHandler + ActionHandler + DataStore + IdentityManager + DIDResolver {}

impl<T> Agent for T where
    T: MessageHandler + ActionHandler + DataStore + IdentityManager + DIDResolver
{
}

/// Abbreviates a DID for display, keeping the method and both ends of the identifier.
pub fn abbreviate_did(did: &str) -> String {
    const KEEP: usize = 8;
    let chars: Vec<char> = did.chars().collect();
    if chars.len() <= 3 * KEEP {
        return did.to_owned();
    }
    let head: String = chars[..2 * KEEP].iter().collect();
    let tail: String = chars[chars.len() - KEEP..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviate_did() {
        assert_eq!(abbreviate_did("did:example:abc"), "did:example:abc");
        let did = "did:jwk:eyJjcnYiOiJzZWNwMjU2azEiLCJrdHkiOiJFQyJ9";
        let short = abbreviate_did(did);
        assert_eq!(short, "did:jwk:eyJjcnYi…OiJFQyJ9");
        assert!(short.chars().count() < did.chars().count());
    }
}
