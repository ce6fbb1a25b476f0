//! Inbound messages and their validation errors.
use crate::resolver::ResolverError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// An error raised while validating an inbound message.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// No payload was received.
    #[error("Message is empty.")]
    EmptyMessage,
    /// The payload is not a compact JWT.
    #[error("Unsupported message format: {0}")]
    MalformedMessage(String),
    /// The JWT carries no `iss` claim.
    #[error("Message has no issuer.")]
    MissingIssuer,
    /// The JWT is neither an SDR, a credential nor a presentation.
    #[error("Unsupported message type.")]
    UnsupportedMessageType,
    /// Issuer DID could not be resolved to a verification key.
    #[error("Could not resolve message issuer: {0}")]
    Resolver(#[from] ResolverError),
    /// Signature did not verify against the issuer's key.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    /// The JWT `exp` claim is in the past.
    #[error("Message expired.")]
    Expired,
    /// The JWT `nbf` claim is in the future.
    #[error("Message not yet valid.")]
    NotYetValid,
    /// A presentation answering a request is addressed to another DID.
    #[error("Message addressed to {0}.")]
    WrongAudience(String),
}

/// Type tag assigned to a message during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "sdr")]
    SelectiveDisclosureRequest,
    #[serde(rename = "w3c.vc")]
    VerifiableCredential,
    #[serde(rename = "w3c.vp")]
    VerifiablePresentation,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::SelectiveDisclosureRequest => "sdr",
            MessageType::VerifiableCredential => "w3c.vc",
            MessageType::VerifiablePresentation => "w3c.vp",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Hex encoded SHA-256 of the raw payload.
    pub id: String,
    pub raw: String,
    #[serde(rename = "type")]
    pub type_: MessageType,
    /// Correlation id linking the message to an earlier request.
    pub thread_id: Option<String>,
    /// DID of the sender.
    pub from: Option<String>,
    /// DID of the intended recipient.
    pub to: Option<String>,
    /// Decoded message payload.
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(type_: MessageType, raw: &str) -> Self {
        Self {
            id: Self::id_for(raw),
            raw: raw.to_owned(),
            type_,
            thread_id: None,
            from: None,
            to: None,
            data: Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Message identifier derived from the raw payload.
    pub fn id_for(raw: &str) -> String {
        hex::encode(Sha256::digest(raw.as_bytes()))
    }

    pub fn with_thread_id(mut self, thread_id: &str) -> Self {
        self.thread_id = Some(thread_id.to_owned());
        self
    }

    pub fn with_from(mut self, from: &str) -> Self {
        self.from = Some(from.to_owned());
        self
    }

    pub fn with_to(mut self, to: &str) -> Self {
        self.to = Some(to.to_owned());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Thread id, if present and non-empty.
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Sender DID, if present and non-empty.
    pub fn from(&self) -> Option<&str> {
        self.from.as_deref().filter(|did| !did.is_empty())
    }

    pub fn is_presentation(&self) -> bool {
        self.type_ == MessageType::VerifiablePresentation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_id_is_stable() {
        let a = Message::new(MessageType::VerifiablePresentation, "a.b.c");
        let b = Message::new(MessageType::VerifiableCredential, "a.b.c");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 64);
        assert_ne!(a.id, Message::id_for("a.b.d"));
    }

    #[test]
    fn test_empty_thread_id_and_sender() {
        let message = Message::new(MessageType::VerifiablePresentation, "raw")
            .with_thread_id("")
            .with_from("");
        assert_eq!(message.thread_id(), None);
        assert_eq!(message.from(), None);
    }

    #[test]
    fn test_serialize() {
        let message = Message::new(MessageType::VerifiablePresentation, "raw")
            .with_thread_id("sess-123")
            .with_from("did:example:abc")
            .with_data(json!({"tag": "sess-123"}));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "w3c.vp");
        assert_eq!(value["threadId"], "sess-123");
        assert_eq!(value["from"], "did:example:abc");
        let round: Message = serde_json::from_value(value).unwrap();
        assert_eq!(round, message);
    }
}
