//! In-memory message store.
use crate::jwt::{claim_str, decode_unverified};
use didlogin_core::agent::abbreviate_did;
use didlogin_core::credential::subject_claim;
use didlogin_core::message::{Message, MessageType};
use didlogin_core::DEFAULT_MESSAGE_CAPACITY;
use log::debug;
use serde_json::Value;
use ssi::vc::Credential;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Messages {
    by_id: HashMap<String, Message>,
    /// Ids, oldest first.
    order: VecDeque<String>,
}

/// Saved messages keyed by id, holding at most `capacity` of them.
///
/// Once full, saving a new message evicts the oldest one.
#[derive(Debug)]
pub struct MemoryMessageStore {
    messages: RwLock<Messages>,
    capacity: usize,
}

impl Default for MemoryMessageStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MESSAGE_CAPACITY)
    }
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store keeping at most `capacity` messages, and at least one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: RwLock::new(Messages::default()),
            capacity: capacity.max(1),
        }
    }

    /// Saves a message. Re-saving a message with the same id replaces it in place.
    pub async fn save(&self, message: Message) {
        let mut messages = self.messages.write().await;
        let id = message.id.to_owned();
        if messages.by_id.insert(id.to_owned(), message).is_some() {
            return;
        }
        messages.order.push_back(id);
        while messages.order.len() > self.capacity {
            if let Some(evicted) = messages.order.pop_front() {
                messages.by_id.remove(&evicted);
                debug!("Message store full, evicted message {}", evicted);
            }
        }
    }

    /// Messages sent by `sender`, oldest first.
    pub async fn find_by_sender(&self, sender: &str) -> Vec<Message> {
        let messages = self.messages.read().await;
        messages
            .order
            .iter()
            .filter_map(|id| messages.by_id.get(id))
            .filter(|message| message.from() == Some(sender))
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<Message> {
        self.messages.read().await.by_id.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.by_id.is_empty()
    }

    /// Display name for a DID: the latest `name` it disclosed about itself, else the abbreviated DID.
    pub async fn display_name(&self, did: &str) -> String {
        let messages = self.messages.read().await;
        messages
            .order
            .iter()
            .rev()
            .filter_map(|id| messages.by_id.get(id))
            .filter(|message| message.from() == Some(did))
            .find_map(|message| disclosed_name(message, did))
            .unwrap_or_else(|| abbreviate_did(did))
    }
}

/// Name disclosed by `did` in a saved credential or presentation.
fn disclosed_name(message: &Message, did: &str) -> Option<String> {
    match message.type_ {
        MessageType::VerifiableCredential => subject_name(&message.data, did),
        MessageType::VerifiablePresentation => message
            .data
            .pointer("/vp/verifiableCredential")?
            .as_array()?
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|jwt| decode_unverified(jwt).ok())
            .find_map(|claims| subject_name(&Value::Object(claims), did)),
        MessageType::SelectiveDisclosureRequest => None,
    }
}

fn subject_name(claims: &Value, did: &str) -> Option<String> {
    if claim_str(claims.as_object()?, "sub").map_or(false, |sub| sub != did) {
        return None;
    }
    let credential: Credential = serde_json::from_value(claims.get("vc")?.clone()).ok()?;
    subject_claim(&credential, "name")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;

    const DID: &str = "did:jwk:eyJjcnYiOiJzZWNwMjU2azEiLCJrdHkiOiJFQyJ9";

    fn unsigned_jwt(claims: Value) -> String {
        format!(
            "eyJhbGciOiJub25lIn0.{}.sig",
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    fn name_credential(sub: &str, name: &str) -> String {
        unsigned_jwt(json!({
            "iss": sub,
            "sub": sub,
            "vc": {
                "@context": ["https://www.w3.org/2018/credentials/v1"],
                "type": ["VerifiableCredential"],
                "credentialSubject": {"id": sub, "name": name}
            }
        }))
    }

    fn presentation(from: &str, credentials: Vec<String>) -> Message {
        let data = json!({"iss": from, "vp": {"verifiableCredential": credentials}});
        Message::new(MessageType::VerifiablePresentation, &data.to_string())
            .with_from(from)
            .with_data(data)
    }

    #[tokio::test]
    async fn test_display_name_from_presentation() {
        let store = MemoryMessageStore::new();
        assert_eq!(store.display_name(DID).await, abbreviate_did(DID));

        store
            .save(presentation(DID, vec![name_credential(DID, "Alice")]))
            .await;
        assert_eq!(store.display_name(DID).await, "Alice");
        assert_eq!(store.find_by_sender(DID).await.len(), 1);
        assert!(store.find_by_sender("did:example:other").await.is_empty());

        store
            .save(presentation(DID, vec![name_credential(DID, "Alice B.")]))
            .await;
        assert_eq!(store.display_name(DID).await, "Alice B.");
    }

    #[tokio::test]
    async fn test_name_about_other_subject_ignored() {
        let store = MemoryMessageStore::new();
        let vc = name_credential("did:example:other", "Mallory");
        store.save(presentation(DID, vec![vc])).await;
        assert_eq!(store.display_name(DID).await, abbreviate_did(DID));
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let store = MemoryMessageStore::new();
        assert!(store.is_empty().await);
        store.save(presentation(DID, vec![])).await;
        store.save(presentation(DID, vec![])).await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_oldest_messages_evicted_at_capacity() {
        let store = MemoryMessageStore::with_capacity(2);
        let messages: Vec<Message> = (0..3)
            .map(|i| presentation(DID, vec![format!("a.b.{i}")]))
            .collect();
        for message in &messages {
            store.save(message.clone()).await;
        }
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get(&messages[0].id).await, None);

        // Re-saving a kept message does not evict another one.
        store.save(messages[1].clone()).await;
        assert_eq!(store.len().await, 2);
        assert_eq!(
            store.find_by_sender(DID).await,
            vec![messages[1].clone(), messages[2].clone()]
        );
    }
}
