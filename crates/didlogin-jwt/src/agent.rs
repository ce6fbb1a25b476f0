//! A self-contained agent acting as a `did:jwk` identity.
use crate::did_jwk::{did_from_jwk, is_private, DIDJwkResolver};
use crate::jwt::{self, audience, claim_str, decode_unverified, message_type};
use crate::store::MemoryMessageStore;
use crate::{MESSAGING_SERVICE_FRAGMENT, MESSAGING_SERVICE_TYPE};
use async_trait::async_trait;
use chrono::Utc;
use didlogin_core::action::{Action, ActionHandler, SigningError};
use didlogin_core::agent::{
    DataStore, DataStoreError, Identity, IdentityManager, MessageHandler,
    ServiceEndpointPublicationError,
};
use didlogin_core::events::{AgentEvent, EventBus};
use didlogin_core::credential::bind_credential;
use didlogin_core::message::{Message, MessageType, ValidationError};
use didlogin_core::resolver::{
    document_key, resolve_as_result, uri_service, ResolverError, ResolverResult,
};
use josekit::jwt::JwtPayload;
use log::{debug, info, warn};
use serde_json::Value;
use ssi::did_resolve::{DIDResolver, ResolutionInputMetadata};
use ssi::jwk::JWK;
use ssi::vc::URI;
use std::sync::RwLock;
use std::time::SystemTime;
use thiserror::Error;
use url::Url;

/// An error constructing an agent.
#[derive(Error, Debug)]
pub enum JwtAgentError {
    /// The supplied key cannot sign.
    #[error("Signing key is not a private key.")]
    NotAPrivateKey,
    /// The identity could not be derived from the key.
    #[error("Failed to derive identity: {0}")]
    Identity(#[from] ResolverError),
    /// Key generation failed.
    #[error("Failed to generate key: {0}")]
    KeyGeneration(String),
}

/// Agent signing ES256K JWTs as the `did:jwk` identity of its key.
#[derive(Debug)]
pub struct JwtAgent {
    signing_key: JWK,
    did: String,
    service_endpoint: RwLock<Option<String>>,
    store: MemoryMessageStore,
    events: EventBus<AgentEvent>,
}

impl JwtAgent {
    /// Creates an agent from a secp256k1 private key. Saved messages are published on `events`.
    pub fn new(signing_key: JWK, events: EventBus<AgentEvent>) -> Result<Self, JwtAgentError> {
        if !is_private(&signing_key) {
            return Err(JwtAgentError::NotAPrivateKey);
        }
        let did = did_from_jwk(&signing_key.to_public())?;
        info!("Agent identity: {}", did);
        Ok(Self {
            signing_key,
            did,
            service_endpoint: RwLock::new(None),
            store: MemoryMessageStore::new(),
            events,
        })
    }

    /// Creates an agent with a freshly generated key.
    pub fn generate(events: EventBus<AgentEvent>) -> Result<Self, JwtAgentError> {
        let signing_key = JWK::generate_secp256k1()
            .map_err(|err| JwtAgentError::KeyGeneration(err.to_string()))?;
        Self::new(signing_key, events)
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn events(&self) -> &EventBus<AgentEvent> {
        &self.events
    }

    pub fn store(&self) -> &MemoryMessageStore {
        &self.store
    }

    fn service_endpoint(&self) -> Option<String> {
        match self.service_endpoint.read() {
            Ok(endpoint) => endpoint.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn payload_for(&self, action: &Action) -> Result<JwtPayload, SigningError> {
        let now = Utc::now();
        let mut payload = JwtPayload::new();
        payload.set_issuer(self.did.as_str());
        payload.set_issued_at(&SystemTime::from(now));
        match action {
            Action::SignSdr {
                request, valid_for, ..
            } => {
                let expires = now.checked_add_signed(*valid_for).ok_or_else(|| {
                    SigningError::Rejected(format!("validity window out of range: {valid_for}"))
                })?;
                payload.set_expires_at(&SystemTime::from(expires));
                set_claim(&mut payload, "type", Value::from("sdr"))?;
                set_claim(&mut payload, "tag", Value::from(request.tag.as_str()))?;
                set_claim(&mut payload, "claims", serde_json::to_value(&request.claims)?)?;
            }
            Action::SignVc {
                subject,
                credential,
                ..
            } => {
                let mut credential = credential.clone();
                bind_credential(&mut credential, &self.did, subject);
                payload.set_subject(subject.as_str());
                payload.set_not_before(&SystemTime::from(now));
                set_claim(&mut payload, "vc", serde_json::to_value(&credential)?)?;
            }
            Action::SignVp {
                audience,
                tag,
                presentation,
                ..
            } => {
                let mut presentation = presentation.clone();
                presentation.holder = Some(URI::String(self.did.to_owned()));
                payload.set_audience(vec![audience.as_str()]);
                if let Some(tag) = tag {
                    set_claim(&mut payload, "tag", Value::from(tag.as_str()))?;
                }
                set_claim(&mut payload, "vp", serde_json::to_value(&presentation)?)?;
            }
        }
        Ok(payload)
    }
}

fn set_claim(payload: &mut JwtPayload, name: &str, value: Value) -> Result<(), SigningError> {
    payload
        .set_claim(name, Some(value))
        .map_err(|err| SigningError::Rejected(err.to_string()))
}

#[async_trait]
impl ActionHandler for JwtAgent {
    async fn handle_action(&self, action: Action) -> Result<String, SigningError> {
        if action.issuer() != self.did {
            return Err(SigningError::KeyUnavailable(action.issuer().to_owned()));
        }
        debug!("Handling action: {}", action.name());
        let payload = self.payload_for(&action)?;
        jwt::sign(&payload, &self.signing_key).map_err(|err| SigningError::Rejected(err.to_string()))
    }
}

#[async_trait]
impl MessageHandler for JwtAgent {
    async fn handle_message(&self, raw: &str) -> Result<Message, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        let claims = decode_unverified(raw)?;
        let issuer = claim_str(&claims, "iss")
            .ok_or(ValidationError::MissingIssuer)?
            .to_owned();
        let document = resolve_as_result(self, &issuer).await?;
        let key = document_key(&document)?;
        let payload = jwt::verify(raw, &key)
            .map_err(|err| ValidationError::InvalidSignature(err.to_string()))?;
        let now = SystemTime::now();
        if payload.expires_at().map_or(false, |exp| exp < now) {
            return Err(ValidationError::Expired);
        }
        if payload.not_before().map_or(false, |nbf| nbf > now) {
            return Err(ValidationError::NotYetValid);
        }
        let type_ = message_type(&claims).ok_or(ValidationError::UnsupportedMessageType)?;
        let to = audience(&claims);
        // Answers to a login request must be addressed to this identity.
        if type_ == MessageType::VerifiablePresentation
            && claims.contains_key("tag")
            && to.as_deref() != Some(self.did.as_str())
        {
            return Err(ValidationError::WrongAudience(to.unwrap_or_default()));
        }

        let mut message = Message::new(type_, raw).with_from(&issuer);
        if let Some(tag) = claim_str(&claims, "tag") {
            message = message.with_thread_id(tag);
        }
        if let Some(aud) = to {
            message = message.with_to(&aud);
        }
        let message = message.with_data(Value::Object(claims));

        self.store.save(message.clone()).await;
        info!("Saved {} message {} from {}", message.type_, message.id, issuer);
        if self.events.publish(AgentEvent::SavedMessage(message.clone())) == 0 {
            warn!("No subscribers for saved message: {}", message.id);
        }
        Ok(message)
    }
}

#[async_trait]
impl DataStore for JwtAgent {
    async fn short_id(&self, did: &str) -> Result<String, DataStoreError> {
        Ok(self.store.display_name(did).await)
    }

    async fn find_messages(&self, sender: &str) -> Result<Vec<Message>, DataStoreError> {
        Ok(self.store.find_by_sender(sender).await)
    }
}

#[async_trait]
impl IdentityManager for JwtAgent {
    fn identity(&self) -> Identity {
        Identity {
            did: self.did.to_owned(),
            service_endpoint: self.service_endpoint(),
        }
    }

    async fn set_service_endpoint(
        &self,
        endpoint: &str,
    ) -> Result<(), ServiceEndpointPublicationError> {
        let url = Url::parse(endpoint)
            .map_err(|_| ServiceEndpointPublicationError::InvalidEndpoint(endpoint.to_owned()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ServiceEndpointPublicationError::InvalidEndpoint(
                endpoint.to_owned(),
            ));
        }
        let mut published = self.service_endpoint.write().map_err(|err| {
            ServiceEndpointPublicationError::NotPublished {
                did: self.did.to_owned(),
                reason: err.to_string(),
            }
        })?;
        *published = Some(endpoint.to_owned());
        info!("Published messaging service endpoint {} for {}", endpoint, self.did);
        Ok(())
    }
}

/// Resolves `did:jwk` DIDs, adding the published messaging service to the agent's own document.
#[async_trait]
impl DIDResolver for JwtAgent {
    async fn resolve(
        &self,
        did: &str,
        input_metadata: &ResolutionInputMetadata,
    ) -> ResolverResult {
        let (metadata, document, document_metadata) =
            DIDJwkResolver.resolve(did, input_metadata).await;
        let Some(mut document) = document else {
            return (metadata, None, document_metadata);
        };
        if did == self.did {
            if let Some(endpoint) = self.service_endpoint() {
                document.service.get_or_insert_with(Vec::new).push(uri_service(
                    &format!("{did}{MESSAGING_SERVICE_FRAGMENT}"),
                    MESSAGING_SERVICE_TYPE,
                    &endpoint,
                ));
            }
        }
        (metadata, Some(document), document_metadata)
    }
}
