//! JWT agent for didlogin: ES256K signing, `did:jwk` resolution and message validation.
pub mod agent;
pub mod did_jwk;
pub mod jwt;
pub mod key_manager;
pub mod store;

pub use agent::JwtAgent;

/// Fragment of the verification method in `did:jwk` documents.
pub const DID_JWK_KEY_FRAGMENT: &str = "#0";

/// Fragment of the messaging service published by the agent identity.
pub const MESSAGING_SERVICE_FRAGMENT: &str = "#messaging";

/// Type of the messaging service published by the agent identity.
pub const MESSAGING_SERVICE_TYPE: &str = "Messaging";
