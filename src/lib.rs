//! didlogin: session-gated login with decentralized identifiers.
//!
//! A browser session is authenticated when a wallet answers the session's signed selective
//! disclosure request with a verifiable presentation tagged with the session id.
pub use didlogin_core as core;
pub use didlogin_http as http;
pub use didlogin_jwt as jwt;
