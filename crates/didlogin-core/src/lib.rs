//! Core types and traits for session-gated DID login (agent and transport independent).
pub mod action;
pub mod agent;
pub mod credential;
pub mod events;
pub mod guard;
pub mod listener;
pub mod message;
pub mod resolver;
pub mod sdr;
pub mod session;

/// Environment variable name for the didlogin data directory.
pub const DIDLOGIN_DATA: &str = "DIDLOGIN_DATA";

/// Environment variable name for the didlogin config file.
pub const DIDLOGIN_CONFIG: &str = "DIDLOGIN_CONFIG";

/// Route that unauthenticated visitors are sent to.
pub const LOGIN_ROUTE: &str = "/login";

/// Path of the messaging service endpoint, relative to the public host.
pub const MESSAGING_ENDPOINT: &str = "/handle-message";

/// Default number of seconds an issued login request stays valid.
pub const DEFAULT_REQUEST_VALIDITY_SECS: i64 = 600;

/// Upper bound on the login request validity window.
pub const MAX_REQUEST_VALIDITY_SECS: i64 = 86_400;

/// Default number of seconds a session may stay unused before eviction.
pub const DEFAULT_SESSION_IDLE_SECS: i64 = 3_600;

/// Upper bound on the session idle timeout.
pub const MAX_SESSION_IDLE_SECS: i64 = 2_592_000;

/// Default upper bound on the number of messages the agent keeps.
pub const DEFAULT_MESSAGE_CAPACITY: usize = 10_000;
