//! didlogin HTTP server functionality.
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod messaging;
pub mod middleware;
pub mod pages;
pub mod qrcode;
pub mod resolver;
pub mod server;
pub mod state;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "didlogin.sid";

/// Query parameter carrying a JWT in wallet deep links.
pub(crate) const CONTENT_PARAM: &str = "c_i";
