use crate::config::HTTPConfig;
use didlogin_core::agent::Agent;
use didlogin_core::events::{EventBus, RoomEvent};
use didlogin_core::session::{MemoryStore, SessionStore};
use didlogin_core::DEFAULT_SESSION_IDLE_SECS;
use log::warn;
use std::sync::Arc;

/// A shared app state for handlers.
pub struct AppState {
    pub config: HTTPConfig,
    pub agent: Arc<dyn Agent>,
    pub sessions: Arc<dyn SessionStore>,
    /// Real-time notifications, one room per session id.
    pub notifications: EventBus<RoomEvent>,
}

impl AppState {
    /// Keeps sessions in memory, evicting those idle for longer than the configured timeout.
    pub fn new(config: HTTPConfig, agent: Arc<dyn Agent>) -> Self {
        let idle_timeout = config.session_idle().unwrap_or_else(|err| {
            warn!("{}, using {}s.", err, DEFAULT_SESSION_IDLE_SECS);
            chrono::Duration::seconds(DEFAULT_SESSION_IDLE_SECS)
        });
        let sessions = Arc::new(MemoryStore::with_idle_timeout(idle_timeout));
        Self::new_with_store(config, agent, sessions)
    }

    pub fn new_with_store(
        config: HTTPConfig,
        agent: Arc<dyn Agent>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            agent,
            sessions,
            notifications: EventBus::default(),
        }
    }
}
