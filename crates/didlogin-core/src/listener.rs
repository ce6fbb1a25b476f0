//! Authentication listener: logs sessions in when a matching presentation is saved.
use crate::events::{AgentEvent, EventBus, Notification, RoomEvent};
use crate::message::Message;
use crate::session::{update_session, Session, SessionError, SessionStore, Update};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Reason a saved message did not authenticate a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotAPresentation,
    MissingThreadId,
    MissingSender,
    UnknownSession,
    AlreadyAuthenticated,
    LoginRequestExpired,
}

/// Outcome of handling one saved message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerOutcome {
    Ignored(IgnoreReason),
    Authenticated { session_id: String, did: String },
}

/// Moves sessions from unauthenticated to authenticated on receipt of a matching presentation.
#[derive(Debug, Clone)]
pub struct AuthenticationListener {
    sessions: Arc<dyn SessionStore>,
    notifications: EventBus<RoomEvent>,
}

impl AuthenticationListener {
    pub fn new(sessions: Arc<dyn SessionStore>, notifications: EventBus<RoomEvent>) -> Self {
        Self {
            sessions,
            notifications,
        }
    }

    /// Handles a "message saved" event.
    ///
    /// The session named by the message thread id is updated with compare-and-swap, so
    /// concurrent presentations for one thread produce a single transition and a single
    /// `loggedin` notification.
    pub async fn on_saved_message(
        &self,
        message: &Message,
    ) -> Result<ListenerOutcome, SessionError> {
        if !message.is_presentation() {
            return Ok(ListenerOutcome::Ignored(IgnoreReason::NotAPresentation));
        }
        let Some(session_id) = message.thread_id() else {
            return Ok(ListenerOutcome::Ignored(IgnoreReason::MissingThreadId));
        };
        let Some(did) = message.from() else {
            warn!("Presentation {} for thread {} has no sender.", message.id, session_id);
            return Ok(ListenerOutcome::Ignored(IgnoreReason::MissingSender));
        };

        let now = Utc::now();
        let update = update_session(self.sessions.as_ref(), session_id, |session| {
            if session.is_authenticated() || session.login_request_expired(now) {
                return None;
            }
            Some(Session {
                did: Some(did.to_owned()),
                ..session.clone()
            })
        })
        .await?;

        match update {
            Update::Missing => {
                info!(
                    "No session for thread {}, ignoring presentation from {}.",
                    session_id, did
                );
                Ok(ListenerOutcome::Ignored(IgnoreReason::UnknownSession))
            }
            Update::Unchanged(session) if session.is_authenticated() => {
                warn!(
                    "Session {} already authenticated, ignoring presentation from {}.",
                    session_id, did
                );
                Ok(ListenerOutcome::Ignored(IgnoreReason::AlreadyAuthenticated))
            }
            Update::Unchanged(_) => {
                warn!(
                    "Login request for session {} expired, ignoring presentation from {}.",
                    session_id, did
                );
                Ok(ListenerOutcome::Ignored(IgnoreReason::LoginRequestExpired))
            }
            Update::Updated(session) => {
                info!("Session {} logged in as {}.", session.id, did);
                self.notifications.publish(RoomEvent {
                    room: session.id.to_owned(),
                    notification: Notification::LoggedIn {
                        did: did.to_owned(),
                    },
                });
                Ok(ListenerOutcome::Authenticated {
                    session_id: session.id,
                    did: did.to_owned(),
                })
            }
        }
    }

    /// Subscribes to agent events and handles them on a background task.
    pub fn spawn(self, events: &EventBus<AgentEvent>) -> ListenerHandle {
        let mut receiver = events.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(AgentEvent::SavedMessage(message)) => {
                        match self.on_saved_message(&message).await {
                            Ok(outcome) => debug!("Message {}: {:?}", message.id, outcome),
                            Err(err) => error!("Failed to handle message {}: {}", message.id, err),
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Authentication listener lagged, {} events skipped.", skipped)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Agent event bus closed, authentication listener stopped.");
        });
        ListenerHandle { handle }
    }
}

/// Owns the background listener task; the task is aborted when the handle is dropped.
#[derive(Debug)]
pub struct ListenerHandle {
    handle: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
