//! Server-sent events pushing notifications to the browser of a session.
use crate::middleware::SessionContext;
use crate::state::AppState;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use log::debug;
use std::convert::Infallible;
use std::sync::Arc;

/// Streams the notifications of the caller's session room.
pub async fn events(
    State(state): State<Arc<AppState>>,
    session: SessionContext,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Session {} subscribed to notifications.", session.id);
    let stream = state
        .notifications
        .room_stream(&session.id)
        .map(|notification| {
            Ok(Event::default()
                .event(notification.name())
                .data(notification.payload().to_string()))
        });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
