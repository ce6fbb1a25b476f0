//! Messaging service endpoint receiving wallet messages.
use crate::errors::DIDLoginHTTPError;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use didlogin_core::agent::MessageHandler;
use log::info;
use serde_json::{json, Value};
use std::sync::Arc;

/// Validates and saves a raw message, read as text whatever its content type.
///
/// Responds `{"id": <message id>}`; saving triggers the authentication listener without
/// waiting for it.
pub async fn handle_message(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<Value>, DIDLoginHTTPError> {
    let message = state.agent.handle_message(&body).await.map_err(|err| {
        info!("Rejected message: {}", err);
        err
    })?;
    Ok(Json(json!({ "id": message.id })))
}
