use crate::errors::DIDLoginHTTPError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use didlogin_core::resolver::resolve_as_result;
use ssi::did::Document;
use std::sync::Arc;

/// Resolves a DID, including the messaging service published for the service identity.
pub async fn get_did_resolution(
    Path(did): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Document>, DIDLoginHTTPError> {
    Ok(Json(resolve_as_result(state.agent.as_ref(), &did).await?))
}
