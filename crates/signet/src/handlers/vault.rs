//! handler for the vault unlock endpoint.

use axum::{extract::State, Json};

use crate::ops::vault as ops;
use crate::AppState;

use super::{ApiError, RequestEnvelope, ResponseEnvelope};

/// POST `/v3/vault/unlock`
pub async fn unlock(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::VaultUnlockRequest>>,
) -> Result<Json<ResponseEnvelope<ops::VaultUnlockResponse>>, ApiError> {
    let response = ops::unlock_vault(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}
