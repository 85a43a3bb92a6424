//! handlers for the signature verification endpoints.

use axum::{extract::State, Json};

use crate::ops::signature as ops;
use crate::AppState;

use super::{ApiError, RequestEnvelope, ResponseEnvelope};

/// POST `/v3/signature/verify`
pub async fn verify(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::VerifySignatureRequest>>,
) -> Result<Json<ResponseEnvelope<ops::VerifySignatureResponse>>, ApiError> {
    let response = ops::verify_signature(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v3/signature/ecdsa/verify`
pub async fn verify_ecdsa(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::VerifyEcdsaSignatureRequest>>,
) -> Result<Json<ResponseEnvelope<ops::VerifyEcdsaSignatureResponse>>, ApiError> {
    let response = ops::verify_ecdsa_signature(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}
