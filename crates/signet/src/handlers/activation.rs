//! handlers for the activation lifecycle endpoints.

use axum::{extract::State, Json};

use crate::ops::activation as ops;
use crate::AppState;

use super::{ApiError, RequestEnvelope, ResponseEnvelope};

/// POST `/v3/activation/init`
pub async fn init(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::InitActivationRequest>>,
) -> Result<Json<ResponseEnvelope<ops::InitActivationResponse>>, ApiError> {
    let response = ops::init_activation(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v3/activation/prepare`
pub async fn prepare(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::PrepareActivationRequest>>,
) -> Result<Json<ResponseEnvelope<ops::PrepareActivationResponse>>, ApiError> {
    let response = ops::prepare_activation(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v3/activation/create`
pub async fn create(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::CreateActivationRequest>>,
) -> Result<Json<ResponseEnvelope<ops::PrepareActivationResponse>>, ApiError> {
    let response = ops::create_activation(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v3/activation/commit`
pub async fn commit(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::CommitActivationRequest>>,
) -> Result<Json<ResponseEnvelope<ops::CommitActivationResponse>>, ApiError> {
    let response = ops::commit_activation(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v3/activation/status`
pub async fn status(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::GetActivationStatusRequest>>,
) -> Result<Json<ResponseEnvelope<ops::GetActivationStatusResponse>>, ApiError> {
    let response = ops::get_activation_status(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v3/activation/remove`
pub async fn remove(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::RemoveActivationRequest>>,
) -> Result<Json<ResponseEnvelope<ops::RemoveActivationResponse>>, ApiError> {
    let response = ops::remove_activation(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v3/activation/block`
pub async fn block(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::BlockActivationRequest>>,
) -> Result<Json<ResponseEnvelope<ops::BlockActivationResponse>>, ApiError> {
    let response = ops::block_activation(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v3/activation/unblock`
pub async fn unblock(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::UnblockActivationRequest>>,
) -> Result<Json<ResponseEnvelope<ops::BlockActivationResponse>>, ApiError> {
    let response = ops::unblock_activation(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v3/activation/otp/update`
pub async fn update_otp(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::UpdateActivationOtpRequest>>,
) -> Result<Json<ResponseEnvelope<ops::UpdateActivationOtpResponse>>, ApiError> {
    let response = ops::update_activation_otp(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v3/activation/list`
pub async fn list(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::ListActivationsRequest>>,
) -> Result<Json<ResponseEnvelope<ops::ActivationListResponse>>, ApiError> {
    let response = ops::list_activations(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v3/activation/lookup`
pub async fn lookup(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::LookupActivationsRequest>>,
) -> Result<Json<ResponseEnvelope<ops::ActivationListResponse>>, ApiError> {
    let response = ops::lookup_activations(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v3/activation/history`
pub async fn history(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::ActivationHistoryRequest>>,
) -> Result<Json<ResponseEnvelope<ops::ActivationHistoryResponse>>, ApiError> {
    let response = ops::get_activation_history(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v2/activation/prepare`
pub async fn prepare_legacy(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::PrepareActivationLegacyRequest>>,
) -> Result<Json<ResponseEnvelope<ops::PrepareActivationLegacyResponse>>, ApiError> {
    let response = ops::prepare_activation_legacy(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}

/// POST `/v2/activation/create`
pub async fn create_legacy(
    State(state): State<AppState>,
    Json(envelope): Json<RequestEnvelope<ops::CreateActivationLegacyRequest>>,
) -> Result<Json<ResponseEnvelope<ops::PrepareActivationLegacyResponse>>, ApiError> {
    let response = ops::create_activation_legacy(&state, envelope.request_object).await?;
    Ok(Json(ResponseEnvelope::ok(response)))
}
