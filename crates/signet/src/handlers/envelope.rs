//! JSON request/response envelopes and error mapping.
//!
//! every endpoint speaks `{ "requestObject": <T> }` in and
//! `{ "status": "OK", "responseObject": <T> }` out; errors become
//! `{ "status": "ERROR", "responseObject": { "code": "ERR_*", "message": "..." } }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use signet_types::ServiceError;

/// request wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope<T> {
    /// the operation request.
    #[serde(rename = "requestObject")]
    pub request_object: T,
}

/// response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    /// "OK" or "ERROR".
    pub status: String,
    /// the operation response.
    #[serde(rename = "responseObject")]
    pub response_object: T,
}

impl<T> ResponseEnvelope<T> {
    /// wrap a successful response.
    pub fn ok(response_object: T) -> Self {
        Self {
            status: "OK".to_string(),
            response_object,
        }
    }
}

/// error payload inside the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// stable machine-readable code.
    pub code: String,
    /// human-readable message.
    pub message: String,
}

/// api error type for handler responses.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let envelope = ResponseEnvelope {
            status: "ERROR".to_string(),
            response_object: ErrorBody {
                code: self.0.code().to_string(),
                message: self.0.to_string(),
            },
        };
        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_field_name() {
        let json = r#"{ "requestObject": { "activationId": "a-1" } }"#;
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Req {
            activation_id: String,
        }
        let envelope: RequestEnvelope<Req> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.request_object.activation_id, "a-1");
    }

    #[test]
    fn test_ok_envelope_shape() {
        let envelope = ResponseEnvelope::ok(serde_json::json!({"value": 1}));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(json["responseObject"]["value"], 1);
    }

    #[test]
    fn test_error_envelope_shape() {
        let envelope = ResponseEnvelope {
            status: "ERROR".to_string(),
            response_object: ErrorBody {
                code: ServiceError::ActivationExpired.code().to_string(),
                message: ServiceError::ActivationExpired.to_string(),
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "ERROR");
        assert_eq!(json["responseObject"]["code"], "ERR_ACTIVATION_EXPIRED");
    }
}
