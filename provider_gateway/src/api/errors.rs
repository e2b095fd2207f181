//! HTTP error envelopes.
//!
//! Validation problems are answered at the boundary with a 400 and a bare
//! error message. Orchestration and network failures are folded into a
//! generic 503 envelope that carries the request context (minus secrets) for
//! observability; stack traces never reach the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::errors::GatewayError;

/// Body of a validation failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// 400 response with a bare error message.
pub fn validation_error(message: impl Into<String>) -> Response {
    let message = message.into();
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: message })).into_response()
}

/// 401 response for a failed authorization check.
pub fn authorization_error(message: impl Into<String>) -> Response {
    let message = message.into();
    (StatusCode::UNAUTHORIZED, Json(ErrorBody { error: message })).into_response()
}

/// Generic 503 envelope with the request context attached.
pub fn service_unavailable(error: &dyn std::fmt::Display, context: Value) -> Response {
    let payload: Vec<String> = match &context {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{}={}", key, s),
                other => format!("{}={}", key, other),
            })
            .collect(),
        other => vec![other.to_string()],
    };
    log::error!("Payload was: {}", payload.join(","));

    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({
            "error": error.to_string(),
            "context": context,
        })),
    )
        .into_response()
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            GatewayError::MalformedRequest(message) => validation_error(message.clone()),
            GatewayError::InvalidSignature(message) => authorization_error(message.clone()),
            GatewayError::UnsafeUrl(_) | GatewayError::UpstreamUnavailable(_) => {
                service_unavailable(&self, Value::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_validation_error_status() {
        let response = validation_error("missing field");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_service_unavailable_status() {
        let err = GatewayError::UpstreamUnavailable("operator down".to_string());
        let response = service_unavailable(&err, serde_json::json!({"jobId": "1"}));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_gateway_error_mapping() {
        let response = GatewayError::MalformedRequest("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = GatewayError::InvalidSignature("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = GatewayError::UnsafeUrl("http://10.0.0.1".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
