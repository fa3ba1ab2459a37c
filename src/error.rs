use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for the SSV gateway
#[derive(Debug, thiserror::Error)]
pub enum RewardgateError {
    /// The key directory could not be fetched or parsed.
    ///
    /// Recoverable: nothing is cached on this path, so the next lookup
    /// retries the fetch. The key cache swallows this error; it never
    /// reaches a request handler.
    #[error("Key fetch failed: {0}")]
    KeyFetch(String),

    #[error("Signature verification failed")]
    SignatureInvalid,

    /// A callback that passed signature verification carried an unusable
    /// required field. Should not occur on an authentic message.
    #[error("Malformed callback payload: {0}")]
    PayloadMalformed(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Standard error response format for API errors.
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
    error_id: String,
}

impl RewardgateError {
    pub fn key_fetch(msg: impl Into<String>) -> Self {
        Self::KeyFetch(msg.into())
    }

    pub fn payload_malformed(msg: impl Into<String>) -> Self {
        Self::PayloadMalformed(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::SignatureInvalid => StatusCode::UNAUTHORIZED,
            Self::PayloadMalformed(_) => StatusCode::BAD_REQUEST,
            Self::KeyFetch(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Persistence(_) | Self::Internal(_) | Self::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a safe error message suitable for client responses.
    ///
    /// Client errors (4xx) expose their message since the caller needs to
    /// know what went wrong. Server errors (5xx) return a generic message to
    /// prevent information disclosure (CWE-209); the details are logged
    /// server-side only.
    fn safe_message(&self) -> String {
        match self {
            Self::SignatureInvalid => "Signature verification failed".to_string(),
            Self::PayloadMalformed(msg) => format!("Malformed callback payload: {}", msg),

            Self::KeyFetch(_) => "Service unavailable".to_string(),
            Self::Persistence(_) => "Error saving reward information".to_string(),
            Self::Internal(_) | Self::Anyhow(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for RewardgateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        // Full error details stay in the server logs.
        tracing::error!(
            status = status.as_u16(),
            error_id = %error_id,
            error = %self,
            "Callback request failed"
        );

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id,
        });

        (status, body).into_response()
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, RewardgateError>;

impl From<reqwest::Error> for RewardgateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RewardgateError::KeyFetch("key directory fetch timed out".to_string())
        } else if err.is_connect() {
            RewardgateError::KeyFetch(format!("key directory unreachable: {}", err))
        } else {
            RewardgateError::KeyFetch(format!("key directory fetch failed: {}", err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============ Variant creation and status mapping ============

    #[test]
    fn test_signature_invalid_maps_to_unauthorized() {
        let err = RewardgateError::SignatureInvalid;
        assert_eq!(err.to_string(), "Signature verification failed");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_payload_malformed_maps_to_bad_request() {
        let err = RewardgateError::payload_malformed("invalid reward_amount 'abc'");
        assert!(matches!(err, RewardgateError::PayloadMalformed(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_key_fetch_maps_to_service_unavailable() {
        let err = RewardgateError::key_fetch("connection refused");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_persistence_maps_to_internal_server_error() {
        let err = RewardgateError::persistence("unique constraint violated mid-flight");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_anyhow_error() {
        let err: RewardgateError = anyhow::anyhow!("unexpected").into();
        assert!(matches!(err, RewardgateError::Anyhow(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // ============ safe_message (information disclosure prevention) ============

    #[test]
    fn test_safe_message_client_errors_exposed() {
        assert_eq!(
            RewardgateError::payload_malformed("missing transaction_id").safe_message(),
            "Malformed callback payload: missing transaction_id"
        );
        assert_eq!(
            RewardgateError::SignatureInvalid.safe_message(),
            "Signature verification failed"
        );
    }

    #[test]
    fn test_safe_message_server_errors_hidden() {
        assert_eq!(
            RewardgateError::persistence("db-prod-01:5432 rejected credentials").safe_message(),
            "Error saving reward information"
        );
        assert_eq!(
            RewardgateError::key_fetch("dns lookup failed for internal host").safe_message(),
            "Service unavailable"
        );
        assert_eq!(
            RewardgateError::internal("pool exhausted").safe_message(),
            "Internal server error"
        );
    }

    // ============ IntoResponse ============

    #[tokio::test]
    async fn test_into_response_statuses() {
        let response = RewardgateError::SignatureInvalid.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = RewardgateError::payload_malformed("bad").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = RewardgateError::persistence("oops").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_into_response_body_hides_server_details() {
        let response = RewardgateError::persistence("password is 'hunter2'").into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error"], "Error saving reward information");
        assert!(!json["error"].as_str().unwrap().contains("hunter2"));
        // An error id is always generated for reconciliation.
        assert!(uuid::Uuid::parse_str(json["error_id"].as_str().unwrap()).is_ok());
    }
}
