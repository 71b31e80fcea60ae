/// Unified error types for the caller identity verification service
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::ProviderError;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Raw input could not be reduced to a plausible phone number
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    /// Caller-ID provider failed transiently; safe to retry later
    #[error("Caller ID provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Caller-ID provider has no name for the number
    #[error("No caller ID record for {0}")]
    NoRecord(String),

    /// Number is not in the identity roster
    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    /// Identity registry could not be read
    #[error("Identity store error: {0}")]
    IdentityStore(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProviderError> for VerifyError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) => VerifyError::ProviderUnavailable(msg),
            ProviderError::NoRecord(phone) => VerifyError::NoRecord(phone),
        }
    }
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert VerifyError to HTTP response
impl IntoResponse for VerifyError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            VerifyError::RateLimitExceeded { retry_after } => Some(retry_after.as_secs().max(1)),
            _ => None,
        };

        let (status, error_code, message) = match self {
            VerifyError::InvalidPhoneNumber(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidPhoneNumber",
                self.to_string(),
            ),
            VerifyError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            VerifyError::UnknownIdentity(_) => (
                StatusCode::NOT_FOUND,
                "UnknownIdentity",
                self.to_string(),
            ),
            VerifyError::NoRecord(_) => (
                StatusCode::NOT_FOUND,
                "NoRecord",
                self.to_string(),
            ),
            VerifyError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            VerifyError::ProviderUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "ProviderUnavailable",
                self.to_string(),
            ),
            VerifyError::IdentityStore(_) => (
                StatusCode::BAD_GATEWAY,
                "IdentityStoreUnavailable",
                self.to_string(),
            ),
            VerifyError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            VerifyError::Database(_)
            | VerifyError::Migration(_)
            | VerifyError::Internal(_)
            | VerifyError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Result type alias for service operations
pub type VerifyResult<T> = Result<T, VerifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_conversion() {
        let err: VerifyError = ProviderError::NoRecord("+15551234567".to_string()).into();
        assert!(matches!(err, VerifyError::NoRecord(ref p) if p == "+15551234567"));

        let err: VerifyError = ProviderError::Unavailable("timeout".to_string()).into();
        assert!(matches!(err, VerifyError::ProviderUnavailable(_)));
    }

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (VerifyError::InvalidPhoneNumber("x".into()), StatusCode::BAD_REQUEST),
            (VerifyError::UnknownIdentity("x".into()), StatusCode::NOT_FOUND),
            (VerifyError::ProviderUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (VerifyError::IdentityStore("x".into()), StatusCode::BAD_GATEWAY),
            (VerifyError::Internal("secret".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = VerifyError::RateLimitExceeded {
            retry_after: std::time::Duration::from_millis(200),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }
}
