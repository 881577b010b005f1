//! Error handling for the webhook endpoint
//!
//! Every failure the relay provider can see is an `ApiError`. The status code
//! decides whether the relay retries: 5xx responses are retried upstream,
//! everything else is final.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inbound::{IngestError, PayloadError};
use crate::store::StorageError;

/// Standardized error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Timestamp of the error
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    // === Authentication & Configuration (401, 503) ===
    #[error("Authentication required: {reason}")]
    Unauthorized { reason: String },

    #[error("Webhook credentials are not configured")]
    NotConfigured,

    // === Request Errors (400, 405, 413, 415) ===
    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Recipient could not be determined")]
    MissingRecipient,

    #[error("Method not allowed: {method}")]
    MethodNotAllowed { method: String },

    #[error("Payload too large: max size is {max_size} bytes")]
    PayloadTooLarge { max_size: usize },

    #[error("Unsupported media type: {media_type}")]
    UnsupportedMediaType { media_type: String },

    // === Server Errors (500, 504) ===
    #[error("Failed to parse message: {message}")]
    ParseError { message: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },

    #[error("Processing timed out after {seconds}s")]
    GatewayTimeout { seconds: u64 },
}

impl ApiError {
    /// Get the error code for programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized { .. } => "AUTH_REQUIRED",
            ApiError::NotConfigured => "NOT_CONFIGURED",
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::MissingRecipient => "MISSING_RECIPIENT",
            ApiError::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            ApiError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            ApiError::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
            ApiError::ParseError { .. } => "PARSE_ERROR",
            ApiError::DatabaseError { .. } => "DATABASE_ERROR",
            ApiError::InternalError { .. } => "INTERNAL_ERROR",
            ApiError::GatewayTimeout { .. } => "GATEWAY_TIMEOUT",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            ApiError::BadRequest { .. } |
            ApiError::MissingRecipient => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,

            // 405 Method Not Allowed
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,

            // 413 Payload Too Large
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 415 Unsupported Media Type
            ApiError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            // 500 Internal Server Error
            ApiError::ParseError { .. } |
            ApiError::DatabaseError { .. } |
            ApiError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,

            // 503 Service Unavailable
            ApiError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            ApiError::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        match status.as_u16() {
            400..=499 => log::warn!("Client error: {} ({})", self, status),
            500..=599 => log::error!("Server error: {} ({})", self, status),
            _ => log::info!("API response: {} ({})", self, status),
        }

        let mut response = HttpResponse::build(status);
        if let ApiError::MethodNotAllowed { .. } = self {
            response.insert_header(("Allow", "POST"));
        }
        response.json(ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            timestamp: chrono::Utc::now(),
        })
    }
}

// === Type Conversions ===

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MissingRecipient => ApiError::MissingRecipient,
            IngestError::Parse(e) => ApiError::ParseError { message: e.to_string() },
            IngestError::Storage(e) => e.into(),
            IngestError::Attachment(e) => ApiError::InternalError { message: e.to_string() },
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::DatabaseError { message: err.to_string() }
    }
}

impl From<PayloadError> for ApiError {
    fn from(err: PayloadError) -> Self {
        match err {
            PayloadError::UnsupportedMediaType(media_type) => ApiError::UnsupportedMediaType { media_type },
            PayloadError::InvalidJson(message) => ApiError::ParseError { message },
        }
    }
}
