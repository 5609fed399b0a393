use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Unique error codes for client identification
#[derive(Debug, Clone, Copy)]
pub enum ErrorCode {
    // Database errors (1xxx)
    DatabaseConnection = 1001,
    DatabaseQuery = 1002,

    // Validation errors (2xxx)
    ValidationFailed = 2001,
    MissingField = 2002,

    // External service errors (5xxx)
    ProviderUnavailable = 5001,
    ProviderResponse = 5002,
    LlmUnavailable = 5003,
    LlmResponse = 5004,

    // Resource errors (6xxx)
    NotFound = 6001,
    AlreadyExists = 6002,

    // Internal errors (9xxx)
    InternalError = 9001,
    ConfigurationError = 9002,
}

impl ErrorCode {
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    // Database errors
    #[error("Database connection error: {0}")]
    DatabaseConnectionError(String),

    #[error("Database query error: {0}")]
    DatabaseQueryError(#[from] sea_orm::DbErr),

    // Validation errors
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    // External search providers: contained by the aggregator, never fatal
    #[error("Provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: &'static str, message: String },

    #[error("Provider {provider} returned a malformed response: {message}")]
    ProviderResponse { provider: &'static str, message: String },

    // Generative text service: callers fall back to deterministic paths
    #[error("Generative service not configured")]
    LlmUnavailable,

    #[error("Generative service error: {0}")]
    LlmError(String),

    // Resource errors
    #[error("Resource not found: {resource_type} with id {resource_id}")]
    NotFound { resource_type: String, resource_id: String },

    /// Uniqueness violation at insert time. For papers and tags this is the
    /// benign-duplicate signal, handled at the call site, not surfaced raw.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    // Internal errors
    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),
}

impl AppError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::DatabaseConnectionError(_) => ErrorCode::DatabaseConnection,
            Self::DatabaseQueryError(_) => ErrorCode::DatabaseQuery,
            Self::ValidationError(_) => ErrorCode::ValidationFailed,
            Self::MissingField(_) => ErrorCode::MissingField,
            Self::ProviderUnavailable { .. } => ErrorCode::ProviderUnavailable,
            Self::ProviderResponse { .. } => ErrorCode::ProviderResponse,
            Self::LlmUnavailable => ErrorCode::LlmUnavailable,
            Self::LlmError(_) => ErrorCode::LlmResponse,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::AlreadyExists(_) => ErrorCode::AlreadyExists,
            Self::InternalError(_) => ErrorCode::InternalError,
            Self::ConfigError(_) => ErrorCode::ConfigurationError,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseConnectionError(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseQueryError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::ProviderUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::ProviderResponse { .. } => StatusCode::BAD_GATEWAY,
            Self::LlmUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::LlmError(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for the uniqueness-violation signal the pipeline treats as a
    /// duplicate rather than a failure.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        match &self {
            AppError::ValidationError(_)
            | AppError::MissingField(_)
            | AppError::NotFound { .. }
            | AppError::AlreadyExists(_) => {
                tracing::debug!(error_code = error_code.as_u16(), %message, "Client error");
            }
            AppError::ProviderUnavailable { .. }
            | AppError::ProviderResponse { .. }
            | AppError::LlmUnavailable
            | AppError::LlmError(_) => {
                tracing::warn!(error_code = error_code.as_u16(), %message, "Upstream error");
            }
            _ => {
                tracing::error!(error_code = error_code.as_u16(), %message, error = ?self, "Server error");
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code.as_u16(),
                "status": status.as_u16(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
