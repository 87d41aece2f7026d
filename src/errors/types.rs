//! Error type definitions for the Sublarr application
//!
//! This module defines all error types used throughout the application,
//! providing a hierarchical error system with machine-readable codes that
//! surface in structured HTTP error responses.

use thiserror::Error;

/// Top-level application error type
///
/// This enum represents all possible errors that can occur in the application.
/// It uses `thiserror` to provide automatic error trait implementations and
/// proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Subtitle provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Web layer errors
    #[error("Web error: {0}")]
    Web(#[from] WebError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Configuration errors, optionally carrying a troubleshooting hint
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        troubleshooting: Option<String>,
    },

    /// External service errors (upstream managers, translation sidecar)
    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    /// Operation already in progress errors
    #[error("Operation already in progress: {operation_type} on {resource}")]
    OperationInProgress {
        operation_type: String,
        resource: String,
    },

    /// Destination volume does not have enough free space for an install
    #[error("Insufficient disk space: {available_mb} MB free, {required_mb} MB required")]
    InsufficientDiskSpace { required_mb: u64, available_mb: u64 },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Constraint violations (unique, foreign key, etc.)
    #[error("Constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    /// Data serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Migration failures
    #[error("Migration failed: {version} - {message}")]
    MigrationFailed { version: String, message: String },
}

/// Subtitle provider specific errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Search or download exceeded its wall-clock timeout
    #[error("Provider timeout: {provider}")]
    Timeout { provider: String },

    /// Circuit breaker rejected the call
    #[error("Circuit open for provider: {provider}")]
    CircuitOpen { provider: String },

    /// Provider returned 429; retry_after is the server hint when present
    #[error("Rate limited by {provider} (retry after {retry_after_secs:?}s)")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// Authentication/credentials failure
    #[error("Authentication failed for {provider}: {message}")]
    AuthenticationFailed { provider: String, message: String },

    /// Provider response could not be parsed
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    /// Non-success HTTP status from the provider
    #[error("HTTP {status} from {provider}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    /// Plugin definition was rejected during validation
    #[error("Invalid plugin definition in {file}: {message}")]
    InvalidPlugin { file: String, message: String },

    /// Provider is not registered
    #[error("Unknown provider: {provider}")]
    UnknownProvider { provider: String },
}

/// Web layer specific errors
#[derive(Error, Debug)]
pub enum WebError {
    /// Invalid request format
    #[error("Invalid request: {field} - {message}")]
    InvalidRequest { field: String, message: String },

    /// Missing or invalid API key
    #[error("Invalid authentication: {message}")]
    InvalidAuth { message: String },

    /// JSON parsing errors
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl AppError {
    /// Machine-readable error code, stable across releases
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DB_001",
            AppError::Repository(RepositoryError::ConstraintViolation { .. }) => "DB_002",
            AppError::Repository(RepositoryError::MigrationFailed { .. }) => "DB_003",
            AppError::Repository(_) => "DB_001",
            AppError::Provider(ProviderError::Timeout { .. }) => "PROV_002",
            AppError::Provider(ProviderError::CircuitOpen { .. }) => "PROV_003",
            AppError::Provider(ProviderError::RateLimited { .. }) => "PROV_004",
            AppError::Provider(ProviderError::AuthenticationFailed { .. }) => "PROV_005",
            AppError::Provider(ProviderError::InvalidPlugin { .. }) => "PROV_006",
            AppError::Provider(_) => "PROV_001",
            AppError::Web(WebError::InvalidAuth { .. }) => "AUTH_001",
            AppError::Web(_) => "WEB_001",
            AppError::Validation { .. } => "VAL_001",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Configuration { .. } => "CFG_001",
            AppError::ExternalService { .. } => "EXT_001",
            AppError::OperationInProgress { .. } => "OP_001",
            AppError::InsufficientDiskSpace { .. } => "SYS_001",
            AppError::Internal { .. } => "INTERNAL_ERROR",
            AppError::Http(_) => "HTTP_001",
        }
    }

    /// Troubleshooting hint for operator-facing error responses
    pub fn troubleshooting(&self) -> Option<String> {
        match self {
            AppError::Configuration {
                troubleshooting, ..
            } => troubleshooting.clone(),
            AppError::InsufficientDiskSpace { .. } => Some(
                "Free up disk space on the media volume or change the install destination."
                    .to_string(),
            ),
            AppError::Provider(ProviderError::AuthenticationFailed { provider, .. }) => Some(
                format!("Check the credentials configured for provider '{provider}' in Settings."),
            ),
            AppError::Web(WebError::InvalidAuth { .. }) => {
                Some("Provide the configured API key in the X-Api-Key header.".to_string())
            }
            _ => None,
        }
    }

    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            troubleshooting: None,
        }
    }

    /// Create a configuration error with a troubleshooting hint
    pub fn configuration_with_hint<S: Into<String>, H: Into<String>>(message: S, hint: H) -> Self {
        Self::Configuration {
            message: message.into(),
            troubleshooting: Some(hint.into()),
        }
    }

    /// Create an external service error
    pub fn external_service<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<R: Into<String>, I: ToString>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(AppError::validation("x").code(), "VAL_001");
        assert_eq!(AppError::configuration("x").code(), "CFG_001");
        assert_eq!(
            AppError::Provider(ProviderError::CircuitOpen {
                provider: "opensubtitles".into()
            })
            .code(),
            "PROV_003"
        );
        assert_eq!(
            AppError::InsufficientDiskSpace {
                required_mb: 100,
                available_mb: 50
            }
            .code(),
            "SYS_001"
        );
    }

    #[test]
    fn disk_space_error_carries_hint() {
        let err = AppError::InsufficientDiskSpace {
            required_mb: 100,
            available_mb: 12,
        };
        assert!(err.troubleshooting().is_some());
    }
}
