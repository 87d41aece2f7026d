//! Centralized error handling for Sublarr
//!
//! This module provides the error hierarchy shared by all application
//! layers, with stable machine-readable error codes and consistent HTTP
//! status mapping.
//!
//! # Error Categories
//!
//! - **Database Errors**: SeaORM operations, migrations, connection issues
//! - **Repository Errors**: Data access layer failures
//! - **Provider Errors**: Subtitle provider connectivity, rate limits, parsing
//! - **Validation Errors**: Input validation and business rule violations
//! - **Web Errors**: HTTP request/response handling issues
//!
//! # Usage
//!
//! ```rust
//! use sublarr::errors::{AppError, AppResult};
//!
//! async fn example_function() -> AppResult<String> {
//!     // Function can return any error type that converts to AppError
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for Provider Results
pub type ProviderResult<T> = Result<T, ProviderError>;
