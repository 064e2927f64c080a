//! Convenience result type alias for webchat.

use crate::error::AppError;

/// A specialized `Result` type for webchat operations.
pub type AppResult<T> = Result<T, AppError>;
