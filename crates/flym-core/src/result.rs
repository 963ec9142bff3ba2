//! Convenience result type alias for Flym.

use crate::error::AppError;

/// A specialized `Result` type for Flym operations.
pub type AppResult<T> = Result<T, AppError>;
