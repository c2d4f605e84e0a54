//! Convenience result type alias for Lamtamnix.

use crate::error::AppError;

/// A specialized `Result` type for plugin host operations.
pub type AppResult<T> = Result<T, AppError>;
