//! Convenience result type alias for PluginHost.

use crate::error::AppError;

/// A specialized `Result` type for PluginHost operations.
pub type AppResult<T> = Result<T, AppError>;
