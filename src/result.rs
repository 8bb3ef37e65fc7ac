use crate::error::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
