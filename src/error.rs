use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by the client, the request gate and lazy views.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure, or a body that could not be decoded as JSON.
    #[error("{0}")]
    Reqwest(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("unexpected status code: {0}")]
    UnexpectedStatus(StatusCode),

    /// Keyed lookup of a key the view does not hold.
    #[error("no such key: {0:?}")]
    KeyNotFound(String),

    /// Attribute-style lookup of a key the view does not hold.
    #[error("no such attribute: {0:?}")]
    AttributeNotFound(String),

    /// The decoded payload does not have the shape the route expects.
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),

    /// The client was configured with invalid values.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The request gate was closed while waiting for admission.
    #[error("request gate is closed")]
    Closed,
}

impl Error {
    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::UnexpectedStatus(code) => Some(*code),
            Error::Reqwest(e) => e.status(),
            _ => None,
        }
    }

    /// Returns `true` for the missing-key and missing-attribute lookups.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound(_) | Error::AttributeNotFound(_))
    }
}
