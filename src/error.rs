//! Crate error type.
//!
//! Mirrors hand-rolled `RoutingError`: a flat enum with manual
//! `Display`/`Error` impls rather than a derive-macro crate, plus `From`
//! conversions at the I/O boundaries.

use std::fmt;

/// Error kinds for the flyer-route pipeline.
#[derive(Debug)]
pub enum Error {
    /// Bad polygon, out-of-range radius, or unknown area type.
    InvalidArea(String),
    /// `num_routes` out of range, unknown travel mode or balance priority.
    InvalidParameters(String),
    /// The pruned road graph has zero edges.
    NoRoads,
    /// The partitioner produced zero non-empty zones.
    NoZones,
    /// Upstream map provider call failed.
    ProviderFailure(String),
    /// Upstream map provider call exceeded its timeout.
    ProviderTimeout,
    /// Unexpected invariant violation.
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArea(msg) => write!(f, "invalid area: {}", msg),
            Error::InvalidParameters(msg) => write!(f, "invalid parameters: {}", msg),
            Error::NoRoads => write!(f, "no roads found in the specified area"),
            Error::NoZones => write!(f, "partitioner produced no zones"),
            Error::ProviderFailure(msg) => write!(f, "map provider failure: {}", msg),
            Error::ProviderTimeout => write!(f, "map provider call timed out"),
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::ProviderFailure(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ProviderFailure(format!("malformed provider response: {}", e))
    }
}

/// HTTP status code this error should surface as.
impl Error {
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidArea(_) | Error::InvalidParameters(_) => 400,
            Error::NoRoads => 400,
            Error::NoZones => 500,
            Error::ProviderFailure(_) | Error::ProviderTimeout => 502,
            Error::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
