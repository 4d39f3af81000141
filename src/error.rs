//! Error types for Golder

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for Golder operations
pub type Result<T> = std::result::Result<T, GolderError>;

/// Errors that can occur in Golder
#[derive(Debug, Error)]
pub enum GolderError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid suite configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// URL resolved through the engine is not a registered route
    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    /// Interceptor refused a live call to an unregistered URL
    #[error("Unregistered route: {0} is not declared in this suite")]
    UnregisteredRoute(String),

    /// First fetch of a route failed and there is no snapshot to fall back on
    #[error("GET {url} returned code {status}; cannot gold")]
    Upstream {
        /// Route URL
        url: String,
        /// Status code returned upstream
        status: u16,
    },

    /// Transport-level failure reaching upstream
    #[error("Network error: {0}")]
    Network(String),

    /// Stored snapshot could not be decoded
    #[error("Invalid snapshot {}: {reason}", .path.display())]
    InvalidSnapshot {
        /// Snapshot file
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// One or more routes failed during a batch gold
    #[error("{} route(s) failed to gold: {}", .failures.len(), FailureList(.failures))]
    GoldFailed {
        /// Every route that failed, in registration order
        failures: Vec<RouteFailure>,
    },
}

/// A single route failure collected by a batch gold
#[derive(Debug)]
pub struct RouteFailure {
    /// Route name
    pub route: String,
    /// Why it failed
    pub error: GolderError,
}

struct FailureList<'a>(&'a [RouteFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", failure.route, failure.error)?;
        }
        Ok(())
    }
}
