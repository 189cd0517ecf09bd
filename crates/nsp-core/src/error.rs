//! Unified error types for the predictor workspace
//!
//! [`NspError`] is the common error at API boundaries. Concern-specific enums such as
//! [`TopologyError`](crate::topology::TopologyError) convert into it with `?`.
//!
//! # Example
//!
//! ```
//! use nsp_core::{NspError, NspResult};
//!
//! fn check_precision(precision: f64) -> NspResult<()> {
//!     if precision <= 0.0 {
//!         return Err(NspError::Config(format!("precision must be positive, got {precision}")));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_precision(0.001).is_ok());
//! assert!(check_precision(0.0).is_err());
//! ```

use thiserror::Error;

use crate::topology::TopologyError;

/// Unified error type for predictor operations.
#[derive(Error, Debug)]
pub enum NspError {
    /// I/O errors (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Malformed input messages
    #[error("Message error: {0}")]
    Message(String),

    /// Radial topology violations
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Sweep/numeric errors
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using NspError.
pub type NspResult<T> = Result<T, NspError>;

impl From<String> for NspError {
    fn from(s: String) -> Self {
        NspError::Other(s)
    }
}

impl From<&str> for NspError {
    fn from(s: &str) -> Self {
        NspError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for NspError {
    fn from(err: serde_json::Error) -> Self {
        NspError::Parse(err.to_string())
    }
}
