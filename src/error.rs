//! Error types for bazi_core

use thiserror::Error;

/// Result type for bazi_core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when computing charts and analyses
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Timestamp that cannot be represented, before or after adjustment
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Longitude outside the [-180, 180] degree range
    #[error("Invalid longitude: {0} (expected -180..=180)")]
    InvalidLongitude(f64),

    /// A stem or branch index outside the fixed 10/12-symbol sets
    #[error("Invalid symbol index: {0}")]
    InvalidSymbol(u8),

    /// A day master that cannot be assessed against the supplied distribution
    #[error("Invalid day master: {0}")]
    InvalidDayMaster(String),
}
