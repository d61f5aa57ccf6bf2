//! Custom error types for the crate.
//!
//! A single `thiserror` enum covers the whole taxonomy: bus-level failures,
//! bad mode arguments, malformed sweep parameters, and file output problems.
//! Every operation either succeeds or returns one of these to the immediate
//! caller; nothing is retried automatically.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The bus cannot reach the instrument. Reported at session
    /// construction and fatal to that session.
    #[error("device unavailable at {address}: {reason}")]
    DeviceUnavailable { address: String, reason: String },

    /// An unrecognized source/measure kind was supplied. The instrument
    /// state is left unchanged.
    #[error("unsupported mode '{0}': expected one of voltage, current, resistance")]
    UnsupportedMode(String),

    /// Sweep parameters that the instrument would reject, caught locally.
    #[error("invalid sweep spec: {0}")]
    InvalidSweepSpec(String),

    /// A save path that cannot be created or written.
    #[error("file I/O error: {0}")]
    FileIo(#[from] std::io::Error),

    /// Settings file missing, unreadable, or failing to deserialize.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A read or write on the bus transport failed mid-session.
    #[error("transport error: {0}")]
    Transport(String),

    /// The instrument replied with something we could not parse.
    #[error("malformed instrument response: {0}")]
    MalformedResponse(String),

    /// Functionality compiled out. Rebuild with the named feature.
    #[error("feature '{0}' is not enabled. Rebuild with --features {0}")]
    FeatureDisabled(&'static str),
}
