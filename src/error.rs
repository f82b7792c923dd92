//! Centralized error handling for sealwatch.
//!
//! The variants follow the failure taxonomy of the service:
//!
//! - transient I/O never leaves the intake stage (it is retried there),
//! - payload and crypto failures abort the current file only,
//! - configuration and credential failures are fatal at startup,
//! - cancellation ends the watch loop.
//!
//! ```
//! use sealwatch::error::SealwatchError;
//!
//! fn is_fatal(err: &SealwatchError) -> bool {
//!     matches!(err, SealwatchError::Config(_) | SealwatchError::Credential(_))
//! }
//! ```
//!
//! The `ResultExt` trait adds `.context()` to any `Result` whose error
//! converts into [`SealwatchError`]:
//!
//! ```no_run
//! use sealwatch::error::{Result, ResultExt as _};
//!
//! fn read_payload(path: &str) -> Result<Vec<u8>> {
//!     std::fs::read(path).context("Failed to read payload")
//! }
//! ```

use std::fmt;

/// Main error type for sealwatch operations.
#[derive(Debug)]
pub enum SealwatchError {
    /// I/O errors (file operations)
    Io(std::io::Error),

    /// The measurement payload could not be read line by line
    Load(String),

    /// A checksum could not be computed for a value
    ChecksumUnavailable(String),

    /// Invalid or missing configuration
    Config(String),

    /// Key store password could not be resolved
    Credential(String),

    /// Key store could not be opened or lacks the configured alias
    KeyStore(String),

    /// Signature algorithm setup, signing or verification machinery failed
    Crypto(String),

    /// A signature did not match its file
    Verification(String),

    /// A file never became ready or could not be copied
    Intake(String),

    /// Operation cancelled by shutdown
    Cancelled,

    /// Generic error with context
    Other(String),
}

impl fmt::Display for SealwatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Load(msg) => write!(f, "Unable to load measurements: {msg}"),
            Self::ChecksumUnavailable(value) => write!(f, "Checksum unavailable for value: {value}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Credential(msg) => write!(f, "Credential error: {msg}"),
            Self::KeyStore(msg) => write!(f, "Key store error: {msg}"),
            Self::Crypto(msg) => write!(f, "Signature error: {msg}"),
            Self::Verification(msg) => write!(f, "Verification failed: {msg}"),
            Self::Intake(msg) => write!(f, "Intake error: {msg}"),
            Self::Cancelled => write!(f, "Operation cancelled"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SealwatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SealwatchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for SealwatchError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<serde_json::Error> for SealwatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<openssl::error::ErrorStack> for SealwatchError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        Self::Crypto(err.to_string())
    }
}

/// Result type alias for sealwatch operations.
pub type Result<T> = std::result::Result<T, SealwatchError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with the message.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with the produced message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<SealwatchError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: SealwatchError = e.into();
            SealwatchError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: SealwatchError = e.into();
            SealwatchError::Other(format!("{}: {}", f(), err))
        })
    }
}
