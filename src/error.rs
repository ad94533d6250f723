//! Custom error types for the node.
//!
//! This module defines the primary error type, `NodeError`, used across the
//! crate. Using the `thiserror` crate, it provides a centralized way to
//! handle the different kinds of failures the node can hit, from I/O and
//! configuration issues to modem communication problems.
//!
//! Note that most of the node's runtime degradations (a full queue, a failed
//! transmit, a corrupted storage header) are *not* errors: they are reported
//! through the status record or healed silently, and the node keeps running.
//! `NodeError` covers the genuinely exceptional paths: opening the storage
//! file, opening the serial port, reading the level source, malformed
//! configuration.

use thiserror::Error;

/// Convenience alias for results using the node error type.
pub type NodeResult<T> = std::result::Result<T, NodeError>;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Modem transport error: {0}")]
    Transport(String),

    #[error("Serial support not enabled. Rebuild with --features modem_serial")]
    SerialFeatureDisabled,
}
