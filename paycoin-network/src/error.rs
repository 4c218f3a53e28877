//! Error types for the Paycoin network module.

use std::io;

use paycoin_core::CodecError;
use thiserror::Error;

/// Main error type for the network module
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Framing or payload decoding failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serializer configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NetworkError {
    /// The codec error behind this one, if any.
    pub fn as_codec(&self) -> Option<&CodecError> {
        match self {
            NetworkError::Codec(err) => Some(err),
            _ => None,
        }
    }
}

/// A specialized `Result` type for network operations
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;
