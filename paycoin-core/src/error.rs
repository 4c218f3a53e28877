//! Error types for the Paycoin codec

use thiserror::Error;

/// Main error type for parsing and serializing wire structures.
///
/// Every variant is fatal to the value being decoded: a constructor that
/// fails never hands back a partially populated node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A read needed more bytes than the buffer had left
    #[error("Buffer underrun: needed {needed} bytes, {remaining} remaining")]
    BufferUnderrun {
        /// Bytes the read asked for
        needed: usize,
        /// Bytes that were left in the buffer
        remaining: usize,
    },

    /// The bytes are well formed but break a structural rule
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The operation is not defined for this value
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The stream ran out before the network magic was found
    #[error("Stream exhausted before network magic was found")]
    ResyncFailure,

    /// A child index was past the end of its list
    #[error("Index {index} out of bounds for {len} elements")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Length of the list
        len: usize,
    },

    /// A transaction list operation was attempted on a header-only block
    #[error("Block was decoded as a header only and has no transaction list")]
    HeaderOnly,
}

impl CodecError {
    /// Shorthand for a [`CodecError::ProtocolViolation`].
    pub fn violation(msg: impl Into<String>) -> Self {
        CodecError::ProtocolViolation(msg.into())
    }

    /// True when the error only means more input is needed.
    pub fn is_underrun(&self) -> bool {
        matches!(self, CodecError::BufferUnderrun { .. } | CodecError::ResyncFailure)
    }
}

/// A specialized `Result` type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodecError::BufferUnderrun { needed: 4, remaining: 1 };
        assert_eq!(err.to_string(), "Buffer underrun: needed 4 bytes, 1 remaining");
        assert!(err.is_underrun());

        let err = CodecError::violation("bad count");
        assert_eq!(err.to_string(), "Protocol violation: bad count");
        assert!(!err.is_underrun());
    }
}
