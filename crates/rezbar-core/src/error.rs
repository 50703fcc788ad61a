//! Error types for the rezbar-core library.
//!
//! This module provides comprehensive error handling using the `thiserror` crate,
//! with one variant per failure class: schema, decode, path, encode.

use thiserror::Error;

/// Result type alias for rezbar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all rezbar operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Schema is invalid or a named type cannot be resolved
    #[error("schema error: {0}")]
    Schema(String),

    /// Malformed wire data
    #[error("invalid wire data at offset {offset}: {reason}")]
    Decode {
        /// Absolute byte offset in the input buffer where the error occurred
        offset: usize,
        /// Human-readable description of the issue
        reason: String,
    },

    /// A field path addresses a node that does not exist in the tree
    #[error("path error: {0}")]
    Path(String),

    /// The value tree is in a state that cannot be serialized
    #[error("encode error: {0}")]
    Encode(String),

    /// Failed to parse the compiled descriptor
    #[error("failed to parse descriptor: {0}")]
    DescriptorParse(#[from] prost::DecodeError),

    /// Failed to parse presentation data
    #[error("failed to parse presentation data: {0}")]
    Presentation(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Creates a new decode error at the given byte offset
    pub fn decode(offset: usize, reason: impl Into<String>) -> Self {
        Self::Decode {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a new path error
    pub fn path(msg: impl Into<String>) -> Self {
        Self::Path(msg.into())
    }

    /// Creates a new encode error
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Returns true if this error only invalidates the triggering operation,
    /// leaving previously loaded editor state usable
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Path(_))
    }
}
