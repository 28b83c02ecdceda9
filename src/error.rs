//! Error types for jpegr-metadata

/// Result type for gain-map metadata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing gain-map metadata
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Destination buffer cannot hold the output. Recoverable: the caller
    /// may retry with a larger buffer. Bytes already written to the
    /// destination must be discarded.
    #[error("buffer too small: need {needed} bytes, capacity is {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// Malformed or unsupported binary metadata structure
    #[error("invalid metadata: {0}")]
    Metadata(String),

    /// XMP block is ill-formed or missing required gain-map fields;
    /// callers should treat this as "no gain-map metadata available"
    #[error("gain-map XMP rejected: {0}")]
    ParseRejected(String),
}
