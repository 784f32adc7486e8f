use thiserror::Error;

/// Errors produced while fitting models or transforming batches.
///
/// Every variant is deterministic for a given input, so nothing here is
/// worth retrying; a failed call can only be fixed by changing the
/// configuration or the data.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid fit parameters: an empty corpus, a document frequency
    /// threshold no term can meet, or a latent dimension out of range.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Shape mismatch between paired structures at transform time.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A model whose fitted state is absent or degenerate, e.g. one
    /// deserialized from a stale or hand-built payload.
    #[error("{0} is not fitted")]
    NotFitted(&'static str),

    /// Fitted state could not be encoded or decoded.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_cbor::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
