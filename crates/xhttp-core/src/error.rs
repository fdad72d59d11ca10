//! Error types for writing responses.

use thiserror::Error;

use crate::sink::SinkError;

/// A response could not be written.
///
/// These failures are local to one request: the status line may already be
/// on its way, so they are reported and never retried.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The body could not be encoded.
    #[error("could not encode response body: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sink rejected the body.
    #[error("could not write response: {0}")]
    Sink(#[from] SinkError),
}
