//! Central error types for the engine (thiserror-based).

use thiserror::Error;

/// Errors flowing through the playback pipeline.
///
/// `Eof` is an ordinary error value rather than a separate channel: the
/// inter-stage queues latch it like any other terminal condition, so
/// "end of stream" and "failure" travel the same path and are told apart
/// only at the edges. The enum is `Clone + PartialEq` for that reason —
/// a latched error is re-observed by every later queue operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Normal terminal condition of a stream or queue.
    #[error("end of stream")]
    Eof,

    /// No packet available yet; the caller should retry shortly.
    #[error("temporarily unavailable, try again")]
    Again,

    /// The source produced a malformed payload. Recoverable: the decoder
    /// discards the packet and continues.
    #[error("invalid data in stream")]
    InvalidData,

    /// Codec failure; fatal to the current session.
    #[error("decoder failed: {0}")]
    Decoder(String),

    /// Allocation failure.
    #[error("allocation failed")]
    NoMem,

    /// Unsupported media, option, or configuration; fatal at init.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Third-party component failure, typically fatal.
    #[error("external component failed: {0}")]
    External(String),
}

impl EngineError {
    /// True for the normal end-of-stream condition (as opposed to a failure).
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}

/// Convenience Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
