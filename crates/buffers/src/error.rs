use thiserror::Error;

/// Failures surfaced by bounds-checked buffer reads.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    #[error("end of buffer")]
    EndOfBuffer,
    #[error("invalid utf-8")]
    InvalidUtf8,
}
