//! Error types for the mpack codec.

use std::io;

use mpack_buffers::BufferError;
use thiserror::Error;

/// Failures raised while encoding values.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// An integer cannot be represented by any native wire width and no
    /// oversized-integer extension is registered.
    #[error("integer out of MessagePack range")]
    IntOutOfRange,
    /// A string/binary/array/map length exceeds the 32-bit wire limit.
    #[error("payload length {0} exceeds format limits")]
    LengthOutOfRange(usize),
    /// Raw string bytes were not valid UTF-8.
    #[error("invalid utf-8 payload")]
    InvalidUtf8,
    /// No extension is registered for the supplied type.
    #[error("no extension registered for type")]
    UnregisteredType,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures raised while decoding byte streams.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The reserved tag `0xc1` appeared in the input.
    #[error("reserved tag 0xc1 encountered")]
    ReservedTag,
    /// Bytes remained after a complete top-level value.
    #[error("extra bytes after top-level value")]
    TrailingBytes,
    /// A timestamp extension payload was not 4, 8, or 12 bytes.
    #[error("unsupported timestamp payload length {0}")]
    TimestampLength(usize),
    /// A registered extension received a payload of unexpected size.
    #[error("extension payload has unexpected length {0}")]
    ExtPayloadLength(usize),
    /// Container nesting exceeded the 128-frame cap.
    #[error("nesting deeper than {} levels", crate::decoder::MAX_DEPTH)]
    StackExceeded,
    /// A typed header reader hit a tag of a different family.
    #[error("unexpected tag 0x{found:02x}, expected {expected}")]
    UnexpectedType { expected: &'static str, found: u8 },
    /// An unregistered extension type id was decoded without
    /// `allow_unknown_ext`.
    #[error("unknown extension type {0}")]
    UnknownExtType(i8),
    /// The input ended before a value completed.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// A string payload was not valid UTF-8.
    #[error("invalid utf-8 in string payload")]
    InvalidUtf8,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<BufferError> for DecodeError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::EndOfBuffer => DecodeError::UnexpectedEof,
            BufferError::InvalidUtf8 => DecodeError::InvalidUtf8,
        }
    }
}

/// Failures raised by factory configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FactoryError {
    /// The factory was frozen and no longer accepts registrations.
    #[error("factory is frozen")]
    Frozen,
}
