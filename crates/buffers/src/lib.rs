//! Chunked byte stores for the mpack codec family.
//!
//! The write side ([`WriteBuffer`]) coalesces small writes into shared
//! segments; the read side ([`ReadBuffer`]) is a sliding window over fed
//! chunks that supports tentative reads with rollback.

mod error;
mod read_buffer;
mod write_buffer;

pub use error::BufferError;
pub use read_buffer::{Pos, ReadBuffer};
pub use write_buffer::{WriteBuffer, COALESCE_THRESHOLD};
