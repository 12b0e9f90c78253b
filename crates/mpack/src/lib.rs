//! Streaming MessagePack encoder/decoder.
//!
//! The codec is split along the format's own seams: a [`Value`] model, an
//! [`Encoder`] with normative width selection, a resumable [`Decoder`] that
//! accepts bytes in arbitrary pieces, extension registries bridged by a
//! [`Factory`], and a [`Pool`] for recycling instances.
//!
//! One-shot helpers cover the common case:
//!
//! ```
//! use mpack::{pack, unpack, Value};
//!
//! let bytes = pack(&Value::Array(vec![Value::Int(1), Value::Str("x".into())])).unwrap();
//! assert_eq!(unpack(&bytes).unwrap(), Value::Array(vec![Value::Int(1), Value::Str("x".into())]));
//! ```

pub mod constants;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod factory;
pub mod pool;
pub mod registry;
pub mod timestamp;
pub mod value;

use std::io;
use std::sync::OnceLock;

pub use decoder::{Decoder, DecoderOptions, Values};
pub use encoder::Encoder;
pub use error::{DecodeError, EncodeError, FactoryError};
pub use factory::{register_bigint, Factory, RegisteredType, TypeRegistration};
pub use pool::Pool;
pub use timestamp::Timestamp;
pub use value::{Ext, Value};

fn default_factory() -> &'static Factory {
    static FACTORY: OnceLock<Factory> = OnceLock::new();
    FACTORY.get_or_init(|| {
        let mut factory = Factory::new();
        factory.freeze();
        factory
    })
}

/// Encodes one value to a byte vector.
pub fn pack(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = default_factory().encoder();
    encoder.write(value)?;
    encoder.finalize()
}

/// Encodes one value into `sink`.
pub fn pack_to<W: io::Write + Send + 'static>(value: &Value, sink: W) -> Result<(), EncodeError> {
    let mut encoder = default_factory().encoder_with_sink(sink);
    encoder.write(value)?;
    encoder.finalize()?;
    Ok(())
}

/// Decodes exactly one value from a byte slice.
pub fn unpack(bytes: &[u8]) -> Result<Value, DecodeError> {
    default_factory()
        .decoder(DecoderOptions::default())
        .decode(bytes)
}

/// Decodes exactly one value from a byte source.
pub fn unpack_from<R: io::Read + Send + 'static>(source: R) -> Result<Value, DecodeError> {
    default_factory()
        .decoder_with_source(source, DecoderOptions::default())
        .full_decode()
}
