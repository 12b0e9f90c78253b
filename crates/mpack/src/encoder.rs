//! `Encoder` — value to tagged byte sequence.

use std::any::{Any, TypeId};
use std::io;
use std::sync::Arc;

use mpack_buffers::WriteBuffer;

use crate::constants::*;
use crate::registry::{ExtPacker, PackerRegistry};
use crate::{EncodeError, Timestamp, Value};

/// Encodes values into MessagePack, accumulating bytes in a chunked buffer.
///
/// The narrowest wire width that can represent a value is always chosen,
/// with one exception: in compatibility mode strings never use `str8` (they
/// are promoted to `str16`) and binary payloads are emitted with string
/// tags, restricting output to the pre-binary subset of the format.
pub struct Encoder {
    writer: WriteBuffer,
    sink: Option<Box<dyn io::Write + Send>>,
    registry: Arc<PackerRegistry>,
    compatibility_mode: bool,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// Creates an encoder with an empty extension registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(PackerRegistry::new()))
    }

    /// Creates an encoder over a shared registry snapshot. Used by factories.
    pub fn with_registry(registry: Arc<PackerRegistry>) -> Self {
        Self {
            writer: WriteBuffer::new(),
            sink: None,
            registry,
            compatibility_mode: false,
        }
    }

    /// Binds an output sink; [`finalize`](Encoder::finalize) will drain into
    /// it instead of returning bytes.
    pub fn sink<W: io::Write + Send + 'static>(mut self, sink: W) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Restricts output to the pre-binary tag subset.
    pub fn compatibility_mode(mut self, enabled: bool) -> Self {
        self.compatibility_mode = enabled;
        self
    }

    pub fn is_compatibility_mode(&self) -> bool {
        self.compatibility_mode
    }

    /// Number of bytes accumulated since the last finalize/reset.
    pub fn buffered(&self) -> usize {
        self.writer.len()
    }

    /// Discards any accumulated bytes.
    pub fn reset(&mut self) {
        self.writer.reset();
    }

    /// Encodes one value, extension registrations taking priority over the
    /// built-in tags for the types they cover.
    pub fn write(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Nil => {
                self.write_nil();
                Ok(())
            }
            Value::Bool(b) => {
                self.write_bool(*b);
                Ok(())
            }
            Value::Int(i) => {
                self.write_int(*i);
                Ok(())
            }
            Value::UInt(u) => {
                self.write_uint(*u);
                Ok(())
            }
            Value::Float(f) => {
                self.write_float(*f);
                Ok(())
            }
            Value::Str(s) => self.write_str(s),
            Value::Symbol(s) => self.write_str(s),
            Value::Bin(b) => self.write_bin(b),
            Value::Array(items) => {
                self.write_array_header(items.len())?;
                for item in items {
                    self.write(item)?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                self.write_map_header(entries.len())?;
                for (key, val) in entries {
                    self.write(key)?;
                    self.write(val)?;
                }
                Ok(())
            }
            Value::Ext(ext) => self.write_ext(ext.type_id, &ext.data),
            Value::Timestamp(ts) => match self.registry.lookup(TypeId::of::<Timestamp>()) {
                Some(_) => self.write_extension(ts),
                None => self.write_timestamp(*ts),
            },
            Value::BigInt(i) => self.write_bigint(*i),
        }
    }

    /// Returns the accumulated bytes and resets.
    ///
    /// With a sink bound the bytes are drained into it instead and an empty
    /// vector is returned.
    pub fn finalize(&mut self) -> Result<Vec<u8>, EncodeError> {
        match &mut self.sink {
            Some(sink) => {
                self.writer.flush_to(sink)?;
                sink.flush()?;
                Ok(Vec::new())
            }
            None => Ok(self.writer.flush()),
        }
    }

    pub fn write_nil(&mut self) {
        self.writer.u8(NIL);
    }

    pub fn write_bool(&mut self, b: bool) {
        self.writer.u8(if b { TRUE } else { FALSE });
    }

    pub fn write_int(&mut self, v: i64) {
        if v >= 0 {
            self.write_uint(v as u64);
        } else if v >= -32 {
            self.writer.u8(v as i8 as u8);
        } else if v >= i8::MIN as i64 {
            self.writer.u16((INT8 as u16) << 8 | (v as i8 as u8 as u16));
        } else if v >= i16::MIN as i64 {
            self.writer.u8u16(INT16, v as i16 as u16);
        } else if v >= i32::MIN as i64 {
            self.writer.u8u32(INT32, v as i32 as u32);
        } else {
            self.writer.u8u64(INT64, v as u64);
        }
    }

    pub fn write_uint(&mut self, v: u64) {
        if v <= POS_FIXINT_MAX as u64 {
            self.writer.u8(v as u8);
        } else if v <= u8::MAX as u64 {
            self.writer.u16((UINT8 as u16) << 8 | v as u16);
        } else if v <= u16::MAX as u64 {
            self.writer.u8u16(UINT16, v as u16);
        } else if v <= u32::MAX as u64 {
            self.writer.u8u32(UINT32, v as u32);
        } else {
            self.writer.u8u64(UINT64, v);
        }
    }

    pub fn write_float(&mut self, v: f64) {
        self.writer.u8f64(FLOAT64, v);
    }

    pub fn write_float32(&mut self, v: f32) {
        self.writer.u8f32(FLOAT32, v);
    }

    fn write_str_header(&mut self, len: usize) -> Result<(), EncodeError> {
        if len <= FIXSTR_MAX_LEN {
            self.writer.u8(FIXSTR_PREFIX | len as u8);
        } else if len <= u8::MAX as usize && !self.compatibility_mode {
            self.writer.u16((STR8 as u16) << 8 | len as u16);
        } else if len <= u16::MAX as usize {
            self.writer.u8u16(STR16, len as u16);
        } else if len <= u32::MAX as usize {
            self.writer.u8u32(STR32, len as u32);
        } else {
            return Err(EncodeError::LengthOutOfRange(len));
        }
        Ok(())
    }

    pub fn write_str(&mut self, s: &str) -> Result<(), EncodeError> {
        self.write_str_header(s.len())?;
        self.writer.utf8(s);
        Ok(())
    }

    /// Writes raw bytes with string tags, validating that they are UTF-8.
    pub fn write_str_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let s = std::str::from_utf8(bytes).map_err(|_| EncodeError::InvalidUtf8)?;
        self.write_str(s)
    }

    pub fn write_bin(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        if self.compatibility_mode {
            // Pre-binary receivers only understand raw (string) tags.
            self.write_str_header(data.len())?;
            self.writer.buf(data);
            return Ok(());
        }
        let len = data.len();
        if len <= u8::MAX as usize {
            self.writer.u16((BIN8 as u16) << 8 | len as u16);
        } else if len <= u16::MAX as usize {
            self.writer.u8u16(BIN16, len as u16);
        } else if len <= u32::MAX as usize {
            self.writer.u8u32(BIN32, len as u32);
        } else {
            return Err(EncodeError::LengthOutOfRange(len));
        }
        self.writer.buf(data);
        Ok(())
    }

    pub fn write_array_header(&mut self, len: usize) -> Result<(), EncodeError> {
        if len <= FIXARRAY_MAX_LEN {
            self.writer.u8(FIXARRAY_PREFIX | len as u8);
        } else if len <= u16::MAX as usize {
            self.writer.u8u16(ARRAY16, len as u16);
        } else if len <= u32::MAX as usize {
            self.writer.u8u32(ARRAY32, len as u32);
        } else {
            return Err(EncodeError::LengthOutOfRange(len));
        }
        Ok(())
    }

    pub fn write_map_header(&mut self, len: usize) -> Result<(), EncodeError> {
        if len <= FIXMAP_MAX_LEN {
            self.writer.u8(FIXMAP_PREFIX | len as u8);
        } else if len <= u16::MAX as usize {
            self.writer.u8u16(MAP16, len as u16);
        } else if len <= u32::MAX as usize {
            self.writer.u8u32(MAP32, len as u32);
        } else {
            return Err(EncodeError::LengthOutOfRange(len));
        }
        Ok(())
    }

    pub fn write_ext(&mut self, type_id: i8, payload: &[u8]) -> Result<(), EncodeError> {
        let len = payload.len();
        match len {
            1 => self.writer.u16((FIXEXT1 as u16) << 8 | type_id as u8 as u16),
            2 => self.writer.u16((FIXEXT2 as u16) << 8 | type_id as u8 as u16),
            4 => self.writer.u16((FIXEXT4 as u16) << 8 | type_id as u8 as u16),
            8 => self.writer.u16((FIXEXT8 as u16) << 8 | type_id as u8 as u16),
            16 => self.writer.u16((FIXEXT16 as u16) << 8 | type_id as u8 as u16),
            _ => {
                if len <= u8::MAX as usize {
                    self.writer.u16((EXT8 as u16) << 8 | len as u16);
                } else if len <= u16::MAX as usize {
                    self.writer.u8u16(EXT16, len as u16);
                } else if len <= u32::MAX as usize {
                    self.writer.u8u32(EXT32, len as u32);
                } else {
                    return Err(EncodeError::LengthOutOfRange(len));
                }
                self.writer.i8(type_id);
            }
        }
        self.writer.buf(payload);
        Ok(())
    }

    pub fn write_timestamp(&mut self, ts: Timestamp) -> Result<(), EncodeError> {
        self.write_ext(TIMESTAMP_TYPE, &ts.to_payload())
    }

    /// Encodes a registered application type as its extension.
    ///
    /// Plain packers produce the payload bytes directly; recursive packers
    /// receive a fresh encoder sharing this registry, so the payload may
    /// itself be MessagePack.
    pub fn write_extension<T: Any>(&mut self, value: &T) -> Result<(), EncodeError> {
        let record = self
            .registry
            .lookup(TypeId::of::<T>())
            .ok_or(EncodeError::UnregisteredType)?;
        let payload = match &record.packer {
            ExtPacker::Plain(pack) => pack(value)?,
            ExtPacker::Recursive(pack) => {
                let mut nested = Encoder::with_registry(self.registry.clone())
                    .compatibility_mode(self.compatibility_mode);
                pack(value, &mut nested)?;
                nested.finalize()?
            }
        };
        self.write_ext(record.type_id, &payload)
    }

    fn write_bigint(&mut self, v: i128) -> Result<(), EncodeError> {
        if let Ok(i) = i64::try_from(v) {
            self.write_int(i);
            return Ok(());
        }
        if let Ok(u) = u64::try_from(v) {
            self.write_uint(u);
            return Ok(());
        }
        // Only registrations carrying the oversized-integer flag apply here;
        // a plain integer registration is ignored for in-range values and
        // for this path alike.
        let record = self
            .registry
            .oversized()
            .ok_or(EncodeError::IntOutOfRange)?;
        let payload = match &record.packer {
            ExtPacker::Plain(pack) => pack(&v)?,
            ExtPacker::Recursive(pack) => {
                let mut nested = Encoder::with_registry(self.registry.clone())
                    .compatibility_mode(self.compatibility_mode);
                pack(&v, &mut nested)?;
                nested.finalize()?
            }
        };
        self.write_ext(record.type_id, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write(value).unwrap();
        encoder.finalize().unwrap()
    }

    #[test]
    fn integer_width_selection() {
        assert_eq!(encode(&Value::Int(0)), [0x00]);
        assert_eq!(encode(&Value::Int(127)), [0x7f]);
        assert_eq!(encode(&Value::Int(128)), [0xcc, 0x80]);
        assert_eq!(encode(&Value::Int(256)), [0xcd, 0x01, 0x00]);
        assert_eq!(encode(&Value::Int(65536)), [0xce, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(
            encode(&Value::Int(1 << 32)),
            [0xcf, 0, 0, 0, 1, 0, 0, 0, 0]
        );
        assert_eq!(encode(&Value::Int(-1)), [0xff]);
        assert_eq!(encode(&Value::Int(-32)), [0xe0]);
        assert_eq!(encode(&Value::Int(-33)), [0xd0, 0xdf]);
        assert_eq!(encode(&Value::Int(-129)), [0xd1, 0xff, 0x7f]);
        assert_eq!(
            encode(&Value::Int(-32769)),
            [0xd2, 0xff, 0xff, 0x7f, 0xff]
        );
        assert_eq!(
            encode(&Value::Int(i64::MIN)),
            [0xd3, 0x80, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            encode(&Value::UInt(u64::MAX)),
            [0xcf, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn float_encoding() {
        assert_eq!(
            encode(&Value::Float(1.0)),
            [0xcb, 0x3f, 0xf0, 0, 0, 0, 0, 0, 0]
        );
        let mut encoder = Encoder::new();
        encoder.write_float32(1.5);
        assert_eq!(encoder.finalize().unwrap(), [0xca, 0x3f, 0xc0, 0, 0]);
    }

    #[test]
    fn string_width_selection() {
        assert_eq!(encode(&Value::Str("".into())), [0xa0]);
        let out = encode(&Value::Str("a".repeat(31)));
        assert_eq!(out[0], 0xbf);
        let out = encode(&Value::Str("a".repeat(32)));
        assert_eq!(&out[..2], &[0xd9, 32]);
        let out = encode(&Value::Str("a".repeat(256)));
        assert_eq!(&out[..3], &[0xda, 0x01, 0x00]);
        let out = encode(&Value::Str("a".repeat(65536)));
        assert_eq!(&out[..5], &[0xdb, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn compatibility_mode_promotes_str8_and_suppresses_bin() {
        let mut encoder = Encoder::new().compatibility_mode(true);
        encoder.write_str(&"a".repeat(32)).unwrap();
        let out = encoder.finalize().unwrap();
        assert_eq!(&out[..3], &[0xda, 0x00, 32]);

        let mut encoder = Encoder::new().compatibility_mode(true);
        encoder.write_bin(&[1, 2, 3]).unwrap();
        let out = encoder.finalize().unwrap();
        assert_eq!(out, [0xa3, 1, 2, 3]);
    }

    #[test]
    fn binary_width_selection() {
        let out = encode(&Value::Bin(vec![0xab; 3]));
        assert_eq!(&out[..2], &[0xc4, 3]);
        let out = encode(&Value::Bin(vec![0xab; 256]));
        assert_eq!(&out[..3], &[0xc5, 0x01, 0x00]);
        let out = encode(&Value::Bin(vec![0xab; 65536]));
        assert_eq!(&out[..5], &[0xc6, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn container_headers() {
        assert_eq!(encode(&Value::Array(vec![])), [0x90]);
        assert_eq!(encode(&Value::Map(vec![])), [0x80]);
        assert_eq!(
            encode(&Value::Map(vec![(Value::Int(1), Value::Int(1))])),
            [0x81, 0x01, 0x01]
        );
        let mut encoder = Encoder::new();
        encoder.write_array_header(16).unwrap();
        encoder.write_map_header(65536).unwrap();
        let out = encoder.finalize().unwrap();
        assert_eq!(out, [0xdc, 0x00, 0x10, 0xdf, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn extension_forms() {
        let mut encoder = Encoder::new();
        encoder.write_ext(7, &[0xaa]).unwrap();
        encoder.write_ext(7, &[0xaa; 2]).unwrap();
        encoder.write_ext(7, &[0xaa; 3]).unwrap();
        encoder.write_ext(-2, &[0xaa; 16]).unwrap();
        let out = encoder.finalize().unwrap();
        assert_eq!(&out[..3], &[0xd4, 0x07, 0xaa]);
        assert_eq!(&out[3..7], &[0xd5, 0x07, 0xaa, 0xaa]);
        assert_eq!(&out[7..10], &[0xc7, 3, 0x07]);
        assert_eq!(&out[13..15], &[0xd8, 0xfe]);
    }

    #[test]
    fn timestamp_uses_fixext4_for_short_form() {
        let out = encode(&Value::Timestamp(Timestamp {
            sec: 1_700_000_000,
            nsec: 0,
        }));
        assert_eq!(out, [0xd6, 0xff, 0x65, 0x53, 0x6a, 0x00]);
    }

    #[test]
    fn bigint_without_registration_fails_out_of_range_only() {
        assert_eq!(encode(&Value::BigInt(-5)), [0xfb]);
        assert_eq!(
            encode(&Value::BigInt(u64::MAX as i128)),
            [0xcf, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
        let mut encoder = Encoder::new();
        let err = encoder.write(&Value::BigInt(u64::MAX as i128 + 1));
        assert!(matches!(err, Err(EncodeError::IntOutOfRange)));
    }

    #[test]
    fn finalize_drains_to_sink() {
        let mut encoder = Encoder::new().sink(Vec::new());
        encoder.write(&Value::Int(1)).unwrap();
        assert_eq!(encoder.finalize().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn write_str_bytes_validates_utf8() {
        let mut encoder = Encoder::new();
        assert!(matches!(
            encoder.write_str_bytes(&[0xff, 0xfe]),
            Err(EncodeError::InvalidUtf8)
        ));
        encoder.write_str_bytes(b"ok").unwrap();
        assert_eq!(encoder.finalize().unwrap(), [0xa2, b'o', b'k']);
    }
}
