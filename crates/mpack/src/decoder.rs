//! `Decoder` — resumable state machine from byte stream to values.
//!
//! Bytes are fed in arbitrarily small pieces; [`Decoder::read`] returns
//! `Ok(None)` ("need more") until a complete top-level value is available,
//! so callers can resume after every feed without re-parsing.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use mpack_buffers::ReadBuffer;

use crate::constants::*;
use crate::registry::{ExtUnpacker, UnpackerRegistry};
use crate::{DecodeError, Value};

/// Maximum container nesting depth.
pub const MAX_DEPTH: usize = 128;

const SOURCE_CHUNK: usize = 4096;

/// Decode-time behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderOptions {
    /// Intern string map keys as [`Value::Symbol`].
    pub symbolize_keys: bool,
    /// Accepted for configuration parity; decoded values are already
    /// immutable to other holders under Rust ownership.
    pub freeze: bool,
    /// Decode unregistered extensions to raw [`Value::Ext`] records instead
    /// of failing.
    pub allow_unknown_ext: bool,
    /// Advisory hint for aggressive interning of symbol payloads; key
    /// interning is already eager, so this has no further effect.
    pub optimized_symbols_parsing: bool,
}

/// One level of container nesting. The explicit stack replaces recursion so
/// the depth cap is cheap to enforce and decoding can resume mid-container.
enum Frame {
    Array {
        items: Vec<Value>,
        remaining: usize,
    },
    MapKey {
        entries: Vec<(Value, Value)>,
        remaining: usize,
    },
    MapValue {
        entries: Vec<(Value, Value)>,
        remaining: usize,
        key: Value,
    },
}

enum PartialKind {
    Str,
    Bin,
    Ext(i8),
}

/// A payload whose length is known but whose bytes have not all arrived.
struct PartialRead {
    kind: PartialKind,
    total: usize,
    bytes: Vec<u8>,
}

/// Streaming MessagePack decoder.
///
/// # Example
///
/// ```
/// use mpack::{Decoder, Value};
///
/// let mut decoder = Decoder::new();
/// decoder.feed(&[0x81, 0x01]);
/// assert_eq!(decoder.read().unwrap(), None); // map open, value missing
/// decoder.feed(&[0x2a]);
/// let value = decoder.read().unwrap().unwrap();
/// assert_eq!(value, Value::Map(vec![(Value::Int(1), Value::Int(42))]));
/// ```
pub struct Decoder {
    buffer: ReadBuffer,
    source: Option<Box<dyn io::Read + Send>>,
    source_eof: bool,
    stack: Vec<Frame>,
    partial: Option<PartialRead>,
    /// Tag byte already consumed from the buffer but not yet acted on;
    /// survives "need more" returns so resumption never re-reads it.
    head: Option<u8>,
    registry: Arc<UnpackerRegistry>,
    options: DecoderOptions,
    symbols: HashMap<String, Arc<str>>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// Creates a decoder with the builtin registrations (timestamp) only.
    pub fn new() -> Self {
        Self::with_options(DecoderOptions::default())
    }

    pub fn with_options(options: DecoderOptions) -> Self {
        Self::with_registry(Arc::new(UnpackerRegistry::with_builtins()), options)
    }

    /// Creates a decoder over a shared registry snapshot. Used by factories.
    pub fn with_registry(registry: Arc<UnpackerRegistry>, options: DecoderOptions) -> Self {
        Self {
            buffer: ReadBuffer::new(),
            source: None,
            source_eof: false,
            stack: Vec::new(),
            partial: None,
            head: None,
            registry,
            options,
            symbols: HashMap::new(),
        }
    }

    /// Binds an input source that is pulled in chunks whenever the buffer
    /// runs dry.
    pub fn source<R: io::Read + Send + 'static>(mut self, source: R) -> Self {
        self.source = Some(Box::new(source));
        self.source_eof = false;
        self
    }

    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    /// Number of buffered bytes not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.size()
    }

    /// Appends bytes to the decode window.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.feed(data.to_vec());
    }

    /// Appends an owned chunk to the decode window without copying.
    pub fn feed_owned(&mut self, data: Vec<u8>) {
        self.buffer.feed(data);
    }

    /// Clears all decode state (buffer, stack, partial read, head byte) so
    /// the instance can be reused for an unrelated stream.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.stack.clear();
        self.partial = None;
        self.head = None;
    }

    /// Reads the next complete top-level value.
    ///
    /// `Ok(None)` means more bytes are needed; feed and call again. Nothing
    /// already consumed is re-read on resumption.
    pub fn read(&mut self) -> Result<Option<Value>, DecodeError> {
        loop {
            let value = if self.partial.is_some() {
                match self.continue_partial()? {
                    Some(v) => v,
                    None => return Ok(None),
                }
            } else {
                match self.read_one()? {
                    Some(v) => v,
                    None => return Ok(None),
                }
            };
            match self.deliver(value)? {
                Some(done) => {
                    self.buffer.compact();
                    return Ok(Some(done));
                }
                None => self.buffer.compact(),
            }
        }
    }

    /// One-shot decode of a complete byte slice.
    ///
    /// Fails with [`DecodeError::UnexpectedEof`] on truncated input and
    /// [`DecodeError::TrailingBytes`] if bytes remain after the value.
    pub fn decode(&mut self, input: &[u8]) -> Result<Value, DecodeError> {
        self.reset();
        self.feed(input);
        self.finish_read()
    }

    /// Decodes exactly one value, draining the bound source as needed.
    ///
    /// Unlike [`read`](Decoder::read), end of input here is an error: a
    /// source that ends mid-value fails with
    /// [`DecodeError::UnexpectedEof`], and bytes left over after the value
    /// fail with [`DecodeError::TrailingBytes`].
    pub fn full_decode(&mut self) -> Result<Value, DecodeError> {
        self.finish_read()
    }

    fn finish_read(&mut self) -> Result<Value, DecodeError> {
        match self.read()? {
            Some(value) => {
                if self.head.is_some() || self.ensure(1)? {
                    return Err(DecodeError::TrailingBytes);
                }
                Ok(value)
            }
            None => Err(DecodeError::UnexpectedEof),
        }
    }

    /// Iterates over consecutive top-level values until the window runs dry.
    pub fn iter(&mut self) -> Values<'_> {
        Values { decoder: self }
    }

    /// Advances past exactly one complete value without materializing it.
    ///
    /// Uses a flat pending-value counter instead of the container stack. If
    /// the value is incomplete, no bytes are consumed and `Ok(None)` is
    /// returned.
    ///
    /// Must be called at a value boundary: frames or partial payloads left
    /// by an incomplete [`read`](Decoder::read) are not shared with `skip`.
    pub fn skip(&mut self) -> Result<Option<()>, DecodeError> {
        let saved_pos = self.buffer.save();
        let saved_head = self.head;
        match self.try_skip() {
            Ok(true) => {
                self.buffer.compact();
                Ok(Some(()))
            }
            Ok(false) => {
                self.buffer.restore(saved_pos);
                self.head = saved_head;
                Ok(None)
            }
            Err(e) => {
                self.buffer.restore(saved_pos);
                self.head = saved_head;
                Err(e)
            }
        }
    }

    /// Reads an array header, failing on any other tag family.
    pub fn read_array_header(&mut self) -> Result<Option<usize>, DecodeError> {
        let Some(tag) = self.head_byte()? else {
            return Ok(None);
        };
        if is_fixarray(tag) {
            self.head = None;
            return Ok(Some((tag & 0x0f) as usize));
        }
        match tag {
            ARRAY16 => self.read_len16(),
            ARRAY32 => self.read_len32(),
            _ => Err(DecodeError::UnexpectedType {
                expected: "array",
                found: tag,
            }),
        }
    }

    /// Reads a map header (pair count), failing on any other tag family.
    pub fn read_map_header(&mut self) -> Result<Option<usize>, DecodeError> {
        let Some(tag) = self.head_byte()? else {
            return Ok(None);
        };
        if is_fixmap(tag) {
            self.head = None;
            return Ok(Some((tag & 0x0f) as usize));
        }
        match tag {
            MAP16 => self.read_len16(),
            MAP32 => self.read_len32(),
            _ => Err(DecodeError::UnexpectedType {
                expected: "map",
                found: tag,
            }),
        }
    }

    /// Reads a string header (byte length), failing on any other tag family.
    pub fn read_str_header(&mut self) -> Result<Option<usize>, DecodeError> {
        let Some(tag) = self.head_byte()? else {
            return Ok(None);
        };
        if is_fixstr(tag) {
            self.head = None;
            return Ok(Some((tag & 0x1f) as usize));
        }
        match tag {
            STR8 => self.read_len8(),
            STR16 => self.read_len16(),
            STR32 => self.read_len32(),
            _ => Err(DecodeError::UnexpectedType {
                expected: "string",
                found: tag,
            }),
        }
    }

    /// Reads a binary header (byte length), failing on any other tag family.
    pub fn read_bin_header(&mut self) -> Result<Option<usize>, DecodeError> {
        let Some(tag) = self.head_byte()? else {
            return Ok(None);
        };
        match tag {
            BIN8 => self.read_len8(),
            BIN16 => self.read_len16(),
            BIN32 => self.read_len32(),
            _ => Err(DecodeError::UnexpectedType {
                expected: "binary",
                found: tag,
            }),
        }
    }

    fn read_len8(&mut self) -> Result<Option<usize>, DecodeError> {
        if !self.ensure(1)? {
            return Ok(None);
        }
        self.head = None;
        Ok(Some(self.buffer.try_u8()? as usize))
    }

    fn read_len16(&mut self) -> Result<Option<usize>, DecodeError> {
        if !self.ensure(2)? {
            return Ok(None);
        }
        self.head = None;
        Ok(Some(self.buffer.try_u16()? as usize))
    }

    fn read_len32(&mut self) -> Result<Option<usize>, DecodeError> {
        if !self.ensure(4)? {
            return Ok(None);
        }
        self.head = None;
        Ok(Some(self.buffer.try_u32()? as usize))
    }

    /// Returns the current tag byte, consuming it from the buffer but
    /// keeping it cached until the caller commits to it.
    fn head_byte(&mut self) -> Result<Option<u8>, DecodeError> {
        if let Some(b) = self.head {
            return Ok(Some(b));
        }
        if !self.ensure(1)? {
            return Ok(None);
        }
        let b = self.buffer.try_u8()?;
        self.head = Some(b);
        Ok(Some(b))
    }

    /// Makes `n` bytes available, pulling from the source if bound.
    fn ensure(&mut self, n: usize) -> Result<bool, DecodeError> {
        while self.buffer.size() < n {
            if !self.pull_source()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn pull_source(&mut self) -> Result<bool, DecodeError> {
        if self.source_eof {
            return Ok(false);
        }
        let Some(source) = self.source.as_mut() else {
            return Ok(false);
        };
        let mut chunk = vec![0u8; SOURCE_CHUNK];
        let n = source.read(&mut chunk)?;
        if n == 0 {
            self.source_eof = true;
            return Ok(false);
        }
        chunk.truncate(n);
        self.buffer.feed(chunk);
        Ok(true)
    }

    /// Bytes required beyond the tag before the header (and, for fixed-size
    /// scalars, the whole value) can be consumed.
    fn header_need(tag: u8) -> Result<usize, DecodeError> {
        if is_pos_fixint(tag) || is_neg_fixint(tag) || is_fixstr(tag) || is_fixmap(tag)
            || is_fixarray(tag)
        {
            return Ok(0);
        }
        Ok(match tag {
            NIL | FALSE | TRUE => 0,
            RESERVED => return Err(DecodeError::ReservedTag),
            BIN8 | STR8 => 1,
            BIN16 | STR16 | ARRAY16 | MAP16 => 2,
            BIN32 | STR32 | ARRAY32 | MAP32 => 4,
            EXT8 => 2,
            EXT16 => 3,
            EXT32 => 5,
            FLOAT32 | UINT32 | INT32 => 4,
            FLOAT64 | UINT64 | INT64 => 8,
            UINT8 | INT8 => 1,
            UINT16 | INT16 => 2,
            FIXEXT1 | FIXEXT2 | FIXEXT4 | FIXEXT8 | FIXEXT16 => 1,
            _ => unreachable!("all 256 tag bytes are classified"),
        })
    }

    /// Reads one leaf value, or opens container frames until a leaf (or an
    /// empty container) is produced. `Ok(None)` means "need more".
    fn read_one(&mut self) -> Result<Option<Value>, DecodeError> {
        loop {
            let Some(tag) = self.head_byte()? else {
                return Ok(None);
            };
            let need = Self::header_need(tag)?;
            if !self.ensure(need)? {
                return Ok(None);
            }
            // The header is fully available: commit the tag.
            self.head = None;

            if is_pos_fixint(tag) {
                return Ok(Some(Value::Int(tag as i64)));
            }
            if is_neg_fixint(tag) {
                return Ok(Some(Value::Int(tag as i8 as i64)));
            }
            if is_fixstr(tag) {
                return self.read_str_payload((tag & 0x1f) as usize);
            }
            let opened = if is_fixarray(tag) {
                self.open_array((tag & 0x0f) as usize)?
            } else if is_fixmap(tag) {
                self.open_map((tag & 0x0f) as usize)?
            } else {
                match tag {
                    NIL => return Ok(Some(Value::Nil)),
                    FALSE => return Ok(Some(Value::Bool(false))),
                    TRUE => return Ok(Some(Value::Bool(true))),
                    UINT8 => return Ok(Some(Value::Int(self.buffer.try_u8()? as i64))),
                    UINT16 => return Ok(Some(Value::Int(self.buffer.try_u16()? as i64))),
                    UINT32 => return Ok(Some(Value::Int(self.buffer.try_u32()? as i64))),
                    UINT64 => {
                        let v = self.buffer.try_u64()?;
                        return Ok(Some(match i64::try_from(v) {
                            Ok(i) => Value::Int(i),
                            Err(_) => Value::UInt(v),
                        }));
                    }
                    INT8 => return Ok(Some(Value::Int(self.buffer.try_i8()? as i64))),
                    INT16 => return Ok(Some(Value::Int(self.buffer.try_i16()? as i64))),
                    INT32 => return Ok(Some(Value::Int(self.buffer.try_i32()? as i64))),
                    INT64 => return Ok(Some(Value::Int(self.buffer.try_i64()?))),
                    FLOAT32 => return Ok(Some(Value::Float(self.buffer.try_f32()? as f64))),
                    FLOAT64 => return Ok(Some(Value::Float(self.buffer.try_f64()?))),
                    STR8 => {
                        let n = self.buffer.try_u8()? as usize;
                        return self.read_str_payload(n);
                    }
                    STR16 => {
                        let n = self.buffer.try_u16()? as usize;
                        return self.read_str_payload(n);
                    }
                    STR32 => {
                        let n = self.buffer.try_u32()? as usize;
                        return self.read_str_payload(n);
                    }
                    BIN8 => {
                        let n = self.buffer.try_u8()? as usize;
                        return self.read_bin_payload(n);
                    }
                    BIN16 => {
                        let n = self.buffer.try_u16()? as usize;
                        return self.read_bin_payload(n);
                    }
                    BIN32 => {
                        let n = self.buffer.try_u32()? as usize;
                        return self.read_bin_payload(n);
                    }
                    EXT8 => {
                        let n = self.buffer.try_u8()? as usize;
                        let type_id = self.buffer.try_i8()?;
                        return self.read_ext_payload(type_id, n);
                    }
                    EXT16 => {
                        let n = self.buffer.try_u16()? as usize;
                        let type_id = self.buffer.try_i8()?;
                        return self.read_ext_payload(type_id, n);
                    }
                    EXT32 => {
                        let n = self.buffer.try_u32()? as usize;
                        let type_id = self.buffer.try_i8()?;
                        return self.read_ext_payload(type_id, n);
                    }
                    FIXEXT1 | FIXEXT2 | FIXEXT4 | FIXEXT8 | FIXEXT16 => {
                        let n = match tag {
                            FIXEXT1 => 1,
                            FIXEXT2 => 2,
                            FIXEXT4 => 4,
                            FIXEXT8 => 8,
                            _ => 16,
                        };
                        let type_id = self.buffer.try_i8()?;
                        return self.read_ext_payload(type_id, n);
                    }
                    ARRAY16 => {
                        let n = self.buffer.try_u16()? as usize;
                        self.open_array(n)?
                    }
                    ARRAY32 => {
                        let n = self.buffer.try_u32()? as usize;
                        self.open_array(n)?
                    }
                    MAP16 => {
                        let n = self.buffer.try_u16()? as usize;
                        self.open_map(n)?
                    }
                    MAP32 => {
                        let n = self.buffer.try_u32()? as usize;
                        self.open_map(n)?
                    }
                    _ => unreachable!("all 256 tag bytes are classified"),
                }
            };
            match opened {
                // An empty container is already a complete value.
                Some(empty) => return Ok(Some(empty)),
                // A frame was pushed; keep reading its elements.
                None => continue,
            }
        }
    }

    fn open_array(&mut self, count: usize) -> Result<Option<Value>, DecodeError> {
        if count == 0 {
            return Ok(Some(Value::Array(Vec::new())));
        }
        if self.stack.len() >= MAX_DEPTH {
            return Err(DecodeError::StackExceeded);
        }
        self.stack.push(Frame::Array {
            items: Vec::new(),
            remaining: count,
        });
        Ok(None)
    }

    fn open_map(&mut self, pairs: usize) -> Result<Option<Value>, DecodeError> {
        if pairs == 0 {
            return Ok(Some(Value::Map(Vec::new())));
        }
        if self.stack.len() >= MAX_DEPTH {
            return Err(DecodeError::StackExceeded);
        }
        self.stack.push(Frame::MapKey {
            entries: Vec::new(),
            remaining: pairs,
        });
        Ok(None)
    }

    /// Hands a completed value to the innermost frame. Containers that fill
    /// up become completed values for their parent; with an empty stack the
    /// value is the top-level result.
    fn deliver(&mut self, value: Value) -> Result<Option<Value>, DecodeError> {
        let mut value = value;
        loop {
            match self.stack.pop() {
                None => return Ok(Some(value)),
                Some(Frame::Array {
                    mut items,
                    remaining,
                }) => {
                    items.push(value);
                    if remaining == 1 {
                        value = Value::Array(items);
                        continue;
                    }
                    self.stack.push(Frame::Array {
                        items,
                        remaining: remaining - 1,
                    });
                    return Ok(None);
                }
                Some(Frame::MapKey { entries, remaining }) => {
                    let key = if self.options.symbolize_keys {
                        self.symbolize(value)
                    } else {
                        value
                    };
                    self.stack.push(Frame::MapValue {
                        entries,
                        remaining,
                        key,
                    });
                    return Ok(None);
                }
                Some(Frame::MapValue {
                    mut entries,
                    remaining,
                    key,
                }) => {
                    entries.push((key, value));
                    if remaining == 1 {
                        value = Value::Map(entries);
                        continue;
                    }
                    self.stack.push(Frame::MapKey {
                        entries,
                        remaining: remaining - 1,
                    });
                    return Ok(None);
                }
            }
        }
    }

    fn symbolize(&mut self, value: Value) -> Value {
        match value {
            Value::Str(s) => {
                if let Some(interned) = self.symbols.get(&s) {
                    return Value::Symbol(interned.clone());
                }
                let interned: Arc<str> = Arc::from(s.as_str());
                self.symbols.insert(s, interned.clone());
                Value::Symbol(interned)
            }
            other => other,
        }
    }

    fn read_str_payload(&mut self, len: usize) -> Result<Option<Value>, DecodeError> {
        if self.ensure(len)? {
            let s = self.buffer.try_utf8(len)?;
            return Ok(Some(Value::Str(s)));
        }
        self.start_partial(PartialKind::Str, len);
        Ok(None)
    }

    fn read_bin_payload(&mut self, len: usize) -> Result<Option<Value>, DecodeError> {
        if self.ensure(len)? {
            let data = self.buffer.try_buf(len)?;
            return Ok(Some(Value::Bin(data)));
        }
        self.start_partial(PartialKind::Bin, len);
        Ok(None)
    }

    fn read_ext_payload(&mut self, type_id: i8, len: usize) -> Result<Option<Value>, DecodeError> {
        if self.ensure(len)? {
            let data = self.buffer.try_buf(len)?;
            return self.decode_ext(type_id, data).map(Some);
        }
        self.start_partial(PartialKind::Ext(type_id), len);
        Ok(None)
    }

    fn start_partial(&mut self, kind: PartialKind, total: usize) {
        let bytes = self.buffer.take_up_to(total);
        self.buffer.compact();
        self.partial = Some(PartialRead { kind, total, bytes });
    }

    fn continue_partial(&mut self) -> Result<Option<Value>, DecodeError> {
        let Some(mut partial) = self.partial.take() else {
            return Ok(None);
        };
        let missing = partial.total - partial.bytes.len();
        // Pull the source opportunistically; a short window is fine.
        self.ensure(missing)?;
        let got = self.buffer.take_up_to(missing);
        partial.bytes.extend_from_slice(&got);
        self.buffer.compact();
        if partial.bytes.len() < partial.total {
            self.partial = Some(partial);
            return Ok(None);
        }
        self.assemble(partial).map(Some)
    }

    fn assemble(&mut self, partial: PartialRead) -> Result<Value, DecodeError> {
        match partial.kind {
            PartialKind::Str => String::from_utf8(partial.bytes)
                .map(Value::Str)
                .map_err(|_| DecodeError::InvalidUtf8),
            PartialKind::Bin => Ok(Value::Bin(partial.bytes)),
            PartialKind::Ext(type_id) => self.decode_ext(type_id, partial.bytes),
        }
    }

    fn decode_ext(&mut self, type_id: i8, data: Vec<u8>) -> Result<Value, DecodeError> {
        match self.registry.lookup(type_id) {
            Some(record) => match &record.unpacker {
                ExtUnpacker::Plain(unpack) => unpack(&data),
                ExtUnpacker::Recursive(unpack) => {
                    let mut nested = Decoder::with_registry(self.registry.clone(), self.options);
                    nested.feed_owned(data);
                    unpack(&mut nested)
                }
            },
            None if self.options.allow_unknown_ext => {
                Ok(Value::Ext(crate::Ext { type_id, data }))
            }
            None => Err(DecodeError::UnknownExtType(type_id)),
        }
    }

    /// Skips one value using a flat pending-value counter. Returns
    /// `Ok(false)` if the buffered window ends before the value does; the
    /// caller rolls the cursor back.
    fn try_skip(&mut self) -> Result<bool, DecodeError> {
        let mut pending: usize = 1;
        while pending > 0 {
            let tag = match self.head.take() {
                Some(b) => b,
                None => {
                    if !self.ensure(1)? {
                        return Ok(false);
                    }
                    self.buffer.try_u8()?
                }
            };
            pending -= 1;

            if is_pos_fixint(tag) || is_neg_fixint(tag) {
                continue;
            }
            if is_fixstr(tag) {
                if !self.skip_payload((tag & 0x1f) as usize)? {
                    return Ok(false);
                }
                continue;
            }
            if is_fixarray(tag) {
                pending += (tag & 0x0f) as usize;
                continue;
            }
            if is_fixmap(tag) {
                pending += 2 * (tag & 0x0f) as usize;
                continue;
            }
            match tag {
                NIL | FALSE | TRUE => {}
                RESERVED => return Err(DecodeError::ReservedTag),
                UINT8 | INT8 => {
                    if !self.skip_payload(1)? {
                        return Ok(false);
                    }
                }
                UINT16 | INT16 => {
                    if !self.skip_payload(2)? {
                        return Ok(false);
                    }
                }
                UINT32 | INT32 | FLOAT32 => {
                    if !self.skip_payload(4)? {
                        return Ok(false);
                    }
                }
                UINT64 | INT64 | FLOAT64 => {
                    if !self.skip_payload(8)? {
                        return Ok(false);
                    }
                }
                FIXEXT1 | FIXEXT2 | FIXEXT4 | FIXEXT8 | FIXEXT16 => {
                    let n = match tag {
                        FIXEXT1 => 1,
                        FIXEXT2 => 2,
                        FIXEXT4 => 4,
                        FIXEXT8 => 8,
                        _ => 16,
                    };
                    if !self.skip_payload(1 + n)? {
                        return Ok(false);
                    }
                }
                STR8 | BIN8 => {
                    if !self.ensure(1)? {
                        return Ok(false);
                    }
                    let n = self.buffer.try_u8()? as usize;
                    if !self.skip_payload(n)? {
                        return Ok(false);
                    }
                }
                STR16 | BIN16 => {
                    if !self.ensure(2)? {
                        return Ok(false);
                    }
                    let n = self.buffer.try_u16()? as usize;
                    if !self.skip_payload(n)? {
                        return Ok(false);
                    }
                }
                STR32 | BIN32 => {
                    if !self.ensure(4)? {
                        return Ok(false);
                    }
                    let n = self.buffer.try_u32()? as usize;
                    if !self.skip_payload(n)? {
                        return Ok(false);
                    }
                }
                EXT8 => {
                    if !self.ensure(1)? {
                        return Ok(false);
                    }
                    let n = self.buffer.try_u8()? as usize;
                    if !self.skip_payload(1 + n)? {
                        return Ok(false);
                    }
                }
                EXT16 => {
                    if !self.ensure(2)? {
                        return Ok(false);
                    }
                    let n = self.buffer.try_u16()? as usize;
                    if !self.skip_payload(1 + n)? {
                        return Ok(false);
                    }
                }
                EXT32 => {
                    if !self.ensure(4)? {
                        return Ok(false);
                    }
                    let n = self.buffer.try_u32()? as usize;
                    if !self.skip_payload(1 + n)? {
                        return Ok(false);
                    }
                }
                ARRAY16 => {
                    if !self.ensure(2)? {
                        return Ok(false);
                    }
                    pending += self.buffer.try_u16()? as usize;
                }
                ARRAY32 => {
                    if !self.ensure(4)? {
                        return Ok(false);
                    }
                    pending += self.buffer.try_u32()? as usize;
                }
                MAP16 => {
                    if !self.ensure(2)? {
                        return Ok(false);
                    }
                    pending += 2 * self.buffer.try_u16()? as usize;
                }
                MAP32 => {
                    if !self.ensure(4)? {
                        return Ok(false);
                    }
                    pending += 2 * self.buffer.try_u32()? as usize;
                }
                _ => unreachable!("all 256 tag bytes are classified"),
            }
        }
        Ok(true)
    }

    fn skip_payload(&mut self, n: usize) -> Result<bool, DecodeError> {
        if !self.ensure(n)? {
            return Ok(false);
        }
        self.buffer.skip(n)?;
        Ok(true)
    }
}

/// Iterator over consecutive top-level values. See [`Decoder::iter`].
pub struct Values<'a> {
    decoder: &'a mut Decoder,
}

impl Iterator for Values<'_> {
    type Item = Result<Value, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.decoder.read() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
