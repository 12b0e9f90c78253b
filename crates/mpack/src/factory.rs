//! `Factory` — a reusable configuration bundle that mints encoders and
//! decoders sharing one set of extension registrations.

use std::any::{Any, TypeId};
use std::io;
use std::sync::Arc;

use crate::registry::{
    ExtFlags, ExtPacker, ExtUnpacker, PackerRecord, PackerRegistry, UnpackerRecord,
    UnpackerRegistry,
};
use crate::{
    DecodeError, Decoder, DecoderOptions, EncodeError, Encoder, FactoryError, Pool, Value,
};

/// Registration options for one application type. The callable shape picked
/// (`packer` vs `recursive_packer`, `unpacker` vs `recursive_unpacker`)
/// decides whether the extension payload is opaque bytes or nested
/// MessagePack.
pub struct TypeRegistration<T> {
    packer: Option<ExtPacker>,
    unpacker: Option<ExtUnpacker>,
    recursive: bool,
    oversized_integer_extension: bool,
    _marker: std::marker::PhantomData<fn(&T)>,
}

impl<T: Any> Default for TypeRegistration<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any> TypeRegistration<T> {
    pub fn new() -> Self {
        Self {
            packer: None,
            unpacker: None,
            recursive: false,
            oversized_integer_extension: false,
            _marker: std::marker::PhantomData,
        }
    }

    /// Value → payload bytes.
    pub fn packer(
        mut self,
        pack: impl Fn(&T) -> Result<Vec<u8>, EncodeError> + Send + Sync + 'static,
    ) -> Self {
        self.packer = Some(ExtPacker::Plain(Arc::new(move |value: &dyn Any| {
            let typed = value
                .downcast_ref::<T>()
                .ok_or(EncodeError::UnregisteredType)?;
            pack(typed)
        })));
        self
    }

    /// Value plus a fresh encoder; the payload may itself be MessagePack.
    pub fn recursive_packer(
        mut self,
        pack: impl Fn(&T, &mut Encoder) -> Result<(), EncodeError> + Send + Sync + 'static,
    ) -> Self {
        self.recursive = true;
        self.packer = Some(ExtPacker::Recursive(Arc::new(
            move |value: &dyn Any, encoder: &mut Encoder| {
                let typed = value
                    .downcast_ref::<T>()
                    .ok_or(EncodeError::UnregisteredType)?;
                pack(typed, encoder)
            },
        )));
        self
    }

    /// Payload bytes → value.
    pub fn unpacker(
        mut self,
        unpack: impl Fn(&[u8]) -> Result<Value, DecodeError> + Send + Sync + 'static,
    ) -> Self {
        self.unpacker = Some(ExtUnpacker::Plain(Arc::new(unpack)));
        self
    }

    /// Sub-decoder over the payload → value.
    pub fn recursive_unpacker(
        mut self,
        unpack: impl Fn(&mut Decoder) -> Result<Value, DecodeError> + Send + Sync + 'static,
    ) -> Self {
        self.recursive = true;
        self.unpacker = Some(ExtUnpacker::Recursive(Arc::new(unpack)));
        self
    }

    /// Marks this registration as the handler for integers beyond the
    /// native `int64`/`uint64` wire range. Without this flag an integer
    /// registration is kept but never consulted by the encoder, which
    /// keeps using native tags for in-range values.
    pub fn oversized_integer_extension(mut self, enabled: bool) -> Self {
        self.oversized_integer_extension = enabled;
        self
    }
}

/// Introspection record for one registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredType {
    pub type_id: i8,
    pub type_name: &'static str,
    pub recursive: bool,
    pub oversized_integer: bool,
}

/// Mints encoder/decoder instances over a fixed set of registrations.
///
/// Until [`freeze`](Factory::freeze) is called, every mint snapshots the
/// registries, so later registrations never affect in-flight instances. A
/// frozen factory shares one snapshot across all mints and may be used from
/// multiple threads.
pub struct Factory {
    packers: PackerRegistry,
    unpackers: UnpackerRegistry,
    frozen: Option<Snapshot>,
}

struct Snapshot {
    packers: Arc<PackerRegistry>,
    unpackers: Arc<UnpackerRegistry>,
}

impl Default for Factory {
    fn default() -> Self {
        Self::new()
    }
}

impl Factory {
    /// A factory carrying the builtin timestamp registration (type `-1`).
    pub fn new() -> Self {
        Self {
            packers: PackerRegistry::with_builtins(),
            unpackers: UnpackerRegistry::with_builtins(),
            frozen: None,
        }
    }

    /// Registers an application type under an extension id.
    ///
    /// Fails with [`FactoryError::Frozen`] once the factory is frozen.
    pub fn register_type<T: Any>(
        &mut self,
        type_id: i8,
        registration: TypeRegistration<T>,
    ) -> Result<(), FactoryError> {
        if self.frozen.is_some() {
            return Err(FactoryError::Frozen);
        }
        let flags = ExtFlags {
            recursive: registration.recursive,
            oversized_integer: registration.oversized_integer_extension,
        };
        let type_name = std::any::type_name::<T>();
        if let Some(packer) = registration.packer {
            self.packers.register(
                TypeId::of::<T>(),
                PackerRecord {
                    type_id,
                    type_name,
                    packer,
                    flags,
                },
            );
        }
        if let Some(unpacker) = registration.unpacker {
            self.unpackers.register(
                type_id,
                UnpackerRecord {
                    type_name,
                    unpacker,
                    flags,
                },
            );
        }
        Ok(())
    }

    /// Seals the factory. Further registrations fail; mints become cheap
    /// snapshot shares and the factory may be used concurrently.
    pub fn freeze(&mut self) {
        if self.frozen.is_none() {
            self.frozen = Some(Snapshot {
                packers: Arc::new(self.packers.clone()),
                unpackers: Arc::new(self.unpackers.clone()),
            });
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    fn packer_snapshot(&self) -> Arc<PackerRegistry> {
        match &self.frozen {
            Some(snapshot) => snapshot.packers.clone(),
            None => Arc::new(self.packers.clone()),
        }
    }

    fn unpacker_snapshot(&self) -> Arc<UnpackerRegistry> {
        match &self.frozen {
            Some(snapshot) => snapshot.unpackers.clone(),
            None => Arc::new(self.unpackers.clone()),
        }
    }

    /// Mints an encoder over the current registrations.
    pub fn encoder(&self) -> Encoder {
        Encoder::with_registry(self.packer_snapshot())
    }

    /// Mints an encoder that drains into `sink` on finalize.
    pub fn encoder_with_sink<W: io::Write + Send + 'static>(&self, sink: W) -> Encoder {
        self.encoder().sink(sink)
    }

    /// Mints a decoder over the current registrations.
    pub fn decoder(&self, options: DecoderOptions) -> Decoder {
        Decoder::with_registry(self.unpacker_snapshot(), options)
    }

    /// Mints a decoder pulling from `source`.
    pub fn decoder_with_source<R: io::Read + Send + 'static>(
        &self,
        source: R,
        options: DecoderOptions,
    ) -> Decoder {
        self.decoder(options).source(source)
    }

    /// Lists the pack-side registrations.
    pub fn registered_types(&self) -> Vec<RegisteredType> {
        let mut types: Vec<RegisteredType> = self
            .packers
            .iter()
            .map(|(_, record)| RegisteredType {
                type_id: record.type_id,
                type_name: record.type_name,
                recursive: record.flags.recursive,
                oversized_integer: record.flags.oversized_integer,
            })
            .collect();
        types.sort_by_key(|t| t.type_id);
        types
    }

    /// Freezes the factory and wraps it in a bounded instance pool.
    pub fn pool(mut self, capacity: usize) -> Pool {
        self.freeze();
        Pool::new(Arc::new(self), capacity)
    }

    /// Like [`pool`](Factory::pool), with decoder options applied to every
    /// pooled decoder.
    pub fn pool_with_decoder_options(mut self, capacity: usize, options: DecoderOptions) -> Pool {
        self.freeze();
        Pool::with_decoder_options(Arc::new(self), capacity, options)
    }
}

/// Registers a two's-complement `i128` big-integer extension under the given
/// application type id, flagged as the oversized-integer handler.
///
/// The payload is the 16-byte big-endian two's-complement representation,
/// so round-trips use the `fixext16` form.
pub fn register_bigint(factory: &mut Factory, type_id: i8) -> Result<(), FactoryError> {
    factory.register_type::<i128>(
        type_id,
        TypeRegistration::new()
            .packer(|v: &i128| Ok(v.to_be_bytes().to_vec()))
            .unpacker(|data| {
                let bytes: [u8; 16] = data
                    .try_into()
                    .map_err(|_| DecodeError::ExtPayloadLength(data.len()))?;
                Ok(Value::BigInt(i128::from_be_bytes(bytes)))
            })
            .oversized_integer_extension(true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;

    #[test]
    fn frozen_factory_rejects_registration() {
        let mut factory = Factory::new();
        factory.freeze();
        let err = factory.register_type::<u8>(10, TypeRegistration::new().packer(|_| Ok(vec![])));
        assert_eq!(err, Err(FactoryError::Frozen));
    }

    #[test]
    fn minted_instances_are_isolated_from_later_registrations() {
        let mut factory = Factory::new();
        let mut early = factory.encoder();
        factory
            .register_type::<u8>(
                10,
                TypeRegistration::new().packer(|v: &u8| Ok(vec![*v])),
            )
            .unwrap();
        // The early encoder predates the registration.
        assert!(matches!(
            early.write_extension(&7u8),
            Err(EncodeError::UnregisteredType)
        ));
        let mut late = factory.encoder();
        late.write_extension(&7u8).unwrap();
        assert_eq!(late.finalize().unwrap(), [0xd4, 10, 7]);
    }

    #[test]
    fn registered_types_lists_builtin_timestamp() {
        let factory = Factory::new();
        let types = factory.registered_types();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].type_id, -1);
        assert!(types[0].type_name.ends_with("Timestamp"));
    }

    #[test]
    fn roundtrip_through_custom_plain_extension() {
        let mut factory = Factory::new();
        factory
            .register_type::<u32>(
                8,
                TypeRegistration::new()
                    .packer(|v: &u32| Ok(v.to_be_bytes().to_vec()))
                    .unpacker(|data| {
                        let bytes: [u8; 4] = data
                            .try_into()
                            .map_err(|_| DecodeError::ExtPayloadLength(data.len()))?;
                        Ok(Value::Int(u32::from_be_bytes(bytes) as i64))
                    }),
            )
            .unwrap();
        let mut encoder = factory.encoder();
        encoder.write_extension(&0xdeadbeefu32).unwrap();
        let bytes = encoder.finalize().unwrap();
        assert_eq!(bytes, [0xd6, 8, 0xde, 0xad, 0xbe, 0xef]);
        let mut decoder = factory.decoder(DecoderOptions::default());
        assert_eq!(decoder.decode(&bytes).unwrap(), Value::Int(0xdeadbeef));
    }

    #[test]
    fn bigint_extension_roundtrip() {
        let mut factory = Factory::new();
        register_bigint(&mut factory, 2).unwrap();
        let huge = i128::from(u64::MAX) + 1;
        let mut encoder = factory.encoder();
        encoder.write(&Value::BigInt(huge)).unwrap();
        let bytes = encoder.finalize().unwrap();
        assert_eq!(bytes[0], 0xd8); // fixext16
        assert_eq!(bytes[1], 2);
        let mut decoder = factory.decoder(DecoderOptions::default());
        assert_eq!(decoder.decode(&bytes).unwrap(), Value::BigInt(huge));
    }

    #[test]
    fn in_range_bigint_keeps_native_tags_despite_registration() {
        let mut factory = Factory::new();
        register_bigint(&mut factory, 2).unwrap();
        let mut encoder = factory.encoder();
        encoder.write(&Value::BigInt(5)).unwrap();
        assert_eq!(encoder.finalize().unwrap(), [0x05]);
    }

    #[test]
    fn timestamp_registration_survives_freeze_and_mint() {
        let mut factory = Factory::new();
        factory.freeze();
        let mut encoder = factory.encoder();
        let ts = Timestamp {
            sec: 1_700_000_000,
            nsec: 0,
        };
        encoder.write(&Value::Timestamp(ts)).unwrap();
        let bytes = encoder.finalize().unwrap();
        assert_eq!(bytes, [0xd6, 0xff, 0x65, 0x53, 0x6a, 0x00]);
        let mut decoder = factory.decoder(DecoderOptions::default());
        assert_eq!(decoder.decode(&bytes).unwrap(), Value::Timestamp(ts));
    }
}
