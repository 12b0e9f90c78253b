//! Extension type registries shared between factories and minted instances.
//!
//! The pack side is keyed on the concrete Rust type token ([`TypeId`]); the
//! unpack side is a 256-slot table indexed by `type_id + 128` for O(1)
//! decode-time lookup.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::constants::TIMESTAMP_TYPE;
use crate::{DecodeError, Decoder, EncodeError, Encoder, Timestamp, Value};

/// Behavior flags attached to a registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtFlags {
    /// The packer/unpacker nests a full encoder/decoder, so the extension
    /// payload may itself contain MessagePack-encoded values.
    pub recursive: bool,
    /// The registration handles integers that do not fit the native
    /// `int64`/`uint64` wire widths. In-range integers keep native tags.
    pub oversized_integer: bool,
}

/// A packer callable. `Plain` produces the raw payload bytes; `Recursive`
/// writes the payload through a fresh encoder sharing the registry.
#[derive(Clone)]
pub enum ExtPacker {
    Plain(Arc<dyn Fn(&dyn Any) -> Result<Vec<u8>, EncodeError> + Send + Sync>),
    Recursive(Arc<dyn Fn(&dyn Any, &mut Encoder) -> Result<(), EncodeError> + Send + Sync>),
}

/// An unpacker callable. `Plain` maps payload bytes to a value; `Recursive`
/// reads through a sub-decoder fed with the payload.
#[derive(Clone)]
pub enum ExtUnpacker {
    Plain(Arc<dyn Fn(&[u8]) -> Result<Value, DecodeError> + Send + Sync>),
    Recursive(Arc<dyn Fn(&mut Decoder) -> Result<Value, DecodeError> + Send + Sync>),
}

/// Pack-side registration record.
#[derive(Clone)]
pub struct PackerRecord {
    pub type_id: i8,
    pub type_name: &'static str,
    pub packer: ExtPacker,
    pub flags: ExtFlags,
}

/// Unpack-side registration record.
#[derive(Clone)]
pub struct UnpackerRecord {
    pub type_name: &'static str,
    pub unpacker: ExtUnpacker,
    pub flags: ExtFlags,
}

/// Class-token → extension record map used by encoders.
///
/// Keying on the concrete `TypeId` makes every lookup a direct hash hit;
/// the ancestor-walk cache the design calls for collapses into the map
/// itself, and each mutation replaces the cached entry it would have
/// invalidated.
#[derive(Clone, Default)]
pub struct PackerRegistry {
    records: HashMap<TypeId, Arc<PackerRecord>>,
    oversized: Option<Arc<PackerRecord>>,
}

impl PackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry carrying the builtin timestamp registration.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            TypeId::of::<Timestamp>(),
            PackerRecord {
                type_id: TIMESTAMP_TYPE,
                type_name: std::any::type_name::<Timestamp>(),
                packer: ExtPacker::Plain(Arc::new(|value| {
                    value
                        .downcast_ref::<Timestamp>()
                        .map(|ts| ts.to_payload())
                        .ok_or(EncodeError::UnregisteredType)
                })),
                flags: ExtFlags::default(),
            },
        );
        registry
    }

    pub fn register(&mut self, key: TypeId, record: PackerRecord) {
        let record = Arc::new(record);
        if record.flags.oversized_integer {
            self.oversized = Some(record.clone());
        }
        self.records.insert(key, record);
    }

    pub fn lookup(&self, key: TypeId) -> Option<Arc<PackerRecord>> {
        self.records.get(&key).cloned()
    }

    /// The registration that handles integers beyond the native wire range,
    /// if any.
    pub fn oversized(&self) -> Option<Arc<PackerRecord>> {
        self.oversized.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeId, &Arc<PackerRecord>)> {
        self.records.iter()
    }
}

/// Type-id → unpacker table used by decoders.
#[derive(Clone)]
pub struct UnpackerRegistry {
    slots: Vec<Option<Arc<UnpackerRecord>>>,
}

impl Default for UnpackerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UnpackerRegistry {
    pub fn new() -> Self {
        Self {
            slots: vec![None; 256],
        }
    }

    /// A registry carrying the builtin timestamp registration.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            TIMESTAMP_TYPE,
            UnpackerRecord {
                type_name: std::any::type_name::<Timestamp>(),
                unpacker: ExtUnpacker::Plain(Arc::new(|data| {
                    Timestamp::from_payload(data).map(Value::Timestamp)
                })),
                flags: ExtFlags::default(),
            },
        );
        registry
    }

    #[inline]
    fn index(type_id: i8) -> usize {
        (type_id as i16 + 128) as usize
    }

    pub fn register(&mut self, type_id: i8, record: UnpackerRecord) {
        self.slots[Self::index(type_id)] = Some(Arc::new(record));
    }

    pub fn lookup(&self, type_id: i8) -> Option<Arc<UnpackerRecord>> {
        self.slots[Self::index(type_id)].clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i8, &Arc<UnpackerRecord>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|rec| ((i as i16 - 128) as i8, rec)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_record(type_id: i8) -> PackerRecord {
        PackerRecord {
            type_id,
            type_name: "test",
            packer: ExtPacker::Plain(Arc::new(|_| Ok(vec![]))),
            flags: ExtFlags::default(),
        }
    }

    #[test]
    fn packer_lookup_by_type_token() {
        let mut registry = PackerRegistry::new();
        registry.register(TypeId::of::<u8>(), payload_record(5));
        assert_eq!(registry.lookup(TypeId::of::<u8>()).unwrap().type_id, 5);
        assert!(registry.lookup(TypeId::of::<u16>()).is_none());
    }

    #[test]
    fn re_registration_replaces_previous_record() {
        let mut registry = PackerRegistry::new();
        registry.register(TypeId::of::<u8>(), payload_record(5));
        registry.register(TypeId::of::<u8>(), payload_record(9));
        assert_eq!(registry.lookup(TypeId::of::<u8>()).unwrap().type_id, 9);
    }

    #[test]
    fn oversized_slot_tracks_flagged_registration() {
        let mut registry = PackerRegistry::new();
        assert!(registry.oversized().is_none());
        let mut record = payload_record(3);
        record.flags.oversized_integer = true;
        registry.register(TypeId::of::<i128>(), record);
        assert_eq!(registry.oversized().unwrap().type_id, 3);
    }

    #[test]
    fn unpacker_slots_cover_negative_ids() {
        let mut registry = UnpackerRegistry::new();
        registry.register(
            -1,
            UnpackerRecord {
                type_name: "timestamp",
                unpacker: ExtUnpacker::Plain(Arc::new(|_| Ok(Value::Nil))),
                flags: ExtFlags::default(),
            },
        );
        assert!(registry.lookup(-1).is_some());
        assert!(registry.lookup(-128).is_none());
        assert!(registry.lookup(127).is_none());
        assert_eq!(registry.iter().count(), 1);
        assert_eq!(registry.iter().next().map(|(id, _)| id), Some(-1));
    }
}
