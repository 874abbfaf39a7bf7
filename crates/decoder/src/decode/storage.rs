//! Storage decoding.

use super::Engine;
use crate::{
    allocation::{StorageSize, storage_size},
    error::DecoderError,
    pointer::{Pointer, StoragePosition, StorageRange, WORD_SIZE},
    slot::{Slot, SlotKey},
    types::{ArrayType, MappingType, StructType, Type},
    value::{DecodeResult, DecodingError, Field, MappingEntry, Value},
};
use alloy_primitives::{Bytes, U256};

/// Returns the range of element `index` of an array whose data starts at `data`.
///
/// Elements smaller than a word are packed right to left, `32 / size` per word; larger ones take
/// whole words each.
pub(crate) fn element_range(data: &Slot, index: u64, size: StorageSize) -> StorageRange {
    match size {
        StorageSize::Bytes(size) => {
            let size = u64::from(size.max(1));
            let per_word = WORD_SIZE as u64 / size;
            let slot = data.offset_by(U256::from(index / per_word));
            let from = (WORD_SIZE as u64 - (index % per_word + 1) * size) as u8;
            StorageRange::new(
                StoragePosition::new(slot.clone(), from),
                StoragePosition::new(slot, from + size as u8 - 1),
            )
        }
        StorageSize::Words(words) => {
            let offset = U256::from(index).wrapping_mul(U256::from(words));
            StorageRange::words(data.offset_by(offset), U256::from(words))
        }
    }
}

impl Engine<'_> {
    pub(crate) async fn decode_storage(
        &self,
        ty: &Type,
        range: &StorageRange,
    ) -> Result<DecodeResult, DecoderError> {
        let slot = &range.from.slot;
        match ty {
            Type::String { .. } => self.storage_bytes(ty, slot).await,
            Type::Bytes(bytes) if bytes.length.is_none() => self.storage_bytes(ty, slot).await,
            Type::Array(array) => self.storage_array(ty, array, slot).await,
            Type::Struct(st) => self.storage_struct(ty, st, slot).await,
            Type::Mapping(mapping) => self.storage_mapping(ty, mapping, slot).await,
            Type::Tuple(_) => Ok(self.error(ty, DecodingError::UnsupportedType)),
            _ => {
                let raw = read_or_return!(ty, self.reader.read_storage(range).await);
                Ok(self.value(ty, &raw, false))
            }
        }
    }

    /// Decodes a `bytes` or `string`.
    ///
    /// Up to 31 bytes are stored in the high-order bytes of the slot itself, with twice the
    /// length in the lowest byte. Longer data lives at `keccak256(slot)` and the slot holds
    /// `length * 2 + 1`.
    async fn storage_bytes(&self, ty: &Type, slot: &Slot) -> Result<DecodeResult, DecoderError> {
        let range = StorageRange::word(slot.clone());
        let word = read_or_return!(ty, self.reader.read_storage(&range).await);
        let last = word[WORD_SIZE - 1];
        if last & 1 == 0 {
            let length = (last / 2) as usize;
            if length >= WORD_SIZE {
                return Ok(self.error(ty, DecodingError::MalformedLength { raw: word }));
            }
            return Ok(self.bytes_value(ty, Bytes::copy_from_slice(&word[..length])));
        }

        let length = (U256::from_be_slice(&word) - U256::from(1)) / U256::from(2);
        if length > U256::from(self.options.max_container_length) {
            let limit = self.options.max_container_length;
            return Ok(self.error(ty, DecodingError::OverlongContainer { length, limit }));
        }
        let start = StoragePosition::new(Slot::hashed(slot.clone()), 0);
        let data = StorageRange::with_length(start, length);
        let data = read_or_return!(ty, self.reader.read_storage(&data).await);
        Ok(self.bytes_value(ty, data))
    }

    /// Decodes a static or dynamic array; a dynamic array's length is stored in its slot and its
    /// data at `keccak256(slot)`.
    async fn storage_array(
        &self,
        ty: &Type,
        array: &ArrayType,
        slot: &Slot,
    ) -> Result<DecodeResult, DecoderError> {
        let Some(size) = storage_size(&array.base_type, &self.allocations.storage) else {
            return Ok(self.error(ty, missing_layout(&array.base_type)));
        };
        let (length, data) = match array.length {
            Some(length) => (U256::from(length), slot.clone()),
            None => {
                let range = StorageRange::word(slot.clone());
                let word = read_or_return!(ty, self.reader.read_storage(&range).await);
                (U256::from_be_slice(&word), Slot::hashed(slot.clone()))
            }
        };
        if length > U256::from(self.options.max_container_length) {
            let limit = self.options.max_container_length;
            return Ok(self.error(ty, DecodingError::OverlongContainer { length, limit }));
        }

        let length = length.to::<u64>();
        let mut elements = Vec::with_capacity(length as usize);
        for index in 0..length {
            let pointer = Pointer::Storage(element_range(&data, index, size));
            elements.push(self.decode(&array.base_type, &pointer).await?);
        }
        Ok(DecodeResult::from_value(ty.clone(), Value::Array(elements)))
    }

    /// Decodes a struct member by member, in declaration order.
    async fn storage_struct(
        &self,
        ty: &Type,
        st: &StructType,
        slot: &Slot,
    ) -> Result<DecodeResult, DecoderError> {
        let Some(allocation) = self.allocations.storage.get(&st.id) else {
            let error = DecodingError::AllocationMissing { id: st.id.clone(), member: None };
            return Ok(self.error(ty, error));
        };

        let mut fields = Vec::with_capacity(st.member_types.len());
        for member in &st.member_types {
            let value = match allocation.member(&member.name) {
                Some(allocation) => {
                    let Pointer::Storage(range) = &allocation.pointer else {
                        return Err(DecoderError::allocation(
                            &st.id,
                            format!("member `{}` is not allocated in storage", member.name),
                        ));
                    };
                    let pointer = Pointer::Storage(range.relative_to(slot));
                    self.decode(&member.ty, &pointer).await?
                }
                None => self.error(
                    &member.ty,
                    DecodingError::AllocationMissing {
                        id: st.id.clone(),
                        member: Some(member.name.clone()),
                    },
                ),
            };
            fields.push(Field::new(member.name.clone(), value));
        }
        Ok(DecodeResult::from_value(ty.clone(), Value::Struct(fields)))
    }

    /// Decodes the entries of a mapping for the keys known to the caller.
    ///
    /// The entry under `key` lives at `keccak256(key ++ slot)`; without known keys the mapping
    /// decodes as empty.
    async fn storage_mapping(
        &self,
        ty: &Type,
        mapping: &MappingType,
        slot: &Slot,
    ) -> Result<DecodeResult, DecoderError> {
        let keys = self.options.mapping_keys.get(&slot.address());
        let size = storage_size(&mapping.value_type, &self.allocations.storage);

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let value = match (SlotKey::encode(&mapping.key_type, key), size) {
                (Some(encoded), Some(size)) => {
                    let entry = Slot::mapping_entry(slot.clone(), encoded);
                    let pointer = Pointer::Storage(element_range(&entry, 0, size));
                    self.decode(&mapping.value_type, &pointer).await?
                }
                (None, _) => self.error(
                    &mapping.value_type,
                    DecodingError::InvalidMappingKey { key: key.to_string() },
                ),
                (_, None) => self.error(&mapping.value_type, missing_layout(&mapping.value_type)),
            };
            entries.push(MappingEntry { key: key.clone(), value });
        }
        Ok(DecodeResult::from_value(ty.clone(), Value::Mapping(entries)))
    }
}

/// The error for a type whose storage size isn't known.
fn missing_layout(ty: &Type) -> DecodingError {
    match ty {
        Type::Struct(st) => DecodingError::AllocationMissing { id: st.id.clone(), member: None },
        _ => DecodingError::UnsupportedType,
    }
}
