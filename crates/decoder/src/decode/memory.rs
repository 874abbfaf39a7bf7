//! Memory decoding.
//!
//! Every element and member takes exactly one word. A word holding a reference type is a pointer
//! to the value's data; dynamic containers start with their length.

use super::{Engine, to_offset};
use crate::{
    error::DecoderError,
    pointer::{BufferKind, BufferRange, Pointer, WORD_SIZE},
    types::{ArrayType, Member, StructType, Type},
    value::{DecodeResult, DecodingError, Field, Value},
};
use alloy_primitives::U256;

impl Engine<'_> {
    /// Decodes the word at `position`.
    pub(crate) fn decode_memory(
        &self,
        ty: &Type,
        position: usize,
    ) -> Result<DecodeResult, DecoderError> {
        let word = self.reader.read_buffer_word(BufferKind::Memory, position);
        if !ty.is_reference() {
            return Ok(self.value(ty, word.as_slice(), self.options.strict_padding));
        }
        match to_offset(&word) {
            Ok(address) => self.memory_at(ty, address),
            Err(error) => Ok(self.error(ty, error)),
        }
    }

    /// Decodes a reference type whose data starts at `address`.
    pub(crate) fn memory_at(
        &self,
        ty: &Type,
        address: usize,
    ) -> Result<DecodeResult, DecoderError> {
        trace!(%ty, address, "decode memory");
        match ty {
            Type::String { .. } | Type::Bytes(_) => {
                let length = match self.memory_length(address) {
                    Ok(length) => length,
                    Err(error) => return Ok(self.error(ty, error)),
                };
                let range = BufferRange::new(address + WORD_SIZE, length);
                Ok(self.bytes_value(ty, self.reader.read_buffer(BufferKind::Memory, range)))
            }
            Type::Array(array) => self.memory_array(ty, array, address),
            Type::Struct(st) => self.memory_struct(ty, st, address),
            Type::Tuple(tuple) => self.memory_members(ty, &tuple.member_types, address),
            _ => Ok(self.error(ty, DecodingError::UnsupportedType)),
        }
    }

    fn memory_array(
        &self,
        ty: &Type,
        array: &ArrayType,
        address: usize,
    ) -> Result<DecodeResult, DecoderError> {
        let (length, start) = match array.length {
            Some(length) => match self.check_length(U256::from(length)) {
                Ok(length) => (length, address),
                Err(error) => return Ok(self.error(ty, error)),
            },
            None => match self.memory_length(address) {
                Ok(length) => (length, address + WORD_SIZE),
                Err(error) => return Ok(self.error(ty, error)),
            },
        };

        let elements = (0..length)
            .map(|index| self.decode_memory(&array.base_type, start + index * WORD_SIZE))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DecodeResult::from_value(ty.clone(), Value::Array(elements)))
    }

    /// Decodes a struct at `address` using its memory allocation; mappings are left out.
    fn memory_struct(
        &self,
        ty: &Type,
        st: &StructType,
        address: usize,
    ) -> Result<DecodeResult, DecoderError> {
        let Some(allocation) = self.allocations.memory.get(&st.id) else {
            let error = DecodingError::AllocationMissing { id: st.id.clone(), member: None };
            return Ok(self.error(ty, error));
        };

        let mut fields = Vec::with_capacity(st.member_types.len());
        for member in st.member_types.iter().filter(|m| !matches!(m.ty, Type::Mapping(_))) {
            let value = match allocation.member(&member.name) {
                Some(allocation) => {
                    let Pointer::Memory(range) = &allocation.pointer else {
                        return Err(DecoderError::allocation(
                            &st.id,
                            format!("member `{}` is not allocated in memory", member.name),
                        ));
                    };
                    self.decode_memory(&member.ty, address + range.start)?
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

    fn memory_members(
        &self,
        ty: &Type,
        members: &[Member],
        address: usize,
    ) -> Result<DecodeResult, DecoderError> {
        let fields = members
            .iter()
            .enumerate()
            .map(|(i, member)| {
                let value = self.decode_memory(&member.ty, address + i * WORD_SIZE)?;
                Ok(Field::new(member.name.clone(), value))
            })
            .collect::<Result<Vec<_>, DecoderError>>()?;
        Ok(DecodeResult::from_value(ty.clone(), Value::Tuple(fields)))
    }

    /// Reads the length word at `address`.
    fn memory_length(&self, address: usize) -> Result<usize, DecodingError> {
        let word = self.reader.read_buffer_word(BufferKind::Memory, address);
        self.check_length(U256::from_be_bytes(word.0))
    }

    /// Checks a container length against the configured limit.
    pub(crate) fn check_length(&self, length: U256) -> Result<usize, DecodingError> {
        let limit = self.options.max_container_length;
        if length > U256::from(limit) {
            return Err(DecodingError::OverlongContainer { length, limit });
        }
        Ok(length.to::<usize>())
    }
}
