//! ABI decoding of calldata, returndata and event data.
//!
//! A value occupies its head: one word for value types and dynamic types, the whole inlined
//! encoding for static arrays and structs. The head of a dynamic type holds an offset relative to
//! the start of the enclosing container.

use super::{Engine, to_offset};
use crate::{
    error::DecoderError,
    pointer::{BufferKind, BufferRange, WORD_SIZE},
    types::{Member, StructType, Type},
    value::{DecodeResult, DecodingError, Field, Value},
};
use alloy_primitives::U256;

impl Engine<'_> {
    /// Decodes the value whose head is at `position`; offsets are relative to `base`.
    pub(crate) fn decode_abi(
        &self,
        ty: &Type,
        kind: BufferKind,
        position: usize,
        base: usize,
    ) -> Result<DecodeResult, DecoderError> {
        if let Type::Mapping(_) = ty {
            return Ok(self.error(ty, DecodingError::UnsupportedType));
        }
        if ty.is_abi_dynamic() {
            let word = self.reader.read_buffer_word(kind, position);
            let start = match to_offset(&word).map(|offset| base.checked_add(offset)) {
                Ok(Some(start)) => start,
                Ok(None) => {
                    let raw = word.to_vec().into();
                    return Ok(self.error(ty, DecodingError::PointerTooLarge { raw }));
                }
                Err(error) => return Ok(self.error(ty, error)),
            };
            return self.abi_at(ty, kind, start);
        }
        match ty {
            Type::Array(_) | Type::Struct(_) | Type::Tuple(_) => self.abi_at(ty, kind, position),
            _ => {
                let word = self.reader.read_buffer_word(kind, position);
                Ok(self.value(ty, word.as_slice(), self.options.strict_padding))
            }
        }
    }

    /// Decodes the encoding of a reference type starting at `start`.
    ///
    /// Dynamic `bytes`, `string` and arrays start with their length.
    pub(crate) fn abi_at(
        &self,
        ty: &Type,
        kind: BufferKind,
        start: usize,
    ) -> Result<DecodeResult, DecoderError> {
        trace!(%ty, %kind, start, "decode abi");
        match ty {
            Type::String { .. } | Type::Bytes(_) => {
                match self.abi_length(kind, start) {
                    Ok(length) => self.abi_with_length(ty, kind, start + WORD_SIZE, length),
                    Err(error) => Ok(self.error(ty, error)),
                }
            }
            Type::Array(array) => {
                let length = match array.length {
                    Some(length) => self.check_length(U256::from(length)).map(|l| (l, start)),
                    None => self.abi_length(kind, start).map(|l| (l, start + WORD_SIZE)),
                };
                match length {
                    Ok((length, data)) => self.abi_with_length(ty, kind, data, length),
                    Err(error) => Ok(self.error(ty, error)),
                }
            }
            Type::Struct(st) => self.abi_struct(ty, st, kind, start),
            Type::Tuple(tuple) => self.abi_tuple(ty, &tuple.member_types, kind, start),
            _ => Ok(self.error(ty, DecodingError::UnsupportedType)),
        }
    }

    /// Decodes `length` bytes or elements of a dynamic type whose data starts at `data`.
    pub(crate) fn abi_with_length(
        &self,
        ty: &Type,
        kind: BufferKind,
        data: usize,
        length: usize,
    ) -> Result<DecodeResult, DecoderError> {
        match ty {
            Type::String { .. } | Type::Bytes(_) => {
                let raw = self.reader.read_buffer(kind, BufferRange::new(data, length));
                Ok(self.bytes_value(ty, raw))
            }
            Type::Array(array) => {
                let Some(size) = array.base_type.abi_head_size() else {
                    return Ok(self.error(ty, DecodingError::UnsupportedType));
                };
                let mut elements = Vec::with_capacity(length);
                for index in 0..length {
                    let head = data.saturating_add(index.saturating_mul(size));
                    elements.push(self.decode_abi(&array.base_type, kind, head, data)?);
                }
                Ok(DecodeResult::from_value(ty.clone(), Value::Array(elements)))
            }
            _ => Ok(self.error(ty, DecodingError::UnsupportedType)),
        }
    }

    /// Decodes a struct using its ABI allocation.
    fn abi_struct(
        &self,
        ty: &Type,
        st: &StructType,
        kind: BufferKind,
        start: usize,
    ) -> Result<DecodeResult, DecoderError> {
        let Some(allocation) = self.allocations.abi.get(&st.id) else {
            let error = DecodingError::AllocationMissing { id: st.id.clone(), member: None };
            return Ok(self.error(ty, error));
        };

        let mut fields = Vec::with_capacity(st.member_types.len());
        for member in st.member_types.iter().filter(|m| !matches!(m.ty, Type::Mapping(_))) {
            let value = match allocation.member(&member.name) {
                Some(allocation) => {
                    let Some((_, range)) = allocation.pointer.buffer() else {
                        return Err(DecoderError::allocation(
                            &st.id,
                            format!("member `{}` is not ABI allocated", member.name),
                        ));
                    };
                    self.decode_abi(&member.ty, kind, start + range.start, start)?
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

    /// Decodes tuple members laid out one head after another.
    fn abi_tuple(
        &self,
        ty: &Type,
        members: &[Member],
        kind: BufferKind,
        start: usize,
    ) -> Result<DecodeResult, DecoderError> {
        let mut head = start;
        let mut fields = Vec::with_capacity(members.len());
        for member in members {
            let Some(size) = member.ty.abi_head_size() else {
                return Ok(self.error(ty, DecodingError::UnsupportedType));
            };
            fields.push(Field::new(
                member.name.clone(),
                self.decode_abi(&member.ty, kind, head, start)?,
            ));
            head = head.saturating_add(size);
        }
        Ok(DecodeResult::from_value(ty.clone(), Value::Tuple(fields)))
    }

    fn abi_length(&self, kind: BufferKind, start: usize) -> Result<usize, DecodingError> {
        let word = self.reader.read_buffer_word(kind, start);
        self.check_length(U256::from_be_bytes(word.0))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        Decoder, EvmState, Pointer,
        allocation::{Allocations, allocate_abi},
        pointer::BufferRange,
        step::Unavailable,
        types::{Member, StructType, Type},
        value::{DecodingError, Value},
    };
    use alloy_primitives::{B256, U256};

    fn encode(words: &[u64]) -> Vec<u8> {
        words.iter().flat_map(|w| B256::from(U256::from(*w)).0).collect()
    }

    fn returndata(ty: &Type, data: Vec<u8>, decoder: &Decoder) -> crate::DecodeResult {
        let state = EvmState::new().with_returndata(data);
        decoder
            .decode_with(ty, &Pointer::Returndata(BufferRange::word(0)), &state, &mut Unavailable)
            .unwrap()
    }

    #[test]
    fn dynamic_uint_array() {
        let ty = Type::array(Type::UINT256, None, None);
        let result = returndata(&ty, encode(&[0x20, 2, 5, 6]), &Decoder::default());
        let Some(Value::Array(elements)) = result.as_value() else { panic!("{result:?}") };
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[1].as_value(), Some(&Value::Uint(U256::from(6))));
    }

    #[test]
    fn string_behind_offset() {
        let mut data = encode(&[0x20, 3]);
        data.extend_from_slice(&B256::right_padding_from(b"abc").0);
        let result = returndata(&Type::string(None), data, &Decoder::default());
        assert_eq!(result.as_value(), Some(&Value::String("abc".into())));
    }

    #[test]
    fn static_struct_is_inlined() {
        let ty = Type::Struct(StructType {
            id: "P".into(),
            type_name: "P".into(),
            member_types: vec![Member::new("x", Type::UINT256), Member::new("y", Type::Bool)],
            location: None,
        });
        let allocations = Allocations { abi: allocate_abi([&ty]).unwrap(), ..Default::default() };
        let result = returndata(&ty, encode(&[9, 1]), &Decoder::new(allocations));
        let Some(Value::Struct(fields)) = result.as_value() else { panic!("{result:?}") };
        assert_eq!(fields[0].value.as_value(), Some(&Value::Uint(U256::from(9))));
        assert_eq!(fields[1].value.as_value(), Some(&Value::Bool(true)));
    }

    #[test]
    fn nested_dynamic_offsets_are_relative() {
        // uint256[][] with [[1], [2, 3]]
        let ty = Type::array(Type::array(Type::UINT256, None, None), None, None);
        let data = encode(&[0x20, 2, 0x40, 0x80, 1, 1, 2, 2, 3]);
        let result = returndata(&ty, data, &Decoder::default());
        let Some(Value::Array(outer)) = result.as_value() else { panic!("{result:?}") };
        let Some(Value::Array(second)) = outer[1].as_value() else { panic!("{outer:?}") };
        assert_eq!(second[1].as_value(), Some(&Value::Uint(U256::from(3))));
    }

    #[test]
    fn strict_padding() {
        let mut decoder = Decoder::default();
        decoder.options_mut().strict_padding = true;
        let result = returndata(&Type::Bool, encode(&[2]), &decoder);
        assert!(matches!(result.as_error(), Some(DecodingError::BoolOutOfRange { .. })));

        let result = returndata(&Type::Uint { bits: 8 }, encode(&[0x1ff]), &decoder);
        assert!(matches!(result.as_error(), Some(DecodingError::Padding { .. })));
    }

    #[test]
    fn huge_offset() {
        let data = B256::repeat_byte(0xff).to_vec();
        let result = returndata(&Type::dynamic_bytes(None), data, &Decoder::default());
        assert!(matches!(result.as_error(), Some(DecodingError::PointerTooLarge { .. })));
    }
}
