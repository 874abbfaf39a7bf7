//! Stack decoding.

use super::{Engine, to_offset};
use crate::{
    error::DecoderError,
    pointer::{BufferKind, StorageRange, WORD_SIZE},
    slot::Slot,
    types::{DataLocation, FunctionType, Type, Visibility},
    value::{DecodeResult, DecodingError},
};
use alloy_primitives::{B256, U256};

impl Engine<'_> {
    /// Decodes the stack words `from..=to`.
    ///
    /// Value types sit in the low-order bytes of the last word. A reference type's words point to
    /// its data in the type's location, memory if it carries none: a memory address, a storage
    /// slot, or a calldata position. Dynamic calldata values take two words, the position of
    /// their data and their length. External function pointers take two words as well, the
    /// address and the selector.
    pub(crate) async fn decode_stack(
        &self,
        ty: &Type,
        from: usize,
        to: usize,
    ) -> Result<DecodeResult, DecoderError> {
        let raw = read_or_return!(ty, self.reader.read_stack(from, to));
        let words: Vec<B256> = raw.chunks_exact(WORD_SIZE).map(B256::from_slice).collect();
        let Some(last) = words.last() else {
            return Err(DecoderError::Internal("empty stack read".to_string()));
        };

        if !ty.is_reference() {
            let external = Type::Function(FunctionType { visibility: Visibility::External });
            if let ([.., address, selector], true) = (words.as_slice(), *ty == external) {
                let mut raw = address[12..].to_vec();
                raw.extend_from_slice(&selector[28..]);
                return Ok(self.value(ty, &raw, false));
            }
            return Ok(self.value(ty, last.as_slice(), false));
        }

        match ty.location().unwrap_or(DataLocation::Memory) {
            DataLocation::Memory => match to_offset(last) {
                Ok(address) => self.memory_at(ty, address),
                Err(error) => Ok(self.error(ty, error)),
            },
            DataLocation::Storage => {
                let slot = Slot::new(U256::from_be_bytes(last.0));
                self.decode_storage(ty, &StorageRange::word(slot)).await
            }
            DataLocation::Calldata => self.stack_calldata(ty, &words),
        }
    }

    fn stack_calldata(&self, ty: &Type, words: &[B256]) -> Result<DecodeResult, DecoderError> {
        let dynamic = match ty {
            Type::String { .. } | Type::Bytes(_) => true,
            Type::Array(array) => array.length.is_none(),
            _ => false,
        };
        match (dynamic, words) {
            (true, [.., position, length]) => {
                let position = match to_offset(position) {
                    Ok(position) => position,
                    Err(error) => return Ok(self.error(ty, error)),
                };
                match self.check_length(U256::from_be_bytes(length.0)) {
                    Ok(length) => self.abi_with_length(ty, BufferKind::Calldata, position, length),
                    Err(error) => Ok(self.error(ty, error)),
                }
            }
            (_, [.., position]) => match to_offset(position) {
                Ok(position) => self.abi_at(ty, BufferKind::Calldata, position),
                Err(error) => Ok(self.error(ty, error)),
            },
            (_, []) => Ok(self.error(ty, DecodingError::UnsupportedType)),
        }
    }
}
