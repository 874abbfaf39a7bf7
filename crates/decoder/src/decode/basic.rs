//! Conversions from raw bytes to value types.
//!
//! Raw bytes may be longer than the value: a stack, memory or ABI word holds the value in its
//! low-order bytes (high-order for `bytesN` and external function pointers), while a storage
//! read yields exactly the value's bytes.

use super::Engine;
use crate::{
    allocation::enum_size,
    types::{Type, Visibility},
    value::{DecodeResult, DecodingError, Value},
};
use alloy_primitives::{Address, B256, Bytes, FixedBytes, I256, U256};

impl Engine<'_> {
    /// Decodes a value type out of `raw`.
    ///
    /// With `strict` set the bytes around the value must be clean padding.
    pub(crate) fn value(&self, ty: &Type, raw: &[u8], strict: bool) -> DecodeResult {
        let value = self.convert(ty, raw, strict);
        self.finish(ty, value)
    }

    fn convert(&self, ty: &Type, raw: &[u8], strict: bool) -> Result<Value, DecodingError> {
        let value = match ty {
            Type::Uint { bits } => Value::Uint(unsigned(raw, byte_width(*bits)?, strict)?),
            Type::Int { bits } => Value::Int(signed(raw, byte_width(*bits)?, strict)?),
            Type::Ufixed { bits, places } => {
                Value::Ufixed { raw: unsigned(raw, byte_width(*bits)?, strict)?, places: *places }
            }
            Type::Fixed { bits, places } => {
                Value::Fixed { raw: signed(raw, byte_width(*bits)?, strict)?, places: *places }
            }
            Type::Bool => {
                let value = right_aligned(raw, 1, strict)?[0];
                if strict && value > 1 {
                    return Err(DecodingError::BoolOutOfRange { raw: Bytes::copy_from_slice(raw) });
                }
                Value::Bool(value != 0)
            }
            Type::Address { .. } => Value::Address(address(raw, strict)?),
            Type::Contract(_) => Value::Contract { address: address(raw, strict)? },
            Type::Bytes(bytes) => match bytes.length {
                Some(length @ 1..=32) => {
                    Value::FixedBytes(left_aligned(raw, length as usize, strict)?.into())
                }
                Some(_) => return Err(DecodingError::UnsupportedType),
                None => Value::Bytes(Bytes::copy_from_slice(raw)),
            },
            Type::String { .. } => return string(raw),
            Type::Enum(e) => {
                let ordinal = unsigned(raw, enum_size(e.options.len()) as usize, strict)?;
                let index = usize::try_from(ordinal).ok().filter(|index| *index < e.options.len());
                let Some(index) = index else {
                    return Err(DecodingError::EnumOutOfRange {
                        raw: ordinal,
                        options: e.options.len(),
                    });
                };
                Value::Enum { ordinal: index as u64, name: e.options[index].clone() }
            }
            Type::Function(function) => match function.visibility {
                Visibility::External => {
                    let raw = left_aligned(raw, 24, strict)?;
                    Value::ExternalFunction {
                        address: Address::from_slice(&raw[..20]),
                        selector: FixedBytes::from_slice(&raw[20..]),
                    }
                }
                Visibility::Internal => self.internal_function(right_aligned(raw, 8, strict)?)?,
            },
            _ => return Err(DecodingError::UnsupportedType),
        };
        Ok(value)
    }

    /// Splits an internal function pointer into its program counters and looks the function
    /// up.
    fn internal_function(&self, raw: Vec<u8>) -> Result<Value, DecodingError> {
        let constructor_pc = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let deployed_pc = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
        let table = &self.allocations.internal_functions;
        let function = if (deployed_pc == 0 && constructor_pc == 0) || table.is_empty() {
            None
        } else {
            let Some(function) = table.get(deployed_pc, constructor_pc) else {
                return Err(DecodingError::NoSuchInternalFunction { deployed_pc, constructor_pc });
            };
            Some(function.to_string())
        };
        Ok(Value::InternalFunction { deployed_pc, constructor_pc, function })
    }

    /// Decodes the contents of a dynamic `bytes` or `string`.
    pub(crate) fn bytes_value(&self, ty: &Type, data: Bytes) -> DecodeResult {
        let value = match ty {
            Type::String { .. } => string(&data),
            _ => Ok(Value::Bytes(data)),
        };
        self.finish(ty, value)
    }

    /// Decodes a value supplied as raw bytes.
    pub(crate) fn decode_literal(&self, ty: &Type, raw: &Bytes) -> DecodeResult {
        match ty {
            Type::String { .. } => self.bytes_value(ty, raw.clone()),
            Type::Bytes(bytes) if bytes.length.is_none() => self.bytes_value(ty, raw.clone()),
            ty if ty.is_reference() => self.error(ty, DecodingError::UnsupportedType),
            _ => self.value(ty, raw, false),
        }
    }
}

/// Bytes taken by a `bits` wide number; wider than a word isn't a type.
fn byte_width(bits: u16) -> Result<usize, DecodingError> {
    match bits {
        1..=256 => Ok(usize::from(bits).div_ceil(8)),
        _ => Err(DecodingError::UnsupportedType),
    }
}

fn string(raw: &[u8]) -> Result<Value, DecodingError> {
    match std::str::from_utf8(raw) {
        Ok(s) => Ok(Value::String(s.to_string())),
        Err(_) => Err(DecodingError::InvalidUtf8 { raw: Bytes::copy_from_slice(raw) }),
    }
}

fn address(raw: &[u8], strict: bool) -> Result<Address, DecodingError> {
    Ok(Address::from_slice(&right_aligned(raw, 20, strict)?))
}

fn unsigned(raw: &[u8], size: usize, strict: bool) -> Result<U256, DecodingError> {
    Ok(U256::from_be_slice(&right_aligned(raw, size, strict)?))
}

/// Sign-extends the low `size` bytes of `raw` from bit `8 * size - 1`.
///
/// A `raw` shorter than `size` is zero-extended to `size` bytes first.
fn signed(raw: &[u8], size: usize, strict: bool) -> Result<I256, DecodingError> {
    let value = right_aligned(raw, size, false)?;
    let fill = if value[0] & 0x80 != 0 { 0xff } else { 0x00 };
    if strict && raw[..raw.len().saturating_sub(size)].iter().any(|b| *b != fill) {
        return Err(DecodingError::Padding { raw: Bytes::copy_from_slice(raw) });
    }
    let mut word = B256::repeat_byte(fill);
    word[32 - size..].copy_from_slice(&value);
    Ok(I256::from_raw(U256::from_be_bytes(word.0)))
}

/// Returns the low `size` bytes of `raw`, zero-extended if `raw` is shorter.
fn right_aligned(raw: &[u8], size: usize, strict: bool) -> Result<Vec<u8>, DecodingError> {
    if raw.len() <= size {
        let mut value = vec![0; size - raw.len()];
        value.extend_from_slice(raw);
        return Ok(value);
    }
    let (padding, value) = raw.split_at(raw.len() - size);
    if strict && padding.iter().any(|b| *b != 0) {
        return Err(DecodingError::Padding { raw: Bytes::copy_from_slice(raw) });
    }
    Ok(value.to_vec())
}

/// Returns the high `size` bytes of `raw`, zero-extended if `raw` is shorter.
fn left_aligned(raw: &[u8], size: usize, strict: bool) -> Result<Vec<u8>, DecodingError> {
    if raw.len() <= size {
        let mut value = raw.to_vec();
        value.resize(size, 0);
        return Ok(value);
    }
    let (value, padding) = raw.split_at(size);
    if strict && padding.iter().any(|b| *b != 0) {
        return Err(DecodingError::Padding { raw: Bytes::copy_from_slice(raw) });
    }
    Ok(value.to_vec())
}
