//! Storage slot addressing.
//!
//! A [`Slot`] is either a literal slot number or an offset relative to another slot. Dynamic
//! arrays and mappings hash their base slot (together with the key, for mappings) to find where
//! their data lives; struct members and static array elements use plain offsets.

use crate::{Type, value::Value};
use alloy_primitives::{B256, Bytes, U256, keccak256, map::B256HashMap};
use serde::{Deserialize, Serialize};

/// Width in bits of a numeric key type, if it is a valid one.
fn width(bits: u16) -> Option<usize> {
    (1..=256).contains(&bits).then_some(usize::from(bits))
}

/// A storage addressing descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    /// Offset added to the resolved base.
    pub offset: U256,
    /// The slot this one is relative to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Box<Slot>>,
    /// Whether the resolved `path` is hashed to obtain the base.
    #[serde(default)]
    pub hash_path: bool,
    /// Mapping key hashed in front of the path; only used when `hash_path` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<SlotKey>,
}

/// A mapping key, encoded the way it is hashed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKey {
    /// A value type key, already padded to a full word.
    Word(B256),
    /// A `bytes` or `string` key, hashed as is.
    Raw(Bytes),
}

impl SlotKey {
    /// Encodes a mapping key of type `key_type`.
    ///
    /// Value types are left-padded (signed integers sign-extended) to a word, `bytesN` is
    /// right-padded and `bytes`/`string` keys are used unpadded. Returns `None` when the value
    /// doesn't fit the key type.
    pub fn encode(key_type: &Type, key: &Value) -> Option<Self> {
        let key = match (key_type, key) {
            (Type::Uint { bits }, Value::Uint(v)) |
            (Type::Ufixed { bits, .. }, Value::Ufixed { raw: v, .. }) => {
                if v.bit_len() > width(*bits)? {
                    return None;
                }
                Self::Word(B256::from(*v))
            }
            (Type::Int { bits }, Value::Int(v)) |
            (Type::Fixed { bits, .. }, Value::Fixed { raw: v, .. }) => {
                // every bit above the sign bit must repeat it
                let high = v.into_raw() >> (width(*bits)? - 1);
                if !high.is_zero() && high != U256::MAX >> (width(*bits)? - 1) {
                    return None;
                }
                Self::Word(B256::from(v.into_raw()))
            }
            (Type::Bool, Value::Bool(b)) => Self::Word(B256::with_last_byte(*b as u8)),
            (Type::Address { .. }, Value::Address(address)) |
            (Type::Contract(_), Value::Contract { address }) => Self::Word(address.into_word()),
            (Type::Enum(e), Value::Enum { ordinal, .. }) => {
                if usize::try_from(*ordinal).ok()? >= e.options.len() {
                    return None;
                }
                Self::Word(B256::from(U256::from(*ordinal)))
            }
            (Type::Bytes(bytes), Value::FixedBytes(value)) if bytes.length.is_some() => {
                if value.len() > 32 || bytes.length != u8::try_from(value.len()).ok() {
                    return None;
                }
                Self::Word(B256::right_padding_from(value))
            }
            (Type::Bytes(bytes), Value::Bytes(value)) if bytes.length.is_none() => {
                Self::Raw(value.clone())
            }
            (Type::String { .. }, Value::String(value)) => {
                Self::Raw(Bytes::copy_from_slice(value.as_bytes()))
            }
            _ => return None,
        };
        Some(key)
    }

    /// Returns the bytes hashed in front of the mapping's slot.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Word(word) => word.as_slice(),
            Self::Raw(bytes) => bytes,
        }
    }
}

impl Slot {
    /// A literal slot number.
    pub fn new(offset: U256) -> Self {
        Self { offset, ..Default::default() }
    }

    /// A literal slot number.
    pub fn at(offset: u64) -> Self {
        Self::new(U256::from(offset))
    }

    /// `offset` words after `base`, without hashing; used for struct members and static
    /// array elements.
    pub fn member(base: Self, offset: U256) -> Self {
        Self { offset, path: Some(Box::new(base)), hash_path: false, key: None }
    }

    /// The start of a dynamic array's (or long `bytes`/`string`'s) data: `keccak256(base)`.
    pub fn hashed(base: Self) -> Self {
        Self { offset: U256::ZERO, path: Some(Box::new(base)), hash_path: true, key: None }
    }

    /// The slot of the entry under `key` in the mapping at `base`: `keccak256(key ++ base)`.
    pub fn mapping_entry(base: Self, key: SlotKey) -> Self {
        Self { offset: U256::ZERO, path: Some(Box::new(base)), hash_path: true, key: Some(key) }
    }

    /// Returns the same slot moved `by` words further, sharing this slot's base.
    pub fn offset_by(&self, by: U256) -> Self {
        Self { offset: self.offset.wrapping_add(by), ..self.clone() }
    }

    /// Returns the same slot with its offset replaced.
    pub fn with_offset(&self, offset: U256) -> Self {
        Self { offset, ..self.clone() }
    }

    /// Returns `true` if both slots are relative to the same base.
    pub fn same_base(&self, other: &Self) -> bool {
        self.path == other.path &&
            self.hash_path == other.hash_path &&
            (!self.hash_path || self.key == other.key)
    }

    /// Resolves the slot to its 32-byte storage address.
    pub fn address(&self) -> B256 {
        slot_address(self)
    }
}

/// Resolves `slot` to its 32-byte storage address.
///
/// Without a path the address is the offset itself. With a path, the path is resolved first; if
/// `hash_path` is set the base becomes `keccak256(key ++ path_address)` (or
/// `keccak256(path_address)` without a key), then the offset is added modulo 2^256.
pub fn slot_address(slot: &Slot) -> B256 {
    let Some(path) = &slot.path else {
        return B256::from(slot.offset);
    };

    let path_address = slot_address(path);
    let base = if slot.hash_path {
        let hashed = match &slot.key {
            Some(key) => keccak256([key.as_bytes(), path_address.as_slice()].concat()),
            None => keccak256(path_address),
        };
        trace!(path = %path_address, %hashed, "hashed slot path");
        hashed
    } else {
        path_address
    };

    B256::from(U256::from_be_bytes(base.0).wrapping_add(slot.offset))
}

/// Mapping keys known to the caller, grouped by the address of the mapping's slot.
///
/// Storage holds no list of the keys a mapping contains, so only these entries are decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappingKeys {
    keys: B256HashMap<Vec<Value>>,
}

impl MappingKeys {
    /// Records `key` as present in the mapping at `slot`.
    pub fn insert(&mut self, slot: &Slot, key: Value) {
        let keys = self.keys.entry(slot.address()).or_default();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    /// Builder variant of [`Self::insert`].
    pub fn with(mut self, slot: &Slot, key: Value) -> Self {
        self.insert(slot, key);
        self
    }

    /// Returns the known keys of the mapping whose slot resolves to `address`.
    pub fn get(&self, address: &B256) -> &[Value] {
        self.keys.get(address).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
