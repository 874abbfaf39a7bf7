//! Decoded values and results.

use crate::{error::ReadError, types::Type};
use alloy_primitives::{Address, B256, Bytes, FixedBytes, I256, U256};
use serde::{Deserialize, Serialize};

/// The outcome of decoding one value.
///
/// An error result is an ordinary value: containers hold error results for the members that
/// failed while their siblings still decode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DecodeResult {
    Value {
        #[serde(rename = "type")]
        ty: Type,
        value: Value,
    },
    Error {
        #[serde(rename = "type")]
        ty: Type,
        error: DecodingError,
    },
}

impl DecodeResult {
    pub fn from_value(ty: Type, value: Value) -> Self {
        Self::Value { ty, value }
    }

    pub fn from_error(ty: Type, error: DecodingError) -> Self {
        Self::Error { ty, error }
    }

    /// The type that was decoded.
    pub fn ty(&self) -> &Type {
        match self {
            Self::Value { ty, .. } | Self::Error { ty, .. } => ty,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value { value, .. } => Some(value),
            Self::Error { .. } => None,
        }
    }

    pub fn as_error(&self) -> Option<&DecodingError> {
        match self {
            Self::Value { .. } => None,
            Self::Error { error, .. } => Some(error),
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value { value, .. } => Some(value),
            Self::Error { .. } => None,
        }
    }
}

/// A decoded value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Value {
    Uint(U256),
    Int(I256),
    Bool(bool),
    /// `bytesN`
    FixedBytes(Bytes),
    /// Dynamic `bytes`.
    Bytes(Bytes),
    Address(Address),
    String(String),
    /// A signed fixed point number: `raw / 10^places`.
    Fixed { raw: I256, places: u8 },
    /// An unsigned fixed point number: `raw / 10^places`.
    Ufixed { raw: U256, places: u8 },
    Enum { ordinal: u64, name: String },
    Contract { address: Address },
    ExternalFunction { address: Address, selector: FixedBytes<4> },
    /// An internal function pointer; both program counters are zero when uninitialized.
    InternalFunction { deployed_pc: u32, constructor_pc: u32, function: Option<String> },
    Array(Vec<DecodeResult>),
    Struct(Vec<Field>),
    /// The entries for the keys known to the caller.
    Mapping(Vec<MappingEntry>),
    Tuple(Vec<Field>),
    /// The value of a type expression is the type itself.
    Type(Type),
    Magic(Vec<Field>),
}

/// A named member of a struct, tuple or magic value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: DecodeResult,
}

impl Field {
    pub fn new(name: impl Into<String>, value: DecodeResult) -> Self {
        Self { name: name.into(), value }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub key: Value,
    pub value: DecodeResult,
}

/// Why a single value could not be decoded.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DecodingError {
    #[error("unsupported type")]
    UnsupportedType,
    #[error("constant `{name}` can't be recovered statically: {reason}")]
    UnsupportedConstant { name: String, reason: String },
    #[error("read failed: {error}")]
    Read { error: ReadError },
    #[error("invalid UTF-8 in string {raw}")]
    InvalidUtf8 { raw: Bytes },
    #[error("enum ordinal {raw} is out of range for {options} options")]
    EnumOutOfRange { raw: U256, options: usize },
    #[error("invalid boolean {raw}")]
    BoolOutOfRange { raw: Bytes },
    #[error("incorrectly padded word {raw}")]
    Padding { raw: Bytes },
    #[error("malformed length {raw}")]
    MalformedLength { raw: Bytes },
    #[error("container length {length} exceeds the limit of {limit}")]
    OverlongContainer { length: U256, limit: u64 },
    #[error("pointer {raw} is out of range")]
    PointerTooLarge { raw: Bytes },
    #[error("no allocation for {}", allocation_target(.id, .member))]
    AllocationMissing { id: String, member: Option<String> },
    #[error("mapping key {key} doesn't match the key type")]
    InvalidMappingKey { key: String },
    #[error("indexed reference type; only its hash {raw} was logged")]
    IndexedReferenceType { raw: B256 },
    #[error("no internal function at pc {deployed_pc} (constructor pc {constructor_pc})")]
    NoSuchInternalFunction { deployed_pc: u32, constructor_pc: u32 },
}

fn allocation_target(id: &str, member: &Option<String>) -> String {
    match member {
        Some(member) => format!("member `{member}` of `{id}`"),
        None => format!("`{id}`"),
    }
}

impl From<ReadError> for DecodingError {
    fn from(error: ReadError) -> Self {
        match error {
            ReadError::UnsupportedConstant { name, reason } => {
                Self::UnsupportedConstant { name, reason }
            }
            error => Self::Read { error },
        }
    }
}
