//! The closed set of decodable types.
//!
//! Types are produced once per compilation by an external translator and shared read-only across
//! every decode call. The `typeClass` tag is the sole dispatch key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decodable shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "typeClass", rename_all = "lowercase")]
pub enum Type {
    /// `uintN`
    Uint { bits: u16 },
    /// `intN`
    Int { bits: u16 },
    /// `bool`
    Bool,
    /// `bytesN` or `bytes`
    Bytes(BytesType),
    /// `address` or `address payable`
    Address {
        #[serde(default)]
        payable: bool,
    },
    /// `string`
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<DataLocation>,
    },
    /// `fixedMxN`
    Fixed { bits: u16, places: u8 },
    /// `ufixedMxN`
    Ufixed { bits: u16, places: u8 },
    /// A user defined enum.
    Enum(EnumType),
    /// A contract or interface.
    Contract(ContractType),
    /// An external or internal function pointer.
    Function(FunctionType),
    /// A static or dynamic array.
    Array(ArrayType),
    /// A user defined struct.
    Struct(StructType),
    /// A mapping; only exists in storage.
    Mapping(MappingType),
    /// A tuple, e.g. a list of function arguments.
    Tuple(TupleType),
    /// The type of a type, e.g. `type(MyContract)`.
    Type(TypeType),
    /// One of the built-in `msg`, `tx` and `block` objects.
    Magic(MagicType),
    /// A type class this decoder doesn't know about.
    #[serde(other)]
    Unsupported,
}

/// Where a reference type lives when it is referred to from the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLocation {
    Memory,
    Storage,
    Calldata,
}

/// `bytesN` when `length` is set, `bytes` otherwise.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BytesType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<DataLocation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumType {
    pub id: String,
    pub type_name: String,
    pub options: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractType {
    pub type_name: String,
    #[serde(default)]
    pub payable: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    External,
    Internal,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayType {
    pub base_type: Box<Type>,
    /// Static length, `None` for dynamic arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<DataLocation>,
}

/// A named member of a struct or tuple. Tuple members may have an empty name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructType {
    /// Identity used to look up the struct's allocations.
    pub id: String,
    pub type_name: String,
    pub member_types: Vec<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<DataLocation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingType {
    pub key_type: Box<Type>,
    pub value_type: Box<Type>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TupleType {
    pub member_types: Vec<Member>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeType {
    pub of: Box<Type>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MagicVariable {
    Msg,
    Tx,
    Block,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MagicType {
    pub variable: MagicVariable,
}

impl Type {
    /// `uint256`
    pub const UINT256: Self = Self::Uint { bits: 256 };

    /// Returns `bytesN`.
    pub fn fixed_bytes(length: u8) -> Self {
        Self::Bytes(BytesType { length: Some(length), location: None })
    }

    /// Returns dynamic `bytes` living in `location`.
    pub fn dynamic_bytes(location: Option<DataLocation>) -> Self {
        Self::Bytes(BytesType { length: None, location })
    }

    /// Returns a `string` living in `location`.
    pub fn string(location: Option<DataLocation>) -> Self {
        Self::String { location }
    }

    /// Returns `base[]` or `base[length]`.
    pub fn array(base: Self, length: Option<u64>, location: Option<DataLocation>) -> Self {
        Self::Array(ArrayType { base_type: Box::new(base), length, location })
    }

    /// Returns `mapping(key => value)`.
    pub fn mapping(key: Self, value: Self) -> Self {
        Self::Mapping(MappingType { key_type: Box::new(key), value_type: Box::new(value) })
    }

    /// Returns `true` for types whose values are referred to rather than held in a word.
    pub fn is_reference(&self) -> bool {
        match self {
            Self::Bytes(bytes) => bytes.length.is_none(),
            Self::String { .. } |
            Self::Array(_) |
            Self::Struct(_) |
            Self::Mapping(_) |
            Self::Tuple(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if the type is dynamically sized under the ABI encoding rules.
    pub fn is_abi_dynamic(&self) -> bool {
        match self {
            Self::String { .. } => true,
            Self::Bytes(bytes) => bytes.length.is_none(),
            Self::Array(array) => array.length.is_none() || array.base_type.is_abi_dynamic(),
            Self::Struct(st) => st.member_types.iter().any(|m| m.ty.is_abi_dynamic()),
            Self::Tuple(tuple) => tuple.member_types.iter().any(|m| m.ty.is_abi_dynamic()),
            _ => false,
        }
    }

    /// Returns the number of bytes the type occupies in the head of an ABI encoding.
    ///
    /// Dynamic types are referred to through a single offset word. Returns `None` on overflow.
    pub fn abi_head_size(&self) -> Option<usize> {
        if self.is_abi_dynamic() {
            return Some(32);
        }
        match self {
            Self::Array(array) => {
                let length = usize::try_from(array.length?).ok()?;
                length.checked_mul(array.base_type.abi_head_size()?)
            }
            Self::Struct(StructType { member_types, .. }) |
            Self::Tuple(TupleType { member_types }) => member_types
                .iter()
                .filter(|m| !matches!(m.ty, Self::Mapping(_)))
                .try_fold(0usize, |acc, m| acc.checked_add(m.ty.abi_head_size()?)),
            _ => Some(32),
        }
    }

    /// Returns the data location of a reference type, if it carries one.
    pub fn location(&self) -> Option<DataLocation> {
        match self {
            Self::Bytes(BytesType { location, .. }) |
            Self::String { location } |
            Self::Array(ArrayType { location, .. }) |
            Self::Struct(StructType { location, .. }) => *location,
            Self::Mapping(_) => Some(DataLocation::Storage),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint { bits } => write!(f, "uint{bits}"),
            Self::Int { bits } => write!(f, "int{bits}"),
            Self::Bool => f.write_str("bool"),
            Self::Bytes(BytesType { length: Some(length), .. }) => write!(f, "bytes{length}"),
            Self::Bytes(BytesType { length: None, .. }) => f.write_str("bytes"),
            Self::Address { payable: true } => f.write_str("address payable"),
            Self::Address { payable: false } => f.write_str("address"),
            Self::String { .. } => f.write_str("string"),
            Self::Fixed { bits, places } => write!(f, "fixed{bits}x{places}"),
            Self::Ufixed { bits, places } => write!(f, "ufixed{bits}x{places}"),
            Self::Enum(e) => write!(f, "enum {}", e.type_name),
            Self::Contract(c) => write!(f, "contract {}", c.type_name),
            Self::Function(func) => match func.visibility {
                Visibility::External => f.write_str("function external"),
                Visibility::Internal => f.write_str("function internal"),
            },
            Self::Array(array) => match array.length {
                Some(length) => write!(f, "{}[{length}]", array.base_type),
                None => write!(f, "{}[]", array.base_type),
            },
            Self::Struct(st) => write!(f, "struct {}", st.type_name),
            Self::Mapping(m) => write!(f, "mapping({} => {})", m.key_type, m.value_type),
            Self::Tuple(tuple) => {
                f.write_str("(")?;
                for (i, member) in tuple.member_types.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", member.ty)?;
                }
                f.write_str(")")
            }
            Self::Type(t) => write!(f, "type({})", t.of),
            Self::Magic(magic) => write!(f, "{}", magic.variable),
            Self::Unsupported => f.write_str("<unsupported>"),
        }
    }
}
