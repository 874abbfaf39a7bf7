//! Magic variables (`msg`, `tx`, `block`), special values and event topics.

use super::Engine;
use crate::{
    pointer::{BufferKind, BufferRange, Special},
    types::{DataLocation, MagicType, MagicVariable, Type},
    value::{DecodeResult, DecodingError, Field, Value},
};
use semver::Version;
use serde::{Deserialize, Serialize};

/// Compiler version ranges that share one set of magic variable fields.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MagicFamily {
    /// Before 0.8.0.
    Legacy,
    /// 0.8.0: `block.chainid`; `msg.sender` and `tx.origin` are no longer payable.
    Istanbul,
    /// 0.8.7: `block.basefee`.
    London,
    /// 0.8.18: `block.prevrandao`.
    Paris,
    /// 0.8.24: `block.blobbasefee`.
    #[default]
    Cancun,
}

impl MagicFamily {
    /// Returns the family of the given compiler version; pre-releases count as their release.
    pub fn from_version(version: &Version) -> Self {
        match (version.major, version.minor, version.patch) {
            v if v >= (0, 8, 24) => Self::Cancun,
            v if v >= (0, 8, 18) => Self::Paris,
            v if v >= (0, 8, 7) => Self::London,
            v if v >= (0, 8, 0) => Self::Istanbul,
            _ => Self::Legacy,
        }
    }

    /// Returns the fields `variable` has in this family, with their types.
    pub fn fields(self, variable: MagicVariable) -> impl Iterator<Item = (&'static str, Type)> {
        FIELDS
            .iter()
            .filter(move |field| field.variable == variable && field.exists_in(self))
            .map(|field| (field.name, field.ty.to_type()))
    }
}

#[derive(Clone, Copy)]
enum FieldType {
    Uint256,
    Address,
    AddressPayable,
    Bytes4,
    Bytes,
}

impl FieldType {
    fn to_type(self) -> Type {
        match self {
            Self::Uint256 => Type::UINT256,
            Self::Address => Type::Address { payable: false },
            Self::AddressPayable => Type::Address { payable: true },
            Self::Bytes4 => Type::fixed_bytes(4),
            Self::Bytes => Type::dynamic_bytes(Some(DataLocation::Calldata)),
        }
    }
}

#[derive(Clone, Copy)]
enum FieldSource {
    Special(Special),
    /// The whole calldata.
    Calldata,
    /// The first four bytes of the calldata.
    Selector,
}

struct MagicField {
    variable: MagicVariable,
    name: &'static str,
    ty: FieldType,
    source: FieldSource,
    since: MagicFamily,
    /// First family without the field.
    until: Option<MagicFamily>,
}

impl MagicField {
    fn exists_in(&self, family: MagicFamily) -> bool {
        family >= self.since && self.until.is_none_or(|until| family < until)
    }
}

const fn field(
    variable: MagicVariable,
    name: &'static str,
    ty: FieldType,
    source: FieldSource,
) -> MagicField {
    MagicField { variable, name, ty, source, since: MagicFamily::Legacy, until: None }
}

const fn since(mut field: MagicField, family: MagicFamily) -> MagicField {
    field.since = family;
    field
}

const fn until(mut field: MagicField, family: MagicFamily) -> MagicField {
    field.until = Some(family);
    field
}

use FieldSource as S;
use FieldType as T;
use MagicFamily as F;
use MagicVariable as V;

/// Every magic variable field, in display order.
const FIELDS: &[MagicField] = &[
    field(V::Msg, "data", T::Bytes, S::Calldata),
    field(V::Msg, "sig", T::Bytes4, S::Selector),
    until(field(V::Msg, "sender", T::AddressPayable, S::Special(Special::Sender)), F::Istanbul),
    since(field(V::Msg, "sender", T::Address, S::Special(Special::Sender)), F::Istanbul),
    field(V::Msg, "value", T::Uint256, S::Special(Special::Value)),
    until(field(V::Tx, "origin", T::AddressPayable, S::Special(Special::Origin)), F::Istanbul),
    since(field(V::Tx, "origin", T::Address, S::Special(Special::Origin)), F::Istanbul),
    field(V::Tx, "gasprice", T::Uint256, S::Special(Special::Gasprice)),
    field(V::Block, "coinbase", T::AddressPayable, S::Special(Special::Coinbase)),
    field(V::Block, "difficulty", T::Uint256, S::Special(Special::Difficulty)),
    field(V::Block, "gaslimit", T::Uint256, S::Special(Special::Gaslimit)),
    field(V::Block, "number", T::Uint256, S::Special(Special::Number)),
    field(V::Block, "timestamp", T::Uint256, S::Special(Special::Timestamp)),
    since(field(V::Block, "chainid", T::Uint256, S::Special(Special::Chainid)), F::Istanbul),
    since(field(V::Block, "basefee", T::Uint256, S::Special(Special::Basefee)), F::London),
    since(field(V::Block, "prevrandao", T::Uint256, S::Special(Special::Prevrandao)), F::Paris),
    since(field(V::Block, "blobbasefee", T::Uint256, S::Special(Special::Blobbasefee)), F::Cancun),
];

impl Engine<'_> {
    /// Decodes every field the magic variable has in the configured family.
    pub(crate) fn decode_magic(&self, ty: &Type, magic: &MagicType) -> DecodeResult {
        let family = self.options.family;
        let fields = FIELDS
            .iter()
            .filter(|field| field.variable == magic.variable && field.exists_in(family))
            .map(|field| {
                let field_ty = field.ty.to_type();
                let value = match field.source {
                    FieldSource::Special(special) => self.decode_special(&field_ty, special),
                    FieldSource::Calldata => {
                        self.bytes_value(&field_ty, self.reader.state.calldata.clone())
                    }
                    FieldSource::Selector => {
                        let range = BufferRange::new(0, 4);
                        let raw = self.reader.read_buffer(BufferKind::Calldata, range);
                        self.value(&field_ty, &raw, false)
                    }
                };
                Field::new(field.name, value)
            })
            .collect();
        DecodeResult::from_value(ty.clone(), Value::Magic(fields))
    }

    /// Decodes a value the execution engine supplies by name.
    pub(crate) fn decode_special(&self, ty: &Type, special: Special) -> DecodeResult {
        if let Type::Magic(magic) = ty {
            return self.decode_magic(ty, magic);
        }
        let raw = match self.reader.read_special(special) {
            Ok(raw) => raw,
            Err(error) => return self.error(ty, error.into()),
        };
        match ty {
            Type::String { .. } => self.bytes_value(ty, raw),
            Type::Bytes(bytes) if bytes.length.is_none() => self.bytes_value(ty, raw),
            ty if ty.is_reference() => self.error(ty, DecodingError::UnsupportedType),
            _ => self.value(ty, &raw, false),
        }
    }

    /// Decodes an indexed event argument.
    ///
    /// Indexed reference types are logged as the hash of their encoding, which can't be decoded.
    pub(crate) fn decode_topic(&self, ty: &Type, index: usize) -> DecodeResult {
        let topic = match self.reader.read_topic(index) {
            Ok(topic) => topic,
            Err(error) => return self.error(ty, error.into()),
        };
        if ty.is_reference() {
            return self.error(ty, DecodingError::IndexedReferenceType { raw: topic });
        }
        self.value(ty, topic.as_slice(), self.options.strict_padding)
    }
}
