//! Where a value's raw bytes live.

use crate::{error::ReadError, slot::Slot};
use alloy_primitives::{Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The size of an EVM word in bytes.
pub const WORD_SIZE: usize = 32;

/// A location descriptor.
///
/// Pointers are produced by the allocation tables or by the caller; the decoder only derives new
/// pointers from existing ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pointer {
    /// Stack words `from..=to`, counted from the bottom of the stack.
    Stack { from: usize, to: usize },
    Memory(BufferRange),
    Calldata(BufferRange),
    Returndata(BufferRange),
    Eventdata(BufferRange),
    Storage(StorageRange),
    /// Bytes supplied directly, read like stack words.
    Literal(Bytes),
    Special(Special),
    /// Index into the event topics.
    EventTopic(usize),
    /// A constant's definition.
    Definition(ConstantDefinition),
}

impl Pointer {
    /// Returns the buffer and range of a memory, calldata, returndata or eventdata pointer.
    pub fn buffer(&self) -> Option<(BufferKind, BufferRange)> {
        match *self {
            Self::Memory(range) => Some((BufferKind::Memory, range)),
            Self::Calldata(range) => Some((BufferKind::Calldata, range)),
            Self::Returndata(range) => Some((BufferKind::Returndata, range)),
            Self::Eventdata(range) => Some((BufferKind::Eventdata, range)),
            _ => None,
        }
    }

    /// Creates a pointer into the given buffer.
    pub fn in_buffer(kind: BufferKind, start: usize, length: usize) -> Self {
        let range = BufferRange { start, length };
        match kind {
            BufferKind::Memory => Self::Memory(range),
            BufferKind::Calldata => Self::Calldata(range),
            BufferKind::Returndata => Self::Returndata(range),
            BufferKind::Eventdata => Self::Eventdata(range),
        }
    }

    /// A storage pointer covering the whole word at `slot`.
    pub fn storage_word(slot: Slot) -> Self {
        Self::Storage(StorageRange::word(slot))
    }
}

/// The byte buffers of an execution context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Memory,
    Calldata,
    Returndata,
    Eventdata,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Calldata => "calldata",
            Self::Returndata => "returndata",
            Self::Eventdata => "eventdata",
        })
    }
}

/// `length` bytes starting at `start`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferRange {
    pub start: usize,
    pub length: usize,
}

impl BufferRange {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    /// A single word at `start`.
    pub fn word(start: usize) -> Self {
        Self { start, length: WORD_SIZE }
    }
}

/// A byte position inside a storage slot.
///
/// Words are big-endian, so index 31 is the least significant byte.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoragePosition {
    pub slot: Slot,
    #[serde(default)]
    pub index: u8,
}

impl StoragePosition {
    pub fn new(slot: Slot, index: u8) -> Self {
        Self { slot, index }
    }
}

/// How a storage range ends.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeEnd {
    /// Inclusive end position.
    To(StoragePosition),
    /// Number of bytes from the start position.
    Length(U256),
}

/// A run of bytes in storage, possibly spanning several slots.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageRange {
    pub from: StoragePosition,
    #[serde(flatten)]
    pub end: RangeEnd,
}

impl StorageRange {
    /// An inclusive range.
    pub fn new(from: StoragePosition, to: StoragePosition) -> Self {
        Self { from, end: RangeEnd::To(to) }
    }

    /// `length` bytes starting at `from`.
    pub fn with_length(from: StoragePosition, length: U256) -> Self {
        Self { from, end: RangeEnd::Length(length) }
    }

    /// The whole word at `slot`.
    pub fn word(slot: Slot) -> Self {
        let to = StoragePosition::new(slot.clone(), 31);
        Self::new(StoragePosition::new(slot, 0), to)
    }

    /// `words` whole words starting at `slot`.
    pub fn words(slot: Slot, words: U256) -> Self {
        let to = StoragePosition::new(slot.offset_by(words.saturating_sub(U256::from(1))), 31);
        Self::new(StoragePosition::new(slot, 0), to)
    }

    /// The last `bytes` bytes of the word at `slot`.
    pub fn tail(slot: Slot, bytes: u8) -> Self {
        let index = (WORD_SIZE as u8).saturating_sub(bytes.max(1));
        Self::new(StoragePosition::new(slot.clone(), index), StoragePosition::new(slot, 31))
    }

    /// Returns the inclusive end of the range, or `None` for an empty range.
    ///
    /// A length is normalized into the position of its last byte, sharing the start's base.
    pub fn to(&self) -> Result<Option<StoragePosition>, ReadError> {
        if self.from.index as usize >= WORD_SIZE {
            return Err(ReadError::MalformedRange(format!("index {} out of word", self.from.index)));
        }
        match &self.end {
            RangeEnd::To(to) => {
                if to.index as usize >= WORD_SIZE {
                    return Err(ReadError::MalformedRange(format!(
                        "index {} out of word",
                        to.index
                    )));
                }
                Ok(Some(to.clone()))
            }
            RangeEnd::Length(length) => {
                if length.is_zero() {
                    return Ok(None);
                }
                let last = length
                    .checked_add(U256::from(self.from.index))
                    .and_then(|end| end.checked_sub(U256::from(1)))
                    .ok_or_else(|| {
                        ReadError::MalformedRange(format!("length {length} overflows"))
                    })?;
                let word = U256::from(WORD_SIZE);
                let offset = self.from.slot.offset.checked_add(last / word).ok_or_else(|| {
                    ReadError::MalformedRange(format!("length {length} overflows the slot offset"))
                })?;
                let index = (last % word).to::<u8>();
                Ok(Some(StoragePosition::new(self.from.slot.with_offset(offset), index)))
            }
        }
    }

    /// Re-bases a range whose slots are plain offsets onto `base`.
    ///
    /// Allocation tables describe struct members relative to the struct's first slot.
    pub fn relative_to(&self, base: &Slot) -> Self {
        let rebase = |position: &StoragePosition| {
            StoragePosition::new(Slot::member(base.clone(), position.slot.offset), position.index)
        };
        let end = match &self.end {
            RangeEnd::To(to) => RangeEnd::To(rebase(to)),
            RangeEnd::Length(length) => RangeEnd::Length(*length),
        };
        Self { from: rebase(&self.from), end }
    }
}

/// Named per-context values supplied by the execution engine.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Special {
    // whole magic objects
    Msg,
    Tx,
    Block,
    // fields
    This,
    Sender,
    Value,
    Origin,
    Gasprice,
    Coinbase,
    Difficulty,
    Gaslimit,
    Number,
    Timestamp,
    Chainid,
    Basefee,
    Prevrandao,
    Blobbasefee,
}

/// The definition of a constant whose value is recovered statically.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantDefinition {
    pub name: String,
    pub value: ConstantValue,
}

/// A constant's initializer expression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstantValue {
    Literal(Literal),
    /// Any other expression; too complex to recover without evaluation.
    Expression { node_type: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Literal {
    pub kind: LiteralKind,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdenomination: Option<Subdenomination>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LiteralKind {
    Number,
    Bool,
    String,
    UnicodeString,
    HexString,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subdenomination {
    Wei,
    Gwei,
    Szabo,
    Finney,
    Ether,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Years,
}

impl Subdenomination {
    /// The factor a literal with this unit is multiplied by.
    pub fn factor(self) -> U256 {
        let ten = U256::from(10);
        match self {
            Self::Wei | Self::Seconds => U256::from(1),
            Self::Gwei => ten.pow(U256::from(9)),
            Self::Szabo => ten.pow(U256::from(12)),
            Self::Finney => ten.pow(U256::from(15)),
            Self::Ether => ten.pow(U256::from(18)),
            Self::Minutes => U256::from(60),
            Self::Hours => U256::from(3_600),
            Self::Days => U256::from(86_400),
            Self::Weeks => U256::from(604_800),
            Self::Years => U256::from(31_536_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_normalizes_into_end_position() {
        let range =
            StorageRange::with_length(StoragePosition::new(Slot::at(4), 30), U256::from(5));
        let to = range.to().unwrap().unwrap();
        assert_eq!(to.slot, Slot::at(5));
        assert_eq!(to.index, 2);

        let empty = StorageRange::with_length(StoragePosition::new(Slot::at(4), 0), U256::ZERO);
        assert_eq!(empty.to().unwrap(), None);
    }

    #[test]
    fn length_keeps_the_base() {
        let data = Slot::hashed(Slot::at(1));
        let range =
            StorageRange::with_length(StoragePosition::new(data.clone(), 0), U256::from(64));
        let to = range.to().unwrap().unwrap();
        assert!(to.slot.same_base(&data));
        assert_eq!(to.slot.offset, U256::from(1));
        assert_eq!(to.index, 31);
    }

    #[test]
    fn overflowing_length_is_malformed() {
        let range = StorageRange::with_length(StoragePosition::new(Slot::at(0), 1), U256::MAX);
        assert!(matches!(range.to(), Err(ReadError::MalformedRange(_))));
    }

    #[test]
    fn deserialize_pointers() {
        let pointer: Pointer =
            serde_json::from_str(r#"{"memory":{"start":64,"length":32}}"#).unwrap();
        assert_eq!(pointer, Pointer::Memory(BufferRange::word(64)));

        let pointer: Pointer = serde_json::from_str(
            r#"{"storage":{"from":{"slot":{"offset":"0x1"},"index":0},"length":"0x20"}}"#,
        )
        .unwrap();
        assert_eq!(
            pointer,
            Pointer::Storage(StorageRange::with_length(
                StoragePosition::new(Slot::at(1), 0),
                U256::from(32)
            ))
        );

        let pointer: Pointer = serde_json::from_str(r#"{"special":"sender"}"#).unwrap();
        assert_eq!(pointer, Pointer::Special(Special::Sender));
    }
}
