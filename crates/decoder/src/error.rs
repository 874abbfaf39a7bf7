use crate::{pointer::Special, types::Type};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// A failure of the read layer.
///
/// Range failures abort the whole decode; the others only concern the value being read.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadError {
    #[error("malformed storage range: {0}")]
    MalformedRange(String),
    #[error("storage range spans {words} words, more than the limit of {limit}")]
    TooManyWords { words: U256, limit: u64 },
    #[error("stack words {from}..={to} are out of range for a stack of {len}")]
    StackOutOfRange { from: usize, to: usize, len: usize },
    #[error("event topic {index} is out of range for {len} topics")]
    TopicOutOfRange { index: usize, len: usize },
    #[error("special value `{0}` is not available")]
    MissingSpecial(Special),
    #[error("constant `{name}` can't be recovered statically: {reason}")]
    UnsupportedConstant { name: String, reason: String },
}

impl ReadError {
    /// Returns `true` if the error aborts the whole decode call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MalformedRange(_) | Self::TooManyWords { .. })
    }
}

/// A failure of a whole decode call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecoderError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("unsupported type `{0}`")]
    UnsupportedType(Type),
    #[error("malformed allocation for `{id}`: {reason}")]
    Allocation { id: String, reason: String },
    #[error("decode protocol violation: {0}")]
    Internal(String),
}

impl DecoderError {
    pub(crate) fn allocation(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Allocation { id: id.into(), reason: reason.into() }
    }
}
