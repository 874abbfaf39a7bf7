//! The read layer: raw bytes for a pointer.
//!
//! Every read except storage is answered from the state right away. A storage word missing from
//! the state suspends the read until the caller supplies it, see [`crate::step`].

use crate::{
    error::ReadError,
    pointer::{
        BufferKind, BufferRange, ConstantDefinition, ConstantValue, LiteralKind, Pointer, Special,
        StorageRange, Subdenomination, WORD_SIZE,
    },
    state::EvmState,
};
use alloy_primitives::{B256, Bytes, U256, hex, map::B256HashMap};
use std::{
    cell::{Cell, RefCell},
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

/// Words supplied by the caller and the word a suspended decode is waiting for.
#[derive(Debug, Default)]
pub(crate) struct WordChannel {
    supplied: RefCell<B256HashMap<B256>>,
    pending: Cell<Option<B256>>,
}

impl WordChannel {
    pub(crate) fn supply(&self, slot: B256, word: B256) {
        self.supplied.borrow_mut().insert(slot, word);
    }

    pub(crate) fn take_request(&self) -> Option<B256> {
        self.pending.take()
    }
}

/// Resolves once the word at `slot` is in the state or has been supplied.
struct StorageWord<'a> {
    storage: &'a B256HashMap<B256>,
    channel: &'a WordChannel,
    slot: B256,
}

impl Future for StorageWord<'_> {
    type Output = B256;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(word) = self.storage.get(&self.slot) {
            return Poll::Ready(*word);
        }
        if let Some(word) = self.channel.supplied.borrow().get(&self.slot) {
            return Poll::Ready(*word);
        }
        self.channel.pending.set(Some(self.slot));
        Poll::Pending
    }
}

/// Reads raw bytes out of one state.
#[derive(Clone, Debug)]
pub(crate) struct Reader<'a> {
    pub(crate) state: &'a EvmState,
    channel: Rc<WordChannel>,
    max_storage_words: u64,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(
        state: &'a EvmState,
        channel: Rc<WordChannel>,
        max_storage_words: u64,
    ) -> Self {
        Self { state, channel, max_storage_words }
    }

    pub(crate) async fn read(&self, pointer: &Pointer) -> Result<Bytes, ReadError> {
        match pointer {
            Pointer::Storage(range) => self.read_storage(range).await,
            Pointer::Stack { from, to } => self.read_stack(*from, *to),
            Pointer::Memory(range) => Ok(self.read_buffer(BufferKind::Memory, *range)),
            Pointer::Calldata(range) => Ok(self.read_buffer(BufferKind::Calldata, *range)),
            Pointer::Returndata(range) => Ok(self.read_buffer(BufferKind::Returndata, *range)),
            Pointer::Eventdata(range) => Ok(self.read_buffer(BufferKind::Eventdata, *range)),
            Pointer::Literal(bytes) => Ok(bytes.clone()),
            Pointer::Special(special) => self.read_special(*special),
            Pointer::EventTopic(index) => self.read_topic(*index).map(|topic| topic.into()),
            Pointer::Definition(definition) => read_definition(definition),
        }
    }

    /// Reads the bytes of a storage range, suspending for every missing word.
    pub(crate) async fn read_storage(&self, range: &StorageRange) -> Result<Bytes, ReadError> {
        let Some(to) = range.to()? else { return Ok(Bytes::new()) };
        let from = &range.from;
        if !from.slot.same_base(&to.slot) {
            return Err(ReadError::MalformedRange(format!(
                "range ends relative to a different slot than it starts: {:?} to {:?}",
                from.slot, to.slot
            )));
        }
        if (to.slot.offset, to.index) < (from.slot.offset, from.index) {
            return Err(ReadError::MalformedRange("range ends before it starts".to_string()));
        }

        let words = (to.slot.offset - from.slot.offset).checked_add(U256::from(1));
        let words = match words {
            Some(words) if words <= U256::from(self.max_storage_words) => words.to::<u64>(),
            words => {
                return Err(ReadError::TooManyWords {
                    words: words.unwrap_or(U256::MAX),
                    limit: self.max_storage_words,
                });
            }
        };

        let mut data = Vec::with_capacity(words as usize * WORD_SIZE);
        for i in 0..words {
            let slot = from.slot.offset_by(U256::from(i)).address();
            trace!(%slot, "read storage word");
            data.extend_from_slice(self.storage_word(slot).await.as_slice());
        }

        let end = (words as usize - 1) * WORD_SIZE + to.index as usize + 1;
        Ok(Bytes::copy_from_slice(&data[from.index as usize..end]))
    }

    async fn storage_word(&self, slot: B256) -> B256 {
        StorageWord { storage: &self.state.storage, channel: &self.channel, slot }.await
    }

    /// Reads a byte range, zero-extending past the end of the buffer.
    pub(crate) fn read_buffer(&self, kind: BufferKind, range: BufferRange) -> Bytes {
        let buffer = self.state.buffer(kind);
        let mut data = vec![0u8; range.length];
        if let Some(available) = buffer.get(range.start..) {
            let n = available.len().min(range.length);
            data[..n].copy_from_slice(&available[..n]);
        }
        trace!(%kind, start = range.start, length = range.length, "read buffer");
        data.into()
    }

    /// Reads a single word of a buffer.
    pub(crate) fn read_buffer_word(&self, kind: BufferKind, start: usize) -> B256 {
        B256::from_slice(&self.read_buffer(kind, BufferRange::word(start)))
    }

    /// Concatenates the stack words `from..=to`.
    pub(crate) fn read_stack(&self, from: usize, to: usize) -> Result<Bytes, ReadError> {
        let len = self.state.stack.len();
        if from > to || to >= len {
            return Err(ReadError::StackOutOfRange { from, to, len });
        }
        Ok(self.state.stack[from..=to].iter().flat_map(|word| word.0).collect())
    }

    pub(crate) fn read_topic(&self, index: usize) -> Result<B256, ReadError> {
        let len = self.state.eventtopics.len();
        self.state.eventtopics.get(index).copied().ok_or(ReadError::TopicOutOfRange { index, len })
    }

    pub(crate) fn read_special(&self, special: Special) -> Result<Bytes, ReadError> {
        self.state.specials.get(&special).cloned().ok_or(ReadError::MissingSpecial(special))
    }
}

/// Recovers the bytes of a constant from its definition.
///
/// Numbers and booleans become a big-endian word; string and hex literals their raw bytes.
pub(crate) fn read_definition(definition: &ConstantDefinition) -> Result<Bytes, ReadError> {
    let unsupported = |reason: String| ReadError::UnsupportedConstant {
        name: definition.name.clone(),
        reason,
    };
    let literal = match &definition.value {
        ConstantValue::Literal(literal) => literal,
        ConstantValue::Expression { node_type } => {
            return Err(unsupported(format!("`{node_type}` expressions are not evaluated")));
        }
    };
    match literal.kind {
        LiteralKind::Number => parse_number(&literal.value, literal.subdenomination)
            .map(|number| Bytes::from(number.to_be_bytes::<32>()))
            .ok_or_else(|| unsupported(format!("`{}` is not an integer literal", literal.value))),
        LiteralKind::Bool => match literal.value.as_str() {
            "true" => Ok(B256::with_last_byte(1).into()),
            "false" => Ok(B256::ZERO.into()),
            value => Err(unsupported(format!("`{value}` is not a boolean"))),
        },
        LiteralKind::String | LiteralKind::UnicodeString => {
            Ok(Bytes::copy_from_slice(literal.value.as_bytes()))
        }
        LiteralKind::HexString => hex::decode(&literal.value)
            .map(Into::into)
            .map_err(|err| unsupported(format!("invalid hex literal: {err}"))),
    }
}

/// Parses a number literal: decimal, hex or scientific, with `_` separators and an optional
/// unit. Returns `None` unless the result is an integer that fits a word.
pub(crate) fn parse_number(literal: &str, unit: Option<Subdenomination>) -> Option<U256> {
    let literal: String = literal.chars().filter(|c| *c != '_').collect();
    let factor = unit.map_or(U256::from(1), Subdenomination::factor);
    if let Some(digits) = literal.strip_prefix("0x") {
        return U256::from_str_radix(digits, 16).ok()?.checked_mul(factor);
    }

    let (mantissa, exponent) = match literal.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i64>().ok()?),
        None => (literal.as_str(), 0),
    };
    let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{integer}{fraction}");
    if digits.is_empty() {
        return None;
    }

    let value = U256::from_str_radix(&digits, 10).ok()?.checked_mul(factor)?;
    let scale = exponent.checked_sub(i64::try_from(fraction.len()).ok()?)?;
    let ten = U256::from(10);
    if scale >= 0 {
        value.checked_mul(ten.checked_pow(U256::from(scale.unsigned_abs()))?)
    } else {
        let divisor = ten.checked_pow(U256::from(scale.unsigned_abs()))?;
        (value % divisor).is_zero().then(|| value / divisor)
    }
}
