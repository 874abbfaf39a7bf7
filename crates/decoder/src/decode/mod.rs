//! The type-directed decode engine.

use crate::{
    allocation::Allocations,
    error::DecoderError,
    pointer::{BufferKind, Pointer},
    read::{Reader, WordChannel},
    slot::MappingKeys,
    state::EvmState,
    step::{Suspendable, WordSource},
    types::Type,
    value::{DecodeResult, DecodingError, Value},
};
use alloy_primitives::{B256, Bytes, U256};
use foundry_decoder_config::DecoderConfig;
use futures::{FutureExt, future::LocalBoxFuture};
use std::{rc::Rc, sync::Arc};

/// Unwraps a read, turning a recoverable read error into an error result for `$ty` and
/// propagating a fatal one.
macro_rules! read_or_return {
    ($ty:expr, $read:expr) => {
        match $read {
            Ok(raw) => raw,
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                debug!(ty = %$ty, %err, "read failed");
                return Ok(DecodeResult::from_error(($ty).clone(), err.into()));
            }
        }
    };
}

mod abi;
mod arguments;
mod basic;
mod constant;
mod magic;
mod memory;
mod stack;
mod storage;

pub use arguments::DecodedArguments;
pub use magic::MagicFamily;

/// Options of a [`Decoder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Reject ABI and memory words that aren't cleanly padded and booleans other than 0 and 1.
    pub strict_padding: bool,
    /// Largest number of words a single storage read may span.
    pub max_storage_words: u64,
    /// Largest array, `bytes` or `string` length that is materialized.
    pub max_container_length: u64,
    /// Which magic variable fields exist.
    pub family: MagicFamily,
    /// What offsets in ABI encoded buffers are relative to: 4 when the buffer starts with a
    /// selector, 0 otherwise.
    pub abi_pointer_base: usize,
    /// Mapping keys to decode entries for.
    pub mapping_keys: MappingKeys,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::from(&DecoderConfig::default())
    }
}

impl From<&DecoderConfig> for DecodeOptions {
    fn from(config: &DecoderConfig) -> Self {
        Self {
            strict_padding: config.strict_padding,
            max_storage_words: config.max_storage_words,
            max_container_length: config.max_container_length,
            family: config.solc_version.as_ref().map(MagicFamily::from_version).unwrap_or_default(),
            abi_pointer_base: 0,
            mapping_keys: MappingKeys::default(),
        }
    }
}

/// Decodes values out of execution state.
///
/// A decoder holds the allocation tables of one compilation and can be shared by any number of
/// decodes. Every decode call is independent of the others.
#[derive(Clone, Debug, Default)]
pub struct Decoder {
    allocations: Arc<Allocations>,
    options: DecodeOptions,
}

impl Decoder {
    pub fn new(allocations: impl Into<Arc<Allocations>>) -> Self {
        Self::with_options(allocations, DecodeOptions::default())
    }

    pub fn with_options(allocations: impl Into<Arc<Allocations>>, options: DecodeOptions) -> Self {
        Self { allocations: allocations.into(), options }
    }

    /// Creates a decoder configured by `config`.
    pub fn from_config(allocations: impl Into<Arc<Allocations>>, config: &DecoderConfig) -> Self {
        Self::with_options(allocations, config.into())
    }

    pub fn allocations(&self) -> &Allocations {
        &self.allocations
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut DecodeOptions {
        &mut self.options
    }

    /// Decodes the value of type `ty` at `pointer`.
    ///
    /// The decode suspends whenever it needs a storage word missing from `state`. A type this
    /// decoder doesn't know is an error of the whole call; anywhere below the top it is an error
    /// result.
    pub fn decode<'a>(
        &'a self,
        ty: &'a Type,
        pointer: &'a Pointer,
        state: &'a EvmState,
    ) -> Suspendable<'a, DecodeResult> {
        let channel = Rc::new(WordChannel::default());
        let engine = self.engine(state, channel.clone(), self.options.abi_pointer_base);
        let future = async move {
            if let Type::Unsupported = ty {
                return Err(DecoderError::UnsupportedType(ty.clone()));
            }
            engine.decode(ty, pointer).await
        };
        Suspendable::new(channel, future.boxed_local())
    }

    /// Decodes the value of type `ty` at `pointer`, answering storage requests from `source`.
    pub fn decode_with(
        &self,
        ty: &Type,
        pointer: &Pointer,
        state: &EvmState,
        source: &mut impl WordSource,
    ) -> Result<DecodeResult, DecoderError> {
        self.decode(ty, pointer, state).run(source)
    }

    /// Reads the raw bytes at `pointer`.
    pub fn read<'a>(&'a self, pointer: &'a Pointer, state: &'a EvmState) -> Suspendable<'a, Bytes> {
        let channel = Rc::new(WordChannel::default());
        let reader = Reader::new(state, channel.clone(), self.options.max_storage_words);
        let future = async move { Ok(reader.read(pointer).await?) };
        Suspendable::new(channel, future.boxed_local())
    }

    fn engine<'a>(
        &'a self,
        state: &'a EvmState,
        channel: Rc<WordChannel>,
        abi_base: usize,
    ) -> Engine<'a> {
        Engine {
            allocations: &self.allocations,
            options: &self.options,
            reader: Reader::new(state, channel, self.options.max_storage_words),
            abi_base,
        }
    }
}

/// The state of one decode call.
pub(crate) struct Engine<'a> {
    allocations: &'a Allocations,
    options: &'a DecodeOptions,
    reader: Reader<'a>,
    /// What top-level ABI offsets are relative to.
    abi_base: usize,
}

impl Engine<'_> {
    /// Decodes the value of type `ty` at `pointer`.
    ///
    /// Every path produces exactly one result; only fatal read errors and malformed allocations
    /// fail the call.
    pub(crate) fn decode<'b>(
        &'b self,
        ty: &'b Type,
        pointer: &'b Pointer,
    ) -> LocalBoxFuture<'b, Result<DecodeResult, DecoderError>> {
        async move {
            trace!(%ty, ?pointer, "decode");
            match (ty, pointer) {
                (Type::Unsupported, _) => Ok(self.error(ty, DecodingError::UnsupportedType)),
                (Type::Type(of), _) => {
                    Ok(DecodeResult::from_value(ty.clone(), Value::Type((*of.of).clone())))
                }
                (Type::Magic(magic), _) => Ok(self.decode_magic(ty, magic)),
                (_, Pointer::Storage(range)) => self.decode_storage(ty, range).await,
                (_, Pointer::Stack { from, to }) => self.decode_stack(ty, *from, *to).await,
                (_, Pointer::Memory(range)) => self.decode_memory(ty, range.start),
                (_, Pointer::Calldata(range)) => {
                    self.decode_abi(ty, BufferKind::Calldata, range.start, self.abi_base)
                }
                (_, Pointer::Returndata(range)) => {
                    self.decode_abi(ty, BufferKind::Returndata, range.start, 0)
                }
                (_, Pointer::Eventdata(range)) => {
                    self.decode_abi(ty, BufferKind::Eventdata, range.start, 0)
                }
                (_, Pointer::Literal(raw)) => Ok(self.decode_literal(ty, raw)),
                (_, Pointer::Special(special)) => Ok(self.decode_special(ty, *special)),
                (_, Pointer::EventTopic(index)) => Ok(self.decode_topic(ty, *index)),
                (_, Pointer::Definition(definition)) => Ok(self.decode_constant(ty, definition)),
            }
        }
        .boxed_local()
    }

    /// Builds an error result, logging it.
    pub(crate) fn error(&self, ty: &Type, error: DecodingError) -> DecodeResult {
        debug!(%ty, %error, "decoding error");
        DecodeResult::from_error(ty.clone(), error)
    }

    /// Builds a result out of a conversion.
    pub(crate) fn finish(&self, ty: &Type, value: Result<Value, DecodingError>) -> DecodeResult {
        match value {
            Ok(value) => DecodeResult::from_value(ty.clone(), value),
            Err(error) => self.error(ty, error),
        }
    }
}

/// Interprets a word as an offset into a byte buffer.
///
/// Offsets beyond `u32::MAX` can't point into any real buffer.
pub(crate) fn to_offset(word: &B256) -> Result<usize, DecodingError> {
    let offset = U256::from_be_bytes(word.0);
    if offset > U256::from(u32::MAX) {
        return Err(DecodingError::PointerTooLarge { raw: Bytes::copy_from_slice(word.as_slice()) });
    }
    Ok(offset.to::<usize>())
}
