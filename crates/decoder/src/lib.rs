//! # foundry-decoder
//!
//! Type-directed decoding of EVM execution state.
//!
//! Given a [`Type`], a [`Pointer`] to where its bytes live and the [`EvmState`] of the moment,
//! the [`Decoder`] produces a [`DecodeResult`]: the value, or a contained error describing why
//! that particular value (and only that value) couldn't be decoded.
//!
//! Storage is usually only partially known. A decode that needs a word missing from the state
//! suspends with a [`Request`] and resumes once the caller supplied the word; see [`step`].

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

pub mod allocation;
pub use allocation::{Allocations, StructAllocation};

mod decode;
pub use decode::{DecodeOptions, DecodedArguments, Decoder, MagicFamily};

pub mod error;
pub use error::{DecoderError, ReadError};

mod fmt;

pub mod pointer;
pub use pointer::Pointer;

mod read;

pub mod slot;
pub use slot::{MappingKeys, Slot, SlotKey, slot_address};

pub mod state;
pub use state::EvmState;

pub mod step;
pub use step::{Request, Step, Suspendable, Suspended, Unavailable, WordSource};

pub mod types;
pub use types::Type;

pub mod value;
pub use value::{DecodeResult, DecodingError, Field, MappingEntry, Value};

pub use foundry_decoder_config::DecoderConfig;
