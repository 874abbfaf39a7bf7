//! Function call and event log decoding.

use super::{Decoder, Engine};
use crate::{
    allocation::{ArgumentAllocation, EventAllocation, FunctionAllocation},
    error::DecoderError,
    pointer::{BufferKind, Pointer},
    state::EvmState,
    value::{DecodeResult, Field},
};
use alloy_primitives::FixedBytes;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// The decoded arguments of a function call or an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedArguments {
    /// Function or event name.
    pub name: String,
    pub arguments: Vec<Field>,
}

impl DecodedArguments {
    /// Returns the argument named `name`.
    pub fn get(&self, name: &str) -> Option<&DecodeResult> {
        self.arguments.iter().find(|field| field.name == name).map(|field| &field.value)
    }
}

impl Decoder {
    /// Decodes the arguments of the function called with the state's calldata.
    ///
    /// Returns `None` if the calldata is shorter than a selector or the selector is unknown.
    pub fn decode_calldata(
        &self,
        state: &EvmState,
    ) -> Result<Option<DecodedArguments>, DecoderError> {
        let Some(selector) = state.calldata.get(..4) else { return Ok(None) };
        let selector = FixedBytes::<4>::from_slice(selector);
        let Some(function) = self.allocations.functions.get(&selector) else {
            debug!(%selector, "unknown function selector");
            return Ok(None);
        };
        self.decode_function(function, state).map(Some)
    }

    /// Decodes the arguments of `function` from the state's calldata.
    pub fn decode_function(
        &self,
        function: &FunctionAllocation,
        state: &EvmState,
    ) -> Result<DecodedArguments, DecoderError> {
        let engine = self.engine(state, Rc::default(), 4);
        let arguments = decode_arguments(&engine, &function.name, &function.arguments)?;
        Ok(DecodedArguments { name: function.name.clone(), arguments })
    }

    /// Decodes the arguments of `event` from the state's log topics and data.
    pub fn decode_event(
        &self,
        event: &EventAllocation,
        state: &EvmState,
    ) -> Result<DecodedArguments, DecoderError> {
        let engine = self.engine(state, Rc::default(), 0);
        let arguments = decode_arguments(&engine, &event.name, &event.arguments)?;
        Ok(DecodedArguments { name: event.name.clone(), arguments })
    }

    /// Decodes the state's log, looking its event up by topic 0.
    ///
    /// Returns `None` for logs without topics and unknown events.
    pub fn decode_log(&self, state: &EvmState) -> Result<Option<DecodedArguments>, DecoderError> {
        let Some(topic) = state.eventtopics.first() else { return Ok(None) };
        let Some(event) = self.allocations.events.get(topic) else {
            debug!(%topic, "unknown event");
            return Ok(None);
        };
        self.decode_event(event, state).map(Some)
    }
}

fn decode_arguments(
    engine: &Engine<'_>,
    name: &str,
    arguments: &[ArgumentAllocation],
) -> Result<Vec<Field>, DecoderError> {
    arguments
        .iter()
        .map(|argument| {
            let ty = &argument.definition.ty;
            let value = match &argument.pointer {
                Pointer::Calldata(range) => {
                    engine.decode_abi(ty, BufferKind::Calldata, range.start, engine.abi_base)?
                }
                Pointer::Eventdata(range) => {
                    engine.decode_abi(ty, BufferKind::Eventdata, range.start, 0)?
                }
                Pointer::EventTopic(index) => engine.decode_topic(ty, *index),
                pointer => {
                    return Err(DecoderError::allocation(
                        name,
                        format!(
                            "argument `{}` has a {pointer:?} pointer",
                            argument.definition.name
                        ),
                    ));
                }
            };
            Ok(Field::new(argument.definition.name.clone(), value))
        })
        .collect()
}
