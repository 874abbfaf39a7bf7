use crate::pointer::{BufferKind, Special};
use alloy_primitives::{B256, Bytes, map::B256HashMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A snapshot of the execution state values are decoded from.
///
/// Storage is partial: a missing word is fetched from the caller through a suspension, never
/// treated as an error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvmState {
    /// Stack words, bottom first.
    pub stack: Vec<B256>,
    pub storage: B256HashMap<B256>,
    pub memory: Bytes,
    pub calldata: Bytes,
    pub returndata: Bytes,
    pub eventdata: Bytes,
    pub eventtopics: Vec<B256>,
    pub specials: BTreeMap<Special, Bytes>,
}

impl EvmState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack(mut self, stack: impl IntoIterator<Item = B256>) -> Self {
        self.stack = stack.into_iter().collect();
        self
    }

    pub fn with_storage(mut self, slot: B256, word: B256) -> Self {
        self.storage.insert(slot, word);
        self
    }

    pub fn with_memory(mut self, memory: impl Into<Bytes>) -> Self {
        self.memory = memory.into();
        self
    }

    pub fn with_calldata(mut self, calldata: impl Into<Bytes>) -> Self {
        self.calldata = calldata.into();
        self
    }

    pub fn with_returndata(mut self, returndata: impl Into<Bytes>) -> Self {
        self.returndata = returndata.into();
        self
    }

    /// Sets the log's data and topics.
    pub fn with_event(
        mut self,
        topics: impl IntoIterator<Item = B256>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.eventtopics = topics.into_iter().collect();
        self.eventdata = data.into();
        self
    }

    pub fn with_special(mut self, special: Special, value: impl Into<Bytes>) -> Self {
        self.specials.insert(special, value.into());
        self
    }

    /// Returns the byte buffer of the given kind.
    pub fn buffer(&self, kind: BufferKind) -> &Bytes {
        match kind {
            BufferKind::Memory => &self.memory,
            BufferKind::Calldata => &self.calldata,
            BufferKind::Returndata => &self.returndata,
            BufferKind::Eventdata => &self.eventdata,
        }
    }
}
