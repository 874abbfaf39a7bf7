//! Utilities shared by the decoder test suites.

#![warn(unused_crate_dependencies, unreachable_pub)]

use alloy_primitives::{B256, U256, map::B256HashMap};
use foundry_decoder::{
    Slot, WordSource,
    types::{Member, StructType, Type},
};

/// Initializes tracing for tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Returns `value` as a big-endian word.
pub fn word(value: u64) -> B256 {
    B256::from(U256::from(value))
}

/// Concatenates words into a byte buffer.
pub fn encode(words: impl IntoIterator<Item = B256>) -> Vec<u8> {
    words.into_iter().flat_map(|word| word.0).collect()
}

/// Returns a struct type whose id and name are both `name`.
pub fn struct_type(name: &str, members: impl IntoIterator<Item = (&'static str, Type)>) -> Type {
    Type::Struct(StructType {
        id: name.to_string(),
        type_name: name.to_string(),
        member_types: members.into_iter().map(|(name, ty)| Member::new(name, ty)).collect(),
        location: None,
    })
}

/// A storage ledger that records every word requested from it.
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    words: B256HashMap<B256>,
    requests: Vec<B256>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `word` at `slot`.
    pub fn with(mut self, slot: &Slot, word: B256) -> Self {
        self.words.insert(slot.address(), word);
        self
    }

    /// Stores `word` at the raw storage address `address`.
    pub fn with_address(mut self, address: B256, word: B256) -> Self {
        self.words.insert(address, word);
        self
    }

    /// Returns the addresses requested so far, in order.
    pub fn requests(&self) -> &[B256] {
        &self.requests
    }
}

impl WordSource for Ledger {
    fn word(&mut self, slot: &B256) -> Option<B256> {
        self.requests.push(*slot);
        self.words.get(slot).copied()
    }
}
