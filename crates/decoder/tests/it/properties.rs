use alloy_primitives::{B256, U256};
use foundry_decoder::{
    Decoder, EvmState, Pointer, Slot, Unavailable, Value,
    pointer::{BufferRange, StorageRange},
    types::Type,
};
use foundry_decoder_test_utils::Ledger;
use proptest::prelude::*;

fn any_word() -> impl Strategy<Value = B256> {
    any::<[u8; 32]>().prop_map(B256::from)
}

fn uint_bits() -> impl Strategy<Value = u16> {
    (1u16..=32).prop_map(|bytes| bytes * 8)
}

fn masked(value: U256, bits: u16) -> U256 {
    if bits == 256 { value } else { value & ((U256::from(1) << usize::from(bits)) - U256::from(1)) }
}

proptest! {
    #[test]
    fn decoding_is_deterministic(length in 0u64..8, words in prop::collection::vec(any_word(), 8)) {
        let ty = Type::array(Type::UINT256, None, None);
        let pointer = Pointer::storage_word(Slot::at(0));
        let data = Slot::hashed(Slot::at(0));
        let ledger = words.iter().enumerate().fold(
            Ledger::new().with(&Slot::at(0), B256::from(U256::from(length))),
            |ledger, (i, word)| ledger.with(&data.offset_by(U256::from(i)), *word),
        );
        let decoder = Decoder::default();
        let state = EvmState::new();

        let (mut first, mut second) = (ledger.clone(), ledger);
        let a = decoder.decode_with(&ty, &pointer, &state, &mut first).unwrap();
        let b = decoder.decode_with(&ty, &pointer, &state, &mut second).unwrap();
        prop_assert_eq!(a, b);
        prop_assert_eq!(first.requests(), second.requests());
        prop_assert_eq!(first.requests().len() as u64, 1 + length);
    }

    #[test]
    fn slot_addresses_are_pure(base in any_word(), offset in any::<u64>()) {
        let base = Slot::new(U256::from_be_bytes(base.0));
        let offset = U256::from(offset);
        let member = Slot::member(base.clone(), offset);
        prop_assert_eq!(member.address(), member.clone().address());
        prop_assert_eq!(
            U256::from_be_bytes(member.address().0),
            U256::from_be_bytes(base.address().0).wrapping_add(offset)
        );
        prop_assert_eq!(Slot::hashed(base.clone()).address(), Slot::hashed(base).address());
    }

    #[test]
    fn buffer_reads_are_zero_extended(
        buffer in prop::collection::vec(any::<u8>(), 0..96),
        start in 0usize..128,
        length in 0usize..64,
        calldata in any::<bool>(),
    ) {
        let (state, pointer) = if calldata {
            let state = EvmState::new().with_calldata(buffer.clone());
            (state, Pointer::Calldata(BufferRange::new(start, length)))
        } else {
            let state = EvmState::new().with_memory(buffer.clone());
            (state, Pointer::Memory(BufferRange::new(start, length)))
        };
        let decoder = Decoder::default();
        let raw = decoder.read(&pointer, &state).run(&mut Unavailable).unwrap();
        prop_assert_eq!(raw.len(), length);
        for (i, byte) in raw.iter().enumerate() {
            prop_assert_eq!(*byte, buffer.get(start + i).copied().unwrap_or_default());
        }
    }

    #[test]
    fn storage_uints_round_trip(
        bits in uint_bits(),
        value in prop_oneof![
            Just(U256::ZERO),
            Just(U256::from(1)),
            Just(U256::MAX),
            any_word().prop_map(|word| U256::from_be_bytes(word.0)),
        ],
    ) {
        let value = masked(value, bits);
        let state = EvmState::new().with_storage(B256::ZERO, B256::from(value));
        let pointer = Pointer::Storage(StorageRange::word(Slot::at(0)));
        let result = Decoder::default()
            .decode_with(&Type::Uint { bits }, &pointer, &state, &mut Unavailable)
            .unwrap();
        prop_assert_eq!(result.as_value(), Some(&Value::Uint(value)));
    }
}
