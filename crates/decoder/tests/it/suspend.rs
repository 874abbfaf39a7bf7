use alloy_primitives::{B256, U256, keccak256};
use foundry_decoder::{
    Allocations, Decoder, EvmState, Pointer, Request, Slot, Step, Value, WordSource,
    allocation::allocate_storage,
    pointer::StorageRange,
    types::Type,
};
use foundry_decoder_test_utils::{Ledger, init_tracing, struct_type, word};
use similar_asserts::assert_eq;

fn array_ledger() -> Ledger {
    let data = Slot::hashed(Slot::at(0));
    Ledger::new()
        .with(&Slot::at(0), word(3))
        .with(&data, word(100))
        .with(&data.offset_by(U256::from(1)), word(101))
        .with(&data.offset_by(U256::from(2)), word(102))
}

#[test]
fn dynamic_array_requests_in_order() {
    init_tracing();
    let ty = Type::array(Type::UINT256, None, None);
    let pointer = Pointer::Storage(StorageRange::word(Slot::at(0)));
    let state = EvmState::new();
    let decoder = Decoder::default();
    let mut ledger = array_ledger();

    let mut requests = Vec::new();
    let mut step = decoder.decode(&ty, &pointer, &state).start();
    let result = loop {
        match step {
            Step::Done(result) => break result.unwrap(),
            Step::NeedWord(suspended) => {
                let Request::Storage { slot } = *suspended.request();
                requests.push(slot);
                step = suspended.resume(ledger.word(&slot));
            }
        }
    };

    let data = keccak256(word(0));
    let next = |i: u64| B256::from(U256::from_be_bytes(data.0) + U256::from(i));
    assert_eq!(requests, vec![word(0), data, next(1), next(2)]);
    assert_eq!(result.to_string(), "[100, 101, 102]");
}

#[test]
fn decoding_is_deterministic() {
    let ty = Type::array(Type::UINT256, None, None);
    let pointer = Pointer::Storage(StorageRange::word(Slot::at(0)));
    let state = EvmState::new();
    let decoder = Decoder::default();

    let mut first = array_ledger();
    let mut second = array_ledger();
    let a = decoder.decode_with(&ty, &pointer, &state, &mut first).unwrap();
    let b = decoder.decode_with(&ty, &pointer, &state, &mut second).unwrap();
    assert_eq!(a, b);
    assert_eq!(first.requests(), second.requests());
}

#[test]
fn words_in_state_are_not_requested() {
    let ty = Type::array(Type::UINT256, None, None);
    let pointer = Pointer::Storage(StorageRange::word(Slot::at(0)));
    let state = EvmState::new().with_storage(word(0), word(0));

    let decoder = Decoder::default();
    let step = decoder.decode(&ty, &pointer, &state).start();
    let result = step.into_done().expect("nothing to request").unwrap();
    assert_eq!(result.as_value(), Some(&Value::Array(vec![])));
}

#[test]
fn a_slot_is_requested_once() {
    // both members share slot 0
    let half = Type::Uint { bits: 128 };
    let ty = struct_type("Pair", [("a", half.clone()), ("b", half)]);
    let allocations =
        Allocations { storage: allocate_storage([&ty]).unwrap(), ..Default::default() };
    let pointer = Pointer::Storage(StorageRange::word(Slot::at(0)));
    let mut ledger = Ledger::new();

    let result = Decoder::new(allocations)
        .decode_with(&ty, &pointer, &EvmState::new(), &mut ledger)
        .unwrap();
    assert_eq!(ledger.requests(), [word(0)]);
    assert_eq!(result.to_string(), "{ a: 0, b: 0 }");
}

#[test]
fn unavailable_words_read_as_zero() {
    let pointer = Pointer::Storage(StorageRange::word(Slot::at(9)));
    let state = EvmState::new();
    let decoder = Decoder::default();

    let Step::NeedWord(suspended) = decoder.decode(&Type::UINT256, &pointer, &state).start() else {
        panic!("expected a request");
    };
    assert_eq!(*suspended.request(), Request::Storage { slot: word(9) });
    let result = suspended.resume(None).into_done().unwrap().unwrap();
    assert_eq!(result.as_value(), Some(&Value::Uint(U256::ZERO)));
}

#[test]
fn raw_reads_suspend_too() {
    let pointer = Pointer::Storage(StorageRange::word(Slot::at(1)));
    let state = EvmState::new();
    let decoder = Decoder::default();

    let step = decoder.read(&pointer, &state).start();
    let Step::NeedWord(suspended) = step else { panic!("expected a request") };
    let raw = suspended.resume(Some(B256::repeat_byte(7))).into_done().unwrap().unwrap();
    assert_eq!(raw.as_ref(), B256::repeat_byte(7).as_slice());
}

#[test]
fn dropping_a_suspended_decode() {
    let pointer = Pointer::Storage(StorageRange::word(Slot::at(0)));
    let state = EvmState::new();
    let decoder = Decoder::default();
    let step = decoder.decode(&Type::UINT256, &pointer, &state).start();
    assert!(step.is_need_word());
    drop(step);

    // the decoder is unaffected and the next call starts from scratch
    let step = decoder.decode(&Type::UINT256, &pointer, &state).start();
    assert!(step.is_need_word());
}
