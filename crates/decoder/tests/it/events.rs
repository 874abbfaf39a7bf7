use alloy_primitives::{Address, B256, U256, keccak256};
use foundry_decoder::{
    Allocations, Decoder, EvmState, Value,
    allocation::{allocate_event, allocate_function},
    types::{Member, Type},
};
use foundry_decoder_test_utils::{encode, word};
use similar_asserts::assert_eq;

fn transfer_event() -> Vec<(Member, bool)> {
    vec![
        (Member::new("from", Type::Address { payable: false }), true),
        (Member::new("to", Type::Address { payable: false }), true),
        (Member::new("value", Type::UINT256), false),
    ]
}

#[test]
fn erc20_transfer_log() {
    let event = allocate_event("Transfer", &transfer_event(), false).unwrap();
    let topic0 = keccak256("Transfer(address,address,uint256)");
    assert_eq!(event.selector, Some(topic0));

    let from = Address::repeat_byte(0x01);
    let to = Address::repeat_byte(0x02);
    let state =
        EvmState::new().with_event([topic0, from.into_word(), to.into_word()], encode([word(50)]));
    let decoder = Decoder::new(Allocations::default().with_event(event));

    let decoded = decoder.decode_log(&state).unwrap().unwrap();
    assert_eq!(decoded.name, "Transfer");
    let values: Vec<_> =
        decoded.arguments.iter().map(|field| field.value.as_value().cloned()).collect();
    assert_eq!(
        values,
        vec![
            Some(Value::Address(from)),
            Some(Value::Address(to)),
            Some(Value::Uint(U256::from(50))),
        ]
    );
}

#[test]
fn unknown_topic_is_not_an_error() {
    let event = allocate_event("Transfer", &transfer_event(), false).unwrap();
    let decoder = Decoder::new(Allocations::default().with_event(event));
    let state = EvmState::new().with_event([B256::repeat_byte(9)], encode([word(1)]));
    assert_eq!(decoder.decode_log(&state).unwrap(), None);
}

#[test]
fn anonymous_event_starts_at_topic_zero() {
    let event = allocate_event("Ping", &transfer_event(), true).unwrap();
    assert_eq!(event.selector, None);

    let from = Address::repeat_byte(0x0a);
    let to = Address::repeat_byte(0x0b);
    let state = EvmState::new().with_event([from.into_word(), to.into_word()], encode([word(3)]));
    let decoded = Decoder::default().decode_event(&event, &state).unwrap();
    assert_eq!(decoded.get("from").and_then(|v| v.as_value()), Some(&Value::Address(from)));
    assert_eq!(decoded.get("to").and_then(|v| v.as_value()), Some(&Value::Address(to)));
    assert_eq!(decoded.get("value").and_then(|v| v.as_value()), Some(&Value::Uint(U256::from(3))));
}

#[test]
fn missing_topic_is_contained() {
    let event = allocate_event("Transfer", &transfer_event(), false).unwrap();
    let topic0 = event.selector.unwrap();
    let state = EvmState::new().with_event([topic0], encode([word(1)]));

    let decoded = Decoder::default().decode_event(&event, &state).unwrap();
    assert!(decoded.get("from").unwrap().is_error());
    assert_eq!(decoded.get("value").and_then(|v| v.as_value()), Some(&Value::Uint(U256::from(1))));
}

#[test]
fn function_with_dynamic_arguments() {
    let function = allocate_function(
        "setName",
        &[Member::new("id", Type::UINT256), Member::new("name", Type::string(None))],
    )
    .unwrap();
    let selector = function.selector;
    assert_eq!(selector.as_slice(), &keccak256("setName(uint256,string)")[..4]);

    let mut calldata = selector.to_vec();
    calldata.extend(encode([
        word(7),
        word(0x40),
        word(5),
        B256::right_padding_from(b"alice"),
    ]));
    let state = EvmState::new().with_calldata(calldata);
    let decoder = Decoder::new(Allocations::default().with_function(function));

    let decoded = decoder.decode_calldata(&state).unwrap().unwrap();
    assert_eq!(decoded.name, "setName");
    let rendered: Vec<_> = decoded.arguments.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, ["id: 7", "name: \"alice\""]);

    // too short for a selector
    let state = EvmState::new().with_calldata(vec![0xab]);
    assert_eq!(decoder.decode_calldata(&state).unwrap(), None);
}
