use alloy_primitives::{Address, B256, U256, keccak256};
use foundry_decoder::{
    Allocations, DecodeOptions, DecodeResult, Decoder, DecoderError, DecodingError, EvmState,
    MappingKeys, Pointer, ReadError, Slot, SlotKey, Unavailable, Value,
    allocation::allocate_storage,
    pointer::{BufferRange, StoragePosition, StorageRange},
    types::{EnumType, Type},
};
use foundry_decoder_test_utils::{init_tracing, struct_type, word};
use similar_asserts::assert_eq;

fn at(slot: u64) -> Pointer {
    Pointer::Storage(StorageRange::word(Slot::at(slot)))
}

fn plus(address: B256, offset: u64) -> B256 {
    B256::from(U256::from_be_bytes(address.0) + U256::from(offset))
}

fn decode(decoder: &Decoder, ty: &Type, pointer: &Pointer, state: &EvmState) -> DecodeResult {
    decoder.decode_with(ty, pointer, state, &mut Unavailable).unwrap()
}

fn fields(result: &DecodeResult) -> Vec<(String, DecodeResult)> {
    match result.as_value() {
        Some(Value::Struct(fields)) => {
            fields.iter().map(|f| (f.name.clone(), f.value.clone())).collect()
        }
        _ => panic!("not a struct: {result:?}"),
    }
}

#[test]
fn packed_struct() {
    init_tracing();
    let ty = struct_type(
        "S",
        [
            ("a", Type::Uint { bits: 128 }),
            ("b", Type::Uint { bits: 128 }),
            ("c", Type::Bool),
            ("d", Type::Address { payable: false }),
            ("e", Type::UINT256),
        ],
    );
    let allocations =
        Allocations { storage: allocate_storage([&ty]).unwrap(), ..Default::default() };

    let mut first = [0u8; 32];
    first[15] = 2;
    first[31] = 1;
    let mut second = [0u8; 32];
    second[11..31].copy_from_slice(Address::repeat_byte(0x11).as_slice());
    second[31] = 1;
    let state = EvmState::new()
        .with_storage(word(3), first.into())
        .with_storage(word(4), second.into())
        .with_storage(word(5), word(99));

    let result = decode(&Decoder::new(allocations), &ty, &at(3), &state);
    let values: Vec<_> =
        fields(&result).into_iter().map(|(name, value)| (name, value.into_value())).collect();
    assert_eq!(
        values,
        vec![
            ("a".to_string(), Some(Value::Uint(U256::from(1)))),
            ("b".to_string(), Some(Value::Uint(U256::from(2)))),
            ("c".to_string(), Some(Value::Bool(true))),
            ("d".to_string(), Some(Value::Address(Address::repeat_byte(0x11)))),
            ("e".to_string(), Some(Value::Uint(U256::from(99)))),
        ]
    );
    let expected = format!("{{ a: 1, b: 2, c: true, d: {}, e: 99 }}", Address::repeat_byte(0x11));
    assert_eq!(result.to_string(), expected);
}

#[test]
fn member_failure_is_contained() {
    let kind = Type::Enum(EnumType {
        id: "E".into(),
        type_name: "E".into(),
        options: vec!["A".into(), "B".into()],
    });
    let ty = struct_type("P", [("kind", kind), ("amount", Type::UINT256)]);
    let allocations =
        Allocations { storage: allocate_storage([&ty]).unwrap(), ..Default::default() };
    let state = EvmState::new().with_storage(word(0), word(7)).with_storage(word(1), word(5));

    let result = decode(&Decoder::new(allocations), &ty, &at(0), &state);
    assert!(result.is_value());
    let fields = fields(&result);
    assert_eq!(
        fields[0].1.as_error(),
        Some(&DecodingError::EnumOutOfRange { raw: U256::from(7), options: 2 })
    );
    assert_eq!(fields[1].1.as_value(), Some(&Value::Uint(U256::from(5))));
}

#[test]
fn omitted_member_allocation() {
    let ty = struct_type(
        "T",
        [("first", Type::UINT256), ("second", Type::UINT256), ("third", Type::UINT256)],
    );
    let mut storage = allocate_storage([&ty]).unwrap();
    storage.get_mut("T").unwrap().members.retain(|member| member.definition.name != "second");
    let decoder = Decoder::new(Allocations { storage, ..Default::default() });
    let state = EvmState::new()
        .with_storage(word(0), word(1))
        .with_storage(word(1), word(2))
        .with_storage(word(2), word(3));

    let result = decode(&decoder, &ty, &at(0), &state);
    let fields = fields(&result);
    assert_eq!(fields[0].1.as_value(), Some(&Value::Uint(U256::from(1))));
    assert_eq!(
        fields[1].1.as_error(),
        Some(&DecodingError::AllocationMissing { id: "T".into(), member: Some("second".into()) })
    );
    assert_eq!(fields[2].1.as_value(), Some(&Value::Uint(U256::from(3))));
}

#[test]
fn missing_struct_allocation() {
    let ty = struct_type("Unknown", [("x", Type::UINT256)]);
    let result = decode(&Decoder::default(), &ty, &at(0), &EvmState::new());
    assert_eq!(
        result.as_error(),
        Some(&DecodingError::AllocationMissing { id: "Unknown".into(), member: None })
    );
}

#[test]
fn mapping_entry_slot() {
    let ty = Type::mapping(Type::UINT256, Type::UINT256);
    let entry = keccak256([word(7).0, word(5).0].concat());
    assert_eq!(Slot::mapping_entry(Slot::at(5), SlotKey::Word(word(7))).address(), entry);

    let state = EvmState::new().with_storage(entry, word(42));
    let options = DecodeOptions {
        mapping_keys: MappingKeys::default().with(&Slot::at(5), Value::Uint(U256::from(7))),
        ..Default::default()
    };
    let decoder = Decoder::with_options(Allocations::default(), options);

    let result = decode(&decoder, &ty, &at(5), &state);
    let Some(Value::Mapping(entries)) = result.as_value() else { panic!("{result:?}") };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, Value::Uint(U256::from(7)));
    assert_eq!(entries[0].value.as_value(), Some(&Value::Uint(U256::from(42))));

    // without known keys a mapping is empty, not an error
    let result = decode(&Decoder::default(), &ty, &at(5), &state);
    assert_eq!(result.as_value(), Some(&Value::Mapping(vec![])));
}

#[test]
fn mapping_with_string_keys() {
    let ty = Type::mapping(Type::string(None), Type::Bool);
    let entry = keccak256([b"abc".as_slice(), word(1).as_slice()].concat());
    let state = EvmState::new().with_storage(entry, word(1));
    let options = DecodeOptions {
        mapping_keys: MappingKeys::default()
            .with(&Slot::at(1), Value::String("abc".into()))
            .with(&Slot::at(1), Value::Uint(U256::from(1))),
        ..Default::default()
    };
    let decoder = Decoder::with_options(Allocations::default(), options);

    let result = decode(&decoder, &ty, &at(1), &state);
    let Some(Value::Mapping(entries)) = result.as_value() else { panic!("{result:?}") };
    assert_eq!(entries[0].value.as_value(), Some(&Value::Bool(true)));
    assert!(matches!(entries[1].value.as_error(), Some(DecodingError::InvalidMappingKey { .. })));
}

#[test]
fn out_of_range_keys_are_not_hashed() {
    let ty = Type::mapping(Type::Uint { bits: 8 }, Type::UINT256);
    let entry = keccak256([word(200).0, word(2).0].concat());
    let state = EvmState::new().with_storage(entry, word(9));
    let options = DecodeOptions {
        mapping_keys: MappingKeys::default()
            .with(&Slot::at(2), Value::Uint(U256::from(200)))
            .with(&Slot::at(2), Value::Uint(U256::from(300))),
        ..Default::default()
    };
    let decoder = Decoder::with_options(Allocations::default(), options);

    let result = decode(&decoder, &ty, &at(2), &state);
    let Some(Value::Mapping(entries)) = result.as_value() else { panic!("{result:?}") };
    assert_eq!(entries[0].value.as_value(), Some(&Value::Uint(U256::from(9))));
    assert_eq!(
        entries[1].value.as_error(),
        Some(&DecodingError::InvalidMappingKey { key: Value::Uint(U256::from(300)).to_string() })
    );
}

#[test]
fn elements_wider_than_a_word() {
    let ty = Type::array(Type::Uint { bits: 264 }, None, None);
    let state = EvmState::new().with_storage(word(0), word(1));
    let result = decode(&Decoder::default(), &ty, &at(0), &state);
    assert_eq!(result.as_error(), Some(&DecodingError::UnsupportedType));

    let ty = Type::array(Type::fixed_bytes(33), Some(3), None);
    let result = decode(&Decoder::default(), &ty, &at(0), &state);
    assert_eq!(result.as_error(), Some(&DecodingError::UnsupportedType));

    let result = decode(&Decoder::default(), &Type::Uint { bits: 264 }, &at(0), &state);
    assert_eq!(result.as_error(), Some(&DecodingError::UnsupportedType));
}

#[test]
fn short_and_long_strings() {
    let mut short = B256::right_padding_from(b"hello");
    short[31] = 10;
    let state = EvmState::new().with_storage(word(0), short);
    let result = decode(&Decoder::default(), &Type::string(None), &at(0), &state);
    assert_eq!(result.as_value(), Some(&Value::String("hello".into())));

    let text = "a".repeat(40);
    let data = keccak256(word(0));
    let state = EvmState::new()
        .with_storage(word(0), word(81))
        .with_storage(data, B256::from_slice(&text.as_bytes()[..32]))
        .with_storage(plus(data, 1), B256::right_padding_from(&text.as_bytes()[32..]));
    let result = decode(&Decoder::default(), &Type::string(None), &at(0), &state);
    assert_eq!(result.as_value(), Some(&Value::String(text)));
}

#[test]
fn malformed_short_length() {
    let state = EvmState::new().with_storage(word(0), B256::with_last_byte(0x40));
    let result = decode(&Decoder::default(), &Type::dynamic_bytes(None), &at(0), &state);
    assert!(matches!(result.as_error(), Some(DecodingError::MalformedLength { .. })));
}

#[test]
fn packed_dynamic_array() {
    let ty = Type::array(Type::Uint { bits: 64 }, None, None);
    let data = keccak256(word(2));
    let mut first = [0u8; 32];
    for (i, value) in [10u8, 11, 12, 13].into_iter().enumerate() {
        first[31 - i * 8] = value;
    }
    let state = EvmState::new()
        .with_storage(word(2), word(5))
        .with_storage(data, first.into())
        .with_storage(plus(data, 1), word(14));

    let result = decode(&Decoder::default(), &ty, &at(2), &state);
    assert_eq!(result.to_string(), "[10, 11, 12, 13, 14]");
}

#[test]
fn overlong_array_is_contained() {
    let ty = Type::array(Type::UINT256, None, None);
    let state = EvmState::new().with_storage(word(0), B256::repeat_byte(0xff));
    let result = decode(&Decoder::default(), &ty, &at(0), &state);
    assert!(matches!(result.as_error(), Some(DecodingError::OverlongContainer { .. })));
}

#[test]
fn too_many_words_fails_the_decode() {
    let range =
        StorageRange::with_length(StoragePosition::new(Slot::at(0), 0), U256::from(10_000_000u64));
    let err = Decoder::default()
        .decode_with(&Type::UINT256, &Pointer::Storage(range), &EvmState::new(), &mut Unavailable)
        .unwrap_err();
    assert!(matches!(err, DecoderError::Read(ReadError::TooManyWords { .. })));
}

#[test]
fn unsupported_types() {
    let err = Decoder::default()
        .decode_with(&Type::Unsupported, &at(0), &EvmState::new(), &mut Unavailable)
        .unwrap_err();
    assert_eq!(err, DecoderError::UnsupportedType(Type::Unsupported));

    // below the top an unknown type only fails its own value
    let nested = Type::array(Type::Unsupported, Some(2), None);
    let pointer = Pointer::Memory(BufferRange::word(0));
    let result = decode(&Decoder::default(), &nested, &pointer, &EvmState::new());
    let Some(Value::Array(elements)) = result.as_value() else { panic!("{result:?}") };
    assert_eq!(elements.len(), 2);
    assert_eq!(elements[1].as_error(), Some(&DecodingError::UnsupportedType));
}
