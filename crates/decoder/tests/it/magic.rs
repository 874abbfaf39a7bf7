use alloy_primitives::{Address, B256, U256};
use foundry_decoder::{
    Allocations, Decoder, DecoderConfig, EvmState, MagicFamily, Pointer, Unavailable, Value,
    pointer::Special,
    types::{MagicType, MagicVariable, Type, TypeType},
};
use semver::Version;
use similar_asserts::assert_eq;

fn field_names(result: &foundry_decoder::DecodeResult) -> Vec<String> {
    let Some(Value::Magic(fields)) = result.as_value() else { panic!("{result:?}") };
    fields.iter().map(|field| field.name.clone()).collect()
}

#[test]
fn family_follows_configured_compiler() {
    let config =
        DecoderConfig { solc_version: Some(Version::new(0, 8, 7)), ..DecoderConfig::default() };
    let decoder = Decoder::from_config(Allocations::default(), &config);
    assert_eq!(decoder.options().family, MagicFamily::London);

    let state = EvmState::new()
        .with_special(Special::Number, B256::from(U256::from(17_000_000u64)))
        .with_special(Special::Basefee, B256::from(U256::from(30)));
    let ty = Type::Magic(MagicType { variable: MagicVariable::Block });
    let result = decoder
        .decode_with(&ty, &Pointer::Special(Special::Block), &state, &mut Unavailable)
        .unwrap();

    assert_eq!(
        field_names(&result),
        ["coinbase", "difficulty", "gaslimit", "number", "timestamp", "chainid", "basefee"]
    );
    let Some(Value::Magic(fields)) = result.as_value() else { unreachable!() };
    assert_eq!(fields[3].value.as_value(), Some(&Value::Uint(U256::from(17_000_000u64))));
    assert_eq!(fields[6].value.as_value(), Some(&Value::Uint(U256::from(30))));
    // fields the state lacks fail on their own
    assert!(fields[0].value.is_error());
}

#[test]
fn default_family_is_the_latest() {
    let ty = Type::Magic(MagicType { variable: MagicVariable::Block });
    let result = Decoder::default()
        .decode_with(&ty, &Pointer::Special(Special::Block), &EvmState::new(), &mut Unavailable)
        .unwrap();
    let names = field_names(&result);
    assert_eq!(names.last().map(String::as_str), Some("blobbasefee"));
    assert!(names.iter().any(|name| name == "prevrandao"));
}

#[test]
fn tx_fields() {
    let origin = Address::repeat_byte(0x42);
    let state = EvmState::new()
        .with_special(Special::Origin, origin.into_word())
        .with_special(Special::Gasprice, B256::from(U256::from(1_000_000_000u64)));
    let ty = Type::Magic(MagicType { variable: MagicVariable::Tx });
    let result = Decoder::default()
        .decode_with(&ty, &Pointer::Special(Special::Tx), &state, &mut Unavailable)
        .unwrap();
    assert_eq!(result.to_string(), format!("{{ origin: {origin}, gasprice: 1000000000 }}"));
}

#[test]
fn single_specials() {
    let this = Address::repeat_byte(0x77);
    let state = EvmState::new().with_special(Special::This, this.into_word());
    let result = Decoder::default()
        .decode_with(
            &Type::Address { payable: false },
            &Pointer::Special(Special::This),
            &state,
            &mut Unavailable,
        )
        .unwrap();
    assert_eq!(result.as_value(), Some(&Value::Address(this)));
}

#[test]
fn type_values_need_no_state() {
    let ty = Type::Type(TypeType { of: Box::new(Type::UINT256) });
    let result = Decoder::default()
        .decode_with(&ty, &Pointer::Literal(Default::default()), &EvmState::new(), &mut Unavailable)
        .unwrap();
    assert_eq!(result.as_value(), Some(&Value::Type(Type::UINT256)));
    assert_eq!(result.to_string(), "type(uint256)");
}
