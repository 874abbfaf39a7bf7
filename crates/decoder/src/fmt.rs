//! Human readable rendering of decoded values.

use crate::value::{DecodeResult, Field, MappingEntry, Value};
use alloy_primitives::{U256, hex};
use itertools::Itertools;
use std::fmt;

impl fmt::Display for DecodeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value { value, .. } => fmt::Display::fmt(value, f),
            Self::Error { error, .. } => write!(f, "<error: {error}>"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::FixedBytes(bytes) | Self::Bytes(bytes) => {
                f.write_str(&hex::encode_prefixed(bytes))
            }
            Self::Address(address) | Self::Contract { address } => write!(f, "{address}"),
            Self::String(value) => write!(f, "{value:?}"), // escape strings
            Self::Fixed { raw, places } => {
                let (sign, abs) = raw.into_sign_and_abs();
                if sign.is_negative() {
                    f.write_str("-")?;
                }
                fixed(abs, *places, f)
            }
            Self::Ufixed { raw, places } => fixed(*raw, *places, f),
            Self::Enum { name, .. } => f.write_str(name),
            Self::ExternalFunction { address, selector } => write!(f, "{address}.{selector}"),
            Self::InternalFunction { function: Some(function), .. } => f.write_str(function),
            Self::InternalFunction { deployed_pc: 0, constructor_pc: 0, function: None } => {
                f.write_str("<uninitialized>")
            }
            Self::InternalFunction { deployed_pc, constructor_pc, function: None } => {
                write!(f, "<function at pc {deployed_pc} (constructor pc {constructor_pc})>")
            }
            Self::Array(elements) => write!(f, "[{}]", elements.iter().format(", ")),
            Self::Struct(fields) | Self::Magic(fields) => {
                if fields.is_empty() {
                    return f.write_str("{}");
                }
                write!(f, "{{ {} }}", fields.iter().format(", "))
            }
            Self::Tuple(fields) => write!(f, "({})", fields.iter().format(", ")),
            Self::Mapping(entries) => write!(f, "{{{}}}", entries.iter().format(", ")),
            Self::Type(ty) => write!(f, "type({ty})"),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            return fmt::Display::fmt(&self.value, f);
        }
        write!(f, "{}: {}", self.name, self.value)
    }
}

impl fmt::Display for MappingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.key, self.value)
    }
}

/// Writes `raw / 10^places` without losing precision; trailing zeros of the fraction are kept.
fn fixed(raw: U256, places: u8, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if places == 0 {
        return write!(f, "{raw}");
    }
    let digits = raw.to_string();
    let places = places as usize;
    if digits.len() > places {
        let (integer, fraction) = digits.split_at(digits.len() - places);
        write!(f, "{integer}.{fraction}")
    } else {
        write!(f, "0.{digits:0>places$}")
    }
}
