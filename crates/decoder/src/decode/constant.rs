use super::Engine;
use crate::{
    pointer::{ConstantDefinition, ConstantValue, LiteralKind},
    read::read_definition,
    types::Type,
    value::{DecodeResult, DecodingError},
};

impl Engine<'_> {
    /// Decodes a constant from its literal definition.
    pub(crate) fn decode_constant(
        &self,
        ty: &Type,
        definition: &ConstantDefinition,
    ) -> DecodeResult {
        let raw = match read_definition(definition) {
            Ok(raw) => raw,
            Err(error) => return self.error(ty, error.into()),
        };
        let number = matches!(
            &definition.value,
            ConstantValue::Literal(literal) if literal.kind == LiteralKind::Number
        );
        match ty {
            Type::String { .. } => self.bytes_value(ty, raw),
            Type::Bytes(bytes) => match bytes.length {
                // `bytesN` constants written as numbers hold their value in the low-order bytes
                Some(length) if number => {
                    let length = (length as usize).min(raw.len());
                    self.value(ty, &raw[raw.len() - length..], false)
                }
                Some(_) => self.value(ty, &raw, false),
                None => self.bytes_value(ty, raw),
            },
            ty if ty.is_reference() => self.error(ty, DecodingError::UnsupportedType),
            _ => self.value(ty, &raw, false),
        }
    }
}
