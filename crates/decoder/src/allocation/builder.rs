//! Computes allocation tables from struct, function and event definitions.

use super::{
    ArgumentAllocation, EventAllocation, FunctionAllocation, MemberAllocation, StorageSize,
    StructAllocation, enum_size, storage_size,
};
use crate::{
    pointer::{BufferRange, Pointer, StoragePosition, StorageRange, WORD_SIZE},
    slot::Slot,
    types::{Member, StructType, TupleType, Type, Visibility},
};
use alloy_primitives::{FixedBytes, U256, keccak256};
use std::collections::HashMap;

/// Errors produced while computing allocations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("expected a struct, got `{0}`")]
    NotAStruct(Type),
    #[error("member `{member}` of `{id}` has no layout in {location}")]
    NoLayout { id: String, member: String, location: &'static str },
    #[error("`{0}` is too large to allocate")]
    Overflow(String),
}

type Table = HashMap<String, StructAllocation>;

/// Computes the storage layout of every struct in `structs` and of the structs they contain.
///
/// Members are packed right to left into 32-byte slots in declaration order. A member that
/// doesn't fit in what remains of the current slot starts the next one; structs and arrays always
/// start a new slot and so does whatever follows them.
pub fn allocate_storage<'a>(
    structs: impl IntoIterator<Item = &'a Type>,
) -> Result<Table, AllocationError> {
    let mut table = Table::new();
    for ty in structs {
        let Type::Struct(st) = ty else { return Err(AllocationError::NotAStruct(ty.clone())) };
        storage_struct(st, &mut table)?;
    }
    Ok(table)
}

fn storage_struct(st: &StructType, table: &mut Table) -> Result<(), AllocationError> {
    if table.contains_key(&st.id) {
        return Ok(());
    }

    let mut slot = 0u64;
    // bytes already used in `slot`, counted from the right
    let mut used = 0usize;
    let mut members = Vec::with_capacity(st.member_types.len());
    for member in &st.member_types {
        visit_structs(&member.ty, &mut |nested| storage_struct(nested, table))?;
        let size = storage_size(&member.ty, table).ok_or_else(|| AllocationError::NoLayout {
            id: st.id.clone(),
            member: member.name.clone(),
            location: "storage",
        })?;
        let range = match size {
            StorageSize::Bytes(bytes) => {
                let bytes = bytes as usize;
                if used + bytes > WORD_SIZE {
                    slot += 1;
                    used = 0;
                }
                let from = (WORD_SIZE - used - bytes) as u8;
                let to = (WORD_SIZE - used - 1) as u8;
                used += bytes;
                StorageRange::new(
                    StoragePosition::new(Slot::at(slot), from),
                    StoragePosition::new(Slot::at(slot), to),
                )
            }
            StorageSize::Words(words) => {
                if used > 0 {
                    slot += 1;
                    used = 0;
                }
                let range = StorageRange::words(Slot::at(slot), U256::from(words));
                slot = slot
                    .checked_add(words)
                    .ok_or_else(|| AllocationError::Overflow(st.type_name.clone()))?;
                range
            }
        };
        trace!(id = %st.id, member = %member.name, ?range, "allocated storage member");
        members.push(MemberAllocation {
            definition: member.clone(),
            pointer: Pointer::Storage(range),
        });
    }

    let size = if used > 0 { slot + 1 } else { slot };
    table.insert(st.id.clone(), StructAllocation { size: size.max(1), dynamic: false, members });
    Ok(())
}

/// Computes the memory layout of every struct in `structs` and of the structs they contain.
///
/// Every member takes one word, holding either the value or a pointer to it. Mappings are left
/// out.
pub fn allocate_memory<'a>(
    structs: impl IntoIterator<Item = &'a Type>,
) -> Result<Table, AllocationError> {
    let mut table = Table::new();
    for ty in structs {
        let Type::Struct(st) = ty else { return Err(AllocationError::NotAStruct(ty.clone())) };
        memory_struct(st, &mut table)?;
    }
    Ok(table)
}

fn memory_struct(st: &StructType, table: &mut Table) -> Result<(), AllocationError> {
    if table.contains_key(&st.id) {
        return Ok(());
    }
    let mut members = Vec::new();
    for member in st.member_types.iter().filter(|m| !matches!(m.ty, Type::Mapping(_))) {
        visit_structs(&member.ty, &mut |nested| memory_struct(nested, table))?;
        let start = members.len() * WORD_SIZE;
        members.push(MemberAllocation {
            definition: member.clone(),
            pointer: Pointer::Memory(BufferRange::word(start)),
        });
    }
    let size = (members.len() * WORD_SIZE) as u64;
    table.insert(st.id.clone(), StructAllocation { size, dynamic: false, members });
    Ok(())
}

/// Computes the ABI layout of every struct in `structs` and of the structs they contain.
///
/// Member pointers cover the member's head: the value itself for static types, the offset word
/// for dynamic ones.
pub fn allocate_abi<'a>(
    structs: impl IntoIterator<Item = &'a Type>,
) -> Result<Table, AllocationError> {
    let mut table = Table::new();
    for ty in structs {
        let Type::Struct(st) = ty else { return Err(AllocationError::NotAStruct(ty.clone())) };
        abi_struct(st, &mut table)?;
    }
    Ok(table)
}

fn abi_struct(st: &StructType, table: &mut Table) -> Result<(), AllocationError> {
    if table.contains_key(&st.id) {
        return Ok(());
    }
    let mut offset = 0usize;
    let mut members = Vec::new();
    for member in st.member_types.iter().filter(|m| !matches!(m.ty, Type::Mapping(_))) {
        visit_structs(&member.ty, &mut |nested| abi_struct(nested, table))?;
        let (range, next) = abi_head(&st.type_name, &member.ty, offset)?;
        offset = next;
        members.push(MemberAllocation {
            definition: member.clone(),
            pointer: Pointer::Calldata(range),
        });
    }
    let dynamic = st.member_types.iter().any(|m| m.ty.is_abi_dynamic());
    table.insert(st.id.clone(), StructAllocation { size: offset as u64, dynamic, members });
    Ok(())
}

/// Returns the head range of a value of type `ty` at `offset` and the offset following it.
fn abi_head(
    container: &str,
    ty: &Type,
    offset: usize,
) -> Result<(BufferRange, usize), AllocationError> {
    let overflow = || AllocationError::Overflow(container.to_string());
    let length = ty.abi_head_size().ok_or_else(overflow)?;
    let next = offset.checked_add(length).ok_or_else(overflow)?;
    Ok((BufferRange::new(offset, length), next))
}

/// Calls `f` with every struct reachable from `ty`.
fn visit_structs(
    ty: &Type,
    f: &mut impl FnMut(&StructType) -> Result<(), AllocationError>,
) -> Result<(), AllocationError> {
    match ty {
        Type::Struct(st) => f(st),
        Type::Array(array) => visit_structs(&array.base_type, f),
        Type::Mapping(mapping) => visit_structs(&mapping.value_type, f),
        Type::Tuple(TupleType { member_types }) => {
            member_types.iter().try_for_each(|member| visit_structs(&member.ty, f))
        }
        _ => Ok(()),
    }
}

/// Computes the calldata layout of a function's arguments.
///
/// Arguments follow the 4-byte selector, so every pointer is offset by 4.
pub fn allocate_function(
    name: &str,
    inputs: &[Member],
) -> Result<FunctionAllocation, AllocationError> {
    let signature = signature(name, inputs.iter().map(|input| &input.ty))?;
    let selector = FixedBytes::<4>::from_slice(&keccak256(signature.as_bytes())[..4]);

    let mut offset = 4usize;
    let mut arguments = Vec::with_capacity(inputs.len());
    for input in inputs {
        let (range, next) = abi_head(name, &input.ty, offset)?;
        offset = next;
        arguments.push(ArgumentAllocation {
            definition: input.clone(),
            pointer: Pointer::Calldata(range),
            indexed: false,
        });
    }
    debug!(%signature, %selector, "allocated function");
    Ok(FunctionAllocation { name: name.to_string(), selector, arguments })
}

/// Computes the layout of an event's arguments.
///
/// Indexed arguments are read from the topics, following topic 0 unless the event is anonymous;
/// the others are ABI encoded in the log data.
pub fn allocate_event(
    name: &str,
    inputs: &[(Member, bool)],
    anonymous: bool,
) -> Result<EventAllocation, AllocationError> {
    let signature = signature(name, inputs.iter().map(|(input, _)| &input.ty))?;
    let selector = (!anonymous).then(|| keccak256(signature.as_bytes()));

    let mut topic = usize::from(!anonymous);
    let mut offset = 0usize;
    let mut arguments = Vec::with_capacity(inputs.len());
    for (input, indexed) in inputs {
        let pointer = if *indexed {
            topic += 1;
            Pointer::EventTopic(topic - 1)
        } else {
            let (range, next) = abi_head(name, &input.ty, offset)?;
            offset = next;
            Pointer::Eventdata(range)
        };
        arguments.push(ArgumentAllocation {
            definition: input.clone(),
            pointer,
            indexed: *indexed,
        });
    }
    Ok(EventAllocation { name: name.to_string(), anonymous, selector, arguments })
}

fn signature<'a>(
    name: &str,
    types: impl Iterator<Item = &'a Type>,
) -> Result<String, AllocationError> {
    let types = types
        .map(|ty| {
            abi_type_name(ty).ok_or_else(|| AllocationError::NoLayout {
                id: name.to_string(),
                member: ty.to_string(),
                location: "the ABI",
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("{name}({})", types.join(",")))
}

/// Returns the canonical ABI name of `ty`, as used in signatures.
///
/// Returns `None` for types that can't be ABI encoded.
pub fn abi_type_name(ty: &Type) -> Option<String> {
    let name = match ty {
        Type::Uint { bits } => format!("uint{bits}"),
        Type::Int { bits } => format!("int{bits}"),
        Type::Bool => "bool".to_string(),
        Type::Address { .. } | Type::Contract(_) => "address".to_string(),
        Type::Bytes(bytes) => match bytes.length {
            Some(length) => format!("bytes{length}"),
            None => "bytes".to_string(),
        },
        Type::String { .. } => "string".to_string(),
        Type::Fixed { bits, places } => format!("fixed{bits}x{places}"),
        Type::Ufixed { bits, places } => format!("ufixed{bits}x{places}"),
        Type::Enum(e) => format!("uint{}", u16::from(enum_size(e.options.len())) * 8),
        Type::Function(function) if function.visibility == Visibility::External => {
            "function".to_string()
        }
        Type::Array(array) => {
            let base = abi_type_name(&array.base_type)?;
            match array.length {
                Some(length) => format!("{base}[{length}]"),
                None => format!("{base}[]"),
            }
        }
        Type::Struct(StructType { member_types, .. }) | Type::Tuple(TupleType { member_types }) => {
            let members: Vec<_> =
                member_types.iter().map(|member| abi_type_name(&member.ty)).collect::<Option<_>>()?;
            format!("({})", members.join(","))
        }
        _ => return None,
    };
    Some(name)
}
