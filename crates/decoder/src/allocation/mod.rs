//! Allocation tables: where the members of structs and the arguments of functions and events
//! live relative to their container.
//!
//! The tables are computed once per set of compiled types and shared read-only by every decode.

use crate::{
    pointer::Pointer,
    types::{Member, Type, Visibility},
};
use alloy_primitives::{B256, FixedBytes, map::B256HashMap};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

mod builder;
pub use builder::{
    AllocationError, abi_type_name, allocate_abi, allocate_event, allocate_function,
    allocate_memory, allocate_storage,
};

/// All allocation tables of a compilation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Allocations {
    /// Storage layouts by struct id; member pointers are storage ranges relative to slot 0.
    pub storage: HashMap<String, StructAllocation>,
    /// Memory layouts by struct id; member pointers are memory ranges relative to offset 0.
    pub memory: HashMap<String, StructAllocation>,
    /// ABI layouts by struct id; member pointers are calldata ranges relative to offset 0.
    pub abi: HashMap<String, StructAllocation>,
    /// Function argument layouts by selector.
    pub functions: HashMap<FixedBytes<4>, FunctionAllocation>,
    /// Non-anonymous event layouts by topic 0.
    pub events: B256HashMap<EventAllocation>,
    pub internal_functions: InternalFunctionTable,
}

impl Allocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the storage, memory and ABI layouts of `structs`.
    pub fn from_structs<'a>(
        structs: impl IntoIterator<Item = &'a Type> + Clone,
    ) -> Result<Self, AllocationError> {
        Ok(Self {
            storage: allocate_storage(structs.clone())?,
            memory: allocate_memory(structs.clone())?,
            abi: allocate_abi(structs)?,
            ..Default::default()
        })
    }

    pub fn with_function(mut self, function: FunctionAllocation) -> Self {
        self.functions.insert(function.selector, function);
        self
    }

    /// Adds an event; anonymous events can't be looked up by topic and are skipped.
    pub fn with_event(mut self, event: EventAllocation) -> Self {
        if let Some(selector) = event.selector {
            self.events.insert(selector, event);
        }
        self
    }

    pub fn with_internal_functions(mut self, table: InternalFunctionTable) -> Self {
        self.internal_functions = table;
        self
    }
}

/// The layout of one struct in one location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructAllocation {
    /// Words in storage, bytes in memory and ABI encodings.
    pub size: u64,
    /// Whether the struct is dynamically sized under the ABI encoding rules.
    #[serde(default)]
    pub dynamic: bool,
    pub members: Vec<MemberAllocation>,
}

impl StructAllocation {
    /// Returns the allocation of the member called `name`.
    pub fn member(&self, name: &str) -> Option<&MemberAllocation> {
        self.members.iter().find(|member| member.definition.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAllocation {
    pub definition: Member,
    pub pointer: Pointer,
}

/// A function or event argument.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentAllocation {
    pub definition: Member,
    pub pointer: Pointer,
    #[serde(default)]
    pub indexed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionAllocation {
    pub name: String,
    pub selector: FixedBytes<4>,
    pub arguments: Vec<ArgumentAllocation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAllocation {
    pub name: String,
    #[serde(default)]
    pub anonymous: bool,
    /// Topic 0 of a non-anonymous event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<B256>,
    pub arguments: Vec<ArgumentAllocation>,
}

/// Names of internal functions by program counter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalFunctionTable {
    pub deployed: BTreeMap<u32, String>,
    pub constructor: BTreeMap<u32, String>,
}

impl InternalFunctionTable {
    pub fn is_empty(&self) -> bool {
        self.deployed.is_empty() && self.constructor.is_empty()
    }

    /// Looks the function up by deployed pc, then by constructor pc.
    pub fn get(&self, deployed_pc: u32, constructor_pc: u32) -> Option<&str> {
        self.deployed
            .get(&deployed_pc)
            .filter(|_| deployed_pc != 0)
            .or_else(|| self.constructor.get(&constructor_pc).filter(|_| constructor_pc != 0))
            .map(String::as_str)
    }
}

/// How much storage a type takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageSize {
    /// Packable into part of a word.
    Bytes(u8),
    /// Whole words; the next value starts a new slot.
    Words(u64),
}

impl StorageSize {
    /// Number of whole words taken, rounding partial words up.
    pub fn words(self) -> u64 {
        match self {
            Self::Bytes(_) => 1,
            Self::Words(words) => words,
        }
    }
}

/// Returns how much storage `ty` takes, looking struct sizes up in `storage`.
///
/// Returns `None` for structs missing from the table and types that can't live in storage.
pub fn storage_size(ty: &Type, storage: &HashMap<String, StructAllocation>) -> Option<StorageSize> {
    let size = match ty {
        Type::Uint { bits } | Type::Int { bits } | Type::Fixed { bits, .. } |
        Type::Ufixed { bits, .. } => StorageSize::Bytes(packed(bits.div_ceil(8))?),
        Type::Bool => StorageSize::Bytes(1),
        Type::Address { .. } | Type::Contract(_) => StorageSize::Bytes(20),
        Type::Bytes(bytes) => match bytes.length {
            Some(length) => StorageSize::Bytes(packed(length.into())?),
            None => StorageSize::Words(1),
        },
        Type::Enum(e) => StorageSize::Bytes(enum_size(e.options.len())),
        Type::Function(function) => match function.visibility {
            Visibility::External => StorageSize::Bytes(24),
            Visibility::Internal => StorageSize::Bytes(8),
        },
        Type::String { .. } | Type::Mapping(_) => StorageSize::Words(1),
        Type::Array(array) => match array.length {
            None => StorageSize::Words(1),
            Some(length) => match storage_size(&array.base_type, storage)? {
                StorageSize::Bytes(size) => {
                    let per_word = u64::from(32 / size.max(1));
                    StorageSize::Words(length.div_ceil(per_word).max(1))
                }
                StorageSize::Words(words) => StorageSize::Words(length.checked_mul(words)?.max(1)),
            },
        },
        Type::Struct(st) => StorageSize::Words(storage.get(&st.id)?.size),
        Type::Tuple(_) | Type::Type(_) | Type::Magic(_) | Type::Unsupported => return None,
    };
    Some(size)
}

/// A value of `bytes` bytes packs into a word only if it has 1 to 32 of them.
fn packed(bytes: u16) -> Option<u8> {
    u8::try_from(bytes).ok().filter(|bytes| (1..=32).contains(bytes))
}

/// Bytes taken by an enum with `options` options.
pub(crate) fn enum_size(options: usize) -> u8 {
    let mut size = 1u8;
    let mut capacity = 256u128;
    while (options as u128) > capacity && size < 32 {
        size += 1;
        capacity = capacity.saturating_mul(256);
    }
    size
}
