//! Runtime type identity for the composition graph.
//!
//! Every binding, dependency edge, and exposure is keyed by a [`TypeKey`]:
//! the `TypeId` of the bound Rust type plus two payloads that ride along for
//! later stages, the demangled type name (diagnostics) and the type's memory
//! [`Layout`] (allocation sizing). Equality and hashing consider only the
//! `TypeId`.

use std::alloc::Layout;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a bindable type.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
    layout: Layout,
}

impl TypeKey {
    /// The key for `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            layout: Layout::new::<T>(),
        }
    }

    /// Human-readable type path, as produced by [`std::any::type_name`].
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Memory layout of one instance of the keyed type.
    #[must_use]
    pub const fn layout(&self) -> Layout {
        self.layout
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
