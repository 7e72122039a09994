//! Aggregate allocation accounting for a normalized graph.
//!
//! Normalization never constructs an object, but it records how much storage
//! the eventual instances will need so the instantiation runtime can reserve
//! one bulk arena block instead of making one heap allocation per binding.
//! The plan is mutated additively while the pipeline runs and read once it is
//! done.

use crate::key::TypeKey;

/// Running storage requirements for a composition's instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationPlan {
    owned_bytes: usize,
    owned_count: usize,
    external_count: usize,
}

impl AllocationPlan {
    /// Accounts for one arena-owned instance of `key`'s type.
    ///
    /// The reservation is worst-case: `size + align - 1` bytes cover the
    /// instance wherever the arena cursor happens to sit.
    pub(crate) fn add_owned(&mut self, key: TypeKey) {
        let layout = key.layout();
        self.owned_bytes += layout.size() + layout.align() - 1;
        self.owned_count += 1;
    }

    /// Accounts for one instance whose storage is managed outside the arena.
    pub(crate) fn add_external(&mut self, _key: TypeKey) {
        self.external_count += 1;
    }

    /// Total bytes to reserve for arena-owned instances.
    #[must_use]
    pub const fn owned_bytes(&self) -> usize {
        self.owned_bytes
    }

    /// Number of instances the arena will own.
    #[must_use]
    pub const fn owned_count(&self) -> usize {
        self.owned_count
    }

    /// Number of instances stored outside the arena.
    #[must_use]
    pub const fn external_count(&self) -> usize {
        self.external_count
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
