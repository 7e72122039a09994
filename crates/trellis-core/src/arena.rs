//! Bulk instance arena sized from an [`AllocationPlan`].
//!
//! One bump block backs every arena-owned instance of a composition. The
//! block is reserved up front from the plan's worst-case byte total, so
//! instantiating the whole graph performs a single heap allocation.

use bumpalo::Bump;

use crate::sizing::AllocationPlan;

/// Arena backing the instances of one injector.
pub struct InstanceArena {
    bump: Bump,
}

impl InstanceArena {
    /// An empty arena with no reservation.
    #[must_use]
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    /// Reserves one block covering every arena-owned instance in `plan`.
    #[must_use]
    pub fn for_plan(plan: &AllocationPlan) -> Self {
        Self {
            bump: Bump::with_capacity(plan.owned_bytes()),
        }
    }

    /// Places `value` in the arena and returns a reference tied to the
    /// arena's lifetime.
    pub fn alloc<T>(&self, value: T) -> &mut T {
        self.bump.alloc(value)
    }

    /// Bytes handed out so far.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Drops all instances' storage at once, keeping the block for reuse.
    pub fn reset(&mut self) {
        self.bump.reset();
    }
}

impl Default for InstanceArena {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
