//! The long-lived artifact of one normalized composition.
//!
//! A [`Storage`] owns everything the instantiation runtime keeps around
//! between injector startups: the dependency graph, the merged collection
//! sets, the storage plan, and the compression undo table that a later,
//! larger composition consults when it extends this one.

use anyhow::Result;
use indexmap::IndexMap;
use trellis_core::{
    AllocationPlan, CollectionSet, CompressionUndo, InstanceArena, Normalized, TypeKey,
};

use crate::build::DepGraph;

/// Cacheable result of normalizing one composition.
pub struct Storage {
    pub graph: DepGraph,
    pub multibindings: IndexMap<TypeKey, CollectionSet>,
    pub alloc: AllocationPlan,
    pub undo: IndexMap<TypeKey, CompressionUndo>,
}

impl Storage {
    /// Builds the graph and takes ownership of the rest of the bundle.
    ///
    /// # Errors
    ///
    /// Propagates graph construction failures, see [`DepGraph::build`].
    pub fn build(normalized: Normalized) -> Result<Self> {
        let graph = DepGraph::build(&normalized)?;
        let Normalized {
            multibindings,
            alloc,
            undo,
            ..
        } = normalized;
        Ok(Self {
            graph,
            multibindings,
            alloc,
            undo,
        })
    }

    /// Reserves the bulk arena block for this composition's instances.
    #[must_use]
    pub fn arena(&self) -> InstanceArena {
        InstanceArena::for_plan(&self.alloc)
    }

    /// The merged collection set for `key`, if anything contributed to it.
    #[must_use]
    pub fn collection(&self, key: TypeKey) -> Option<&CollectionSet> {
        self.multibindings.get(&key)
    }

    /// Reversal data for `target`, if its forwarding edge was compressed.
    #[must_use]
    pub fn undo_for(&self, target: TypeKey) -> Option<&CompressionUndo> {
        self.undo.get(&target)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{
        LazyModule, NormalizeOptions, Provision, Record, SharedInstance, normalize, shared,
    };

    struct Cfg;
    struct Db;

    fn make_cfg(_deps: &[SharedInstance]) -> SharedInstance {
        shared(Cfg)
    }

    fn make_db(_deps: &[SharedInstance]) -> SharedInstance {
        shared(Db)
    }

    fn demo(out: &mut Vec<Record>) {
        out.push(Record::Bind {
            key: TypeKey::of::<Cfg>(),
            provision: Provision::owned(make_cfg, &[]),
        });
        out.push(Record::Bind {
            key: TypeKey::of::<Db>(),
            provision: Provision::owned(make_db, &[TypeKey::of::<Cfg>()]),
        });
    }

    fn built() -> Storage {
        let normalized = normalize(
            "demo",
            vec![Record::Install(LazyModule::new("demo", demo))],
            &[TypeKey::of::<Db>()],
            &NormalizeOptions::default(),
        );
        Storage::build(normalized).unwrap()
    }

    #[test]
    fn the_bundle_survives_the_handoff() {
        let storage = built();
        assert_eq!(storage.graph.node_count(), 2);
        assert_eq!(storage.alloc.owned_count(), 2);
        assert!(storage.collection(TypeKey::of::<Db>()).is_none());
        assert!(storage.undo_for(TypeKey::of::<Db>()).is_none());
    }

    #[test]
    fn the_arena_is_sized_from_the_plan() {
        let storage = built();
        let arena = storage.arena();
        let cfg = arena.alloc(Cfg);
        let db = arena.alloc(Db);
        assert!(std::ptr::from_ref(cfg) != std::ptr::from_ref(db).cast());
        assert!(arena.allocated_bytes() <= storage.alloc.owned_bytes());
    }
}
