//! Merging independently-contributed collection elements.
//!
//! Any number of modules may contribute elements for the same multibound
//! key without ever seeing each other. The merger folds the flat contribution
//! list into one set per key, preserving the order the contributions were
//! discovered in. Unlike single bindings, contributions are never
//! deduplicated; two identical recipes mean two elements.

use indexmap::IndexMap;
use tracing::debug;

use crate::expand::CollectionPair;
use crate::key::TypeKey;
use crate::record::{CollectFn, Provision};
use crate::sizing::AllocationPlan;

/// The merged contributions for one multibound key.
#[derive(Debug, Clone)]
pub struct CollectionSet {
    /// Element provisions in discovery order across all contributing modules.
    pub elements: Vec<Provision>,
    /// Builds the public collection value from the resolved elements.
    pub collect: CollectFn,
}

/// Folds the contribution list into per-key sets, accounting element storage
/// into `plan` as it goes.
///
/// Every contributing module registers the builder for the key it extends;
/// the builders are interchangeable by construction, and the last one
/// processed is kept.
pub(crate) fn merge(
    pairs: Vec<CollectionPair>,
    plan: &mut AllocationPlan,
) -> IndexMap<TypeKey, CollectionSet> {
    let mut merged: IndexMap<TypeKey, CollectionSet> = IndexMap::new();
    for pair in pairs {
        match &pair.provision {
            Provision::Owned { .. } => plan.add_owned(pair.key),
            Provision::External { .. } => plan.add_external(pair.key),
            Provision::Instance(_) => {}
        }
        let set = merged.entry(pair.key).or_insert_with(|| CollectionSet {
            elements: Vec::new(),
            collect: pair.collect,
        });
        set.collect = pair.collect;
        set.elements.push(pair.provision);
    }
    debug!(keys = merged.len(), "merged collection contributions");
    merged
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
