//! Forwarding-edge compression.
//!
//! # Overview
//!
//! An interface bound to a concrete type is a pure forwarding edge: resolving
//! the interface costs an extra graph node and an extra slot just to hand
//! back the concrete value. When nothing else in the graph can observe the
//! difference, the edge is collapsed. The interface's entry takes over the
//! target's construction, using the hint recipe that builds the target value
//! directly into the interface's slot, and the target's own entry disappears.
//!
//! A candidate is disqualified when the target is a dependency of a
//! collection element, is exposed to callers, or has any dependent other than
//! the forwarding interface itself. Compression never fails: a disqualified
//! candidate is simply left uncompressed.
//!
//! Each rewrite is recorded in an undo table so a later composition that
//! extends this one, and breaks one of the conditions, can reconstruct the
//! uncompressed pair. The storage plan is unaffected either way: the target
//! instance is still built exactly once.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::expand::{CollectionPair, ForwardHint};
use crate::key::TypeKey;
use crate::record::Provision;

/// Reversal data for one compressed edge, keyed by the erased target type.
#[derive(Debug, Clone)]
pub struct CompressionUndo {
    /// The interface whose entry absorbed the target.
    pub iface: TypeKey,
    /// The interface's original forwarding provision.
    pub iface_provision: Provision,
    /// The target's original provision.
    pub target_provision: Provision,
}

/// Collapses every still-qualified forwarding edge in `bindings`.
///
/// Candidates arrive keyed by target type. The surviving rewrites are
/// returned as an undo table in the order they were applied.
pub(crate) fn compress(
    bindings: &mut IndexMap<TypeKey, Provision>,
    mut candidates: IndexMap<TypeKey, ForwardHint>,
    collections: &[CollectionPair],
    exposed: &[TypeKey],
) -> IndexMap<TypeKey, CompressionUndo> {
    // A target consumed by a collection element recipe keeps its own entry.
    for pair in collections {
        for dep in pair.provision.deps() {
            if candidates.shift_remove(dep).is_some() {
                debug!(
                    target = dep.name(),
                    "not compressing: dependency of a collection element"
                );
            }
        }
    }

    // The exposed surface must stay independently resolvable.
    for key in exposed {
        if candidates.shift_remove(key).is_some() {
            debug!(target = key.name(), "not compressing: exposed type");
        }
    }

    // Any dependent other than the forwarding interface defeats the rewrite.
    for (dependent, provision) in &*bindings {
        for dep in provision.deps() {
            let disqualified = candidates
                .get(dep)
                .is_some_and(|hint| hint.iface != *dependent);
            if disqualified {
                candidates.shift_remove(dep);
                debug!(
                    target = dep.name(),
                    dependent = dependent.name(),
                    "not compressing: target has another dependent"
                );
            }
        }
    }

    let mut undo = IndexMap::with_capacity(candidates.len());
    for (target, hint) in candidates {
        // Hints are emitted next to their forwarding binding, so both
        // endpoints are normally present. A candidate with a missing or
        // ready-made endpoint is skipped rather than rewritten.
        let Some(iface_provision) = bindings.get(&hint.iface).cloned() else {
            trace!(target = target.name(), "hint names an unbound interface");
            continue;
        };
        let Some(target_provision) = bindings.get(&target).cloned() else {
            trace!(target = target.name(), "hint names an unbound target");
            continue;
        };
        debug_assert!(
            !iface_provision.is_constructed(),
            "forwarding bindings do not hold finished values"
        );

        // The rewritten entry keeps the target's storage kind: the value
        // being built is still the target type, it just lives in the
        // interface's slot now.
        let rewritten = match &target_provision {
            Provision::Owned { deps, .. } => Provision::Owned {
                create: hint.create,
                deps: Arc::clone(deps),
            },
            Provision::External { deps, .. } => Provision::External {
                create: hint.create,
                deps: Arc::clone(deps),
            },
            Provision::Instance(_) => {
                trace!(target = target.name(), "hint targets a ready-made value");
                continue;
            }
        };
        bindings.insert(hint.iface, rewritten);
        bindings.shift_remove(&target);
        debug!(
            iface = hint.iface.name(),
            target = target.name(),
            "compressed forwarding edge"
        );
        undo.insert(
            target,
            CompressionUndo {
                iface: hint.iface,
                iface_provision,
                target_provision,
            },
        );
    }
    undo
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
