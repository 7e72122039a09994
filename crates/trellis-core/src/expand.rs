//! Worklist expansion of lazy module installs.
//!
//! # Overview
//!
//! Install chains are caller-controlled and can nest arbitrarily deep, so
//! expansion runs on an explicit LIFO worklist instead of the call stack.
//! When an install record reaches the top of the stack it is replaced by its
//! end marker and the module's declared records are pushed above it; popping
//! the marker later completes the module. The markers make the logical call
//! stack visible, which is what lets a cycle report print the whole install
//! chain.
//!
//! # Bookkeeping
//!
//! Two membership sets drive the interesting decisions:
//! - fully expanded: re-installing a member is a free no-op, which makes
//!   installs idempotent and diamond-shaped module graphs cheap;
//! - expansion in progress: re-installing a member means the module
//!   transitively installs itself, which is fatal.
//!
//! Output maps are insertion-ordered, so a given record sequence always
//! produces the same binding table, element order, and hint order.

use std::collections::HashSet;

use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::{debug, instrument, trace};

use crate::diagnostics::{FatalDiagnostic, InstallTrace};
use crate::key::TypeKey;
use crate::record::{CollectFn, CreateFn, ModuleId, Provision, Record};
use crate::sizing::AllocationPlan;

/// Everything expansion discovers, before compression and merging.
#[derive(Debug)]
pub(crate) struct Expansion {
    pub(crate) bindings: IndexMap<TypeKey, Provision>,
    pub(crate) collections: Vec<CollectionPair>,
    pub(crate) forward_hints: IndexMap<TypeKey, ForwardHint>,
}

/// A collection contribution joined with its collection builder.
#[derive(Debug)]
pub(crate) struct CollectionPair {
    pub(crate) key: TypeKey,
    pub(crate) provision: Provision,
    pub(crate) collect: CollectFn,
}

/// Compression candidate, keyed by the concrete target type: the interface
/// that forwards to it, and the recipe that builds the target value directly
/// into the interface's slot.
#[derive(Debug)]
pub(crate) struct ForwardHint {
    pub(crate) iface: TypeKey,
    pub(crate) create: CreateFn,
}

/// Drains `records`, expanding installs until only facts remain.
///
/// Binding storage is accounted into `plan` as bindings are first seen;
/// duplicate consistent bindings collapse without re-counting.
#[instrument(level = "debug", skip(records, plan), fields(records = records.len()))]
pub(crate) fn expand(
    root: &'static str,
    records: Vec<Record>,
    plan: &mut AllocationPlan,
) -> Result<Expansion, FatalDiagnostic> {
    let mut worklist = records;
    let mut bindings = IndexMap::new();
    let mut collections = Vec::new();
    let mut forward_hints = IndexMap::new();
    let mut in_progress: HashSet<ModuleId> = HashSet::new();
    let mut done: HashSet<ModuleId> = HashSet::new();

    while let Some(record) = worklist.pop() {
        match record {
            Record::Bind { key, provision } => {
                insert_binding(&mut bindings, plan, key, provision)?;
            }
            Record::BindInCollection { key, provision } => match worklist.pop() {
                Some(Record::CollectionBuilder { collect, .. }) => {
                    collections.push(CollectionPair {
                        key,
                        provision,
                        collect,
                    });
                }
                _ => unreachable!("collection contribution without its adjacent builder"),
            },
            Record::CollectionBuilder { collect, .. } => match worklist.pop() {
                Some(Record::BindInCollection { key, provision }) => {
                    collections.push(CollectionPair {
                        key,
                        provision,
                        collect,
                    });
                }
                _ => unreachable!("collection builder without its adjacent contribution"),
            },
            Record::Forward {
                iface,
                target,
                create,
            } => {
                forward_hints.insert(target, ForwardHint { iface, create });
            }
            Record::Install(module) => {
                let id = ModuleId::Plain(module);
                if done.contains(&id) {
                    trace!(module = module.name(), "module already expanded, skipping");
                } else if in_progress.contains(&id) {
                    return Err(FatalDiagnostic::InstallCycle {
                        trace: cycle_trace(root, &worklist, &id, module.name()),
                    });
                } else {
                    debug!(module = module.name(), "expanding module");
                    in_progress.insert(id);
                    worklist.push(Record::Expanded(module));
                    module.expand_into(&mut worklist);
                }
            }
            Record::InstallWithArgs(module) => {
                let id = ModuleId::WithArgs(module.clone());
                if done.contains(&id) {
                    trace!(module = module.name(), "module already expanded, skipping");
                } else if in_progress.contains(&id) {
                    return Err(FatalDiagnostic::InstallCycle {
                        trace: cycle_trace(root, &worklist, &id, module.name()),
                    });
                } else {
                    debug!(module = module.name(), "expanding module");
                    in_progress.insert(id);
                    worklist.push(Record::ExpandedWithArgs(module.clone()));
                    module.expand_into(&mut worklist);
                }
            }
            Record::Expanded(module) => {
                let id = ModuleId::Plain(module);
                in_progress.remove(&id);
                done.insert(id);
            }
            Record::ExpandedWithArgs(module) => {
                let id = ModuleId::WithArgs(module);
                in_progress.remove(&id);
                done.insert(id);
            }
        }
    }

    debug_assert!(in_progress.is_empty(), "unbalanced expansion markers");
    debug!(
        bindings = bindings.len(),
        collection_elements = collections.len(),
        forward_hints = forward_hints.len(),
        "expansion complete"
    );
    Ok(Expansion {
        bindings,
        collections,
        forward_hints,
    })
}

fn insert_binding(
    bindings: &mut IndexMap<TypeKey, Provision>,
    plan: &mut AllocationPlan,
    key: TypeKey,
    provision: Provision,
) -> Result<(), FatalDiagnostic> {
    match bindings.entry(key) {
        Entry::Occupied(slot) => {
            if !slot.get().same_binding(&provision) {
                return Err(FatalDiagnostic::InconsistentBinding { key });
            }
            trace!(key = key.name(), "duplicate binding collapsed");
        }
        Entry::Vacant(slot) => {
            match &provision {
                Provision::Owned { .. } => plan.add_owned(key),
                Provision::External { .. } => plan.add_external(key),
                Provision::Instance(_) => {}
            }
            slot.insert(provision);
        }
    }
    Ok(())
}

/// Reads the install chain out of the worklist's end markers, bottom of the
/// stack first, and notes where the repeated module first appears.
fn cycle_trace(
    root: &'static str,
    worklist: &[Record],
    repeated_id: &ModuleId,
    repeated: &'static str,
) -> InstallTrace {
    let mut frames = Vec::new();
    let mut loop_start = None;
    for record in worklist {
        let (name, id) = match record {
            Record::Expanded(module) => (module.name(), ModuleId::Plain(*module)),
            Record::ExpandedWithArgs(module) => {
                (module.name(), ModuleId::WithArgs(module.clone()))
            }
            _ => continue,
        };
        if loop_start.is_none() && id == *repeated_id {
            loop_start = Some(frames.len());
        }
        frames.push(name);
    }
    let fallback = frames.len();
    InstallTrace {
        root,
        frames,
        loop_start: loop_start.unwrap_or(fallback),
        repeated,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
