//! Pipeline orchestration: expand, compress, merge.
//!
//! This is the only entry point the instantiation runtime uses. Everything
//! upstream of it is a flat record list; everything downstream works off the
//! returned [`Normalized`] artifact.

use indexmap::IndexMap;
use tracing::instrument;

use crate::compress::{CompressionUndo, compress};
use crate::diagnostics::FatalDiagnostic;
use crate::expand::{Expansion, expand};
use crate::key::TypeKey;
use crate::multibind::{CollectionSet, merge};
use crate::record::{Provision, Record};
use crate::sizing::AllocationPlan;

/// Options for one normalization run.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Collapse qualified forwarding edges. The rewrites are reversible
    /// through the undo table, so this is on by default.
    pub compress: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { compress: true }
    }
}

/// Everything the instantiation runtime needs from one composition.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Flat binding table, in deterministic discovery order.
    pub bindings: Vec<(TypeKey, Provision)>,
    /// Merged collection sets, keyed by element type.
    pub multibindings: IndexMap<TypeKey, CollectionSet>,
    /// Aggregate storage requirements for the whole graph.
    pub alloc: AllocationPlan,
    /// Reversal data for every compressed edge, keyed by the erased type.
    pub undo: IndexMap<TypeKey, CompressionUndo>,
}

/// Normalizes the record list declared by the composition named `root`.
///
/// `exposed` lists the keys the composition promises to its callers; they are
/// kept independently resolvable, so a forwarding edge onto an exposed key is
/// never compressed.
///
/// A broken composition (a key bound twice with different bindings, or a
/// module that transitively installs itself) is reported to stderr and
/// terminates the process with a non-zero status. No partial result would be
/// sound, and these are programming errors no caller can handle.
#[must_use]
pub fn normalize(
    root: &'static str,
    records: Vec<Record>,
    exposed: &[TypeKey],
    options: &NormalizeOptions,
) -> Normalized {
    match try_normalize(root, records, exposed, options) {
        Ok(normalized) => normalized,
        Err(fatal) => fatal.report_and_exit(),
    }
}

#[instrument(level = "debug", skip(records, options), fields(records = records.len()))]
pub(crate) fn try_normalize(
    root: &'static str,
    records: Vec<Record>,
    exposed: &[TypeKey],
    options: &NormalizeOptions,
) -> Result<Normalized, FatalDiagnostic> {
    let mut plan = AllocationPlan::default();
    let Expansion {
        mut bindings,
        collections,
        forward_hints,
    } = expand(root, records, &mut plan)?;

    let undo = if options.compress {
        compress(&mut bindings, forward_hints, &collections, exposed)
    } else {
        IndexMap::new()
    };
    let multibindings = merge(collections, &mut plan);

    Ok(Normalized {
        bindings: bindings.into_iter().collect(),
        multibindings,
        alloc: plan,
        undo,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
