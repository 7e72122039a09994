//! Bulk construction of the hash-indexed dependency graph.
//!
//! # Overview
//!
//! The instantiation runtime never walks record lists; it walks a prebuilt
//! graph with O(1) entry by type key. Nodes are the normalized bindings,
//! and an edge `A -> B` means A's recipe consumes B. The whole structure is
//! built in one pass over the flat binding table: nodes first, then edges
//! through the key index.
//!
//! # Content hash
//!
//! Every graph carries a blake3 hash over its nodes (name, storage kind) and
//! edges in table order. The binding table is deterministic for a given
//! composition, so equal compositions hash equally and the hash doubles as a
//! cache key for downstream artifacts.

use std::collections::HashMap;

use anyhow::{Context, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, instrument};
use trellis_core::{Normalized, Provision, TypeKey};

/// One resolvable node of the final graph.
#[derive(Debug, Clone)]
pub struct BindingNode {
    /// The bound key.
    pub key: TypeKey,
    /// How an instance of `key` is produced.
    pub provision: Provision,
}

impl BindingNode {
    /// Terminal nodes hold a finished value; resolution stops here.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.provision.is_constructed()
    }
}

/// The dependency graph the injector walks: petgraph storage plus a key
/// index for O(1) entry.
#[derive(Debug)]
pub struct DepGraph {
    pub graph: DiGraph<BindingNode, ()>,
    pub node_map: HashMap<TypeKey, NodeIndex>,
    pub content_hash: String,
}

impl DepGraph {
    /// Builds the graph from a normalized binding table in one pass.
    ///
    /// # Errors
    ///
    /// Fails when a recipe depends on a key with no binding of its own. The
    /// upstream pipeline only produces such tables from malformed record
    /// streams, and indexing a dangling edge would defer the failure to
    /// resolution time.
    #[instrument(skip(normalized), fields(bindings = normalized.bindings.len()))]
    pub fn build(normalized: &Normalized) -> Result<Self> {
        let mut graph = DiGraph::with_capacity(normalized.bindings.len(), 0);
        let mut node_map = HashMap::with_capacity(normalized.bindings.len());

        for (key, provision) in &normalized.bindings {
            let idx = graph.add_node(BindingNode {
                key: *key,
                provision: provision.clone(),
            });
            node_map.insert(*key, idx);
        }

        for (key, provision) in &normalized.bindings {
            let from = node_map[key];
            for dep in provision.deps() {
                let to = node_map.get(dep).copied().with_context(|| {
                    format!(
                        "binding '{}' depends on '{}', which has no binding",
                        key.name(),
                        dep.name()
                    )
                })?;
                graph.add_edge(from, to, ());
            }
        }

        let content_hash = fingerprint(normalized);
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            %content_hash,
            "built dependency graph"
        );
        Ok(Self {
            graph,
            node_map,
            content_hash,
        })
    }

    /// The node index for `key`, if it is bound.
    #[must_use]
    pub fn node(&self, key: TypeKey) -> Option<NodeIndex> {
        self.node_map.get(&key).copied()
    }

    /// The binding stored for `key`, if it is bound.
    #[must_use]
    pub fn binding(&self, key: TypeKey) -> Option<&BindingNode> {
        self.node(key).and_then(|idx| self.graph.node_weight(idx))
    }

    /// Dependency keys of `key`'s recipe, in declared order.
    #[must_use]
    pub fn deps_of(&self, key: TypeKey) -> &[TypeKey] {
        self.binding(key).map_or(&[], |node| node.provision.deps())
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Stable digest of the normalized table: node names, storage kinds, dep
/// lists, and collection shapes, all in table order.
fn fingerprint(normalized: &Normalized) -> String {
    let mut hasher = blake3::Hasher::new();
    for (key, provision) in &normalized.bindings {
        hasher.update(key.name().as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(provision.kind_name().as_bytes());
        hasher.update(&[0x1f]);
        for dep in provision.deps() {
            hasher.update(dep.name().as_bytes());
            hasher.update(&[0x1e]);
        }
        hasher.update(&[0x1d]);
    }
    for (key, set) in &normalized.multibindings {
        hasher.update(key.name().as_bytes());
        hasher.update(&[0x1f]);
        for element in &set.elements {
            hasher.update(element.kind_name().as_bytes());
            hasher.update(&[0x1e]);
        }
        hasher.update(&[0x1d]);
    }
    format!("blake3:{}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
