#![forbid(unsafe_code)]
//! Composition-graph normalization for the trellis injector.
//!
//! # Overview
//!
//! Client code assembles an object graph out of modules: units that declare
//! bindings and install further modules, possibly parameterized and deeply
//! nested. Before anything can be instantiated, that declaration has to be
//! expanded, deduplicated, validated, optimized, and flattened into one table
//! keyed by type identity. This crate is that pipeline:
//!
//! - [`record`] defines the flat vocabulary a module's builder surface
//!   compiles down to;
//! - [`expand`](normalize) drains installs on an explicit worklist, making
//!   installs idempotent and turning install loops into reports;
//! - [`compress`] collapses pure forwarding edges that nothing can observe;
//! - [`multibind`] merges collection contributions across modules;
//! - [`sizing`] and [`arena`] pre-plan one bulk allocation for the instances
//!   the runtime will eventually build.
//!
//! The result is a [`Normalized`] artifact, which `trellis-graph` turns into
//! the hash-indexed dependency graph the runtime walks.
//!
//! # Example
//!
//! ```
//! use trellis_core::{
//!     LazyModule, NormalizeOptions, Provision, Record, SharedInstance, TypeKey, normalize,
//!     shared,
//! };
//!
//! struct Config {
//!     retries: u32,
//! }
//! struct Client;
//!
//! fn make_client(_deps: &[SharedInstance]) -> SharedInstance {
//!     shared(Client)
//! }
//!
//! fn net(out: &mut Vec<Record>) {
//!     out.push(Record::Bind {
//!         key: TypeKey::of::<Config>(),
//!         provision: Provision::ready(Config { retries: 3 }),
//!     });
//!     out.push(Record::Bind {
//!         key: TypeKey::of::<Client>(),
//!         provision: Provision::owned(make_client, &[TypeKey::of::<Config>()]),
//!     });
//! }
//!
//! let normalized = normalize(
//!     "app",
//!     vec![Record::Install(LazyModule::new("net", net))],
//!     &[TypeKey::of::<Client>()],
//!     &NormalizeOptions::default(),
//! );
//! assert_eq!(normalized.bindings.len(), 2);
//! ```

pub mod arena;
pub mod compress;
pub mod diagnostics;
mod expand;
pub mod key;
pub mod multibind;
pub mod normalize;
pub mod record;
pub mod sizing;

pub use arena::InstanceArena;
pub use compress::CompressionUndo;
pub use diagnostics::{FatalDiagnostic, InstallTrace};
pub use key::TypeKey;
pub use multibind::CollectionSet;
pub use normalize::{NormalizeOptions, Normalized, normalize};
pub use record::{
    ArgModule, CollectFn, CreateFn, LazyModule, LazyModuleWithArgs, ModuleFunId, ModuleWithArgs,
    Provision, Record, SharedInstance, shared,
};
pub use sizing::AllocationPlan;
