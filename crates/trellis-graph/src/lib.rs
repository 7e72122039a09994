#![forbid(unsafe_code)]
//! Graph assembly for normalized compositions.
//!
//! `trellis-core` produces a flat binding table; this crate bulk-builds the
//! structure the instantiation runtime actually walks: a [`DepGraph`] with
//! O(1) entry by type key, bundled with the merged collection sets, the
//! storage plan, and the compression undo table as one cacheable [`Storage`]
//! artifact.
//!
//! # Example
//!
//! ```
//! use trellis_core::{
//!     LazyModule, NormalizeOptions, Provision, Record, SharedInstance, TypeKey, normalize,
//!     shared,
//! };
//! use trellis_graph::Storage;
//!
//! struct Config;
//!
//! fn make_config(_deps: &[SharedInstance]) -> SharedInstance {
//!     shared(Config)
//! }
//!
//! fn app(out: &mut Vec<Record>) {
//!     out.push(Record::Bind {
//!         key: TypeKey::of::<Config>(),
//!         provision: Provision::owned(make_config, &[]),
//!     });
//! }
//!
//! let normalized = normalize(
//!     "app",
//!     vec![Record::Install(LazyModule::new("app", app))],
//!     &[TypeKey::of::<Config>()],
//!     &NormalizeOptions::default(),
//! );
//! let storage = Storage::build(normalized)?;
//! assert!(storage.graph.binding(TypeKey::of::<Config>()).is_some());
//! # anyhow::Ok(())
//! ```

pub mod build;
pub mod storage;

pub use build::{BindingNode, DepGraph};
pub use storage::Storage;
