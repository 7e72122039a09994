//! Composition records: the tagged vocabulary every pipeline stage shares.
//!
//! # Overview
//!
//! A module's builder surface compiles down to a flat sequence of [`Record`]s:
//! concrete bindings, collection contributions, forwarding hints, and deferred
//! installs of further modules. Normalization consumes these records off a
//! worklist; nothing in this module has behavior beyond identity and
//! classification.
//!
//! # Identity
//!
//! Duplicate facts are detected by shallow identity, never by semantic
//! comparison of recipes:
//! - construction recipes ([`CreateFn`], [`CollectFn`]) compare as function
//!   pointers;
//! - ready-made instances compare by `Arc` pointer identity;
//! - module references compare by expansion-function identity plus, for
//!   parameterized modules, `Eq` on the captured arguments.

use std::any::Any;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::ptr;
use std::sync::Arc;

use crate::key::TypeKey;

/// An instance shared across the graph, erased to `Any`.
pub type SharedInstance = Arc<dyn Any + Send + Sync>;

/// A construction recipe. `deps` holds the resolved instances of the
/// binding's dependency list, in declared order.
pub type CreateFn = fn(deps: &[SharedInstance]) -> SharedInstance;

/// Assembles the accumulated elements of a multibound key into the public
/// collection value.
pub type CollectFn = fn(elems: &[SharedInstance]) -> SharedInstance;

/// Erases `value` into the graph's shared-instance representation.
#[must_use]
pub fn shared<T: Any + Send + Sync>(value: T) -> SharedInstance {
    Arc::new(value)
}

// ---------------------------------------------------------------------------
// Provisions
// ---------------------------------------------------------------------------

/// How an instance is produced for a bound key.
#[derive(Clone)]
pub enum Provision {
    /// A value bound ready-made; nothing to construct. Terminal in the
    /// dependency graph.
    Instance(SharedInstance),
    /// Built on demand by `create`, with storage reserved in the injector's
    /// bulk arena.
    Owned {
        create: CreateFn,
        deps: Arc<[TypeKey]>,
    },
    /// Built on demand by `create`, but stored elsewhere (a value whose
    /// lifetime is managed outside the arena).
    External {
        create: CreateFn,
        deps: Arc<[TypeKey]>,
    },
}

impl Provision {
    /// A ready-made value.
    #[must_use]
    pub fn ready<T: Any + Send + Sync>(value: T) -> Self {
        Self::Instance(Arc::new(value))
    }

    /// An arena-owned binding built by `create` from `deps`.
    #[must_use]
    pub fn owned(create: CreateFn, deps: &[TypeKey]) -> Self {
        Self::Owned {
            create,
            deps: Arc::from(deps),
        }
    }

    /// An externally-stored binding built by `create` from `deps`.
    #[must_use]
    pub fn external(create: CreateFn, deps: &[TypeKey]) -> Self {
        Self::External {
            create,
            deps: Arc::from(deps),
        }
    }

    /// Dependency keys in declared order; empty for ready-made values.
    #[must_use]
    pub fn deps(&self) -> &[TypeKey] {
        match self {
            Self::Instance(_) => &[],
            Self::Owned { deps, .. } | Self::External { deps, .. } => deps,
        }
    }

    /// True when the provision already holds a finished value.
    #[must_use]
    pub const fn is_constructed(&self) -> bool {
        matches!(self, Self::Instance(_))
    }

    /// Stable label for the provision's storage kind.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Instance(_) => "instance",
            Self::Owned { .. } => "owned",
            Self::External { .. } => "external",
        }
    }

    /// Shallow identity: same kind and same recipe pointer or value pointer.
    pub(crate) fn same_binding(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Instance(a), Self::Instance(b)) => Arc::ptr_eq(a, b),
            (Self::Owned { create: a, .. }, Self::Owned { create: b, .. })
            | (Self::External { create: a, .. }, Self::External { create: b, .. }) => {
                ptr::fn_addr_eq(*a, *b)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Provision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(_) => f.write_str("Instance(..)"),
            Self::Owned { deps, .. } => f
                .debug_struct("Owned")
                .field("deps", &DepNames(deps))
                .finish_non_exhaustive(),
            Self::External { deps, .. } => f
                .debug_struct("External")
                .field("deps", &DepNames(deps))
                .finish_non_exhaustive(),
        }
    }
}

struct DepNames<'a>(&'a [TypeKey]);

impl fmt::Debug for DepNames<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(TypeKey::name)).finish()
    }
}

// ---------------------------------------------------------------------------
// Lazy modules
// ---------------------------------------------------------------------------

/// A deferred installation of a module that captures no arguments.
///
/// The expansion function both identifies the module and performs its work:
/// calling it appends the module's declared records to the worklist. Two
/// references are the same module iff they carry the same function.
#[derive(Debug, Clone, Copy)]
pub struct LazyModule {
    name: &'static str,
    expand: fn(&mut Vec<Record>),
}

impl LazyModule {
    /// A reference to the module whose declarations `expand` appends.
    #[must_use]
    pub const fn new(name: &'static str, expand: fn(&mut Vec<Record>)) -> Self {
        Self { name, expand }
    }

    /// Diagnostic name of the module.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn expand_into(&self, out: &mut Vec<Record>) {
        (self.expand)(out);
    }
}

impl PartialEq for LazyModule {
    fn eq(&self, other: &Self) -> bool {
        ptr::fn_addr_eq(self.expand, other.expand)
    }
}

impl Eq for LazyModule {}

impl Hash for LazyModule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.expand as usize);
    }
}

/// Identity of a parameterized module's function, shared by every
/// instantiation of that function regardless of captured arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleFunId(usize);

impl ModuleFunId {
    /// The identity of `f`.
    #[must_use]
    pub fn of<A>(f: fn(&A, &mut Vec<Record>)) -> Self {
        Self(f as usize)
    }
}

/// Behavior and identity of a parameterized module instantiation.
///
/// Implemented once, generically, by [`ArgModule`]. A custom implementation
/// only needs to preserve the identity contract: two instantiations are equal
/// iff they are the same module function applied to equal captured arguments.
pub trait ModuleWithArgs: Send + Sync {
    /// Identity of the module function itself.
    fn fun_id(&self) -> ModuleFunId;

    /// Diagnostic name of the module function.
    fn name(&self) -> &'static str;

    /// Downcast support for cross-instantiation argument comparison.
    fn as_any(&self) -> &dyn Any;

    /// Whether `other` captures arguments equal to this instantiation's.
    fn args_eq(&self, other: &dyn ModuleWithArgs) -> bool;

    /// Hash of the captured arguments.
    fn args_hash(&self) -> u64;

    /// Appends the module's declared records to `out`.
    fn expand_into(&self, out: &mut Vec<Record>);
}

/// The standard parameterized-module representation: a module function plus
/// the arguments captured at install time.
pub struct ArgModule<A> {
    name: &'static str,
    fun: fn(&A, &mut Vec<Record>),
    args: A,
}

impl<A> ArgModule<A>
where
    A: Eq + Hash + Send + Sync + 'static,
{
    /// An instantiation of `fun` over `args`.
    #[must_use]
    pub const fn new(name: &'static str, fun: fn(&A, &mut Vec<Record>), args: A) -> Self {
        Self { name, fun, args }
    }
}

impl<A> ModuleWithArgs for ArgModule<A>
where
    A: Eq + Hash + Send + Sync + 'static,
{
    fn fun_id(&self) -> ModuleFunId {
        ModuleFunId(self.fun as usize)
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn args_eq(&self, other: &dyn ModuleWithArgs) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| other.args == self.args)
    }

    fn args_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.args.hash(&mut hasher);
        hasher.finish()
    }

    fn expand_into(&self, out: &mut Vec<Record>) {
        (self.fun)(&self.args, out);
    }
}

/// A deferred installation of a parameterized module.
#[derive(Clone)]
pub struct LazyModuleWithArgs {
    module: Arc<dyn ModuleWithArgs>,
}

impl LazyModuleWithArgs {
    /// Wraps an instantiation for deferred expansion.
    #[must_use]
    pub fn new(module: impl ModuleWithArgs + 'static) -> Self {
        Self {
            module: Arc::new(module),
        }
    }

    /// Diagnostic name of the module function.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.module.name()
    }

    pub(crate) fn expand_into(&self, out: &mut Vec<Record>) {
        self.module.expand_into(out);
    }
}

impl fmt::Debug for LazyModuleWithArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LazyModuleWithArgs").field(&self.name()).finish()
    }
}

impl PartialEq for LazyModuleWithArgs {
    fn eq(&self, other: &Self) -> bool {
        self.module.fun_id() == other.module.fun_id() && self.module.args_eq(&*other.module)
    }
}

impl Eq for LazyModuleWithArgs {}

impl Hash for LazyModuleWithArgs {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.module.fun_id().hash(state);
        state.write_u64(self.module.args_hash());
    }
}

/// Set identity for either module flavor, used by expansion bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ModuleId {
    Plain(LazyModule),
    WithArgs(LazyModuleWithArgs),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One declared fact about the composition graph.
///
/// The expander pops these off an explicit stack; every variant is dispatched
/// by pattern match and the kind set is closed.
#[derive(Debug, Clone)]
pub enum Record {
    /// Deferred install of a module with no captured arguments.
    Install(LazyModule),
    /// Deferred install of a parameterized module.
    InstallWithArgs(LazyModuleWithArgs),
    /// Stack sentinel: the module's expansion is in progress. Carries the
    /// same identity as the [`Record::Install`] it replaced.
    Expanded(LazyModule),
    /// Stack sentinel for the parameterized flavor.
    ExpandedWithArgs(LazyModuleWithArgs),
    /// A concrete binding: `key` is produced by `provision`.
    Bind { key: TypeKey, provision: Provision },
    /// One contribution to a multibound key. Unlike [`Record::Bind`], many of
    /// these may coexist for one key. Always pushed adjacent to its
    /// [`Record::CollectionBuilder`].
    BindInCollection { key: TypeKey, provision: Provision },
    /// The function that turns a multibound key's accumulated elements into
    /// the public collection value. Always pushed adjacent to its
    /// [`Record::BindInCollection`].
    CollectionBuilder { key: TypeKey, collect: CollectFn },
    /// Compression hint: `iface` is a pure forwarding binding to `target`,
    /// and `create` builds the target value directly into `iface`'s slot.
    Forward {
        iface: TypeKey,
        target: TypeKey,
        create: CreateFn,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
