//! End-to-end pipeline tests over the public API.
//!
//! The golden test wires a small but complete application (config, storage
//! behind an interface, collected telemetry sinks) and asserts the exact
//! normalized table, including discovery order, compression, and the storage
//! plan. Expected values are computed by hand from the record semantics, so
//! any change to worklist order or the rewrite rules will show up here.

use std::ptr;
use std::sync::Arc;

use trellis_core::{
    CreateFn, LazyModule, NormalizeOptions, Normalized, Provision, Record, SharedInstance,
    TypeKey, normalize, shared,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// A small application
// ---------------------------------------------------------------------------

struct Cfg {
    #[allow(dead_code)]
    retries: u32,
}

struct Store {
    #[allow(dead_code)]
    buf: [u8; 10],
}

trait StoreApi: Send + Sync {}
impl StoreApi for Store {}

struct Api(#[allow(dead_code)] u64);

trait Sink: Send + Sync {}
struct LogSink;
impl Sink for LogSink {}
struct NetSink;
impl Sink for NetSink {}

fn cfg_key() -> TypeKey {
    TypeKey::of::<Cfg>()
}

fn store_key() -> TypeKey {
    TypeKey::of::<Store>()
}

fn store_iface_key() -> TypeKey {
    TypeKey::of::<Arc<dyn StoreApi>>()
}

fn api_key() -> TypeKey {
    TypeKey::of::<Api>()
}

fn sink_key() -> TypeKey {
    TypeKey::of::<Arc<dyn Sink>>()
}

fn make_cfg(_deps: &[SharedInstance]) -> SharedInstance {
    shared(Cfg { retries: 3 })
}

fn make_store(deps: &[SharedInstance]) -> SharedInstance {
    let _cfg = deps[0].clone().downcast::<Cfg>().unwrap();
    shared(Store { buf: [0; 10] })
}

fn forward_store(deps: &[SharedInstance]) -> SharedInstance {
    let store = deps[0].clone().downcast::<Store>().unwrap();
    let iface: Arc<dyn StoreApi> = store;
    shared(iface)
}

fn fused_store(deps: &[SharedInstance]) -> SharedInstance {
    let _cfg = deps[0].clone().downcast::<Cfg>().unwrap();
    let iface: Arc<dyn StoreApi> = Arc::new(Store { buf: [0; 10] });
    shared(iface)
}

fn make_api(deps: &[SharedInstance]) -> SharedInstance {
    let _store = deps[0].clone().downcast::<Arc<dyn StoreApi>>().unwrap();
    shared(Api(0))
}

fn make_log_sink(_deps: &[SharedInstance]) -> SharedInstance {
    let sink: Arc<dyn Sink> = Arc::new(LogSink);
    shared(sink)
}

fn make_net_sink(_deps: &[SharedInstance]) -> SharedInstance {
    let sink: Arc<dyn Sink> = Arc::new(NetSink);
    shared(sink)
}

fn collect_sinks(elems: &[SharedInstance]) -> SharedInstance {
    shared(elems.to_vec())
}

fn storage(out: &mut Vec<Record>) {
    out.push(Record::Bind {
        key: store_key(),
        provision: Provision::owned(make_store, &[cfg_key()]),
    });
    out.push(Record::Bind {
        key: store_iface_key(),
        provision: Provision::external(forward_store, &[store_key()]),
    });
    out.push(Record::Forward {
        iface: store_iface_key(),
        target: store_key(),
        create: fused_store,
    });
    out.push(Record::Bind {
        key: cfg_key(),
        provision: Provision::owned(make_cfg, &[]),
    });
}

fn telemetry(out: &mut Vec<Record>) {
    // One pair in each adjacency order.
    out.push(Record::CollectionBuilder {
        key: sink_key(),
        collect: collect_sinks,
    });
    out.push(Record::BindInCollection {
        key: sink_key(),
        provision: Provision::owned(make_log_sink, &[]),
    });
    out.push(Record::BindInCollection {
        key: sink_key(),
        provision: Provision::owned(make_net_sink, &[]),
    });
    out.push(Record::CollectionBuilder {
        key: sink_key(),
        collect: collect_sinks,
    });
}

fn app(out: &mut Vec<Record>) {
    out.push(Record::Install(LazyModule::new("storage", storage)));
    out.push(Record::Install(LazyModule::new("telemetry", telemetry)));
    out.push(Record::Bind {
        key: api_key(),
        provision: Provision::owned(make_api, &[store_iface_key()]),
    });
}

fn normalize_app() -> Normalized {
    normalize(
        "app",
        vec![Record::Install(LazyModule::new("app", app))],
        &[api_key()],
        &NormalizeOptions::default(),
    )
}

fn built_by(provision: &Provision, f: CreateFn) -> bool {
    match provision {
        Provision::Owned { create, .. } | Provision::External { create, .. } => {
            ptr::fn_addr_eq(*create, f)
        }
        Provision::Instance(_) => false,
    }
}

fn keys_of(normalized: &Normalized) -> Vec<TypeKey> {
    normalized.bindings.iter().map(|(key, _)| *key).collect()
}

// ---------------------------------------------------------------------------
// Golden pipeline behavior
// ---------------------------------------------------------------------------

#[test]
fn the_normalized_table_is_exact() {
    init_tracing();
    let normalized = normalize_app();

    // Worklist order: Api first (bound directly by app), then storage's
    // records in reverse declaration order, with Store compressed away into
    // its interface entry.
    assert_eq!(keys_of(&normalized), vec![api_key(), cfg_key(), store_iface_key()]);

    let iface = &normalized.bindings[2].1;
    assert!(built_by(iface, fused_store), "interface absorbs the target recipe");
    assert!(
        matches!(iface, Provision::Owned { .. }),
        "rewritten entry keeps the target's storage kind"
    );
    assert_eq!(iface.deps(), &[cfg_key()], "rewritten entry keeps the target's deps");
}

#[test]
fn the_undo_table_reverses_the_compression() {
    let normalized = normalize_app();

    assert_eq!(normalized.undo.len(), 1);
    let undo = &normalized.undo[&store_key()];
    assert_eq!(undo.iface, store_iface_key());
    assert!(built_by(&undo.iface_provision, forward_store));
    assert!(built_by(&undo.target_provision, make_store));
    assert_eq!(undo.target_provision.deps(), &[cfg_key()]);
}

#[test]
fn sink_elements_keep_discovery_order() {
    let normalized = normalize_app();

    assert_eq!(normalized.multibindings.len(), 1);
    let sinks = &normalized.multibindings[&sink_key()];
    assert_eq!(sinks.elements.len(), 2);
    // The records are drained LIFO, so the later-declared pair is
    // discovered first.
    assert!(built_by(&sinks.elements[0], make_net_sink));
    assert!(built_by(&sinks.elements[1], make_log_sink));
}

#[test]
fn the_plan_covers_every_owned_instance_once() {
    let normalized = normalize_app();

    // Owned: Api, Cfg, Store (counted when first seen; compression does not
    // un-count it), and two sink elements. External: the forwarding entry.
    assert_eq!(normalized.alloc.owned_count(), 5);
    assert_eq!(normalized.alloc.external_count(), 1);

    let slack = |key: TypeKey| key.layout().size() + key.layout().align() - 1;
    let expected = slack(api_key())
        + slack(cfg_key())
        + slack(store_key())
        + 2 * slack(sink_key());
    assert_eq!(normalized.alloc.owned_bytes(), expected);
}

#[test]
fn exposing_the_target_keeps_the_forwarding_pair() {
    let normalized = normalize(
        "app",
        vec![Record::Install(LazyModule::new("app", app))],
        &[api_key(), store_key()],
        &NormalizeOptions::default(),
    );
    let keys = keys_of(&normalized);
    assert!(keys.contains(&store_key()));
    assert!(keys.contains(&store_iface_key()));
    assert!(normalized.undo.is_empty());
}

#[test]
fn installing_the_app_twice_changes_nothing() {
    let once = normalize_app();
    let twice = normalize(
        "app",
        vec![
            Record::Install(LazyModule::new("app", app)),
            Record::Install(LazyModule::new("app", app)),
        ],
        &[api_key()],
        &NormalizeOptions::default(),
    );
    assert_eq!(keys_of(&once), keys_of(&twice));
    assert_eq!(once.alloc, twice.alloc);
    assert_eq!(
        once.multibindings[&sink_key()].elements.len(),
        twice.multibindings[&sink_key()].elements.len()
    );
}

// ---------------------------------------------------------------------------
// Deep install chains
// ---------------------------------------------------------------------------

#[test]
fn a_thousand_deep_install_chain_expands_without_recursion() {
    use trellis_core::{ArgModule, LazyModuleWithArgs};

    struct Leaf;
    fn make_leaf(_deps: &[SharedInstance]) -> SharedInstance {
        shared(Leaf)
    }
    fn chain(n: &u32, out: &mut Vec<Record>) {
        if *n == 0 {
            out.push(Record::Bind {
                key: TypeKey::of::<Leaf>(),
                provision: Provision::owned(make_leaf, &[]),
            });
        } else {
            out.push(Record::InstallWithArgs(LazyModuleWithArgs::new(
                ArgModule::new("chain", chain, *n - 1),
            )));
        }
    }

    let normalized = normalize(
        "deep",
        vec![Record::InstallWithArgs(LazyModuleWithArgs::new(
            ArgModule::new("chain", chain, 1500_u32),
        ))],
        &[TypeKey::of::<Leaf>()],
        &NormalizeOptions::default(),
    );
    assert_eq!(normalized.bindings.len(), 1);
    assert_eq!(normalized.alloc.owned_count(), 1);
}
