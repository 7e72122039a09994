#![no_main]

//! Drives the normalizer with byte-derived module trees.
//!
//! Inputs are conflict-free by construction: every generated binding derives
//! its recipe and storage kind from its key slot alone, and install chains
//! shrink a depth budget, so the fatal paths (which exit the process) are
//! unreachable and any abort is a real bug.

use libfuzzer_sys::fuzz_target;
use trellis_core::{
    ArgModule, CreateFn, LazyModuleWithArgs, NormalizeOptions, Provision, Record, SharedInstance,
    TypeKey, normalize, shared,
};

struct K0;
struct K1(#[allow(dead_code)] u64);
struct K2(#[allow(dead_code)] u32);
struct K3(#[allow(dead_code)] [u8; 5]);
struct K4(#[allow(dead_code)] u128);
struct K5(#[allow(dead_code)] u16);
struct K6;
struct K7(#[allow(dead_code)] [u64; 2]);

const KEYS: usize = 8;

fn key(slot: usize) -> TypeKey {
    match slot % KEYS {
        0 => TypeKey::of::<K0>(),
        1 => TypeKey::of::<K1>(),
        2 => TypeKey::of::<K2>(),
        3 => TypeKey::of::<K3>(),
        4 => TypeKey::of::<K4>(),
        5 => TypeKey::of::<K5>(),
        6 => TypeKey::of::<K6>(),
        _ => TypeKey::of::<K7>(),
    }
}

fn make0(_deps: &[SharedInstance]) -> SharedInstance {
    shared(0_u8)
}

fn make1(_deps: &[SharedInstance]) -> SharedInstance {
    shared(1_u8)
}

fn recipe(slot: usize) -> CreateFn {
    if slot % 2 == 0 { make0 } else { make1 }
}

fn collect_all(_elems: &[SharedInstance]) -> SharedInstance {
    shared(())
}

fn provision(slot: usize) -> Provision {
    let slot = slot % KEYS;
    if slot % 3 == 2 {
        Provision::external(recipe(slot), &[])
    } else {
        Provision::owned(recipe(slot), &[])
    }
}

/// A module whose declarations are a pure function of the spec bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NodeSpec {
    depth: u8,
    bytes: [u8; 4],
}

fn node_module(spec: &NodeSpec, out: &mut Vec<Record>) {
    for (i, byte) in spec.bytes.iter().enumerate() {
        let slot = usize::from(*byte) % KEYS;
        match byte % 5 {
            0 | 1 => out.push(Record::Bind {
                key: key(slot),
                provision: provision(slot),
            }),
            2 => {
                out.push(Record::CollectionBuilder {
                    key: key(slot),
                    collect: collect_all,
                });
                out.push(Record::BindInCollection {
                    key: key(slot),
                    provision: provision(slot),
                });
            }
            3 => out.push(Record::Forward {
                iface: key(slot),
                target: key(slot + 1),
                create: recipe(slot),
            }),
            _ => {
                if spec.depth > 0 {
                    out.push(Record::InstallWithArgs(LazyModuleWithArgs::new(
                        ArgModule::new(
                            "node",
                            node_module,
                            NodeSpec {
                                depth: spec.depth - 1,
                                bytes: [
                                    byte.wrapping_mul(31).wrapping_add(i as u8),
                                    spec.bytes[(i + 1) % 4],
                                    spec.bytes[(i + 2) % 4],
                                    spec.depth,
                                ],
                            },
                        ),
                    )));
                }
            }
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut records = Vec::new();
    let mut exposed = Vec::new();
    for chunk in data.chunks(5).take(64) {
        let mut bytes = [0_u8; 4];
        for (slot, byte) in bytes.iter_mut().zip(chunk.iter().skip(1)) {
            *slot = *byte;
        }
        records.push(Record::InstallWithArgs(LazyModuleWithArgs::new(
            ArgModule::new(
                "node",
                node_module,
                NodeSpec {
                    depth: chunk[0] % 4,
                    bytes,
                },
            ),
        )));
        exposed.push(key(usize::from(chunk[0])));
    }

    let compress = data.len() % 2 == 0;
    let normalized = normalize("fuzz", records, &exposed, &NormalizeOptions { compress });
    assert!(normalized.bindings.len() <= KEYS);
});
