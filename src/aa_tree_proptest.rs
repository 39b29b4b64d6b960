#![cfg(test)]

// Property tests for AaTree; they check the balance law through the
// crate-internal `check_invariants`.

use crate::aa_tree::{AaTree, NodeHandle};
use crate::destructor::DestroyWith;
use crate::error::InsertError;
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

#[derive(Clone, Debug)]
enum Op {
    Insert(u32),
    Remove(u32),
    Find(u32),
}

fn arb_ops(key_space: u32) -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        5 => (0..key_space).prop_map(Op::Insert),
        3 => (0..key_space).prop_map(Op::Remove),
        2 => (0..key_space).prop_map(Op::Find),
    ];
    proptest::collection::vec(op, 1..200)
}

fn height_bound(n: usize) -> f64 {
    2.0 * ((n + 1) as f64).log2()
}

// Property: state-machine equivalence against BTreeMap.
// - Balance invariants (a)-(e) and search order hold after every operation.
// - Height stays within 2*log2(n+1).
// - Duplicate inserts are rejected and change nothing.
// - find agrees with the model; handles stay bound to their key and payload.
// - In-order iteration yields the model's keys in ascending order.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(ops in arb_ops(64)) {
        let mut sut: AaTree<u32> = AaTree::new();
        let mut model: BTreeMap<u32, u32> = BTreeMap::new();
        let mut handles: BTreeMap<u32, NodeHandle> = BTreeMap::new();
        let mut stale: Vec<NodeHandle> = Vec::new();
        let mut payload = 0u32;

        for op in ops {
            match op {
                Op::Insert(k) => {
                    payload += 1;
                    let n = sut.allocate(payload);
                    match sut.insert(k, n) {
                        Ok(()) => {
                            prop_assert!(!model.contains_key(&k));
                            model.insert(k, payload);
                            handles.insert(k, n);
                        }
                        Err(InsertError::DuplicateKey { key }) => {
                            prop_assert_eq!(key, k);
                            prop_assert!(model.contains_key(&k));
                            prop_assert_eq!(sut.free(n), Some(payload));
                            stale.push(n);
                        }
                        Err(e) => prop_assert!(false, "unexpected error {:?}", e),
                    }
                }
                Op::Remove(k) => {
                    prop_assert_eq!(sut.remove(k), model.remove(&k));
                    if let Some(h) = handles.remove(&k) {
                        stale.push(h);
                    }
                    prop_assert!(sut.find(k).is_none());
                }
                Op::Find(k) => {
                    let found = sut.find(k);
                    prop_assert_eq!(found, handles.get(&k).copied());
                    if let Some(h) = found {
                        prop_assert_eq!(sut.get(h), model.get(&k));
                    }
                }
            }

            if let Err(msg) = sut.check_invariants() {
                prop_assert!(false, "{}", msg);
            }
            prop_assert_eq!(sut.len(), model.len());
            if !model.is_empty() {
                prop_assert!((sut.height() as f64) <= height_bound(model.len()),
                    "height {} for {} nodes", sut.height(), model.len());
            }
            let keys: Vec<u32> = sut.iter().map(|(k, _, _)| k).collect();
            let expected: Vec<u32> = model.keys().copied().collect();
            prop_assert_eq!(keys, expected);
            for (&k, &h) in &handles {
                prop_assert_eq!(sut.key_of(h), Some(k));
            }
            for &h in &stale {
                prop_assert!(sut.get(h).is_none(), "stale handle resolved");
            }
        }
    }
}

// Property: the destructor runs exactly once per removed node and once per
// remaining node at teardown, and never for a node still in the tree.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_destructor_accounting(ops in arb_ops(32)) {
        let destroyed: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = destroyed.clone();
        let mut sut = AaTree::with_destructor(DestroyWith(move |k: u32| sink.borrow_mut().push(k)));
        let mut live: BTreeSet<u32> = BTreeSet::new();
        let mut removed = 0usize;

        for op in ops {
            match op {
                Op::Insert(k) => {
                    let n = sut.allocate(k);
                    if sut.insert(k, n).is_ok() {
                        live.insert(k);
                    } else {
                        prop_assert_eq!(sut.free(n), Some(k));
                    }
                }
                Op::Remove(k) => {
                    prop_assert_eq!(sut.remove(k), None);
                    if live.remove(&k) {
                        removed += 1;
                        prop_assert_eq!(destroyed.borrow().last().copied(), Some(k));
                    }
                }
                Op::Find(_) => {}
            }
            prop_assert_eq!(destroyed.borrow().len(), removed);
        }

        let remaining = live.len();
        sut.destroy();
        prop_assert_eq!(destroyed.borrow().len(), removed + remaining);
        let tail: BTreeSet<u32> = destroyed.borrow()[removed..].iter().copied().collect();
        prop_assert_eq!(tail, live);
    }
}
