#![cfg(test)]

// Property tests for ChainHashMap kept inside the crate so they can use the
// test-only accessors and custom key behaviors.

use crate::chain_hash_map::ChainHashMap;
use crate::config::TableConfig;
use crate::destructor::{DestroyWith, Keep};
use crate::error::Result;
use crate::key_behavior::{KeyBehavior, NulTerminated};
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

// Pool-indexed operations so shrinking moves toward earlier keys and
// shorter op lists.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Erase(usize),
    Find(usize),
    Rehash(usize),
    Clear,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<Vec<u8>>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=12).prop_flat_map(|pool| {
        let pool: Vec<Vec<u8>> = pool.into_iter().map(String::into_bytes).collect();
        let idx = 0..pool.len();
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            3 => idx.clone().prop_map(Op::Erase),
            3 => idx.clone().prop_map(Op::Find),
            1 => (0usize..40).prop_map(Op::Rehash),
            1 => Just(Op::Clear),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Every key lands in one chain; equality and duplication as the default.
#[derive(Clone, Copy, Default)]
struct Colliding;
impl KeyBehavior for Colliding {
    type Key = [u8];
    type Stored = Box<[u8]>;
    fn hash(&self, _key: &[u8]) -> u32 {
        7
    }
    fn key_eq(&self, probe: &[u8], stored: &Box<[u8]>) -> bool {
        NulTerminated.key_eq(probe, stored)
    }
    fn duplicate(&self, key: &[u8]) -> Result<Box<[u8]>> {
        NulTerminated.duplicate(key)
    }
}

fn run_against_model<B>(
    mut sut: ChainHashMap<i32, B>,
    pool: &[Vec<u8>],
    ops: Vec<Op>,
) -> std::result::Result<(), TestCaseError>
where
    B: KeyBehavior<Key = [u8], Stored = Box<[u8]>>,
{
    let mut model: HashMap<Vec<u8>, i32> = HashMap::new();
    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = &pool[i];
                let prev = sut.insert(k, v).expect("insert");
                prop_assert_eq!(prev, model.insert(k.clone(), v));
                prop_assert_eq!(sut.find(k), Some(&v));
            }
            Op::Erase(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.erase(k), model.remove(k));
                prop_assert!(sut.find(k).is_none());
            }
            Op::Find(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.find(k), model.get(k));
            }
            Op::Rehash(n) => {
                let before = sut.bucket_count();
                sut.rehash(n).expect("rehash");
                prop_assert_eq!(sut.bucket_count(), if n == 0 { before } else { n });
                for (k, v) in &model {
                    prop_assert_eq!(sut.find(k), Some(v));
                }
            }
            Op::Clear => {
                let buckets = sut.bucket_count();
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.bucket_count(), buckets);
            }
            Op::Iterate => {
                let seen: BTreeSet<(Vec<u8>, i32)> =
                    sut.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
                let expected: BTreeSet<(Vec<u8>, i32)> =
                    model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(seen, expected);
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        let chained: usize = (0..sut.bucket_count()).map(|b| sut.chain_len(b)).sum();
        prop_assert_eq!(chained, model.len());
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// - Overwrite returns the prior value (no destructor configured).
// - Erase returns the removed value; absent keys yield None.
// - Explicit rehash keeps membership and size; zero is a no-op.
// - Every entry is reachable from exactly one chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut = ChainHashMap::with_buckets(3).expect("create");
        run_against_model(sut, &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut = ChainHashMap::with_config(TableConfig::default().with_initial_buckets(5), Colliding, Keep)
            .expect("create");
        run_against_model(sut, &pool, ops)?;
    }
}

// Property: with default growth, the load factor never exceeds the maximum
// once an insert returns, and growth never loses entries.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_load_factor_bounded(hint in 0usize..20, n in 0usize..400) {
        let mut m = ChainHashMap::with_buckets(hint).expect("create");
        for i in 0..n {
            m.insert(format!("key{i}").as_bytes(), i).expect("insert");
            prop_assert!(m.load_factor() <= m.max_load_factor(),
                "load {} over max after {} inserts", m.load_factor(), i + 1);
        }
        prop_assert_eq!(m.len(), n);
        for i in 0..n {
            prop_assert_eq!(m.find(format!("key{i}").as_bytes()), Some(&i));
        }
    }
}

// Property: with a destructor configured, every stored value is destroyed
// exactly once across overwrite/erase/clear/drop, never while still stored,
// and the caller never receives a value back.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_destructor_runs_once_per_value((pool, ops) in arb_scenario()) {
        let destroyed: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = destroyed.clone();
        let mut sut = ChainHashMap::with_config(
            TableConfig::default().with_initial_buckets(2),
            NulTerminated,
            DestroyWith(move |id: u64| sink.borrow_mut().push(id)),
        ).expect("create");
        let mut live: HashMap<Vec<u8>, u64> = HashMap::new();
        let mut next_id = 0u64;

        for op in ops {
            match op {
                Op::Insert(i, _) => {
                    let k = &pool[i];
                    let id = next_id;
                    next_id += 1;
                    prop_assert_eq!(sut.insert(k, id).expect("insert"), None);
                    live.insert(k.clone(), id);
                }
                Op::Erase(i) => {
                    prop_assert_eq!(sut.erase(&pool[i]), None);
                    live.remove(&pool[i]);
                }
                Op::Find(i) => prop_assert_eq!(sut.find(&pool[i]), live.get(&pool[i])),
                Op::Rehash(n) => sut.rehash(n).expect("rehash"),
                Op::Clear => {
                    sut.clear();
                    live.clear();
                }
                Op::Iterate => {}
            }
            let dead: BTreeSet<u64> = destroyed.borrow().iter().copied().collect();
            prop_assert_eq!(dead.len(), destroyed.borrow().len(), "double destroy");
            for id in live.values() {
                prop_assert!(!dead.contains(id), "live value {} destroyed", id);
            }
            prop_assert_eq!(dead.len() + live.len(), next_id as usize);
        }

        drop(sut);
        let mut all = destroyed.borrow().clone();
        all.sort_unstable();
        prop_assert_eq!(all, (0..next_id).collect::<Vec<_>>());
    }
}
