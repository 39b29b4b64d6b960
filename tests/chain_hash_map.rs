// ChainHashMap public API tests.
//
// Each test documents the behavior being verified. Core invariants:
// - Round trip: find returns the value most recently inserted for a key.
// - Overwrite: without a destructor the old value comes back; with one it
//   is destroyed once and the caller sees no previous value.
// - Growth: the load factor is back under the maximum when insert returns.
// - Rehash: membership and size survive any explicit or automatic rehash.
use handle_index::{
    ChainHashMap, DestroyWith, Error, HashEq, KeyBehavior, Keep, NulTerminated, Result,
    TableConfig,
};
use std::cell::Cell;
use std::rc::Rc;

// Test: the a/b/a scenario with default behaviors.
// Verifies: last write wins per key; size counts distinct keys.
#[test]
fn default_behaviors_scenario() {
    let mut m = ChainHashMap::new();
    m.insert(b"a", 1).unwrap();
    m.insert(b"b", 2).unwrap();
    m.insert(b"a", 3).unwrap();
    assert_eq!(m.find(b"a"), Some(&3));
    assert_eq!(m.find(b"b"), Some(&2));
    assert_eq!(m.len(), 2);
}

// Test: values can be borrowed data the table does not own.
// Verifies: storing references works and erase hands them back.
#[test]
fn borrowed_values() {
    let one = String::from("one");
    let two = String::from("two");
    let mut m: ChainHashMap<&String> = ChainHashMap::new();
    m.insert(b"1", &one).unwrap();
    assert_eq!(m.insert(b"1", &two).unwrap(), Some(&one));
    assert_eq!(m.erase(b"1"), Some(&two));
    assert!(m.is_empty());
}

// Test: destructor call count across overwrite, erase, clear and drop.
// Verifies: exactly one call per stored value, none for values still stored.
#[test]
fn destructor_counts() {
    let calls = Rc::new(Cell::new(0));
    let c = calls.clone();
    let mut m = ChainHashMap::with_config(
        TableConfig::default(),
        NulTerminated,
        DestroyWith(move |_: Box<u64>| c.set(c.get() + 1)),
    )
    .unwrap();

    m.insert(b"a", Box::new(1)).unwrap();
    m.insert(b"b", Box::new(2)).unwrap();
    m.insert(b"c", Box::new(3)).unwrap();
    assert_eq!(calls.get(), 0);

    assert!(m.insert(b"a", Box::new(10)).unwrap().is_none());
    assert_eq!(calls.get(), 1);

    assert!(m.erase(b"b").is_none());
    assert_eq!(calls.get(), 2);
    assert!(m.erase(b"b").is_none());
    assert_eq!(calls.get(), 2, "absent key must not call the destructor");

    m.clear();
    assert_eq!(calls.get(), 4);

    m.insert(b"d", Box::new(4)).unwrap();
    drop(m);
    assert_eq!(calls.get(), 5);
}

// Test: automatic growth sequence from the default 100 buckets.
// Verifies: 75 entries fit, the 76th grows to 151, then 114 fit before 228.
#[test]
fn growth_sequence_from_default() {
    let mut m = ChainHashMap::new();
    let key = |i: usize| format!("k{i}").into_bytes();
    for i in 0..75 {
        m.insert(&key(i), i).unwrap();
    }
    assert_eq!(m.bucket_count(), 100);
    m.insert(&key(75), 75).unwrap();
    assert_eq!(m.bucket_count(), 151);
    for i in 76..113 {
        m.insert(&key(i), i).unwrap();
    }
    assert_eq!(m.bucket_count(), 151);
    m.insert(&key(113), 113).unwrap();
    assert_eq!(m.bucket_count(), 228);
    for i in 0..114 {
        assert_eq!(m.find(&key(i)), Some(&i));
    }
    assert!(m.load_factor() <= 0.75);
}

// Test: overwriting never triggers growth.
// Verifies: bucket count and size are stable under repeated overwrites.
#[test]
fn overwrite_never_grows() {
    let mut m = ChainHashMap::with_buckets(2).unwrap();
    m.insert(b"x", 0).unwrap();
    for i in 1..100 {
        assert_eq!(m.insert(b"x", i).unwrap(), Some(i - 1));
    }
    assert_eq!(m.bucket_count(), 2);
    assert_eq!(m.len(), 1);
}

// Test: a caller-supplied behavior for case-insensitive ASCII keys.
// Verifies: custom hash/equality/duplication slots are honored end to end.
#[test]
fn custom_key_behavior() {
    struct CaseInsensitive;
    impl KeyBehavior for CaseInsensitive {
        type Key = str;
        type Stored = String;
        fn hash(&self, key: &str) -> u32 {
            key.bytes()
                .fold(5381u32, |h, c| h.wrapping_mul(33) ^ u32::from(c.to_ascii_lowercase()))
        }
        fn key_eq(&self, probe: &str, stored: &String) -> bool {
            probe.eq_ignore_ascii_case(stored)
        }
        fn duplicate(&self, key: &str) -> Result<String> {
            Ok(key.to_ascii_lowercase())
        }
    }

    let mut m = ChainHashMap::with_config(TableConfig::default(), CaseInsensitive, Keep).unwrap();
    m.insert("Hello", 1).unwrap();
    assert_eq!(m.insert("HELLO", 2).unwrap(), Some(1));
    assert_eq!(m.find("hello"), Some(&2));
    assert_eq!(m.len(), 1);
    let keys: Vec<&String> = m.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["hello"]);
}

// Test: HashEq adapts ordinary Rust keys.
// Verifies: integer keys round-trip through insert/find/erase and rehash.
#[test]
fn hash_eq_integer_keys() {
    let mut m: ChainHashMap<u64, HashEq<u64>> =
        ChainHashMap::with_config(TableConfig::default().with_initial_buckets(1), HashEq::default(), Keep)
            .unwrap();
    for k in 0..1000u64 {
        m.insert(&k, k * 2).unwrap();
    }
    assert_eq!(m.len(), 1000);
    assert!(m.load_factor() <= m.max_load_factor());
    m.rehash(10).unwrap();
    for k in 0..1000u64 {
        assert_eq!(m.find(&k), Some(&(k * 2)));
    }
    for k in (0..1000u64).step_by(2) {
        assert_eq!(m.erase(&k), Some(k * 2));
    }
    assert_eq!(m.len(), 500);
    assert!(!m.contains_key(&0));
    assert!(m.contains_key(&1));
}

// Test: a raised maximum load factor delays growth.
// Verifies: configuration is honored at construction and at runtime.
#[test]
fn configured_load_factor() {
    let cfg = TableConfig::default()
        .with_initial_buckets(10)
        .with_max_load_factor(2.0);
    let mut m = ChainHashMap::with_config(cfg, NulTerminated, Keep).unwrap();
    for i in 0..20u32 {
        m.insert(format!("{i}").as_bytes(), i).unwrap();
    }
    assert_eq!(m.bucket_count(), 10);
    m.insert(b"20", 20).unwrap();
    assert_eq!(m.bucket_count(), 16);

    assert_eq!(
        m.set_max_load_factor(0.0),
        Err(Error::InvalidLoadFactor(0.0))
    );
}
