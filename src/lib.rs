//! handle-index: two single-threaded, in-memory indexing containers.
//!
//! Internal Design:
//!
//! Summary
//! - `ChainHashMap<V, B, D>`: separate-chaining hash table. Keys are
//!   duplicated into the table on first insert; values are released through
//!   a destructor capability on overwrite, erase, clear and drop. The table
//!   grows to `ceil(1.5 * buckets) + 1` buckets as soon as an insert pushes
//!   the load factor above its maximum (0.75 by default).
//! - `AaTree<T, D>`: AA tree keyed by `u32`. Callers allocate nodes in the
//!   tree's arena, then link them in by key. Skew and split keep the tree
//!   balanced on insert and remove.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` where caller callbacks run, no locks.
//! - Entry records and tree nodes live in `slotmap` arenas; handles are
//!   generational and never alias a newer node.
//! - Allocation failure at creation, growth, explicit rehash and key
//!   duplication is reported as [`Error::Alloc`], leaving the container
//!   unchanged.
//! - Missing keys are not errors; they yield `None`.
//!
//! Pluggable behavior
//! - Hash, equality and key duplication come from a [`KeyBehavior`]
//!   resolved at construction. [`NulTerminated`] (djb2 over NUL-terminated
//!   bytes) is the default; [`HashEq`] adapts any `Hash + Eq + Clone` key.
//! - The destructor is a [`Destructor`]. [`Keep`] (the default) hands
//!   replaced and removed values back to the caller; [`DestroyWith`]
//!   consumes them, and the operation then reports no previous value.
//!
//! Hashing and rehashing
//! - Each entry caches its 32-bit hash. Rehash relinks entries using the
//!   cached hash and never calls back into the key behavior, so key copies
//!   are not recreated.
//!
//! Tree removal
//! - Removal follows Andersson's scheme: the descent records the last node
//!   visited and the candidate match, the in-order successor is spliced out
//!   at the bottom, and the unwind path rebalances. The successor then takes
//!   over the matched node's position, so every live handle keeps its key
//!   and payload. The removed payload is released only after the tree is
//!   consistent again.

pub mod aa_tree;
mod aa_tree_proptest;
pub mod chain_hash_map;
mod chain_hash_map_proptest;
pub mod config;
pub mod destructor;
pub mod error;
pub mod key_behavior;
mod reentrancy;

// Public surface
pub use aa_tree::{AaTree, NodeHandle};
pub use chain_hash_map::ChainHashMap;
pub use config::TableConfig;
pub use destructor::{DestroyWith, Destructor, Keep};
pub use error::{Error, InsertError, Result};
pub use key_behavior::{HashEq, KeyBehavior, NulTerminated};
