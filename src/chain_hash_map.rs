//! ChainHashMap: separate-chaining hash table with pluggable key behavior,
//! an optional value destructor and automatic growth.

use crate::config::{grown_bucket_count, validate_load_factor, TableConfig, DEFAULT_BUCKETS};
use crate::destructor::{Destructor, Keep};
use crate::error::{Error, Result};
use crate::key_behavior::{KeyBehavior, NulTerminated};
use crate::reentrancy::DebugReentrancy;
use core::mem;
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, trace};

new_key_type! {
    struct EntryKey;
}

#[derive(Debug)]
struct Entry<S, V> {
    key: S,
    value: V,
    // Cached at insertion; rehash never calls back into the key behavior.
    hash: u32,
    next: Option<EntryKey>,
}

type Buckets = Vec<Option<EntryKey>>;

pub struct ChainHashMap<V, B = NulTerminated, D = Keep>
where
    B: KeyBehavior,
    D: Destructor<V>,
{
    buckets: Buckets,
    slots: SlotMap<EntryKey, Entry<B::Stored, V>>,
    max_load_factor: f32,
    behavior: B,
    destructor: D,
    reentrancy: DebugReentrancy,
}

impl<V> ChainHashMap<V> {
    /// Table with the default 100 buckets and default behaviors.
    pub fn new() -> Self {
        Self::from_parts(
            vec![None; DEFAULT_BUCKETS],
            TableConfig::default().max_load_factor,
            NulTerminated,
            Keep,
        )
    }

    /// Table with `hint` buckets (100 if zero) and default behaviors.
    pub fn with_buckets(hint: usize) -> Result<Self> {
        Self::with_config(
            TableConfig::default().with_initial_buckets(hint),
            NulTerminated,
            Keep,
        )
    }
}

impl<V> Default for ChainHashMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over `(stored key, value)` pairs in unspecified order.
pub struct Iter<'a, S, V> {
    it: slotmap::basic::Values<'a, EntryKey, Entry<S, V>>,
}

impl<'a, S, V> Iterator for Iter<'a, S, V> {
    type Item = (&'a S, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|e| (&e.key, &e.value))
    }
}

/// Iterator over `(stored key, mutable value)` pairs.
pub struct IterMut<'a, S, V> {
    it: slotmap::basic::ValuesMut<'a, EntryKey, Entry<S, V>>,
}

impl<'a, S, V> Iterator for IterMut<'a, S, V> {
    type Item = (&'a S, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|e| (&e.key, &mut e.value))
    }
}

fn alloc_buckets(n: usize) -> Result<Buckets> {
    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(n)
        .map_err(Error::alloc("allocating the bucket array"))?;
    buckets.resize(n, None);
    Ok(buckets)
}

impl<V, B, D> ChainHashMap<V, B, D>
where
    B: KeyBehavior,
    D: Destructor<V>,
{
    pub fn with_config(config: TableConfig, behavior: B, destructor: D) -> Result<Self> {
        config.validate()?;
        let buckets = alloc_buckets(config.bucket_count())?;
        Ok(Self::from_parts(
            buckets,
            config.max_load_factor,
            behavior,
            destructor,
        ))
    }

    fn from_parts(buckets: Buckets, max_load_factor: f32, behavior: B, destructor: D) -> Self {
        Self {
            buckets,
            slots: SlotMap::with_key(),
            max_load_factor,
            behavior,
            destructor,
            reentrancy: DebugReentrancy::new("ChainHashMap"),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// `len / bucket_count`.
    pub fn load_factor(&self) -> f32 {
        self.slots.len() as f32 / self.buckets.len() as f32
    }

    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    /// Takes effect at the next insertion of a new key.
    pub fn set_max_load_factor(&mut self, max: f32) -> Result<()> {
        validate_load_factor(max)?;
        self.max_load_factor = max;
        Ok(())
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    #[inline]
    fn bucket_of(&self, hash: u32) -> usize {
        hash as usize % self.buckets.len()
    }

    fn locate(&self, bucket: usize, hash: u32, key: &B::Key) -> Option<EntryKey> {
        let mut cur = self.buckets[bucket];
        while let Some(k) = cur {
            let e = &self.slots[k];
            if e.hash == hash && self.behavior.key_eq(key, &e.key) {
                return Some(k);
            }
            cur = e.next;
        }
        None
    }

    pub fn find(&self, key: &B::Key) -> Option<&V> {
        let _g = self.reentrancy.enter();
        let hash = self.behavior.hash(key);
        let k = self.locate(self.bucket_of(hash), hash, key)?;
        self.slots.get(k).map(|e| &e.value)
    }

    pub fn find_mut(&mut self, key: &B::Key) -> Option<&mut V> {
        let _g = self.reentrancy.enter();
        let hash = self.behavior.hash(key);
        let k = self.locate(self.bucket_of(hash), hash, key)?;
        self.slots.get_mut(k).map(|e| &mut e.value)
    }

    pub fn contains_key(&self, key: &B::Key) -> bool {
        self.find(key).is_some()
    }

    /// Insert or overwrite.
    ///
    /// On overwrite the old value goes through the destructor: `Ok(Some(old))`
    /// when it is handed back, `Ok(None)` when it was destroyed. A new key
    /// yields `Ok(None)`. When the new entry pushes the load factor above the
    /// maximum, the table grows to `ceil(1.5 * buckets) + 1` before returning.
    ///
    /// Errors leave the table unchanged: the key copy and any grown bucket
    /// array are allocated before anything is linked.
    pub fn insert(&mut self, key: &B::Key, value: V) -> Result<Option<V>> {
        let g = self.reentrancy.enter();
        let hash = self.behavior.hash(key);
        let bucket = self.bucket_of(hash);

        if let Some(k) = self.locate(bucket, hash, key) {
            let old = mem::replace(&mut self.slots[k].value, value);
            drop(g);
            return Ok(self.destructor.release(old));
        }

        let stored = self.behavior.duplicate(key)?;
        let after = (self.slots.len() + 1) as f32 / self.buckets.len() as f32;
        let grown = if after > self.max_load_factor {
            Some(alloc_buckets(grown_bucket_count(self.buckets.len()))?)
        } else {
            None
        };

        let k = self.slots.insert(Entry {
            key: stored,
            value,
            hash,
            next: self.buckets[bucket],
        });
        self.buckets[bucket] = Some(k);
        drop(g);

        if let Some(fresh) = grown {
            self.splice_into(fresh, true);
        }
        Ok(None)
    }

    /// Remove `key`. The value goes through the destructor, so this returns
    /// `None` either when the key is absent or when the value was destroyed.
    pub fn erase(&mut self, key: &B::Key) -> Option<V> {
        let entry = self.unlink(key)?;
        self.destructor.release(entry.value)
    }

    fn unlink(&mut self, key: &B::Key) -> Option<Entry<B::Stored, V>> {
        let _g = self.reentrancy.enter();
        let hash = self.behavior.hash(key);
        let bucket = self.bucket_of(hash);

        let mut prev: Option<EntryKey> = None;
        let mut cur = self.buckets[bucket];
        let found = loop {
            let k = cur?;
            let e = &self.slots[k];
            if e.hash == hash && self.behavior.key_eq(key, &e.key) {
                break k;
            }
            prev = Some(k);
            cur = e.next;
        };

        let next = self.slots[found].next;
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.buckets[bucket] = next,
        }
        self.slots.remove(found)
    }

    /// Remove every entry, releasing each value through the destructor.
    /// The bucket array keeps its size.
    pub fn clear(&mut self) {
        let n = self.slots.len();
        self.buckets.iter_mut().for_each(|b| *b = None);
        for (_, e) in self.slots.drain() {
            drop(self.destructor.release(e.value));
        }
        trace!(entries = n, "cleared chain hash map");
    }

    /// Redistribute every entry over `new_bucket_count` buckets. Entries and
    /// their key copies are relinked, not recreated. Zero is a no-op.
    pub fn rehash(&mut self, new_bucket_count: usize) -> Result<()> {
        if new_bucket_count == 0 {
            return Ok(());
        }
        let fresh = alloc_buckets(new_bucket_count)?;
        self.splice_into(fresh, false);
        Ok(())
    }

    fn splice_into(&mut self, fresh: Buckets, automatic: bool) {
        let from = self.buckets.len();
        let to = fresh.len();
        let old = mem::replace(&mut self.buckets, fresh);
        for head in old {
            let mut cur = head;
            while let Some(k) = cur {
                let e = &mut self.slots[k];
                cur = e.next;
                let b = e.hash as usize % to;
                e.next = self.buckets[b];
                self.buckets[b] = Some(k);
            }
        }
        debug!(
            from,
            to,
            entries = self.slots.len(),
            automatic,
            "rehashed chain hash map"
        );
    }

    /// Number of entries chained in `bucket`; 0 for out-of-range buckets.
    pub fn chain_len(&self, bucket: usize) -> usize {
        let mut cur = self.buckets.get(bucket).copied().flatten();
        let mut n = 0;
        while let Some(k) = cur {
            n += 1;
            cur = self.slots[k].next;
        }
        n
    }

    pub fn iter(&self) -> Iter<'_, B::Stored, V> {
        Iter {
            it: self.slots.values(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, B::Stored, V> {
        IterMut {
            it: self.slots.values_mut(),
        }
    }
}

impl<V, B, D> Drop for ChainHashMap<V, B, D>
where
    B: KeyBehavior,
    D: Destructor<V>,
{
    fn drop(&mut self) {
        self.clear();
    }
}
