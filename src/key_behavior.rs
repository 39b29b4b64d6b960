//! Pluggable key behavior for `ChainHashMap`: hashing, equality and key
//! duplication, resolved at construction time.

use crate::error::{Error, Result};
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use hashbrown::DefaultHashBuilder;

/// Hash, equality and duplication slots of a hash table.
///
/// `Key` is the borrowed form callers look up with; `Stored` is the owned
/// copy the table keeps for every entry. The table hashes a key exactly
/// once, on insertion, and caches the result for rehashing.
pub trait KeyBehavior {
    type Key: ?Sized;
    type Stored;

    fn hash(&self, key: &Self::Key) -> u32;

    fn key_eq(&self, probe: &Self::Key, stored: &Self::Stored) -> bool;

    /// Produce the table-owned copy of a key. Allocation failure is
    /// reported, never fatal.
    fn duplicate(&self, key: &Self::Key) -> Result<Self::Stored>;
}

/// Default behavior: keys are byte strings terminated by the first NUL
/// byte (or the end of the slice), hashed with djb2.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NulTerminated;

/// The bytes of `key` before its first NUL.
#[inline]
pub fn terminated(key: &[u8]) -> &[u8] {
    match key.iter().position(|&b| b == 0) {
        Some(end) => &key[..end],
        None => key,
    }
}

/// djb2 (`h * 33 + c`, seeded with 5381). Bytes are folded in as signed
/// chars, so bytes above 0x7f contribute their sign-extended value.
pub fn djb2(key: &[u8]) -> u32 {
    terminated(key).iter().fold(5381u32, |h, &c| {
        (h << 5).wrapping_add(h).wrapping_add(c as i8 as u32)
    })
}

impl KeyBehavior for NulTerminated {
    type Key = [u8];
    type Stored = Box<[u8]>;

    #[inline]
    fn hash(&self, key: &[u8]) -> u32 {
        djb2(key)
    }

    #[inline]
    fn key_eq(&self, probe: &[u8], stored: &Box<[u8]>) -> bool {
        terminated(probe) == terminated(stored)
    }

    fn duplicate(&self, key: &[u8]) -> Result<Box<[u8]>> {
        let key = terminated(key);
        let mut copy = Vec::new();
        copy.try_reserve_exact(key.len())
            .map_err(Error::alloc("duplicating a key"))?;
        copy.extend_from_slice(key);
        Ok(copy.into_boxed_slice())
    }
}

/// Behavior for any `K: Hash + Eq + Clone`, hashed through a
/// `BuildHasher` and truncated to 32 bits.
pub struct HashEq<K, S = DefaultHashBuilder> {
    hasher: S,
    _key: PhantomData<fn(&K)>,
}

impl<K, S> HashEq<K, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            _key: PhantomData,
        }
    }
}

impl<K, S: Default> Default for HashEq<K, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, S: Clone> Clone for HashEq<K, S> {
    fn clone(&self) -> Self {
        Self::with_hasher(self.hasher.clone())
    }
}

impl<K, S> core::fmt::Debug for HashEq<K, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashEq").finish_non_exhaustive()
    }
}

impl<K, S> KeyBehavior for HashEq<K, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    type Key = K;
    type Stored = K;

    #[inline]
    fn hash(&self, key: &K) -> u32 {
        self.hasher.hash_one(key) as u32
    }

    #[inline]
    fn key_eq(&self, probe: &K, stored: &K) -> bool {
        probe == stored
    }

    fn duplicate(&self, key: &K) -> Result<K> {
        Ok(key.clone())
    }
}
