//! Debug-only reentrancy guard.
//!
//! `ChainHashMap` calls caller-supplied key behavior (hash and equality)
//! while a chain is being walked or relinked. Safe code cannot reach the
//! map from inside those calls, but interior mutability or raw pointers
//! can; the guard turns such nested entry into a panic in debug builds and
//! compiles to nothing in release builds.

use core::marker::PhantomData;

#[cfg(debug_assertions)]
use core::cell::Cell;

/// Per-container tracker. Entry points open a section with
/// `let _g = self.reentrancy.enter();`.
#[derive(Debug)]
pub(crate) struct DebugReentrancy {
    #[cfg(debug_assertions)]
    active: Cell<bool>,
    #[cfg(debug_assertions)]
    owner: &'static str,
    // !Send + !Sync: the containers are single-threaded.
    _nosend: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    #[cfg_attr(not(debug_assertions), allow(unused_variables))]
    pub(crate) const fn new(owner: &'static str) -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(false),
            #[cfg(debug_assertions)]
            owner,
            _nosend: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn enter(&self) -> Section<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.active.replace(true),
                "reentrancy detected: nested entry into {}",
                self.owner
            );
        }
        Section { _tracker: self }
    }

    #[cfg(all(test, debug_assertions))]
    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }
}

/// RAII section returned by [`DebugReentrancy::enter`].
pub(crate) struct Section<'a> {
    _tracker: &'a DebugReentrancy,
}

impl Drop for Section<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            debug_assert!(self._tracker.active.get());
            self._tracker.active.set(false);
        }
    }
}
