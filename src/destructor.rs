//! Destructor capability: decides whether a value leaving a container is
//! handed back to the caller or consumed.

/// Called exactly once for every value that leaves a container through
/// overwrite, erase, remove, clear or teardown.
///
/// Returning `Some` hands ownership back to the caller (no destructor
/// configured). Returning `None` means the value was consumed, and the
/// operation reports "no previous value".
pub trait Destructor<V> {
    fn release(&mut self, value: V) -> Option<V>;
}

/// Default: no destructor. Overwritten or removed values are returned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Keep;

impl<V> Destructor<V> for Keep {
    #[inline]
    fn release(&mut self, value: V) -> Option<V> {
        Some(value)
    }
}

/// A configured destructor. The container owns cleanup of stored values.
#[derive(Clone, Copy, Debug)]
pub struct DestroyWith<F>(pub F);

impl<V, F> Destructor<V> for DestroyWith<F>
where
    F: FnMut(V),
{
    #[inline]
    fn release(&mut self, value: V) -> Option<V> {
        (self.0)(value);
        None
    }
}
