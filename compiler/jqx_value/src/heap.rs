//! Shared storage for heap-backed values.
//!
//! `Heap<T>` is the only allocation path for strings, arrays, objects and
//! invalid payloads. Cloning a `Heap` adds a share; dropping the last share
//! releases the storage. The constructor is crate-private so every allocation
//! goes through the factory methods on [`Value`](crate::Value).
//!
//! Releasing the last share of a nested array drops its elements, which
//! release their own storage, and so on down. That chain is as deep as the
//! value is nested, so each release runs under `ensure_sufficient_stack`.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use jqx_stack::ensure_sufficient_stack;

/// A reference-counted, immutable-once-shared allocation.
///
/// The share is `None` only while `Drop` hands it off.
pub struct Heap<T: ?Sized>(Option<Arc<T>>);

impl<T> Heap<T> {
    #[inline]
    pub(crate) fn new(value: T) -> Self {
        Heap(Some(Arc::new(value)))
    }
}

impl<T: Clone> Heap<T> {
    /// Mutable access for a persistent update.
    ///
    /// When this handle is the only share the storage is reused, otherwise the
    /// outer container is cloned first. Children are handles themselves, so
    /// the clone only bumps their share counts.
    #[inline]
    pub(crate) fn make_mut(&mut self) -> &mut T {
        Arc::make_mut(self.share_mut())
    }

    /// Take the contents out, cloning only when other shares exist.
    #[inline]
    pub(crate) fn into_inner(mut self) -> T {
        match self.0.take() {
            Some(share) => Arc::try_unwrap(share).unwrap_or_else(|shared| (*shared).clone()),
            None => unreachable!("heap share taken before drop"),
        }
    }
}
impl<T: ?Sized> Heap<T> {
    #[inline]
    fn share(&self) -> &Arc<T> {
        match &self.0 {
            Some(share) => share,
            None => unreachable!("heap share taken before drop"),
        }
    }

    #[inline]
    fn share_mut(&mut self) -> &mut Arc<T> {
        match &mut self.0 {
            Some(share) => share,
            None => unreachable!("heap share taken before drop"),
        }
    }

    /// Number of live handles to this allocation.
    #[inline]
    pub fn share_count(this: &Self) -> usize {
        Arc::strong_count(this.share())
    }

    /// Whether two handles view the same allocation.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(a.share(), b.share())
    }
}

impl<T: ?Sized> Drop for Heap<T> {
    fn drop(&mut self) {
        if let Some(share) = self.0.take() {
            ensure_sufficient_stack(move || drop(share));
        }
    }
}

impl<T: ?Sized> Deref for Heap<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        self.share()
    }
}

impl<T: ?Sized> Clone for Heap<T> {
    #[inline]
    fn clone(&self) -> Self {
        Heap(Some(Arc::clone(self.share())))
    }
}

impl<T: ?Sized + PartialEq> PartialEq for Heap<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Heap::ptr_eq(self, other) || **self == **other
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Heap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized> AsRef<T> for Heap<T> {
    #[inline]
    fn as_ref(&self) -> &T {
        self
    }
}
