//! Reference counting shared by the live tracker and snapshot readers.
//!
//! - RefState: atomic counter embedded into a counted object. Starts at 1 (the self-reference).
//! - Ref<T>: guard owning exactly one count; dropping it releases the count.
//! - Refs<T>: set of guards (one per distinct object); dropping it releases all of them.
//!
//! Once the counter reaches zero the object is tidied (RefCounted::tidy) and can never be
//! referenced again: try_ref() fails, which is how callers notice a concurrently retired object.

use anyhow::{anyhow, Result};
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Atomic reference counter.
#[derive(Debug)]
pub struct RefState {
    count: AtomicUsize,
}

impl Default for RefState {
    fn default() -> Self {
        Self::new()
    }
}

impl RefState {
    /// New counter holding the self-reference.
    pub fn new() -> Self {
        Self {
            count: AtomicUsize::new(1),
        }
    }

    /// Current number of outstanding references.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Increment unless already released (count == 0).
    fn try_increment(&self) -> bool {
        let mut cur = self.count.load(Ordering::Acquire);
        loop {
            if cur == 0 {
                return false;
            }
            match self.count.compare_exchange_weak(
                cur,
                cur + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Decrement; returns the remaining count.
    fn decrement(&self) -> usize {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "reference released more times than acquired");
        prev - 1
    }
}

/// An object participating in the reference protocol.
pub trait RefCounted: Send + Sync {
    fn ref_state(&self) -> &RefState;

    /// Runs exactly once, when the last reference is released.
    fn tidy(&self) {}
}

/// Guard for one counted reference.
pub struct Ref<T: RefCounted> {
    inner: Option<Arc<T>>,
}

impl<T: RefCounted> Ref<T> {
    /// Wrap a fresh object; the returned guard is its self-reference.
    pub fn self_ref(value: T) -> Self {
        Self {
            inner: Some(Arc::new(value)),
        }
    }

    /// Take a new reference; None if the object has already been released.
    pub fn try_ref(target: &Arc<T>) -> Option<Self> {
        if target.ref_state().try_increment() {
            Some(Self {
                inner: Some(Arc::clone(target)),
            })
        } else {
            None
        }
    }

    /// Take a new reference; error if the object has already been released.
    pub fn acquire(target: &Arc<T>) -> Result<Self> {
        Self::try_ref(target).ok_or_else(|| anyhow!("attempted to reference an already released object"))
    }

    pub fn get(&self) -> &Arc<T> {
        // inner is only taken in drop
        match &self.inner {
            Some(a) => a,
            None => unreachable!("Ref used after release"),
        }
    }

    /// Release explicitly (same as drop).
    pub fn release(self) {}
}

impl<T: RefCounted> Deref for Ref<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T: RefCounted> Drop for Ref<T> {
    fn drop(&mut self) {
        if let Some(obj) = self.inner.take() {
            if obj.ref_state().decrement() == 0 {
                obj.tidy();
            }
        }
    }
}

impl<T: RefCounted> std::fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ref")
            .field("count", &self.get().ref_state().count())
            .finish()
    }
}

/// A set of references, at most one per object.
pub struct Refs<T: RefCounted> {
    refs: Vec<Ref<T>>,
}

impl<T: RefCounted> Default for Refs<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RefCounted> Refs<T> {
    pub fn new() -> Self {
        Self { refs: Vec::new() }
    }

    /// Reference `target` and keep it. Returns false if the object is already released.
    /// Referencing an object that is already in the set keeps a single reference.
    pub fn try_ref(&mut self, target: &Arc<T>) -> bool {
        let r = match Ref::try_ref(target) {
            Some(r) => r,
            None => return false,
        };
        if self.contains(target) {
            r.release();
        } else {
            self.refs.push(r);
        }
        true
    }

    pub fn contains(&self, target: &Arc<T>) -> bool {
        self.refs.iter().any(|r| Arc::ptr_eq(r.get(), target))
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.refs.iter().map(|r| r.get())
    }

    /// Release every reference in the set.
    pub fn release(self) {}
}
