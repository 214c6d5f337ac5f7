//! Memoized slots for lazily computed split properties.

use std::sync::Arc;

use parking_lot::Mutex;

/// Observable state of a cached property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Never computed.
    Unset,
    /// Computed and held.
    Computed,
    /// Computed once, then released; the next access recomputes.
    Released,
}

#[derive(Debug)]
enum Slot<T> {
    Unset,
    Computed(Arc<T>),
    Released,
}

/// A compute-once slot that can be released and recomputed later.
///
/// The slot lock is held while computing, so concurrent first access
/// computes once. A failed computation leaves the slot as it was.
#[derive(Debug)]
pub(crate) struct Cached<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Cached<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Unset),
        }
    }

    /// Return the held value, computing it with `init` if absent.
    pub(crate) fn get_or_try_init<E>(
        &self,
        init: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        let mut slot = self.slot.lock();
        if let Slot::Computed(value) = &*slot {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(init()?);
        *slot = Slot::Computed(Arc::clone(&value));
        Ok(value)
    }

    /// Drop the held value. Returns `true` if a value was held.
    pub(crate) fn release(&self) -> bool {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Computed(_)) {
            *slot = Slot::Released;
            true
        } else {
            false
        }
    }

    pub(crate) fn state(&self) -> CacheState {
        match *self.slot.lock() {
            Slot::Unset => CacheState::Unset,
            Slot::Computed(_) => CacheState::Computed,
            Slot::Released => CacheState::Released,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn computes_once() {
        let calls = AtomicUsize::new(0);
        let cache = Cached::new();
        for _ in 0..3 {
            let v: Result<Arc<i32>, ()> = cache.get_or_try_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            });
            assert_eq!(*v.unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state(), CacheState::Computed);
    }

    #[test]
    fn release_then_recompute() {
        let cache = Cached::new();
        let _ = cache.get_or_try_init(|| Ok::<_, ()>(1)).unwrap();
        assert!(cache.release());
        assert_eq!(cache.state(), CacheState::Released);
        assert!(!cache.release());
        let v = cache.get_or_try_init(|| Ok::<_, ()>(2)).unwrap();
        assert_eq!(*v, 2);
    }

    #[test]
    fn failure_is_not_memoized() {
        let cache: Cached<i32> = Cached::new();
        assert!(cache.get_or_try_init(|| Err("boom")).is_err());
        assert_eq!(cache.state(), CacheState::Unset);
        assert_eq!(*cache.get_or_try_init(|| Ok::<_, &str>(3)).unwrap(), 3);
    }

    #[test]
    fn concurrent_first_access_computes_once() {
        let calls = AtomicUsize::new(0);
        let cache: Cached<usize> = Cached::new();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    cache
                        .get_or_try_init(|| Ok::<_, ()>(calls.fetch_add(1, Ordering::SeqCst)))
                        .unwrap();
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
