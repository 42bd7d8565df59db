//! Fixed-count pool of deferred-action records.
//!
//! Producers (task syscalls, drivers, ISRs) describe a pending mutation —
//! subscribe/unsubscribe, a deferred callback, or a private event — as a
//! record drawn from this pool, then enqueue it on the internal queue.
//! The pool never grows: under pressure `alloc` returns `None` and the
//! kernel entry point reports `false` so the producer backs off.
//!
//! A [`DeferredRecord`] owns its slot. Dropping it returns the slot to
//! the free list, which is the single free hook for every path: after
//! dispatch, after a refused enqueue, and after a misrouted private
//! event. Records therefore cannot leak.

use core::cell::RefCell;
use core::fmt;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::config::DEFERRED_POOL_CAP;
use crate::events::EventPayload;

/// Callback queued for execution on the dispatch context.
pub type DeferredFn = Box<dyn FnOnce() + Send>;

/// Intent carried by a pooled record.
pub enum DeferredAction {
    /// Add or remove one event type from a task's subscription set.
    Subscription {
        tid: u32,
        evt_type: u32,
        subscribe: bool,
    },
    /// Invoke a callback once, on the dispatch context.
    Callback(DeferredFn),
    /// Deliver a wrapped event to exactly one task.
    PrivateEvt {
        evt_type: u32,
        data: Option<EventPayload>,
        to_tid: u32,
    },
}

impl fmt::Debug for DeferredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscription {
                tid,
                evt_type,
                subscribe,
            } => write!(
                f,
                "Subscription {{ tid: {tid}, evt_type: {evt_type:#x}, subscribe: {subscribe} }}"
            ),
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::PrivateEvt {
                evt_type, to_tid, ..
            } => write!(f, "PrivateEvt {{ evt_type: {evt_type:#x}, to_tid: {to_tid} }}"),
        }
    }
}

// ── Pool ──────────────────────────────────────────────────────

struct Slots {
    entries: [Option<DeferredAction>; DEFERRED_POOL_CAP],
    free: heapless::Vec<u8, DEFERRED_POOL_CAP>,
}

/// Fixed slab of uniformly sized deferred-action records.
///
/// Alloc and free are O(1) and run under a critical section, so both are
/// safe from interrupt context.
pub struct DeferredPool {
    slots: Mutex<CriticalSectionRawMutex, RefCell<Slots>>,
}

impl DeferredPool {
    pub fn new() -> Self {
        let mut free = heapless::Vec::new();
        for i in (0..DEFERRED_POOL_CAP as u8).rev() {
            // Cannot overflow: the list is exactly pool-sized.
            let _ = free.push(i);
        }
        Self {
            slots: Mutex::new(RefCell::new(Slots {
                entries: [const { None }; DEFERRED_POOL_CAP],
                free,
            })),
        }
    }

    fn claim(&self, action: DeferredAction) -> Option<u8> {
        self.slots.lock(|s| {
            let mut s = s.borrow_mut();
            let idx = s.free.pop()?;
            s.entries[idx as usize] = Some(action);
            Some(idx)
        })
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.slots.lock(|s| s.borrow().free.len())
    }
}

impl Default for DeferredPool {
    fn default() -> Self {
        Self::new()
    }
}

// ── Record handle ─────────────────────────────────────────────

/// Owning handle to one pooled record. Dropping it frees the slot.
pub struct DeferredRecord {
    pool: Arc<DeferredPool>,
    idx: u8,
}

impl DeferredRecord {
    /// Claim a slot in `pool` for `action`. `None` means the pool is
    /// exhausted and the caller must surface backpressure.
    pub fn alloc(pool: &Arc<DeferredPool>, action: DeferredAction) -> Option<Self> {
        let idx = pool.claim(action)?;
        Some(Self {
            pool: Arc::clone(pool),
            idx,
        })
    }

    /// Move the action out of the slot. The slot itself is reclaimed when
    /// the record is dropped, after the enclosing event is handled.
    pub(crate) fn take(&mut self) -> Option<DeferredAction> {
        self.pool
            .slots
            .lock(|s| s.borrow_mut().entries[self.idx as usize].take())
    }
}

impl Drop for DeferredRecord {
    fn drop(&mut self) {
        self.pool.slots.lock(|s| {
            let mut s = s.borrow_mut();
            s.entries[self.idx as usize] = None;
            // Cannot overflow: each live record holds a distinct index.
            let _ = s.free.push(self.idx);
        });
    }
}

impl fmt::Debug for DeferredRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeferredRecord({})", self.idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(tid: u32) -> DeferredAction {
        DeferredAction::Subscription {
            tid,
            evt_type: 0x100,
            subscribe: true,
        }
    }

    #[test]
    fn alloc_and_drop_cycle() {
        let pool = Arc::new(DeferredPool::new());
        assert_eq!(pool.available(), DEFERRED_POOL_CAP);

        let rec = DeferredRecord::alloc(&pool, sub(1)).unwrap();
        assert_eq!(pool.available(), DEFERRED_POOL_CAP - 1);
        drop(rec);
        assert_eq!(pool.available(), DEFERRED_POOL_CAP);
    }

    #[test]
    fn exhaustion_returns_none() {
        let pool = Arc::new(DeferredPool::new());
        let held: Vec<_> = (0..DEFERRED_POOL_CAP as u32)
            .map(|i| DeferredRecord::alloc(&pool, sub(i)).unwrap())
            .collect();
        assert_eq!(pool.available(), 0);
        assert!(DeferredRecord::alloc(&pool, sub(99)).is_none());

        drop(held);
        assert_eq!(pool.available(), DEFERRED_POOL_CAP);
        assert!(DeferredRecord::alloc(&pool, sub(99)).is_some());
    }

    #[test]
    fn take_yields_the_action_once() {
        let pool = Arc::new(DeferredPool::new());
        let mut rec = DeferredRecord::alloc(&pool, sub(7)).unwrap();

        match rec.take() {
            Some(DeferredAction::Subscription { tid, .. }) => assert_eq!(tid, 7),
            other => panic!("unexpected action: {other:?}"),
        }
        assert!(rec.take().is_none());
        // Slot is still occupied until the record drops.
        drop(rec);
        assert_eq!(pool.available(), DEFERRED_POOL_CAP);
    }

    #[test]
    fn payload_in_slot_is_released_with_the_record() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static DROPS: AtomicUsize = AtomicUsize::new(0);
        struct Guard;
        impl Drop for Guard {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let pool = Arc::new(DeferredPool::new());
        let rec = DeferredRecord::alloc(
            &pool,
            DeferredAction::PrivateEvt {
                evt_type: 0x2_0000,
                data: Some(EventPayload::new(Guard)),
                to_tid: 4,
            },
        )
        .unwrap();

        assert_eq!(DROPS.load(Ordering::SeqCst), 0);
        drop(rec); // never taken: slot free implies payload released
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);
        assert_eq!(pool.available(), DEFERRED_POOL_CAP);
    }
}
