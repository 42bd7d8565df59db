//! Event model and the bounded event queues.
//!
//! Events are produced by:
//! - hosted apps (through the syscall surface)
//! - drivers and timer callbacks
//! - interrupt handlers (enqueue is ISR-safe)
//! - the kernel itself (subscription/defer/private-event intents)
//!
//! Two queues exist: the *internal* queue drained by the dispatch loop,
//! and the smaller *external* queue drained by the host-interface driver.
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐   dequeue    ┌──────────────┐
//! │ App syscall │────▶│               │─────────────▶│ Dispatch loop│
//! │ Driver/ISR  │────▶│ Internal FIFO │              │ (consumer)   │
//! │ Kernel      │────▶│   (512)       │              └──────────────┘
//! └─────────────┘     ├───────────────┤   dequeue    ┌──────────────┐
//!                     │ External FIFO │─────────────▶│ Host link    │
//!                     │   (256)       │              │ (consumer)   │
//!                     └───────────────┘              └──────────────┘
//! ```
//!
//! Ownership is part of the type: enqueueing moves the event into the
//! queue, and a full queue hands it straight back to the producer, so a
//! payload is dropped (released) exactly once — by whoever holds it.

use core::any::Any;
use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Deque;

use crate::pool::DeferredRecord;

// ── Event-type space ──────────────────────────────────────────
//
// Types below FIRST_USER_EVENT are reserved for the kernel: they are
// consumed by the internal handler, never broadcast, never discardable.

/// Subscription intent (record carries the tid/event pair).
pub const EVT_SUBSCRIBE: u32 = 0x0000_0000;
/// Unsubscription intent.
pub const EVT_UNSUBSCRIBE: u32 = 0x0000_0001;
/// Run a deferred callback on the dispatch context.
pub const EVT_DEFERRED_CALLBACK: u32 = 0x0000_0002;
/// Deliver a wrapped event to a single task by tid.
pub const EVT_PRIVATE_EVT: u32 = 0x0000_0003;

/// First event type that is broadcast to subscribed tasks.
pub const FIRST_USER_EVENT: u32 = 0x0000_0100;

/// Broadcast once after bring-up, before the loop starts dispatching.
pub const EVT_APP_START: u32 = 0x0000_0300;

/// Whether `evt_type` is reserved for the kernel's internal handler.
#[inline]
pub fn is_internal(evt_type: u32) -> bool {
    evt_type < FIRST_USER_EVENT
}

// ── Payload handle ────────────────────────────────────────────

/// Opaque payload attached to a user event.
///
/// The kernel never inspects the value; consumers downcast it. Dropping
/// the handle releases the payload, which replaces the C-style free
/// callback: whoever ends up owning the handle releases it exactly once.
pub struct EventPayload(Box<dyn Any + Send>);

impl EventPayload {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Borrow the payload for a consumer to downcast.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub(crate) fn as_any(&self) -> &(dyn Any + Send) {
        self.0.as_ref()
    }
}

impl fmt::Debug for EventPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventPayload(..)")
    }
}

// ── Event ─────────────────────────────────────────────────────

/// What travels in a queue slot alongside the event type.
#[derive(Debug)]
pub enum EventData {
    /// No payload (e.g. the app-start broadcast).
    Empty,
    /// Opaque user payload, shared read-only with every receiving task.
    User(EventPayload),
    /// Pooled deferred-action record; only valid on internal event types.
    Action(DeferredRecord),
}

impl EventData {
    /// The user payload as seen by task handlers, if any.
    pub fn payload(&self) -> Option<&(dyn Any + Send)> {
        match self {
            Self::User(p) => Some(p.as_any()),
            Self::Empty | Self::Action(_) => None,
        }
    }
}

/// A queued event: a 32-bit type plus its data.
#[derive(Debug)]
pub struct Event {
    pub evt_type: u32,
    pub data: EventData,
}

impl Event {
    /// A payload-less event.
    pub fn empty(evt_type: u32) -> Self {
        Self {
            evt_type,
            data: EventData::Empty,
        }
    }

    /// A user event carrying an opaque payload.
    pub fn user(evt_type: u32, payload: EventPayload) -> Self {
        Self {
            evt_type,
            data: EventData::User(payload),
        }
    }

    pub(crate) fn action(evt_type: u32, record: DeferredRecord) -> Self {
        Self {
            evt_type,
            data: EventData::Action(record),
        }
    }
}

// ── Bounded FIFO queue ────────────────────────────────────────
//
// Producers run on any context including ISRs; the mutex is a critical
// section, held only for the push/pop itself. Consumers are single per
// queue (dispatch loop / host link) but nothing here depends on that.

/// Bounded multi-producer event FIFO.
pub struct EvtQueue<const N: usize> {
    items: Mutex<CriticalSectionRawMutex, RefCell<Deque<Event, N>>>,
}

impl<const N: usize> EvtQueue<N> {
    pub const fn new() -> Self {
        Self {
            items: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Append an event. On a full queue the event comes straight back in
    /// `Err`, leaving payload ownership with the producer.
    pub fn enqueue(&self, evt: Event) -> Result<(), Event> {
        self.items.lock(|q| q.borrow_mut().push_back(evt))
    }

    /// Pop the oldest event, or `None` if the queue is empty.
    pub fn dequeue(&self) -> Option<Event> {
        self.items.lock(|q| q.borrow_mut().pop_front())
    }

    pub fn len(&self) -> usize {
        self.items.lock(|q| q.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> Default for EvtQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_starts_empty() {
        let q: EvtQueue<4> = EvtQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn fifo_ordering() {
        let q: EvtQueue<4> = EvtQueue::new();
        q.enqueue(Event::empty(0x100)).unwrap();
        q.enqueue(Event::empty(0x101)).unwrap();
        q.enqueue(Event::empty(0x102)).unwrap();

        assert_eq!(q.dequeue().unwrap().evt_type, 0x100);
        assert_eq!(q.dequeue().unwrap().evt_type, 0x101);
        assert_eq!(q.dequeue().unwrap().evt_type, 0x102);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn overflow_returns_the_event() {
        let q: EvtQueue<2> = EvtQueue::new();
        q.enqueue(Event::empty(0x100)).unwrap();
        q.enqueue(Event::empty(0x101)).unwrap();

        let refused = q.enqueue(Event::user(0x102, EventPayload::new(7u32)));
        let evt = refused.unwrap_err();
        assert_eq!(evt.evt_type, 0x102);
        // Producer still owns the payload.
        assert_eq!(evt.data.payload().unwrap().downcast_ref::<u32>(), Some(&7));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn payload_downcast() {
        let p = EventPayload::new("sample");
        assert_eq!(p.downcast_ref::<&str>(), Some(&"sample"));
        assert!(p.downcast_ref::<u64>().is_none());
    }

    #[test]
    fn internal_threshold() {
        assert!(is_internal(EVT_SUBSCRIBE));
        assert!(is_internal(EVT_PRIVATE_EVT));
        assert!(is_internal(FIRST_USER_EVENT - 1));
        assert!(!is_internal(FIRST_USER_EVENT));
        assert!(!is_internal(EVT_APP_START));
    }
}
