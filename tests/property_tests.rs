//! Property tests for the dispatch core.
//!
//! Random op sequences are replayed against a plain model: a task
//! receives a broadcast iff its latest accepted sub/unsub dequeued
//! before that broadcast was a sub, every accepted payload is released
//! exactly once, refused operations change nothing, and tids stay
//! unique and monotonic.

use core::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;

use hubos::adapters::app_host::StaticRegistry;
use hubos::adapters::sim::{
    SimApLink, SimHostLink, SimPlatform, SimSensorHub, SimSyscallRegistry,
};
use hubos::config::{DEFERRED_POOL_CAP, MAX_EMBEDDED_SUBS};
use hubos::events::{Event, EventPayload};
use hubos::kernel::Kernel;
use hubos::ports::{AppHost, LoaderKind};
use hubos::subs::SubscriptionSet;
use hubos::task::{AppHeader, AppMarker};

// ── Shared harness ────────────────────────────────────────────

#[derive(Clone, Default)]
struct Trace(Rc<RefCell<Vec<(u64, u32)>>>);

struct RecordingHost {
    trace: Trace,
}

impl AppHost for RecordingHost {
    type PlatInfo = u64;

    fn load(&mut self, header: &'static AppHeader, _kind: LoaderKind) -> Option<u64> {
        Some(header.app_id)
    }

    fn init(&mut self, _header: &'static AppHeader, _plat: &mut u64, _tid: u32) -> bool {
        true
    }

    fn unload(&mut self, _header: &'static AppHeader, _plat: &mut u64) {}

    fn handle(
        &mut self,
        _header: &'static AppHeader,
        plat: &mut u64,
        evt_type: u32,
        _data: Option<&(dyn Any + Send)>,
    ) {
        self.trace.0.borrow_mut().push((*plat, evt_type));
    }
}

static HDR_ONE: AppHeader = AppHeader::new(0xA1, AppMarker::Valid);
static HDR_TWO: AppHeader = AppHeader::new(0xA2, AppMarker::Valid);

fn boot(trace: Trace) -> Kernel<RecordingHost> {
    let mut registry = StaticRegistry::new();
    registry.push(&HDR_ONE, LoaderKind::External);
    registry.push(&HDR_TWO, LoaderKind::External);
    Kernel::bring_up(
        RecordingHost { trace },
        &registry,
        &mut SimPlatform::new(),
        &mut SimSensorHub::new(),
        &mut SimSyscallRegistry::new(),
        &mut SimHostLink::new(),
        &mut SimApLink::new(),
    )
    .expect("bring-up")
}

const APP_IDS: [u64; 2] = [0xA1, 0xA2];
const EVT_TYPES: [u32; 4] = [0x0001_0000, 0x0001_0001, 0x0001_0002, 0x0001_0003];

#[derive(Debug, Clone)]
enum Op {
    Sub(usize, usize),
    Unsub(usize, usize),
    Broadcast(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..APP_IDS.len(), 0..EVT_TYPES.len()).prop_map(|(t, e)| Op::Sub(t, e)),
        (0..APP_IDS.len(), 0..EVT_TYPES.len()).prop_map(|(t, e)| Op::Unsub(t, e)),
        (0..EVT_TYPES.len()).prop_map(Op::Broadcast),
    ]
}

proptest! {
    /// Invariants: delivery tracks the latest accepted sub/unsub that
    /// dequeued before the broadcast, and each subscriber is invoked
    /// exactly once per broadcast. Ops are enqueued in one burst and
    /// drained afterwards, so queue order equals op order; refused ops
    /// (pool full) are excluded from the model exactly as the kernel
    /// excludes them.
    #[test]
    fn delivery_matches_the_subscription_model(
        ops in proptest::collection::vec(arb_op(), 1..=48),
    ) {
        let trace = Trace::default();
        let mut kernel = boot(trace.clone());
        let handle = kernel.handle();
        kernel.drain(); // consume the app-start broadcast

        let mut accepted = Vec::new();
        for op in &ops {
            let ok = match op {
                Op::Sub(t, e) => handle.event_subscribe((t + 1) as u32, EVT_TYPES[*e]),
                Op::Unsub(t, e) => handle.event_unsubscribe((t + 1) as u32, EVT_TYPES[*e]),
                Op::Broadcast(e) => handle
                    .enqueue(Event::empty(EVT_TYPES[*e]), false)
                    .is_ok(),
            };
            if ok {
                accepted.push(op.clone());
            }
        }
        kernel.drain();

        // Replay the accepted ops against a plain set model.
        let mut model: [HashSet<u32>; 2] = [HashSet::new(), HashSet::new()];
        let mut expected = Vec::new();
        for op in &accepted {
            match op {
                Op::Sub(t, e) => {
                    model[*t].insert(EVT_TYPES[*e]);
                }
                Op::Unsub(t, e) => {
                    model[*t].remove(&EVT_TYPES[*e]);
                }
                Op::Broadcast(e) => {
                    for (t, subs) in model.iter().enumerate() {
                        if subs.contains(&EVT_TYPES[*e]) {
                            expected.push((APP_IDS[t], EVT_TYPES[*e]));
                        }
                    }
                }
            }
        }
        prop_assert_eq!(trace.0.borrow().clone(), expected);

        // Final subscription state matches the model too.
        for (t, subs) in model.iter().enumerate() {
            let task = kernel.tasks().find_by_tid((t + 1) as u32).unwrap();
            for evt in EVT_TYPES {
                prop_assert_eq!(task.subscriptions().contains(evt), subs.contains(&evt));
            }
        }
    }

    /// Invariant: every accepted payload is released exactly once after
    /// processing, whether broadcast, privately routed, misrouted, or
    /// never subscribed to.
    #[test]
    fn accepted_payloads_release_exactly_once(
        subscribe_first in proptest::bool::ANY,
        to_tid in 0u32..4,
        broadcasts in 1usize..12,
    ) {
        struct Guard(Arc<AtomicUsize>);
        impl Drop for Guard {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let trace = Trace::default();
        let mut kernel = boot(trace);
        let handle = kernel.handle();
        kernel.drain();

        if subscribe_first {
            prop_assert!(handle.event_subscribe(1, EVT_TYPES[0]));
        }

        let mut counters = Vec::new();
        for _ in 0..broadcasts {
            let drops = Arc::new(AtomicUsize::new(0));
            counters.push(Arc::clone(&drops));
            let evt = Event::user(EVT_TYPES[0], EventPayload::new(Guard(drops)));
            prop_assert!(handle.enqueue(evt, false).is_ok());
        }
        let private_drops = Arc::new(AtomicUsize::new(0));
        prop_assert!(handle.enqueue_private(
            EVT_TYPES[1],
            Some(EventPayload::new(Guard(Arc::clone(&private_drops)))),
            to_tid,
        ));
        counters.push(private_drops);

        kernel.drain();

        for drops in &counters {
            prop_assert_eq!(drops.load(Ordering::SeqCst), 1);
        }
    }

    /// Invariant: once the pool refuses, refused intents leave no trace;
    /// everything accepted before still applies.
    #[test]
    fn refused_intents_leave_no_state(extra in 1usize..16) {
        let trace = Trace::default();
        let mut kernel = boot(trace);
        let handle = kernel.handle();
        kernel.drain();

        for i in 0..DEFERRED_POOL_CAP {
            prop_assert!(handle.event_subscribe(1, 0x0002_0000 + i as u32));
        }
        for i in 0..extra {
            prop_assert!(!handle.event_subscribe(1, 0x0003_0000 + i as u32));
        }

        kernel.drain();
        let task = kernel.tasks().find_by_tid(1).unwrap();
        prop_assert_eq!(task.subscriptions().len(), DEFERRED_POOL_CAP);
        for i in 0..extra {
            prop_assert!(!task.subscriptions().contains(0x0003_0000 + i as u32));
        }
        prop_assert_eq!(handle.pool_available(), DEFERRED_POOL_CAP);
    }

    /// Invariant: the subscription set behaves as a set with strictly
    /// increasing capacity across growth, preserving its contents.
    #[test]
    fn subscription_set_matches_a_set_model(
        ops in proptest::collection::vec(
            (proptest::bool::ANY, 0u32..24),
            1..=96,
        ),
    ) {
        let mut set = SubscriptionSet::new();
        let mut model = HashSet::new();
        let mut last_cap = set.capacity();
        prop_assert_eq!(last_cap, MAX_EMBEDDED_SUBS);

        for (insert, evt) in ops {
            if insert {
                set.insert(evt);
                model.insert(evt);
            } else {
                set.remove(evt);
                model.remove(&evt);
            }
            let cap = set.capacity();
            prop_assert!(cap >= last_cap, "capacity never shrinks");
            if cap != last_cap {
                prop_assert!(cap > last_cap);
                last_cap = cap;
            }

            prop_assert_eq!(set.len(), model.len());
            for e in 0u32..24 {
                prop_assert_eq!(set.contains(e), model.contains(&e));
            }
        }
    }
}

/// Tids are unique, non-zero and monotonic even with duplicate app ids
/// in the scan (invariant checked deterministically: the registry order
/// is the whole input space here).
#[test]
fn tids_are_unique_nonzero_and_monotonic() {
    static H1: AppHeader = AppHeader::new(0xD1, AppMarker::Valid);
    static H2: AppHeader = AppHeader::new(0xD2, AppMarker::Valid);
    static H2_DUP: AppHeader = AppHeader::new(0xD2, AppMarker::Valid);
    static H3: AppHeader = AppHeader::new(0xD3, AppMarker::Valid);

    let mut registry = StaticRegistry::new();
    for h in [&H1, &H2, &H2_DUP, &H3] {
        registry.push(h, LoaderKind::External);
    }
    let kernel = Kernel::bring_up(
        RecordingHost {
            trace: Trace::default(),
        },
        &registry,
        &mut SimPlatform::new(),
        &mut SimSensorHub::new(),
        &mut SimSyscallRegistry::new(),
        &mut SimHostLink::new(),
        &mut SimApLink::new(),
    )
    .expect("bring-up");

    let tids: Vec<u32> = kernel.tasks().iter().map(|t| t.tid()).collect();
    assert_eq!(tids, vec![1, 2, 3]);
    assert!(tids.iter().all(|&t| t != 0));
    let ids: HashSet<u64> = kernel.tasks().iter().map(|t| t.app_id()).collect();
    assert_eq!(ids.len(), 3);
}
