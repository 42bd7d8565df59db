//! The event kernel: bring-up, the dispatch loop, and the producer
//! surface.
//!
//! Locking discipline: adding/removing subscribers (and anything else
//! that touches the task table) can be requested from interrupt context,
//! and one such request can interrupt another. Instead of locks, every
//! mutation travels the internal queue as a pooled deferred action and is
//! applied only when it bubbles to the front, on the dispatch context.
//! Producers touch nothing but the queues and the pool, both of which are
//! ISR-safe; the task table is owned exclusively by the dispatch loop.
//!
//! ```text
//!  syscalls / drivers / ISRs          dispatch context
//!  ────────────────────────           ───────────────────────────
//!  KernelHandle ──▶ pool ──▶ internal queue ──▶ internal handler
//!               ──────────▶ internal queue ──▶ broadcast to tasks
//!               ──────────▶ external queue ──▶ host-link driver
//! ```

use std::sync::Arc;

use log::{error, info, warn};

use crate::config::{EXTERNAL_EVTQ_CAP, INTERNAL_EVTQ_CAP};
use crate::error::Error;
use crate::events::{
    EVT_APP_START, EVT_DEFERRED_CALLBACK, EVT_PRIVATE_EVT, EVT_SUBSCRIBE, EVT_UNSUBSCRIBE, Event,
    EventData, EventPayload, EvtQueue, is_internal,
};
use crate::pool::{DeferredAction, DeferredFn, DeferredPool, DeferredRecord};
use crate::ports::{
    ApLinkPort, AppHost, AppRegistry, HostLinkPort, PlatformPort, SensorHubPort,
    SyscallRegistryPort,
};
use crate::syscall::{OsSyscallTable, SYSCALL_OS_VERSION, SyscallDomain};
use crate::task::TaskTable;

// ── Shared producer-side state ────────────────────────────────

struct KernelShared {
    internal: EvtQueue<INTERNAL_EVTQ_CAP>,
    external: EvtQueue<EXTERNAL_EVTQ_CAP>,
    pool: Arc<DeferredPool>,
}

/// Cheap cloneable handle carrying every entry point a producer may use:
/// the lock-free enqueue/subscription/defer surface plus the external
/// queue drain. Safe to invoke from interrupt context.
#[derive(Clone)]
pub struct KernelHandle {
    shared: Arc<KernelShared>,
}

impl KernelHandle {
    /// Queue a subscription intent for `tid`. `false` means the pool or
    /// the queue is full and nothing was committed.
    pub fn event_subscribe(&self, tid: u32, evt_type: u32) -> bool {
        self.sub_unsub(tid, evt_type, true)
    }

    /// Queue an unsubscription intent for `tid`.
    pub fn event_unsubscribe(&self, tid: u32, evt_type: u32) -> bool {
        self.sub_unsub(tid, evt_type, false)
    }

    fn sub_unsub(&self, tid: u32, evt_type: u32, subscribe: bool) -> bool {
        let Some(record) = DeferredRecord::alloc(
            &self.shared.pool,
            DeferredAction::Subscription {
                tid,
                evt_type,
                subscribe,
            },
        ) else {
            return false;
        };
        let ty = if subscribe { EVT_SUBSCRIBE } else { EVT_UNSUBSCRIBE };
        // A refused enqueue drops the record, which frees its slot.
        self.shared.internal.enqueue(Event::action(ty, record)).is_ok()
    }

    /// Queue `callback` to run exactly once on the dispatch context.
    pub fn defer(&self, callback: DeferredFn) -> bool {
        let Some(record) =
            DeferredRecord::alloc(&self.shared.pool, DeferredAction::Callback(callback))
        else {
            return false;
        };
        self.shared
            .internal
            .enqueue(Event::action(EVT_DEFERRED_CALLBACK, record))
            .is_ok()
    }

    /// Queue an event for delivery to a single task. The payload is
    /// released after delivery, or immediately after processing if the
    /// tid is unknown by then — it never leaks.
    pub fn enqueue_private(&self, evt_type: u32, data: Option<EventPayload>, to_tid: u32) -> bool {
        let Some(record) = DeferredRecord::alloc(
            &self.shared.pool,
            DeferredAction::PrivateEvt {
                evt_type,
                data,
                to_tid,
            },
        ) else {
            return false;
        };
        self.shared
            .internal
            .enqueue(Event::action(EVT_PRIVATE_EVT, record))
            .is_ok()
    }

    /// Enqueue an event on the internal or external queue. On a full
    /// queue the event comes back in `Err` and the producer keeps the
    /// payload.
    pub fn enqueue(&self, evt: Event, external: bool) -> core::result::Result<(), Event> {
        if external {
            self.shared.external.enqueue(evt)
        } else {
            self.shared.internal.enqueue(evt)
        }
    }

    /// Non-blocking drain of the external queue, for the host-interface
    /// driver.
    pub fn dequeue_external(&self) -> Option<Event> {
        self.shared.external.dequeue()
    }

    /// Free slots in the deferred-action pool (backpressure signal).
    pub fn pool_available(&self) -> usize {
        self.shared.pool.available()
    }
}

// ── Kernel ────────────────────────────────────────────────────

/// The dispatch core. Owns the task table and the app host; everything
/// shared with producers lives behind [`KernelHandle`].
pub struct Kernel<H: AppHost> {
    shared: Arc<KernelShared>,
    tasks: TaskTable<H>,
    host: H,
}

impl<H: AppHost> core::fmt::Debug for Kernel<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel").finish_non_exhaustive()
    }
}

impl<H: AppHost> Kernel<H> {
    /// Run the bring-up sequence. Order matters: interrupts stay off
    /// until the queues, pool and task table exist, and tasks start only
    /// after every collaborator is up. A collaborator failure aborts
    /// bring-up and the dispatch loop is never entered.
    pub fn bring_up(
        host: H,
        registry: &impl AppRegistry,
        platform: &mut impl PlatformPort,
        sensors: &mut impl SensorHubPort,
        syscalls: &mut impl SyscallRegistryPort,
        host_link: &mut impl HostLinkPort,
        ap_link: &mut impl ApLinkPort,
    ) -> core::result::Result<Self, Error> {
        platform.interrupts_off();
        platform.timer_init()?;
        platform.init()?;

        info!("hubos core initializing");
        platform.init_late();

        let shared = Arc::new(KernelShared {
            internal: EvtQueue::new(),
            external: EvtQueue::new(),
            pool: Arc::new(DeferredPool::new()),
        });
        let mut kernel = Self {
            shared,
            tasks: TaskTable::new(),
            host,
        };

        sensors.init()?;
        syscalls.init()?;
        kernel.export_api(syscalls);
        host_link.request(kernel.handle())?;
        ap_link.init()?;
        platform.interrupts_on();

        kernel.start_tasks(registry);

        // Broadcast app start to all already-loaded apps.
        if kernel
            .handle()
            .enqueue(Event::empty(EVT_APP_START), false)
            .is_err()
        {
            warn!("app-start broadcast refused: internal queue full");
        }
        Ok(kernel)
    }

    /// A producer handle onto this kernel.
    pub fn handle(&self) -> KernelHandle {
        KernelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// The task table (read-only outside the dispatch context).
    pub fn tasks(&self) -> &TaskTable<H> {
        &self.tasks
    }

    fn export_api(&self, syscalls: &mut impl SyscallRegistryPort) {
        let table = OsSyscallTable::new(self.handle());
        if !syscalls.add_table(SyscallDomain::Os, SYSCALL_OS_VERSION, table) {
            error!("failed to export OS base API");
        }
    }

    // ── Task load/init protocol ───────────────────────────────

    fn start_tasks(&mut self, registry: &impl AppRegistry) {
        info!("hubos registering tasks");
        for (header, kind) in registry.candidates() {
            if self.tasks.is_full() {
                warn!("task table full, remaining apps ignored");
                break;
            }
            if !header.valid_for(kind) {
                warn!("invalid app header ignored (app id {:#x})", header.app_id);
                continue;
            }
            if self.tasks.has_app_id(header.app_id) {
                error!("duplicate app id ignored ({:#x})", header.app_id);
                continue;
            }
            let Some(plat) = self.host.load(header, kind) else {
                warn!("app {:#x} failed to load", header.app_id);
                continue;
            };
            // The tid is consumed only once the image actually loaded.
            let _ = self.tasks.register(header, plat);
        }

        info!("hubos starting tasks");
        let mut i = 0;
        while let Some(task) = self.tasks.get_mut(i) {
            let tid = task.tid;
            let header = task.header;
            if self.host.init(header, &mut task.plat, tid) {
                i += 1;
            } else {
                // Compact: move the last valid slot into this one. Tids
                // stay stable, so nothing outside notices.
                let mut failed = self.tasks.swap_remove(i);
                self.host.unload(failed.header, &mut failed.plat);
            }
        }
    }

    // ── Dispatch ──────────────────────────────────────────────

    /// Dequeue and dispatch one event from the internal queue. Returns
    /// `false` if the queue was empty.
    pub fn step(&mut self) -> bool {
        let Some(evt) = self.shared.internal.dequeue() else {
            return false;
        };
        self.dispatch(evt);
        true
    }

    /// Dispatch until the internal queue is empty. Returns the number of
    /// events processed.
    pub fn drain(&mut self) -> usize {
        let mut n = 0;
        while self.step() {
            n += 1;
        }
        n
    }

    /// Enter the dispatch loop. The platform wait is the only suspension
    /// point in the system; task handlers run on this context and must
    /// return promptly.
    pub fn run(&mut self, platform: &mut impl PlatformPort) -> ! {
        loop {
            if !self.step() {
                platform.wait_for_event();
            }
        }
    }

    fn dispatch(&mut self, evt: Event) {
        let Event { evt_type, data } = evt;
        if is_internal(evt_type) {
            // Internal events are never discardable and never broadcast.
            self.handle_internal(evt_type, data);
        } else {
            let payload = data.payload();
            for task in self.tasks.iter_mut() {
                // At most one delivery per task per broadcast.
                if task.subs.contains(evt_type) {
                    self.host.handle(task.header, &mut task.plat, evt_type, payload);
                }
            }
        }
        // `data` dropped here: payload released, record slot reclaimed.
    }

    fn handle_internal(&mut self, evt_type: u32, data: EventData) {
        let EventData::Action(mut record) = data else {
            warn!("internal event {evt_type:#x} without an action record dropped");
            return;
        };
        let Some(action) = record.take() else {
            warn!("internal event {evt_type:#x} carried an empty record");
            return;
        };

        let expected = match &action {
            DeferredAction::Subscription {
                subscribe: true, ..
            } => EVT_SUBSCRIBE,
            DeferredAction::Subscription {
                subscribe: false, ..
            } => EVT_UNSUBSCRIBE,
            DeferredAction::Callback(_) => EVT_DEFERRED_CALLBACK,
            DeferredAction::PrivateEvt { .. } => EVT_PRIVATE_EVT,
        };
        if evt_type != expected {
            warn!("internal event type {evt_type:#x} does not match its record");
        }

        match action {
            DeferredAction::Subscription {
                tid,
                evt_type: evt,
                subscribe,
            } => {
                // Unknown tid: the task may have failed init. Drop it.
                if let Some(task) = self.tasks.find_by_tid_mut(tid) {
                    if subscribe {
                        task.subs.insert(evt);
                    } else {
                        task.subs.remove(evt);
                    }
                }
            }
            DeferredAction::Callback(callback) => callback(),
            DeferredAction::PrivateEvt {
                evt_type: inner,
                data,
                to_tid,
            } => {
                if let Some(task) = self.tasks.find_by_tid_mut(to_tid) {
                    let payload = data.as_ref().map(|p| p.as_any());
                    self.host.handle(task.header, &mut task.plat, inner, payload);
                }
                // `data` dropped here whether or not the task existed, so
                // misrouted private events cannot leak their payload.
            }
        }
        // `record` dropped here: the pool slot returns to the free list.
    }
}
