//! hubos simulation entry point.
//!
//! Brings the kernel up against the simulated board adapters, registers
//! two demo apps, seeds some traffic so every producer path runs, and
//! enters the dispatch loop. On hardware the startup shim does the same
//! dance with the real collaborators.

use anyhow::Result;
use log::info;

use hubos::adapters::app_host::{DynAppHost, HostedApp, StaticRegistry};
use hubos::adapters::log_sink;
use hubos::adapters::sim::{
    SimApLink, SimHostLink, SimPlatform, SimSensorHub, SimSyscallRegistry, SyscallCell,
};
use hubos::error::fatal;
use hubos::events::{EVT_APP_START, EventPayload};
use hubos::kernel::Kernel;
use hubos::logging::LogLevel;
use hubos::ports::LoaderKind;
use hubos::syscall::{OsSyscall, OsSyscallTable};
use hubos::task::{AppHeader, AppMarker};

/// Demo sensor sample broadcast.
const EVT_SENSOR_SAMPLE: u32 = 0x0001_0000;
/// Demo private event for the heartbeat app.
const EVT_POKE: u32 = 0x0002_0000;

const HEARTBEAT_APP_ID: u64 = 0x4855_424f_0000_0001;
const WATCHER_APP_ID: u64 = 0x4855_424f_0000_0002;

static HEARTBEAT_HDR: AppHeader = AppHeader::new(HEARTBEAT_APP_ID, AppMarker::Internal);
static WATCHER_HDR: AppHeader = AppHeader::new(WATCHER_APP_ID, AppMarker::Valid);

/// One ambient reading, as a driver would publish it.
struct SampleReading {
    centi_deg: i32,
}

// ── Demo apps ─────────────────────────────────────────────────

/// Subscribes to app-start and sensor samples, logs through LOGV.
struct HeartbeatApp {
    tid: u32,
}

impl HostedApp for HeartbeatApp {
    fn start(&mut self, tid: u32, sys: &OsSyscallTable) -> bool {
        self.tid = tid;
        sys.call(OsSyscall::EventqSubscribe {
            tid,
            evt_type: EVT_APP_START,
        })
        .succeeded()
            && sys
                .call(OsSyscall::EventqSubscribe {
                    tid,
                    evt_type: EVT_SENSOR_SAMPLE,
                })
                .succeeded()
    }

    fn handle(
        &mut self,
        evt_type: u32,
        data: Option<&(dyn core::any::Any + Send)>,
        sys: &OsSyscallTable,
    ) {
        match evt_type {
            EVT_APP_START => {
                let _ = sys.call(OsSyscall::LogLogv {
                    level: LogLevel::Info,
                    message: format!("heartbeat up as tid {}", self.tid),
                });
            }
            EVT_SENSOR_SAMPLE => {
                if let Some(reading) = data.and_then(|d| d.downcast_ref::<SampleReading>()) {
                    let _ = sys.call(OsSyscall::LogLogv {
                        level: LogLevel::Debug,
                        message: format!(
                            "heartbeat saw {:.2} degC",
                            f64::from(reading.centi_deg) / 100.0
                        ),
                    });
                }
            }
            EVT_POKE => {
                let _ = sys.call(OsSyscall::LogLogv {
                    level: LogLevel::Info,
                    message: "heartbeat poked".to_string(),
                });
            }
            _ => {}
        }
    }
}

/// Forwards every sensor sample to the host through the external queue.
struct WatcherApp;

impl HostedApp for WatcherApp {
    fn start(&mut self, tid: u32, sys: &OsSyscallTable) -> bool {
        sys.call(OsSyscall::EventqSubscribe {
            tid,
            evt_type: EVT_SENSOR_SAMPLE,
        })
        .succeeded()
    }

    fn handle(
        &mut self,
        evt_type: u32,
        data: Option<&(dyn core::any::Any + Send)>,
        sys: &OsSyscallTable,
    ) {
        if evt_type != EVT_SENSOR_SAMPLE {
            return;
        }
        let Some(reading) = data.and_then(|d| d.downcast_ref::<SampleReading>()) else {
            return;
        };
        let _ = sys.call(OsSyscall::EventqEnqueue {
            evt_type: EVT_SENSOR_SAMPLE,
            data: Some(EventPayload::new(SampleReading {
                centi_deg: reading.centi_deg,
            })),
            external: true,
        });
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    log_sink::init()?;
    info!("hubos v{} (host simulation)", env!("CARGO_PKG_VERSION"));

    // App hosting: the syscall registry publishes the exported table
    // into this cell, and hosted apps call through it.
    let syscalls: SyscallCell = SyscallCell::default();
    let mut host = DynAppHost::new(syscalls.clone());
    host.register(HEARTBEAT_APP_ID, || Box::new(HeartbeatApp { tid: 0 }));
    host.register(WATCHER_APP_ID, || Box::new(WatcherApp));

    let mut registry = StaticRegistry::new();
    registry.push(&HEARTBEAT_HDR, LoaderKind::Internal);
    registry.push(&WATCHER_HDR, LoaderKind::External);

    let mut platform = SimPlatform::new();
    let mut sensors = SimSensorHub::new();
    let mut syscall_registry = SimSyscallRegistry::with_export_cell(syscalls);
    let mut host_link = SimHostLink::with_auto_drain();
    let mut ap_link = SimApLink::new();

    let mut kernel = match Kernel::bring_up(
        host,
        &registry,
        &mut platform,
        &mut sensors,
        &mut syscall_registry,
        &mut host_link,
        &mut ap_link,
    ) {
        Ok(kernel) => kernel,
        Err(e) => fatal(&format!("bring-up failed: {e}")),
    };

    // Seed some traffic so every producer path is visible in the log.
    let handle = kernel.handle();
    for centi_deg in [2210, 2230, 2190] {
        if handle
            .enqueue(
                hubos::Event::user(
                    EVT_SENSOR_SAMPLE,
                    EventPayload::new(SampleReading { centi_deg }),
                ),
                false,
            )
            .is_err()
        {
            info!("sample dropped: internal queue full");
        }
    }
    let _ = handle.enqueue_private(EVT_POKE, None, 1);
    // Misrouted on purpose: the payload is still released by the kernel.
    let _ = handle.enqueue_private(EVT_POKE, Some(EventPayload::new(0u32)), 999);
    let _ = handle.defer(Box::new(|| info!("deferred maintenance ran")));

    kernel.run(&mut platform)
}
