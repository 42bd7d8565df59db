//! Simulated board adapters.
//!
//! Each struct stands in for one collaborator the bring-up sequence
//! expects on hardware. They log what the real thing would do and keep
//! just enough state for tests to assert on (interrupt masking, the
//! exported syscall table, the host drain handle).

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::kernel::KernelHandle;
use crate::ports::{ApLinkPort, HostLinkPort, PlatformPort, SensorHubPort, SyscallRegistryPort};
use crate::syscall::{OsSyscallTable, SyscallDomain};

/// Shared slot the syscall registry publishes the exported table into,
/// so hosted apps can reach it the way real userspace reaches the
/// syscall gate.
pub type SyscallCell = Arc<OnceLock<OsSyscallTable>>;

// ── Platform ──────────────────────────────────────────────────

/// Simulated CPU/board: interrupt masking is a flag, the cooperative
/// wait is a short sleep (the timeout keeps periodic work possible even
/// without a wake signal). Either fallible step can be told to fail.
pub struct SimPlatform {
    interrupts_enabled: bool,
    wait: Duration,
    fail_timer: bool,
    fail_init: bool,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self {
            interrupts_enabled: false,
            wait: Duration::from_millis(10),
            fail_timer: false,
            fail_init: false,
        }
    }

    pub fn failing_timer() -> Self {
        Self {
            fail_timer: true,
            ..Self::new()
        }
    }

    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::new()
        }
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformPort for SimPlatform {
    fn interrupts_off(&mut self) {
        self.interrupts_enabled = false;
    }

    fn interrupts_on(&mut self) {
        self.interrupts_enabled = true;
    }

    fn timer_init(&mut self) -> Result<()> {
        if self.fail_timer {
            return Err(Error::Platform("simulated timer failure"));
        }
        debug!("sim timer started");
        Ok(())
    }

    fn init(&mut self) -> Result<()> {
        if self.fail_init {
            return Err(Error::Platform("simulated bring-up failure"));
        }
        debug!("sim platform up");
        Ok(())
    }

    fn init_late(&mut self) {}

    fn wait_for_event(&mut self) {
        std::thread::sleep(self.wait);
    }
}

// ── Sensors ───────────────────────────────────────────────────

/// Simulated sensor manager; can be told to fail bring-up.
pub struct SimSensorHub {
    fail: bool,
}

impl SimSensorHub {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for SimSensorHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorHubPort for SimSensorHub {
    fn init(&mut self) -> Result<()> {
        if self.fail {
            return Err(Error::Sensors("simulated bring-up failure"));
        }
        debug!("sim sensors up");
        Ok(())
    }
}

// ── Syscall registry ──────────────────────────────────────────

/// Simulated syscall registry. Keeps the table the kernel exports and
/// optionally publishes it into a [`SyscallCell`] for hosted apps. Can
/// be told to fail its own init, or to refuse table registration the
/// way a full registry does.
pub struct SimSyscallRegistry {
    export: Option<SyscallCell>,
    table: Option<OsSyscallTable>,
    fail_init: bool,
    refuse_tables: bool,
}

impl SimSyscallRegistry {
    pub fn new() -> Self {
        Self {
            export: None,
            table: None,
            fail_init: false,
            refuse_tables: false,
        }
    }

    pub fn with_export_cell(cell: SyscallCell) -> Self {
        Self {
            export: Some(cell),
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::new()
        }
    }

    pub fn refusing_tables() -> Self {
        Self {
            refuse_tables: true,
            ..Self::new()
        }
    }

    /// The table the kernel registered, if export has happened.
    pub fn table(&self) -> Option<&OsSyscallTable> {
        self.table.as_ref()
    }
}

impl Default for SimSyscallRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SyscallRegistryPort for SimSyscallRegistry {
    fn init(&mut self) -> Result<()> {
        if self.fail_init {
            return Err(Error::SyscallRegistry("simulated bring-up failure"));
        }
        debug!("sim syscall registry up");
        Ok(())
    }

    fn add_table(&mut self, domain: SyscallDomain, version: u32, table: OsSyscallTable) -> bool {
        if self.refuse_tables {
            return false;
        }
        info!("syscall table registered: {domain:?} v{version}");
        if let Some(cell) = &self.export {
            let _ = cell.set(table.clone());
        }
        self.table = Some(table);
        true
    }
}

// ── Host link ─────────────────────────────────────────────────

/// Simulated host-interface driver. Holds the kernel handle it is given
/// at bring-up; with auto-drain it spawns a thread that empties the
/// external queue the way the real transport ships events to the host.
pub struct SimHostLink {
    auto_drain: bool,
    fail: bool,
    handle: Option<KernelHandle>,
}

impl SimHostLink {
    pub fn new() -> Self {
        Self {
            auto_drain: false,
            fail: false,
            handle: None,
        }
    }

    pub fn with_auto_drain() -> Self {
        Self {
            auto_drain: true,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn handle(&self) -> Option<&KernelHandle> {
        self.handle.as_ref()
    }

    /// Drain everything currently in the external queue, logging each
    /// event. Returns how many were shipped.
    pub fn drain_pending(&self) -> usize {
        let Some(kernel) = &self.handle else {
            return 0;
        };
        let mut n = 0;
        while let Some(evt) = kernel.dequeue_external() {
            debug!("host link shipped event {:#x}", evt.evt_type);
            n += 1;
        }
        n
    }
}

impl Default for SimHostLink {
    fn default() -> Self {
        Self::new()
    }
}

impl HostLinkPort for SimHostLink {
    fn request(&mut self, kernel: KernelHandle) -> Result<()> {
        if self.fail {
            return Err(Error::HostLink("simulated transport failure"));
        }
        if self.auto_drain {
            let drain = kernel.clone();
            std::thread::spawn(move || {
                loop {
                    std::thread::sleep(Duration::from_millis(50));
                    while let Some(evt) = drain.dequeue_external() {
                        debug!("host link shipped event {:#x}", evt.evt_type);
                    }
                }
            });
        }
        self.handle = Some(kernel);
        debug!("sim host link up");
        Ok(())
    }
}

// ── AP link ───────────────────────────────────────────────────

/// Simulated application-processor link; can be told to fail bring-up.
pub struct SimApLink {
    fail: bool,
}

impl SimApLink {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for SimApLink {
    fn default() -> Self {
        Self::new()
    }
}

impl ApLinkPort for SimApLink {
    fn init(&mut self) -> Result<()> {
        if self.fail {
            return Err(Error::ApLink("simulated link failure"));
        }
        debug!("sim AP link up");
        Ok(())
    }
}
