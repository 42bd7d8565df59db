//! Port traits — the boundary between the event kernel and its
//! collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Kernel (dispatch core)
//! ```
//!
//! The platform bring-up, sensor manager, host-interface driver, AP link,
//! syscall registry and per-platform app loader all live on the far side
//! of these traits. The kernel consumes them via generics at call sites,
//! so the dispatch core never touches hardware directly and the whole
//! thing runs on a host with simulated adapters.

use core::any::Any;

use crate::error::Result;
use crate::kernel::KernelHandle;
use crate::syscall::{OsSyscallTable, SyscallDomain};
use crate::task::AppHeader;

// ───────────────────────────────────────────────────────────────
// Platform port (CPU, interrupts, timer, cooperative wait)
// ───────────────────────────────────────────────────────────────

/// Board/CPU services the bring-up sequence and dispatch loop rely on.
pub trait PlatformPort {
    /// Mask interrupts. Bring-up runs with interrupts off until the
    /// queues and the task table exist.
    fn interrupts_off(&mut self);

    /// Unmask interrupts.
    fn interrupts_on(&mut self);

    /// Start the system timer.
    fn timer_init(&mut self) -> Result<()>;

    /// Early platform initialisation (heap, clocks, log transport).
    fn init(&mut self) -> Result<()>;

    /// Late CPU initialisation, after the banner is out.
    fn init_late(&mut self);

    /// Cooperative wait until an event may be available. May return
    /// spuriously; the dispatch loop re-checks the queue every time.
    fn wait_for_event(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Sensor manager port
// ───────────────────────────────────────────────────────────────

/// The sensor manager only needs to be brought up in order; everything
/// else it does flows back in as ordinary events.
pub trait SensorHubPort {
    fn init(&mut self) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Host-interface and AP-link ports
// ───────────────────────────────────────────────────────────────

/// Driver for the host transport. At bring-up it receives a kernel
/// handle, which carries the non-blocking external-queue drain alongside
/// the producer entry points.
pub trait HostLinkPort {
    fn request(&mut self, kernel: KernelHandle) -> Result<()>;
}

/// Application-processor interrupt/link bring-up.
pub trait ApLinkPort {
    fn init(&mut self) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Syscall registry port
// ───────────────────────────────────────────────────────────────

/// Registry the kernel exports its syscall table into. A failed export
/// is logged by the kernel but is not fatal.
pub trait SyscallRegistryPort {
    fn init(&mut self) -> Result<()>;

    fn add_table(&mut self, domain: SyscallDomain, version: u32, table: OsSyscallTable) -> bool;
}

// ───────────────────────────────────────────────────────────────
// App hosting ports
// ───────────────────────────────────────────────────────────────

/// Which region a candidate header came from; each accepts a distinct
/// provenance marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    /// Linked into the image between the internal-app symbols.
    Internal,
    /// Found in the external app region (length-prefixed records).
    External,
}

/// Per-platform app loader: owns the opaque load record and the app entry
/// points. `handle` is only ever invoked on the dispatch context.
pub trait AppHost {
    /// Opaque per-platform load record kept in the task descriptor.
    type PlatInfo;

    /// Load the app image. `None` rejects the candidate; no tid is
    /// consumed for it.
    fn load(&mut self, header: &'static AppHeader, kind: LoaderKind) -> Option<Self::PlatInfo>;

    /// Start the app. `false` removes the task from the table again.
    fn init(&mut self, header: &'static AppHeader, plat: &mut Self::PlatInfo, tid: u32) -> bool;

    /// Undo `load` after a failed `init`.
    fn unload(&mut self, header: &'static AppHeader, plat: &mut Self::PlatInfo);

    /// Deliver one event to the app.
    fn handle(
        &mut self,
        header: &'static AppHeader,
        plat: &mut Self::PlatInfo,
        evt_type: u32,
        data: Option<&(dyn Any + Send)>,
    );
}

/// The build/link layer's view of the app regions: an iterator of
/// candidate headers. The registry owns region walking and scan
/// termination; validity, dedup and the task cap stay in the kernel.
pub trait AppRegistry {
    fn candidates(&self) -> impl Iterator<Item = (&'static AppHeader, LoaderKind)> + '_;
}
