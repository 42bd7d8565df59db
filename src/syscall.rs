//! Typed syscall surface (domain OS, version 1).
//!
//! Each syscall is a strongly-typed descriptor keyed by its table path
//! and opcode; dispatch is a tagged-variant match instead of a variadic
//! unpack. The kernel exports one [`OsSyscallTable`] into the syscall
//! registry at bring-up:
//!
//! ```text
//! OS ─ MAIN ─┬─ EVENTQ ─┬─ SUBSCRIBE
//!            │          ├─ UNSUBSCRIBE
//!            │          ├─ ENQUEUE
//!            │          └─ FUNC_DEFER
//!            └─ LOG ──────  LOGV
//! ```
//!
//! `FUNC_DEFER` is the one call with cross-privilege lifetime: the
//! caller's `(fn, cookie)` pair is wrapped in a [`UserspaceCallback`]
//! handle and a single generic trampoline invokes it exactly once, then
//! releases the handle. The kernel's own defer primitive stays minimal.

use crate::events::{Event, EventData, EventPayload};
use crate::kernel::KernelHandle;
use crate::logging::{LogLevel, logv};

/// Version of the exported OS table.
pub const SYSCALL_OS_VERSION: u32 = 1;

/// Top-level syscall domains. The kernel owns exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallDomain {
    Os,
}

/// Sub-tables under OS.MAIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OsTable {
    EventQ = 0,
    Logging = 1,
}

/// Opcodes in the OS.MAIN.EVENTQ table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EventQOp {
    Subscribe = 0,
    Unsubscribe = 1,
    Enqueue = 2,
    FuncDefer = 3,
}

/// Opcodes in the OS.MAIN.LOG table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LogOp {
    Logv = 0,
}

/// Userspace deferred-callback handle: a plain function pointer and an
/// opaque cookie, the only shape that crosses the privilege boundary.
pub struct UserspaceCallback {
    pub func: fn(usize),
    pub cookie: usize,
}

/// Generic trampoline: invoke the userspace callback once, then release
/// the handle. Every accepted defer runs through here.
fn defer_trampoline(ucbk: Box<UserspaceCallback>) {
    (ucbk.func)(ucbk.cookie);
}

// ── Descriptors ───────────────────────────────────────────────

/// One typed descriptor per syscall.
pub enum OsSyscall {
    EventqSubscribe {
        tid: u32,
        evt_type: u32,
    },
    EventqUnsubscribe {
        tid: u32,
        evt_type: u32,
    },
    EventqEnqueue {
        evt_type: u32,
        data: Option<EventPayload>,
        external: bool,
    },
    EventqFuncDefer {
        callback: UserspaceCallback,
    },
    LogLogv {
        level: LogLevel,
        message: String,
    },
}

impl OsSyscall {
    /// The (sub-table, opcode) pair this descriptor dispatches through.
    pub fn path(&self) -> (OsTable, u32) {
        match self {
            Self::EventqSubscribe { .. } => (OsTable::EventQ, EventQOp::Subscribe as u32),
            Self::EventqUnsubscribe { .. } => (OsTable::EventQ, EventQOp::Unsubscribe as u32),
            Self::EventqEnqueue { .. } => (OsTable::EventQ, EventQOp::Enqueue as u32),
            Self::EventqFuncDefer { .. } => (OsTable::EventQ, EventQOp::FuncDefer as u32),
            Self::LogLogv { .. } => (OsTable::Logging, LogOp::Logv as u32),
        }
    }
}

/// Result of a dispatched syscall.
#[derive(Debug)]
pub enum OsSyscallRet {
    /// Plain success flag (subscribe/unsubscribe/defer, accepted enqueue).
    Bool(bool),
    /// Enqueue refused at capacity; payload ownership returns to the
    /// caller.
    Refused(Option<EventPayload>),
    /// No return value (LOGV).
    Unit,
}

impl OsSyscallRet {
    /// Collapse to the C-style success flag.
    pub fn succeeded(&self) -> bool {
        match self {
            Self::Bool(ok) => *ok,
            Self::Refused(_) => false,
            Self::Unit => true,
        }
    }
}

// ── Dispatch table ────────────────────────────────────────────

/// The OS base API table the kernel exports. Thin façade: every entry
/// translates its descriptor into one kernel operation.
#[derive(Clone)]
pub struct OsSyscallTable {
    kernel: KernelHandle,
}

impl OsSyscallTable {
    pub fn new(kernel: KernelHandle) -> Self {
        Self { kernel }
    }

    pub fn call(&self, syscall: OsSyscall) -> OsSyscallRet {
        match syscall {
            OsSyscall::EventqSubscribe { tid, evt_type } => {
                OsSyscallRet::Bool(self.kernel.event_subscribe(tid, evt_type))
            }
            OsSyscall::EventqUnsubscribe { tid, evt_type } => {
                OsSyscallRet::Bool(self.kernel.event_unsubscribe(tid, evt_type))
            }
            OsSyscall::EventqEnqueue {
                evt_type,
                data,
                external,
            } => {
                let evt = match data {
                    Some(payload) => Event::user(evt_type, payload),
                    None => Event::empty(evt_type),
                };
                match self.kernel.enqueue(evt, external) {
                    Ok(()) => OsSyscallRet::Bool(true),
                    Err(evt) => OsSyscallRet::Refused(match evt.data {
                        EventData::User(payload) => Some(payload),
                        _ => None,
                    }),
                }
            }
            OsSyscall::EventqFuncDefer { callback } => {
                let ucbk = Box::new(callback);
                OsSyscallRet::Bool(self.kernel.defer(Box::new(move || defer_trampoline(ucbk))))
            }
            OsSyscall::LogLogv { level, message } => {
                logv(level, format_args!("{}", message));
                OsSyscallRet::Unit
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_stable() {
        let sub = OsSyscall::EventqSubscribe {
            tid: 1,
            evt_type: 0x100,
        };
        assert_eq!(sub.path(), (OsTable::EventQ, 0));

        let log = OsSyscall::LogLogv {
            level: LogLevel::Info,
            message: String::new(),
        };
        assert_eq!(log.path(), (OsTable::Logging, 0));
    }

    #[test]
    fn succeeded_collapses_like_a_flag() {
        assert!(OsSyscallRet::Bool(true).succeeded());
        assert!(!OsSyscallRet::Bool(false).succeeded());
        assert!(!OsSyscallRet::Refused(None).succeeded());
        assert!(OsSyscallRet::Unit.succeeded());
    }
}
