//! Dynamic app host and static app registry.
//!
//! [`DynAppHost`] is the per-platform loader for a host build: the
//! opaque load record is the live app object itself, constructed from a
//! factory registered per application id. Hosted apps talk to the kernel
//! exclusively through the exported syscall table, like real userspace.
//!
//! [`StaticRegistry`] is the build/link layer's app-region scan reduced
//! to a list: it yields candidate headers in order and owns nothing
//! else; validation stays in the kernel.

use core::any::Any;
use std::collections::HashMap;

use log::error;

use crate::ports::{AppHost, AppRegistry, LoaderKind};
use crate::syscall::OsSyscallTable;
use crate::task::AppHeader;

use super::sim::SyscallCell;

/// A live app instance hosted by [`DynAppHost`].
pub trait HostedApp {
    /// Called once when the task starts; `false` removes the task from
    /// the table again.
    fn start(&mut self, tid: u32, sys: &OsSyscallTable) -> bool;

    /// Called for every delivered event, on the dispatch context.
    fn handle(&mut self, evt_type: u32, data: Option<&(dyn Any + Send)>, sys: &OsSyscallTable);

    /// Called when the task is unloaded after a failed start.
    fn end(&mut self) {}
}

type AppFactory = Box<dyn Fn() -> Box<dyn HostedApp>>;

/// Factory-based app host: `load` constructs the app object, `init`
/// starts it with the syscall table, `handle` forwards events.
pub struct DynAppHost {
    factories: HashMap<u64, AppFactory>,
    syscalls: SyscallCell,
}

impl DynAppHost {
    /// `syscalls` must be the cell the syscall registry publishes into;
    /// bring-up exports the table before any app starts.
    pub fn new(syscalls: SyscallCell) -> Self {
        Self {
            factories: HashMap::new(),
            syscalls,
        }
    }

    /// Register the factory for one application id.
    pub fn register(&mut self, app_id: u64, factory: impl Fn() -> Box<dyn HostedApp> + 'static) {
        self.factories.insert(app_id, Box::new(factory));
    }
}

impl AppHost for DynAppHost {
    type PlatInfo = Box<dyn HostedApp>;

    fn load(&mut self, header: &'static AppHeader, _kind: LoaderKind) -> Option<Self::PlatInfo> {
        self.factories.get(&header.app_id).map(|factory| factory())
    }

    fn init(&mut self, header: &'static AppHeader, plat: &mut Self::PlatInfo, tid: u32) -> bool {
        let Some(sys) = self.syscalls.get() else {
            error!("app {:#x} started before syscall export", header.app_id);
            return false;
        };
        plat.start(tid, sys)
    }

    fn unload(&mut self, _header: &'static AppHeader, plat: &mut Self::PlatInfo) {
        plat.end();
    }

    fn handle(
        &mut self,
        _header: &'static AppHeader,
        plat: &mut Self::PlatInfo,
        evt_type: u32,
        data: Option<&(dyn Any + Send)>,
    ) {
        if let Some(sys) = self.syscalls.get() {
            plat.handle(evt_type, data, sys);
        }
    }
}

// ── Registry ──────────────────────────────────────────────────

/// App registry backed by a plain list of candidate headers.
pub struct StaticRegistry {
    apps: Vec<(&'static AppHeader, LoaderKind)>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self { apps: Vec::new() }
    }

    pub fn push(&mut self, header: &'static AppHeader, kind: LoaderKind) {
        self.apps.push((header, kind));
    }
}

impl Default for StaticRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AppRegistry for StaticRegistry {
    fn candidates(&self) -> impl Iterator<Item = (&'static AppHeader, LoaderKind)> + '_ {
        self.apps.iter().copied()
    }
}
