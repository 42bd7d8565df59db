//! Task descriptors and the fixed task table.
//!
//! Tasks are created during bring-up only, from app headers the registry
//! yields; none are added afterwards and there is no teardown short of
//! reboot. A task is addressed by its tid everywhere — slot pointers move
//! (failed init compacts the table with a swap-remove) but tids never do,
//! and slot indices are never exposed.

use crate::config::MAX_TASKS;
use crate::ports::{AppHost, LoaderKind};
use crate::subs::SubscriptionSet;

/// Marker bytes every app header must open with.
pub const APP_MAGIC: [u8; 8] = *b"HubOSApp";

/// Current app header version.
pub const APP_VERSION_CUR: u16 = 1;

/// Provenance/validity marker in an app header. Each region accepts
/// exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMarker {
    /// App linked into the image itself.
    Internal,
    /// Installed app in the external region, valid for loading.
    Valid,
}

/// Read-only metadata record at the start of an app image.
#[derive(Debug, PartialEq, Eq)]
pub struct AppHeader {
    pub magic: [u8; 8],
    pub version: u16,
    pub marker: AppMarker,
    /// 64-bit unique application id.
    pub app_id: u64,
    /// Byte length of the whole image record; the external-region walk
    /// advances by this.
    pub rel_end: u32,
}

impl AppHeader {
    /// A current-version header, as the packaging tool emits it.
    pub const fn new(app_id: u64, marker: AppMarker) -> Self {
        Self {
            magic: APP_MAGIC,
            version: APP_VERSION_CUR,
            marker,
            app_id,
            rel_end: core::mem::size_of::<AppHeader>() as u32,
        }
    }

    /// Whether this header is acceptable for the region it was found in.
    pub fn valid_for(&self, kind: LoaderKind) -> bool {
        if self.magic != APP_MAGIC || self.version != APP_VERSION_CUR {
            return false;
        }
        match kind {
            LoaderKind::Internal => self.marker == AppMarker::Internal,
            LoaderKind::External => self.marker == AppMarker::Valid,
        }
    }
}

// ── Task descriptor ───────────────────────────────────────────

/// One hosted app: header reference, the loader's opaque record, and the
/// subscription set.
pub struct Task<H: AppHost> {
    pub(crate) tid: u32,
    pub(crate) header: &'static AppHeader,
    pub(crate) plat: H::PlatInfo,
    pub(crate) subs: SubscriptionSet,
}

impl<H: AppHost> Task<H> {
    /// Stable non-zero task id.
    pub fn tid(&self) -> u32 {
        self.tid
    }

    pub fn app_id(&self) -> u64 {
        self.header.app_id
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subs
    }
}

// ── Task table ────────────────────────────────────────────────

/// Fixed-size task table with monotonic tid assignment starting at 1.
pub struct TaskTable<H: AppHost> {
    tasks: heapless::Vec<Task<H>, MAX_TASKS>,
    next_tid: u32,
}

impl<H: AppHost> TaskTable<H> {
    pub fn new() -> Self {
        Self {
            tasks: heapless::Vec::new(),
            next_tid: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tasks.is_full()
    }

    pub fn has_app_id(&self, app_id: u64) -> bool {
        self.tasks.iter().any(|t| t.header.app_id == app_id)
    }

    /// Register a loaded app and assign the next tid. The caller has
    /// already validated the header, checked for duplicates and loaded
    /// the image.
    pub(crate) fn register(&mut self, header: &'static AppHeader, plat: H::PlatInfo) -> Option<u32> {
        if self.is_full() {
            return None;
        }
        let tid = self.next_tid;
        let task = Task {
            tid,
            header,
            plat,
            subs: SubscriptionSet::new(),
        };
        // Cannot fail: fullness was checked above.
        let _ = self.tasks.push(task);
        self.next_tid += 1;
        Some(tid)
    }

    pub(crate) fn find_by_tid_mut(&mut self, tid: u32) -> Option<&mut Task<H>> {
        self.tasks.iter_mut().find(|t| t.tid == tid)
    }

    pub fn find_by_tid(&self, tid: u32) -> Option<&Task<H>> {
        self.tasks.iter().find(|t| t.tid == tid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task<H>> {
        self.tasks.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task<H>> {
        self.tasks.iter_mut()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Task<H>> {
        self.tasks.get_mut(index)
    }

    /// Compact the table after a failed init: move the last entry into
    /// the hole. Correct because nothing references slot indices.
    pub(crate) fn swap_remove(&mut self, index: usize) -> Task<H> {
        self.tasks.swap_remove(index)
    }
}

impl<H: AppHost> Default for TaskTable<H> {
    fn default() -> Self {
        Self::new()
    }
}
