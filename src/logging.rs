//! Level-tagged log façade.
//!
//! The kernel logs through the `log` crate; the platform supplies the
//! sink (an adapter implementing `log::Log`). This module carries the
//! kernel's own level enum — the one that crosses the syscall boundary —
//! and the formatted-output entry point behind the LOGV syscall.

use core::fmt;

/// Log severity as seen by hosted apps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        }
    }
}

/// Emit one formatted record at `level` through the installed sink.
///
/// Userspace messages are tagged with their own target so sinks can tell
/// app output from kernel output.
pub fn logv(level: LogLevel, args: fmt::Arguments<'_>) {
    log::logger().log(
        &log::Record::builder()
            .args(args)
            .level(level.into())
            .target("userspace")
            .build(),
    );
}
