//! Kernel error types.
//!
//! Runtime kernel operations report failure as `bool` (or by handing an
//! event back to its producer); this module only covers bring-up, where a
//! collaborator can refuse to initialize, plus the non-recoverable halt.
//! All variants are `Copy` so they pass through the bring-up sequence
//! without allocation.

use core::fmt;

/// Every fallible bring-up step funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The platform collaborator failed core or timer initialisation.
    Platform(&'static str),
    /// The sensor manager failed to come up.
    Sensors(&'static str),
    /// The host-interface driver rejected the drain request.
    HostLink(&'static str),
    /// The application-processor link failed to initialise.
    ApLink(&'static str),
    /// The syscall registry collaborator failed its own init.
    SyscallRegistry(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Platform(msg) => write!(f, "platform: {msg}"),
            Self::Sensors(msg) => write!(f, "sensors: {msg}"),
            Self::HostLink(msg) => write!(f, "host link: {msg}"),
            Self::ApLink(msg) => write!(f, "AP link: {msg}"),
            Self::SyscallRegistry(msg) => write!(f, "syscall registry: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Kernel-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Non-recoverable halt: log and spin forever.
///
/// Used for contract violations and for bring-up failures where the
/// startup shim has nothing better to do; on hardware the watchdog reset
/// fires after its timeout.
pub fn fatal(msg: &str) -> ! {
    log::error!("{} — halting", msg);
    #[allow(clippy::empty_loop)]
    loop {}
}
