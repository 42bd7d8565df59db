//! Adapters implementing the kernel's port traits for a host build.
//!
//! On hardware these are the CPU bring-up, the sensor manager, the host
//! transport and the per-platform app loader. The simulation adapters
//! here satisfy the same traits with plain std so the kernel, the demo
//! binary and the test suite all run on a development machine.

pub mod app_host;
pub mod log_sink;
pub mod sim;
