//! CPU (host) backend
//!
//! The host backend is always available and doubles as the staging area for
//! cross-backend transfers and as the fallback path for conversions the
//! accelerator does not support.

mod client;
mod device;
mod runtime;
mod sparse;

pub use client::CpuClient;
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
