//! # Shared Library Tracking
//!
//! Discovery of device code objects and their presentation as ordinary loaded
//! modules:
//!
//! - [`registry`]: per-process device module lists, rebuilt from the device runtime
//! - [`loader`]: the [`DeviceLoader`] decorator over the host's [`HostLoader`]
//! - [`view`]: the debugger core's opened-module cache kept in sync with the loader

pub mod loader;
pub mod registry;
pub mod view;

pub use loader::{DeviceLoader, HostLoader};
pub use registry::ModuleRegistry;
pub use view::{ModuleView, SyncReport, ViewEntry};
