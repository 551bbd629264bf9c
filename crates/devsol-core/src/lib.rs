//! # devsol-core
//!
//! Discovery and loading of device code objects for a heterogeneous debugger.
//!
//! A GPU-enabled process carries code objects for the device alongside its
//! host shared libraries. This crate finds them through the device runtime's
//! introspection API, turns their locators into readable byte streams (a
//! window of a file on the target, or a snapshot of process memory), validates
//! them as device ELF images, and presents them to the debugger core as
//! ordinary loaded modules next to the host's.
//!
//! ## Layers
//!
//! - [`uri`]: `file://` and `memory://` code object locators
//! - [`stream`]: random-access byte streams over remote files and memory snapshots
//! - [`image`]: stream-backed ELF images and device ABI validation
//! - [`solib`]: per-process device module lists and the [`DeviceLoader`] facade
//! - [`target`]: the collaborator traits (remote file I/O, memory, device introspection)
//!
//! ## Why there is no unsafe code
//!
//! Everything that touches the target goes through the [`target`] traits.
//! The local implementations only use `std::fs`, so the crate builds under the
//! workspace-wide `unsafe_code = "forbid"`.

pub mod config;
pub mod error;
pub mod events;
pub mod image;
pub mod interrupt;
pub mod prelude;
pub mod solib;
pub mod stream;
pub mod target;
pub mod types;
pub mod uri;

pub use config::LoaderConfig;
// Re-export commonly used types
pub use error::{LoaderError, Result};
pub use events::TargetEvent;
pub use image::BinaryImage;
pub use interrupt::InterruptFlag;
pub use solib::{DeviceLoader, HostLoader, ModuleView};
pub use target::TargetServices;
pub use types::{Address, LoadedModule, ProcessId, TargetSection};
