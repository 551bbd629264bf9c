//! # Types
//!
//! Plain data shared by every layer of the loader: addresses, process and
//! device identities, and the module/section records the debugger core
//! consumes.

pub mod address;
pub mod module;
pub mod process;

pub use address::Address;
pub use module::{LoadedModule, ModuleOrigin, TargetSection};
pub use process::{Architecture, CodeObjectId, DeviceContextId, ProcessId};
