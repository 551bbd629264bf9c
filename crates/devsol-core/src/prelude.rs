//! Common module for library exports

pub use crate::config::LoaderConfig;
pub use crate::error::{LoaderError, Result};
pub use crate::events::TargetEvent;
pub use crate::image::{open_code_object, BinaryImage};
pub use crate::interrupt::InterruptFlag;
pub use crate::solib::{DeviceLoader, HostLoader, ModuleRegistry, ModuleView, SyncReport};
pub use crate::stream::{CodeObjectStream, FileStream, MemoryStream};
pub use crate::target::{DeviceIntrospection, RemoteFileIo, TargetMemory, TargetServices};
pub use crate::types::address::Address;
pub use crate::types::module::{LoadedModule, ModuleOrigin, TargetSection};
pub use crate::types::process::{Architecture, CodeObjectId, DeviceContextId, ProcessId};
pub use crate::uri::CodeObjectUri;
