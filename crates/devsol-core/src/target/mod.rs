//! # Target Collaborators
//!
//! Interfaces to the parts of the debugger this crate relies on but does not
//! implement: remote file access, target memory, and the device runtime's
//! introspection API.
//!
//! The loader only ever talks to these traits, which keeps it usable against a
//! native process, a remote stub, or the in-memory fakes used by the tests.
//! [`local`] holds the implementations the CLI uses on the debugger's own host.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{Address, CodeObjectId, DeviceContextId, ProcessId};

#[cfg(unix)]
pub mod local;

/// Handle to a file opened through [`RemoteFileIo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoteFd(pub u64);

/// Flags for [`RemoteFileIo::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags
{
    /// Open for writing as well as reading.
    pub write: bool,
    /// Create the file if it does not exist.
    pub create: bool,
}

impl OpenFlags
{
    /// Read-only, never create. Code objects are only ever opened this way.
    #[must_use]
    pub const fn read_only() -> Self
    {
        Self {
            write: false,
            create: false,
        }
    }
}

/// File I/O performed on the machine where the target runs.
///
/// Mirrors the `open`/`pread`/`fstat`/`close` primitives a remote debugging
/// stub offers. Errors carry the target-side errno as an [`io::Error`].
pub trait RemoteFileIo
{
    /// Open `path` on the target.
    ///
    /// # Errors
    ///
    /// Any error reported by the target (missing file, permissions, ...).
    fn open(&self, path: &str, flags: OpenFlags) -> io::Result<RemoteFd>;

    /// Read up to `buf.len()` bytes at `offset`. `Ok(0)` means end of file.
    ///
    /// # Errors
    ///
    /// Any error reported by the target.
    fn pread(&self, fd: RemoteFd, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Total size of the open file in bytes.
    ///
    /// # Errors
    ///
    /// Any error reported by the target.
    fn fstat(&self, fd: RemoteFd) -> io::Result<u64>;

    /// Release `fd`.
    ///
    /// # Errors
    ///
    /// Any error reported by the target.
    fn close(&self, fd: RemoteFd) -> io::Result<()>;
}

/// Read access to the debugged process's memory.
pub trait TargetMemory
{
    /// Read `len` bytes starting at `addr`.
    ///
    /// # Errors
    ///
    /// `MemoryRead` (or `Io`) if any part of the range is unreadable.
    fn read_memory(&self, addr: Address, len: usize) -> Result<Vec<u8>>;
}

/// Attributes that can be queried for a code object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeObjectAttribute
{
    /// Address the code object was loaded at (its load bias).
    LoadAddress,
    /// Locator URI of the code object's bytes.
    UriName,
}

/// Value of a [`CodeObjectAttribute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue
{
    Address(Address),
    Uri(String),
}

/// The device runtime's debugging API.
pub trait DeviceIntrospection
{
    /// Device context of `pid`, or `None` while the device runtime is not attached.
    fn process_context(&self, pid: ProcessId) -> Option<DeviceContextId>;

    /// Every code object currently loaded in `context`, in runtime order.
    ///
    /// # Errors
    ///
    /// `Introspection` if the runtime cannot enumerate the context.
    fn code_objects(&self, context: DeviceContextId) -> Result<Vec<CodeObjectId>>;

    /// Look up one attribute of a code object.
    ///
    /// # Errors
    ///
    /// `Introspection` if the id is stale or the attribute unavailable.
    fn code_object_attribute(&self, id: CodeObjectId, attribute: CodeObjectAttribute) -> Result<AttributeValue>;
}

/// The collaborators a loader needs, bundled for cheap cloning into streams.
#[derive(Clone)]
pub struct TargetServices
{
    pub files: Arc<dyn RemoteFileIo>,
    pub memory: Arc<dyn TargetMemory>,
    pub introspection: Arc<dyn DeviceIntrospection>,
}

impl TargetServices
{
    #[must_use]
    pub fn new(
        files: Arc<dyn RemoteFileIo>,
        memory: Arc<dyn TargetMemory>,
        introspection: Arc<dyn DeviceIntrospection>,
    ) -> Self
    {
        Self {
            files,
            memory,
            introspection,
        }
    }
}

impl fmt::Debug for TargetServices
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("TargetServices").finish_non_exhaustive()
    }
}

/// Introspection for a target without a device runtime: no context, ever.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDeviceRuntime;

impl DeviceIntrospection for NoDeviceRuntime
{
    fn process_context(&self, _pid: ProcessId) -> Option<DeviceContextId>
    {
        None
    }

    fn code_objects(&self, _context: DeviceContextId) -> Result<Vec<CodeObjectId>>
    {
        Ok(Vec::new())
    }

    fn code_object_attribute(&self, id: CodeObjectId, _attribute: CodeObjectAttribute) -> Result<AttributeValue>
    {
        Err(crate::error::LoaderError::Introspection(format!(
            "no device runtime to describe code object {}",
            id.raw()
        )))
    }
}
