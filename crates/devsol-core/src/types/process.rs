//! Process, device context, and code object identities.

use std::fmt;

/// Process identifier (PID) of a debugged host process
///
/// The module registry is keyed by this value, and `memory://` locators encode
/// it to name the process whose memory holds the code object.
///
/// ```rust
/// use devsol_core::types::ProcessId;
///
/// let pid = ProcessId::from(4242);
/// assert_eq!(u32::from(pid), 4242);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Handle of a device-side execution environment within a process.
///
/// Issued by the introspection collaborator once its runtime has attached to
/// the process; opaque to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceContextId(pub u64);

/// Opaque handle the device runtime assigns to one loaded code object.
///
/// Handles are unique among the code objects alive in a context, even when two
/// of them were loaded from the same locator, which is why the loader derives
/// module identity from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeObjectId(pub u64);

impl CodeObjectId
{
    /// Raw numeric handle.
    #[must_use]
    pub const fn raw(self) -> u64
    {
        self.0
    }
}

/// CPU architecture of a binary image
///
/// Determined from the ELF `e_machine` field when an image is opened. Relocation
/// is chosen per architecture: device images get a flat load bias, everything
/// else goes through the host loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture
{
    /// 64-bit ARM
    Arm64,
    /// 64-bit x86
    X86_64,
    /// AMD GPU (GCN and later) device code
    Amdgcn,
    /// Anything else; the string is a short description for diagnostics
    Unknown(&'static str),
}

impl Architecture
{
    /// Whether images of this architecture run on the accelerator rather than the host.
    #[must_use]
    pub const fn is_device(self) -> bool
    {
        matches!(self, Architecture::Amdgcn)
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Architecture::Arm64 => write!(f, "arm64"),
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::Amdgcn => write!(f, "amdgcn"),
            Architecture::Unknown(name) => write!(f, "unknown ({name})"),
        }
    }
}
