//! Loaded-module and section records.
//!
//! These are the values exchanged with the debugger core: the merged module
//! list is a `Vec<LoadedModule>`, and relocation rewrites a `TargetSection`.

use super::{Address, CodeObjectId};

/// Capacity of a module's display name, including the terminator slot kept for
/// consumers that copy it into fixed-size buffers.
pub const SO_NAME_CAPACITY: usize = 512;

/// Where a loaded module was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleOrigin
{
    /// Reported by the host's dynamic-loader tracking.
    Host,
    /// Reported by the device introspection collaborator.
    Device,
}

/// One entry of the loaded-module list.
///
/// `so_name` is what gets opened (a path or a code-object locator);
/// `original_name` is the identity the debugger core uses to decide whether a
/// module is new. For device modules the identity is derived from the
/// device-assigned handle so that reloading the same locator at another
/// address yields a distinct module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule
{
    /// Name used to open the image (path or locator, possibly truncated).
    pub so_name: String,
    /// Unique identity of this module within the list.
    pub original_name: String,
    /// Bias added to every section address of the image.
    pub load_bias: Address,
    /// Which loader reported this module.
    pub origin: ModuleOrigin,
}

impl LoadedModule
{
    /// A host module whose path doubles as its identity.
    #[must_use]
    pub fn host(path: impl Into<String>, load_bias: Address) -> Self
    {
        let path = path.into();
        Self {
            original_name: path.clone(),
            so_name: path,
            load_bias,
            origin: ModuleOrigin::Host,
        }
    }

    /// A device module built from a code object's locator and handle.
    ///
    /// The locator is truncated to fit `capacity` bytes including a terminator,
    /// cutting on a character boundary.
    #[must_use]
    pub fn device(locator: &str, id: CodeObjectId, load_bias: Address, capacity: usize) -> Self
    {
        Self {
            so_name: truncate_name(locator, capacity).to_string(),
            original_name: format!("code_object_{}", id.raw()),
            load_bias,
            origin: ModuleOrigin::Device,
        }
    }

    /// Whether this module came from the device introspection collaborator.
    #[must_use]
    pub fn is_device(&self) -> bool
    {
        self.origin == ModuleOrigin::Device
    }
}

/// Longest prefix of `name` that fits in `capacity` bytes with room for a terminator.
fn truncate_name(name: &str, capacity: usize) -> &str
{
    let limit = capacity.saturating_sub(1);
    if name.len() <= limit {
        return name;
    }

    let mut end = limit;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// An address range of one section of a loaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSection
{
    /// Section name, e.g. `.text`.
    pub name: String,
    /// First address of the section.
    pub addr: u64,
    /// One past the last address of the section.
    pub endaddr: u64,
}

impl TargetSection
{
    /// Build a section from its link-time address and size.
    #[must_use]
    pub fn new(name: impl Into<String>, addr: u64, size: u64) -> Self
    {
        Self {
            name: name.into(),
            addr,
            endaddr: addr.wrapping_add(size),
        }
    }

    /// Shift both ends of the range by `bias`.
    pub fn apply_bias(&mut self, bias: Address)
    {
        self.addr = (Address::from(self.addr) + bias.value()).value();
        self.endaddr = (Address::from(self.endaddr) + bias.value()).value();
    }
}
