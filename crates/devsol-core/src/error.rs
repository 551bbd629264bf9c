//! # Error Types
//!
//! Error handling for code-object discovery and loading.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Almost every error here is scoped to a single module: the loader logs it
//! with the offending locator and moves on to the next code object. Nothing in
//! this crate aborts a refresh or the debugger.

use std::io;

use thiserror::Error;

/// Main error type for loader operations
///
/// ## Error Categories
///
/// 1. **Locator errors**: MalformedUri, NonUtf8Path, UnsupportedProtocol, InvalidInteger, InvalidSize, MissingSize
/// 2. **Identity errors**: ForeignProcess
/// 3. **Image errors**: NotExecutable, UnsupportedOsAbi, UnsupportedAbiVersion, BadValue
/// 4. **Target errors**: MemoryCopy, MemoryRead, NoProcess, Introspection, Io
/// 5. **Control**: Interrupted
#[derive(Error, Debug)]
pub enum LoaderError
{
    /// The locator has no `://` protocol delimiter.
    #[error("`{0}': malformed code object URI")]
    MalformedUri(String),

    /// The percent-decoded path is not valid UTF-8.
    #[error("`{0}': code object path is not valid UTF-8")]
    NonUtf8Path(String),

    /// Only `file` and `memory` locators can be resolved.
    #[error("`{uri}': protocol not supported: {protocol}")]
    UnsupportedProtocol
    {
        /// Full locator string
        uri: String,
        /// Lower-cased protocol
        protocol: String,
    },

    /// A query parameter (or the memory-protocol process id) is not an unsigned integer.
    #[error("failed to parse integer for `{key}': {value:?}")]
    InvalidInteger
    {
        /// Parameter name (`offset`, `size`, or `pid`)
        key: &'static str,
        /// The raw text that failed to parse
        value: String,
    },

    /// `size=0` was given.
    #[error("`{0}': invalid size value")]
    InvalidSize(String),

    /// The locator needs an explicit `size` (memory snapshots).
    #[error("`{0}': a size is required to copy a code object from memory")]
    MissingSize(String),

    /// A `memory://` locator names a process other than the one being debugged.
    #[error("`{uri}': code object is from another process ({owner})")]
    ForeignProcess
    {
        /// Full locator string
        uri: String,
        /// Process id encoded in the locator
        owner: u64,
    },

    /// Copying the code object out of target memory failed.
    #[error("`{uri}': failed to copy the code object from the process: {reason}")]
    MemoryCopy
    {
        /// Full locator string
        uri: String,
        /// Description of the underlying memory error
        reason: String,
    },

    /// Reading target memory failed.
    #[error("failed to read {len} bytes of target memory at 0x{address:x}")]
    MemoryRead
    {
        /// Start address of the failed read
        address: u64,
        /// Requested length
        len: usize,
    },

    /// A value read from the target or the image is out of range.
    ///
    /// Raised, for example, when a file stream's base offset lies at or past
    /// the end of the remote file.
    #[error("bad value: {0}")]
    BadValue(String),

    /// The user interrupted a remote transfer.
    #[error("interrupted")]
    Interrupted,

    /// The image is not an executable container we understand.
    #[error("`{name}': not in executable format: {reason}")]
    NotExecutable
    {
        /// Image name or locator
        name: String,
        /// Parser diagnostic
        reason: String,
    },

    /// The ELF OS/ABI tag is not the device ABI.
    #[error("`{name}': ELF file OS ABI is not supported ({osabi})")]
    UnsupportedOsAbi
    {
        /// Image name or locator
        name: String,
        /// `EI_OSABI` found in the image
        osabi: u8,
    },

    /// The ELF ABI version is older than the minimum supported.
    #[error("`{name}': ELF file OS ABI version is not supported ({version})")]
    UnsupportedAbiVersion
    {
        /// Image name or locator
        name: String,
        /// `EI_ABIVERSION` found in the image
        version: u8,
    },

    /// A device locator was opened while no process is being debugged.
    #[error("no process is being debugged")]
    NoProcess,

    /// The device introspection collaborator reported a failure.
    #[error("device introspection failed: {0}")]
    Introspection(String),

    /// I/O error from the remote file collaborator (or a local file).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl LoaderError
{
    /// Whether this error came from a user interrupt rather than the target.
    #[must_use]
    pub fn is_interrupt(&self) -> bool
    {
        matches!(self, Self::Interrupted)
    }
}

/// Convenience type alias for `Result<T, LoaderError>`
///
/// ```rust
/// use devsol_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, LoaderError>;
