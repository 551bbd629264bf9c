//! # Binary Images
//!
//! Opening code objects as ELF images through `object`'s stream-backed reader.
//!
//! [`BinaryImage::from_stream`] is the generic stream-backed open: it wraps a
//! [`CodeObjectStream`] in a [`ReadCache`] so the parser pulls bytes through
//! the stream's `read`/`stat` instead of from a local file, then records the
//! header and section table. [`open_code_object`] is the device-specific entry
//! point: it resolves a locator to the right stream, opens it, and checks that
//! the result really is a device code object we can debug.
//!
//! The image owns its stream, so dropping the image closes the remote file or
//! frees the memory snapshot.

use std::fmt;
use std::sync::Arc;

use object::elf::{self, FileHeader64};
use object::read::elf::{FileHeader, SectionHeader};
use object::read::ReadCache;
use object::{Endianness, FileKind, ReadRef};
use tracing::debug;

use crate::config::{LoaderConfig, EM_AMDGPU};
use crate::error::{LoaderError, Result};
use crate::interrupt::InterruptFlag;
use crate::stream::{CodeObjectStream, FileStream, MemoryStream, StreamReader};
use crate::target::{OpenFlags, TargetServices};
use crate::types::{Address, Architecture, ProcessId, TargetSection};
use crate::uri::{parse_unsigned, CodeObjectUri, Protocol};

/// One allocated section of an image, at its link-time address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSection
{
    pub name: String,
    pub address: u64,
    pub size: u64,
}

/// An opened ELF image backed by a [`CodeObjectStream`].
pub struct BinaryImage
{
    name: String,
    kind: FileKind,
    architecture: Architecture,
    osabi: u8,
    abi_version: u8,
    sections: Vec<ImageSection>,
    data: ReadCache<StreamReader>,
}

impl BinaryImage
{
    /// Open any stream as an ELF64 image.
    ///
    /// No ABI checks are made here; host images come through this path too.
    ///
    /// # Errors
    ///
    /// `NotExecutable` if the bytes are not a well-formed ELF64 file, or the
    /// stream's own error if reading failed underneath the parser.
    pub fn from_stream(name: impl Into<String>, stream: Box<dyn CodeObjectStream>) -> Result<Self>
    {
        let name = name.into();
        let data = ReadCache::new(StreamReader::new(stream));

        let parsed = parse_header(&name, &data);
        let header = match parsed {
            Ok(header) => header,
            // Prefer the stream's error (I/O, interrupt) over the parser's
            // generic "could not read" message.
            Err(err) => return Err(data.into_inner().take_error().unwrap_or(err)),
        };

        debug!(
            image = %name,
            architecture = %header.architecture,
            osabi = header.osabi,
            abi_version = header.abi_version,
            sections = header.sections.len(),
            "opened binary image"
        );

        Ok(Self {
            name,
            kind: header.kind,
            architecture: header.architecture,
            osabi: header.osabi,
            abi_version: header.abi_version,
            sections: header.sections,
            data,
        })
    }

    /// Name the image was opened under (path or locator).
    #[must_use]
    pub fn name(&self) -> &str
    {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> FileKind
    {
        self.kind
    }

    #[must_use]
    pub fn architecture(&self) -> Architecture
    {
        self.architecture
    }

    /// `EI_OSABI` of the image.
    #[must_use]
    pub fn osabi(&self) -> u8
    {
        self.osabi
    }

    /// `EI_ABIVERSION` of the image.
    #[must_use]
    pub fn abi_version(&self) -> u8
    {
        self.abi_version
    }

    /// Sections occupying memory at run time (`SHF_ALLOC`), in file order.
    #[must_use]
    pub fn sections(&self) -> &[ImageSection]
    {
        &self.sections
    }

    /// Link-time address ranges of the allocated sections, ready to be relocated.
    #[must_use]
    pub fn target_sections(&self) -> Vec<TargetSection>
    {
        self.sections
            .iter()
            .map(|section| TargetSection::new(section.name.clone(), section.address, section.size))
            .collect()
    }

    /// Read `len` bytes of the image file at `offset`.
    ///
    /// # Errors
    ///
    /// `BadValue` if the range is outside the image or could not be read.
    pub fn read_at(&self, offset: u64, len: u64) -> Result<&[u8]>
    {
        (&self.data)
            .read_bytes_at(offset, len)
            .map_err(|()| LoaderError::BadValue(format!("`{}': cannot read {len} bytes at {offset:#x}", self.name)))
    }

    /// Total length of the underlying stream.
    ///
    /// # Errors
    ///
    /// `BadValue` if the stream cannot report its size.
    pub fn stream_len(&self) -> Result<u64>
    {
        (&self.data)
            .len()
            .map_err(|()| LoaderError::BadValue(format!("`{}': cannot determine image size", self.name)))
    }
}

impl fmt::Debug for BinaryImage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("BinaryImage")
            .field("name", &self.name)
            .field("architecture", &self.architecture)
            .field("osabi", &self.osabi)
            .field("abi_version", &self.abi_version)
            .field("sections", &self.sections.len())
            .finish_non_exhaustive()
    }
}

struct ParsedHeader
{
    kind: FileKind,
    architecture: Architecture,
    osabi: u8,
    abi_version: u8,
    sections: Vec<ImageSection>,
}

fn parse_header(name: &str, data: &ReadCache<StreamReader>) -> Result<ParsedHeader>
{
    let not_executable = |reason: String| LoaderError::NotExecutable {
        name: name.to_string(),
        reason,
    };

    let kind = FileKind::parse(data).map_err(|err| not_executable(err.to_string()))?;
    if !matches!(kind, FileKind::Elf64) {
        return Err(not_executable(format!("unsupported container {kind:?}")));
    }

    let header = FileHeader64::<Endianness>::parse(data).map_err(|err| not_executable(err.to_string()))?;
    let endian = header.endian().map_err(|err| not_executable(err.to_string()))?;
    let ident = header.e_ident();

    let table = header
        .sections(endian, data)
        .map_err(|err| not_executable(err.to_string()))?;
    let mut sections = Vec::new();
    for section in table.iter() {
        if section.sh_flags(endian) & u64::from(elf::SHF_ALLOC) == 0 {
            continue;
        }
        let raw_name = table
            .section_name(endian, section)
            .map_err(|err| not_executable(err.to_string()))?;
        sections.push(ImageSection {
            name: String::from_utf8_lossy(raw_name).into_owned(),
            address: section.sh_addr(endian),
            size: section.sh_size(endian),
        });
    }

    Ok(ParsedHeader {
        kind,
        architecture: architecture_of(header.e_machine(endian)),
        osabi: ident.os_abi,
        abi_version: ident.abi_version,
        sections,
    })
}

fn architecture_of(machine: u16) -> Architecture
{
    match machine {
        EM_AMDGPU => Architecture::Amdgcn,
        elf::EM_X86_64 => Architecture::X86_64,
        elf::EM_AARCH64 => Architecture::Arm64,
        _ => Architecture::Unknown("unrecognised e_machine"),
    }
}

/// Check that an opened image is a device code object we support.
///
/// # Errors
///
/// `UnsupportedOsAbi` or `UnsupportedAbiVersion`.
pub fn validate_device_image(image: &BinaryImage, config: &LoaderConfig) -> Result<()>
{
    if image.osabi() != config.device_osabi {
        return Err(LoaderError::UnsupportedOsAbi {
            name: image.name().to_string(),
            osabi: image.osabi(),
        });
    }

    if image.abi_version() < config.min_abi_version {
        return Err(LoaderError::UnsupportedAbiVersion {
            name: image.name().to_string(),
            version: image.abi_version(),
        });
    }

    Ok(())
}

/// Resolve `locator` to a stream and open it as a device code object.
///
/// `pid` is the process being debugged; `memory://` locators must name it.
///
/// # Errors
///
/// Any locator, I/O, interrupt, format, or ABI error. All of them concern only
/// this code object.
pub fn open_code_object(
    locator: &str,
    pid: ProcessId,
    services: &TargetServices,
    config: &LoaderConfig,
    interrupt: &InterruptFlag,
) -> Result<BinaryImage>
{
    let uri = CodeObjectUri::parse(locator)?;
    let stream = open_stream(&uri, pid, services, config, interrupt)?;
    let image = BinaryImage::from_stream(locator, stream)?;
    validate_device_image(&image, config)?;
    Ok(image)
}

/// Build the stream a locator designates.
///
/// # Errors
///
/// Locator, identity and I/O errors.
pub fn open_stream(
    uri: &CodeObjectUri,
    pid: ProcessId,
    services: &TargetServices,
    config: &LoaderConfig,
    interrupt: &InterruptFlag,
) -> Result<Box<dyn CodeObjectStream>>
{
    let offset = uri.offset()?;
    let size = uri.size()?;

    match uri.protocol()? {
        Protocol::File => {
            let fd = services.files.open(uri.path(), OpenFlags::read_only())?;
            Ok(Box::new(FileStream::new(
                Arc::clone(&services.files),
                fd,
                offset,
                size,
                interrupt.clone(),
                config.max_transfer_size,
            )))
        }
        Protocol::Memory => {
            let owner = parse_unsigned("pid", uri.raw_path())?;
            if owner != u64::from(pid.0) {
                return Err(LoaderError::ForeignProcess {
                    uri: uri.as_str().to_string(),
                    owner,
                });
            }

            let size = size.ok_or_else(|| LoaderError::MissingSize(uri.as_str().to_string()))?;
            interrupt.check()?;
            let stream = MemoryStream::snapshot(
                services.memory.as_ref(),
                Address::from(offset),
                size,
                config.max_snapshot_size,
            )
            .map_err(|err| LoaderError::MemoryCopy {
                uri: uri.as_str().to_string(),
                reason: err.to_string(),
            })?;
            Ok(Box::new(stream))
        }
    }
}
