//! # Code Object Streams
//!
//! Byte streams over a resolved code object. The image parser never sees where
//! the bytes come from; it only calls `read` and `stat`.
//!
//! Two variants exist:
//!
//! - [`FileStream`]: a window `[offset, offset + size)` of a file on the
//!   target, read through [`RemoteFileIo`]. The size may be unknown up front,
//!   in which case one remote `fstat` discovers it.
//! - [`MemoryStream`]: a snapshot of target memory copied when the stream is
//!   created. The process is free to unmap or overwrite that memory afterwards.
//!
//! [`StreamReader`] turns either one into `Read + Seek` so `object`'s
//! `ReadCache` can parse it.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use tracing::{trace, warn};

use crate::error::{LoaderError, Result};
use crate::interrupt::InterruptFlag;
use crate::target::{RemoteFd, RemoteFileIo, TargetMemory};
use crate::types::Address;

/// Random-access byte source backing one binary image.
pub trait CodeObjectStream: fmt::Debug
{
    /// Copy bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes copied, which is short when the end of the
    /// stream is reached and 0 when `offset` is at or past the end.
    ///
    /// # Errors
    ///
    /// Remote I/O failures and interrupts.
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Length of the stream in bytes.
    ///
    /// # Errors
    ///
    /// Remote I/O failures, or `BadValue` if the window lies outside its file.
    fn stat(&self) -> Result<u64>;
}

/// A window of a file on the target.
pub struct FileStream
{
    files: Arc<dyn RemoteFileIo>,
    fd: RemoteFd,
    offset: u64,
    size: OnceCell<u64>,
    interrupt: InterruptFlag,
    max_transfer: usize,
}

impl FileStream
{
    /// Wrap an already opened remote file.
    ///
    /// Takes ownership of `fd`; it is closed when the stream is dropped.
    /// `size: None` defers the length to the first `stat`.
    #[must_use]
    pub fn new(
        files: Arc<dyn RemoteFileIo>,
        fd: RemoteFd,
        offset: u64,
        size: Option<u64>,
        interrupt: InterruptFlag,
        max_transfer: usize,
    ) -> Self
    {
        let cached = OnceCell::new();
        if let Some(size) = size {
            let _ = cached.set(size);
        }

        Self {
            files,
            fd,
            offset,
            size: cached,
            interrupt,
            max_transfer: max_transfer.max(1),
        }
    }

    /// Base offset of the window in the remote file.
    #[must_use]
    pub fn base_offset(&self) -> u64
    {
        self.offset
    }

    fn remote_size(&self) -> Result<u64>
    {
        let file_size = self.files.fstat(self.fd)?;
        if self.offset >= file_size {
            return Err(LoaderError::BadValue(format!(
                "offset {:#x} is beyond the end of the file ({file_size} bytes)",
                self.offset
            )));
        }
        Ok(file_size - self.offset)
    }
}

impl CodeObjectStream for FileStream
{
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize>
    {
        let available = self.stat()?.saturating_sub(offset);
        let wanted = buf.len().min(usize::try_from(available).unwrap_or(usize::MAX));

        let mut done = 0;
        while done < wanted {
            self.interrupt.check()?;

            let chunk = (wanted - done).min(self.max_transfer);
            let position = self
                .offset
                .checked_add(offset)
                .and_then(|position| position.checked_add(done as u64))
                .ok_or_else(|| {
                    LoaderError::BadValue(format!(
                        "read at {offset:#x} overflows the window at {:#x}",
                        self.offset
                    ))
                })?;
            let count = self.files.pread(self.fd, &mut buf[done..done + chunk], position)?;
            trace!(fd = self.fd.0, position, requested = chunk, count, "remote read");
            if count == 0 {
                break;
            }
            done += count;
        }

        Ok(done)
    }

    fn stat(&self) -> Result<u64>
    {
        self.size.get_or_try_init(|| self.remote_size()).copied()
    }
}

impl Drop for FileStream
{
    fn drop(&mut self)
    {
        if let Err(err) = self.files.close(self.fd) {
            warn!(fd = self.fd.0, error = %err, "failed to close code object file");
        }
    }
}

impl fmt::Debug for FileStream
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("FileStream")
            .field("fd", &self.fd)
            .field("offset", &self.offset)
            .field("size", &self.size.get())
            .finish_non_exhaustive()
    }
}

/// A code object copied out of target memory.
pub struct MemoryStream
{
    image: Vec<u8>,
}

impl MemoryStream
{
    /// Snapshot `size` bytes of target memory at `address`.
    ///
    /// Sizes above `max_size` are refused before anything is allocated.
    ///
    /// # Errors
    ///
    /// `BadValue` for an oversized image, otherwise whatever the memory
    /// collaborator reports for an unreadable range.
    pub fn snapshot(memory: &dyn TargetMemory, address: Address, size: u64, max_size: u64) -> Result<Self>
    {
        if size > max_size {
            return Err(LoaderError::BadValue(format!(
                "code object size {size:#x} exceeds the snapshot limit of {max_size:#x} bytes"
            )));
        }
        let len = usize::try_from(size)
            .map_err(|_| LoaderError::BadValue(format!("code object size {size} does not fit in memory")))?;
        let image = memory.read_memory(address, len)?;
        if image.len() != len {
            return Err(LoaderError::MemoryRead { address: address.value(), len });
        }
        Ok(Self { image })
    }

    /// Wrap bytes that are already in debugger memory.
    #[must_use]
    pub fn from_bytes(image: Vec<u8>) -> Self
    {
        Self { image }
    }
}

impl CodeObjectStream for MemoryStream
{
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize>
    {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        let Some(remaining) = self.image.get(start..) else {
            return Ok(0);
        };

        let count = buf.len().min(remaining.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        Ok(count)
    }

    fn stat(&self) -> Result<u64>
    {
        Ok(self.image.len() as u64)
    }
}

impl fmt::Debug for MemoryStream
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("MemoryStream").field("len", &self.image.len()).finish()
    }
}

/// `Read + Seek` cursor over a [`CodeObjectStream`].
///
/// Loader errors are carried inside `io::Error` so they survive the trip
/// through the parser; [`StreamReader::take_error`] recovers the original.
#[derive(Debug)]
pub struct StreamReader
{
    stream: Box<dyn CodeObjectStream>,
    position: u64,
    last_error: Option<LoaderError>,
}

impl StreamReader
{
    #[must_use]
    pub fn new(stream: Box<dyn CodeObjectStream>) -> Self
    {
        Self {
            stream,
            position: 0,
            last_error: None,
        }
    }

    /// The underlying stream.
    #[must_use]
    pub fn stream(&self) -> &dyn CodeObjectStream
    {
        self.stream.as_ref()
    }

    /// The most recent stream error hidden behind an `io::Error`, if any.
    pub fn take_error(&mut self) -> Option<LoaderError>
    {
        self.last_error.take()
    }

    fn fail(&mut self, err: LoaderError) -> io::Error
    {
        let io_err = io::Error::new(io::ErrorKind::Other, err.to_string());
        self.last_error = Some(err);
        io_err
    }
}

impl Read for StreamReader
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>
    {
        match self.stream.read(buf, self.position) {
            Ok(count) => {
                self.position += count as u64;
                Ok(count)
            }
            Err(err) => Err(self.fail(err)),
        }
    }
}

impl Seek for StreamReader
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>
    {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let len = match self.stream.stat() {
                    Ok(len) => len,
                    Err(err) => return Err(self.fail(err)),
                };
                len.checked_add_signed(delta)
            }
        };

        let target = target.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream"))?;
        self.position = target;
        Ok(target)
    }
}
