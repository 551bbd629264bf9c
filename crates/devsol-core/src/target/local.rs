//! Collaborators backed by the debugger's own host.
//!
//! Used when the target runs on the same machine as the debugger (and by the
//! CLI). Files are read with positional reads so a handle never carries a
//! cursor, matching the remote `pread` contract.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::trace;

use super::{OpenFlags, RemoteFd, RemoteFileIo, TargetMemory};
use crate::error::{LoaderError, Result};
use crate::types::{Address, ProcessId};

/// [`RemoteFileIo`] over the local filesystem.
#[derive(Debug, Default)]
pub struct LocalFileIo
{
    next_fd: AtomicU64,
    open: Mutex<HashMap<RemoteFd, File>>,
}

impl LocalFileIo
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Number of handles not yet closed.
    #[must_use]
    pub fn open_handles(&self) -> usize
    {
        self.files().len()
    }

    fn files(&self) -> std::sync::MutexGuard<'_, HashMap<RemoteFd, File>>
    {
        // A poisoned table is still structurally valid.
        self.open.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn with_file<T>(&self, fd: RemoteFd, f: impl FnOnce(&File) -> io::Result<T>) -> io::Result<T>
    {
        let files = self.files();
        let file = files
            .get(&fd)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("bad file handle {}", fd.0)))?;
        f(file)
    }
}

impl RemoteFileIo for LocalFileIo
{
    fn open(&self, path: &str, flags: OpenFlags) -> io::Result<RemoteFd>
    {
        let file = OpenOptions::new()
            .read(true)
            .write(flags.write)
            .create(flags.create && flags.write)
            .open(path)?;
        let fd = RemoteFd(self.next_fd.fetch_add(1, Ordering::Relaxed) + 1);
        trace!(path, fd = fd.0, "opened local file");
        self.files().insert(fd, file);
        Ok(fd)
    }

    fn pread(&self, fd: RemoteFd, buf: &mut [u8], offset: u64) -> io::Result<usize>
    {
        self.with_file(fd, |file| file.read_at(buf, offset))
    }

    fn fstat(&self, fd: RemoteFd) -> io::Result<u64>
    {
        self.with_file(fd, |file| Ok(file.metadata()?.len()))
    }

    fn close(&self, fd: RemoteFd) -> io::Result<()>
    {
        match self.files().remove(&fd) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("bad file handle {}", fd.0),
            )),
        }
    }
}

/// [`TargetMemory`] reading `/proc/<pid>/mem`.
///
/// The debugger must be allowed to trace the process (same user and a
/// permissive `ptrace_scope`, or an attached tracer).
#[derive(Debug)]
pub struct ProcMemory
{
    path: PathBuf,
}

impl ProcMemory
{
    #[must_use]
    pub fn new(pid: ProcessId) -> Self
    {
        Self {
            path: PathBuf::from(format!("/proc/{}/mem", pid.0)),
        }
    }
}

impl TargetMemory for ProcMemory
{
    fn read_memory(&self, addr: Address, len: usize) -> Result<Vec<u8>>
    {
        let failed = || LoaderError::MemoryRead {
            address: addr.value(),
            len,
        };

        let file = File::open(&self.path)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| failed())?;
        data.resize(len, 0);
        file.read_exact_at(&mut data, addr.value()).map_err(|_| failed())?;
        Ok(data)
    }
}
