//! In-memory collaborators and ELF fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use devsol_core::error::{LoaderError, Result};
use devsol_core::image::BinaryImage;
use devsol_core::solib::HostLoader;
use devsol_core::stream::MemoryStream;
use devsol_core::target::{
    AttributeValue, CodeObjectAttribute, DeviceIntrospection, OpenFlags, RemoteFd, RemoteFileIo, TargetMemory,
    TargetServices,
};
use devsol_core::types::{Address, CodeObjectId, DeviceContextId, LoadedModule, ProcessId, TargetSection};

/// Ordered record of collaborator calls, shared between mocks.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog
{
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: Option<&CallLog>, call: &str)
{
    if let Some(log) = log {
        log.lock().unwrap().push(call.to_string());
    }
}

// ---------------------------------------------------------------------------
// ELF fixtures
// ---------------------------------------------------------------------------

/// Minimal ELF64 little-endian image: header, one `.text`, `.shstrtab`.
#[derive(Debug, Clone)]
pub struct ElfFixture
{
    pub osabi: u8,
    pub abi_version: u8,
    pub machine: u16,
    pub text_addr: u64,
    pub text_size: u64,
}

impl Default for ElfFixture
{
    fn default() -> Self
    {
        Self {
            osabi: 64,
            abi_version: 1,
            machine: 224,
            text_addr: 0,
            text_size: 0x40,
        }
    }
}

impl ElfFixture
{
    pub fn device() -> Self
    {
        Self::default()
    }

    pub fn host() -> Self
    {
        Self {
            osabi: 0,
            abi_version: 0,
            machine: 62,
            ..Self::default()
        }
    }

    pub fn build(&self) -> Vec<u8>
    {
        const EHDR: usize = 64;
        const SHDR: usize = 64;
        let shstrtab = b"\0.text\0.shstrtab\0";

        let text_offset = EHDR;
        let text_len = usize::try_from(self.text_size).unwrap();
        let strtab_offset = text_offset + text_len;
        let shoff = (strtab_offset + shstrtab.len() + 7) & !7;
        let total = shoff + 3 * SHDR;

        let mut out = vec![0u8; total];
        out[0..4].copy_from_slice(b"\x7fELF");
        out[4] = 2; // ELFCLASS64
        out[5] = 1; // little endian
        out[6] = 1; // EV_CURRENT
        out[7] = self.osabi;
        out[8] = self.abi_version;
        put_u16(&mut out, 16, 3); // ET_DYN
        put_u16(&mut out, 18, self.machine);
        put_u32(&mut out, 20, 1);
        put_u64(&mut out, 40, shoff as u64);
        put_u16(&mut out, 52, EHDR as u16);
        put_u16(&mut out, 54, 56);
        put_u16(&mut out, 58, SHDR as u16);
        put_u16(&mut out, 60, 3);
        put_u16(&mut out, 62, 2);

        for (i, byte) in out[text_offset..strtab_offset].iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        out[strtab_offset..strtab_offset + shstrtab.len()].copy_from_slice(shstrtab);

        let text = shoff + SHDR;
        put_u32(&mut out, text, 1);
        put_u32(&mut out, text + 4, 1); // SHT_PROGBITS
        put_u64(&mut out, text + 8, 0x6); // SHF_ALLOC | SHF_EXECINSTR
        put_u64(&mut out, text + 16, self.text_addr);
        put_u64(&mut out, text + 24, text_offset as u64);
        put_u64(&mut out, text + 32, self.text_size);
        put_u64(&mut out, text + 48, 4);

        let strtab = shoff + 2 * SHDR;
        put_u32(&mut out, strtab, 7);
        put_u32(&mut out, strtab + 4, 3); // SHT_STRTAB
        put_u64(&mut out, strtab + 24, strtab_offset as u64);
        put_u64(&mut out, strtab + 32, shstrtab.len() as u64);
        put_u64(&mut out, strtab + 48, 1);

        out
    }
}

/// `image` placed at `offset` inside a zero-filled file of `total` bytes.
pub fn embed(image: &[u8], offset: usize, total: usize) -> Vec<u8>
{
    let mut file = vec![0u8; total.max(offset + image.len())];
    file[offset..offset + image.len()].copy_from_slice(image);
    file
}

fn put_u16(out: &mut [u8], at: usize, value: u16)
{
    out[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut [u8], at: usize, value: u32)
{
    out[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut [u8], at: usize, value: u64)
{
    out[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

// ---------------------------------------------------------------------------
// Remote files
// ---------------------------------------------------------------------------

/// Remote file system backed by byte vectors.
#[derive(Debug, Default)]
pub struct MockFiles
{
    files: Mutex<HashMap<String, Arc<Vec<u8>>>>,
    open: Mutex<HashMap<u64, Arc<Vec<u8>>>>,
    next_fd: AtomicU64,
    pread_cap: Option<usize>,
    pub fstat_calls: AtomicUsize,
    pub pread_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
}

impl MockFiles
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Every `pread` returns at most `cap` bytes.
    pub fn with_pread_cap(cap: usize) -> Self
    {
        Self {
            pread_cap: Some(cap),
            ..Self::default()
        }
    }

    pub fn insert(&self, path: &str, contents: Vec<u8>)
    {
        self.files.lock().unwrap().insert(path.to_string(), Arc::new(contents));
    }

    pub fn open_count(&self) -> usize
    {
        self.open.lock().unwrap().len()
    }

    pub fn fstats(&self) -> usize
    {
        self.fstat_calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize
    {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn contents(&self, fd: RemoteFd) -> io::Result<Arc<Vec<u8>>>
    {
        self.open
            .lock()
            .unwrap()
            .get(&fd.0)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad descriptor"))
    }
}

impl RemoteFileIo for MockFiles
{
    fn open(&self, path: &str, flags: OpenFlags) -> io::Result<RemoteFd>
    {
        if flags.write || flags.create {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only target"));
        }
        let contents = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;

        let fd = self.next_fd.fetch_add(1, Ordering::SeqCst) + 3;
        self.open.lock().unwrap().insert(fd, contents);
        Ok(RemoteFd(fd))
    }

    fn pread(&self, fd: RemoteFd, buf: &mut [u8], offset: u64) -> io::Result<usize>
    {
        self.pread_calls.fetch_add(1, Ordering::SeqCst);
        let contents = self.contents(fd)?;
        let Some(rest) = usize::try_from(offset).ok().and_then(|start| contents.get(start..)) else {
            return Ok(0);
        };
        let count = buf.len().min(rest.len()).min(self.pread_cap.unwrap_or(usize::MAX));
        buf[..count].copy_from_slice(&rest[..count]);
        Ok(count)
    }

    fn fstat(&self, fd: RemoteFd) -> io::Result<u64>
    {
        self.fstat_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.contents(fd)?.len() as u64)
    }

    fn close(&self, fd: RemoteFd) -> io::Result<()>
    {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.open
            .lock()
            .unwrap()
            .remove(&fd.0)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "double close"))
    }
}

// ---------------------------------------------------------------------------
// Target memory
// ---------------------------------------------------------------------------

/// Sparse process memory made of mapped regions.
#[derive(Debug, Default)]
pub struct MockMemory
{
    regions: Mutex<Vec<(u64, Vec<u8>)>>,
    pub reads: AtomicUsize,
}

impl MockMemory
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn map(&self, address: u64, bytes: Vec<u8>)
    {
        self.regions.lock().unwrap().push((address, bytes));
    }

    /// Overwrite mapped bytes in place.
    pub fn write(&self, address: u64, bytes: &[u8])
    {
        for (base, data) in self.regions.lock().unwrap().iter_mut() {
            if address >= *base && address + bytes.len() as u64 <= *base + data.len() as u64 {
                let start = (address - *base) as usize;
                data[start..start + bytes.len()].copy_from_slice(bytes);
                return;
            }
        }
        panic!("write outside mapped memory at {address:#x}");
    }

    pub fn unmap_all(&self)
    {
        self.regions.lock().unwrap().clear();
    }
}

impl TargetMemory for MockMemory
{
    fn read_memory(&self, addr: Address, len: usize) -> Result<Vec<u8>>
    {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let start = addr.value();
        for (base, data) in self.regions.lock().unwrap().iter() {
            let end = base + data.len() as u64;
            if start >= *base && start + len as u64 <= end {
                let from = (start - base) as usize;
                return Ok(data[from..from + len].to_vec());
            }
        }
        Err(LoaderError::MemoryRead { address: start, len })
    }
}

// ---------------------------------------------------------------------------
// Device introspection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CodeObjectEntry
{
    id: CodeObjectId,
    load_address: Option<Address>,
    uri: Option<String>,
}

/// Device runtime with a scripted list of code objects.
#[derive(Debug, Default)]
pub struct MockIntrospection
{
    context: Mutex<Option<DeviceContextId>>,
    objects: Mutex<Vec<CodeObjectEntry>>,
    listing_fails: AtomicBool,
    log: Option<CallLog>,
}

impl MockIntrospection
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self
    {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    /// Make the runtime report a context for every process.
    pub fn attach(&self, context: u64)
    {
        *self.context.lock().unwrap() = Some(DeviceContextId(context));
    }

    pub fn detach(&self)
    {
        *self.context.lock().unwrap() = None;
    }

    pub fn add(&self, id: u64, load_address: u64, uri: &str)
    {
        self.push(id, Some(Address::from(load_address)), Some(uri.to_string()));
    }

    pub fn add_without_uri(&self, id: u64, load_address: u64)
    {
        self.push(id, Some(Address::from(load_address)), None);
    }

    pub fn add_without_address(&self, id: u64, uri: &str)
    {
        self.push(id, None, Some(uri.to_string()));
    }

    pub fn remove(&self, id: u64)
    {
        self.objects.lock().unwrap().retain(|entry| entry.id != CodeObjectId(id));
    }

    pub fn clear(&self)
    {
        self.objects.lock().unwrap().clear();
    }

    pub fn set_listing_fails(&self, fails: bool)
    {
        self.listing_fails.store(fails, Ordering::SeqCst);
    }

    fn push(&self, id: u64, load_address: Option<Address>, uri: Option<String>)
    {
        self.objects.lock().unwrap().push(CodeObjectEntry {
            id: CodeObjectId(id),
            load_address,
            uri,
        });
    }
}

impl DeviceIntrospection for MockIntrospection
{
    fn process_context(&self, _pid: ProcessId) -> Option<DeviceContextId>
    {
        record(self.log.as_ref(), "device:process_context");
        *self.context.lock().unwrap()
    }

    fn code_objects(&self, _context: DeviceContextId) -> Result<Vec<CodeObjectId>>
    {
        record(self.log.as_ref(), "device:code_objects");
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(LoaderError::Introspection("listing failed".to_string()));
        }
        Ok(self.objects.lock().unwrap().iter().map(|entry| entry.id).collect())
    }

    fn code_object_attribute(&self, id: CodeObjectId, attribute: CodeObjectAttribute) -> Result<AttributeValue>
    {
        let objects = self.objects.lock().unwrap();
        let entry = objects
            .iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| LoaderError::Introspection(format!("unknown code object {}", id.raw())))?;

        let missing = || LoaderError::Introspection(format!("attribute unavailable for {}", id.raw()));
        match attribute {
            CodeObjectAttribute::LoadAddress => entry.load_address.map(AttributeValue::Address).ok_or_else(missing),
            CodeObjectAttribute::UriName => entry.uri.clone().map(AttributeValue::Uri).ok_or_else(missing),
        }
    }
}

// ---------------------------------------------------------------------------
// Host loader
// ---------------------------------------------------------------------------

/// Host dynamic loader with a fixed module list and in-memory images.
#[derive(Debug, Default)]
pub struct MockHost
{
    pub modules: Vec<LoadedModule>,
    images: HashMap<String, Vec<u8>>,
    pub relocations: AtomicUsize,
    pub events: usize,
    pub inferior_hooks: Vec<bool>,
    log: Option<CallLog>,
}

impl MockHost
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self
    {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    /// Register a host library that `open_binary` can serve.
    pub fn add_library(&mut self, path: &str, bias: u64, image: Vec<u8>)
    {
        self.modules.push(LoadedModule::host(path, Address::from(bias)));
        self.images.insert(path.to_string(), image);
    }
}

impl HostLoader for MockHost
{
    fn current_modules(&self) -> Vec<LoadedModule>
    {
        self.modules.clone()
    }

    fn open_binary(&self, path: &str) -> Result<BinaryImage>
    {
        record(self.log.as_ref(), "host:open_binary");
        let image = self.images.get(path).ok_or_else(|| {
            LoaderError::Io(io::Error::new(io::ErrorKind::NotFound, format!("host cannot open {path}")))
        })?;
        BinaryImage::from_stream(path, Box::new(MemoryStream::from_bytes(image.clone())))
    }

    fn relocate_section_addresses(&self, module: &LoadedModule, _image: &BinaryImage, section: &mut TargetSection)
    {
        self.relocations.fetch_add(1, Ordering::SeqCst);
        section.apply_bias(module.load_bias);
    }

    fn handle_event(&mut self)
    {
        record(self.log.as_ref(), "host:handle_event");
        self.events += 1;
    }

    fn create_inferior_hook(&mut self, from_tty: bool)
    {
        record(self.log.as_ref(), "host:create_inferior_hook");
        self.inferior_hooks.push(from_tty);
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Mock collaborators plus the bundle handed to the loader.
pub struct Target
{
    pub files: Arc<MockFiles>,
    pub memory: Arc<MockMemory>,
    pub device: Arc<MockIntrospection>,
    pub services: TargetServices,
}

impl Target
{
    pub fn new() -> Self
    {
        Self::build(MockFiles::new(), MockIntrospection::new())
    }

    pub fn build(files: MockFiles, device: MockIntrospection) -> Self
    {
        let files = Arc::new(files);
        let memory = Arc::new(MockMemory::new());
        let device = Arc::new(device);
        let services = TargetServices::new(files.clone(), memory.clone(), device.clone());
        Self {
            files,
            memory,
            device,
            services,
        }
    }
}

pub const PID: ProcessId = ProcessId(4242);
