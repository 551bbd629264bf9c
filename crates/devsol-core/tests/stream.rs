//! Tests for file-backed and memory-snapshot code object streams

mod common;

use std::sync::Arc;

use common::{MockFiles, MockMemory};
use devsol_core::error::LoaderError;
use devsol_core::interrupt::InterruptFlag;
use devsol_core::stream::{CodeObjectStream, FileStream, MemoryStream};
use devsol_core::target::{OpenFlags, RemoteFileIo};
use devsol_core::types::Address;

fn file_stream(files: &Arc<MockFiles>, path: &str, offset: u64, size: Option<u64>) -> FileStream
{
    let fd = files.open(path, OpenFlags::read_only()).unwrap();
    FileStream::new(files.clone(), fd, offset, size, InterruptFlag::new(), 1 << 20)
}

#[test]
fn test_file_stream_window_reads()
{
    let files = Arc::new(MockFiles::new());
    files.insert("/lib/blob", (0u8..=255).collect());
    let stream = file_stream(&files, "/lib/blob", 16, Some(32));

    let mut buf = [0u8; 8];
    assert_eq!(stream.read(&mut buf, 0).unwrap(), 8);
    assert_eq!(buf, [16, 17, 18, 19, 20, 21, 22, 23]);

    // Short read at the end of the window, then nothing past it.
    assert_eq!(stream.read(&mut buf, 28).unwrap(), 4);
    assert_eq!(&buf[..4], &[44, 45, 46, 47]);
    assert_eq!(stream.read(&mut buf, 32).unwrap(), 0);
    assert_eq!(stream.read(&mut buf, 40).unwrap(), 0);
}

#[test]
fn test_file_stream_loops_over_short_preads()
{
    let files = Arc::new(MockFiles::with_pread_cap(3));
    files.insert("/lib/blob", (0u8..100).collect());
    let stream = file_stream(&files, "/lib/blob", 0, None);

    let mut buf = [0u8; 10];
    assert_eq!(stream.read(&mut buf, 5).unwrap(), 10);
    assert_eq!(buf, [5, 6, 7, 8, 9, 10, 11, 12, 13, 14]);
    assert!(files.pread_calls.load(std::sync::atomic::Ordering::SeqCst) >= 4);
}

#[test]
fn test_file_stream_transfer_limit_splits_reads()
{
    let files = Arc::new(MockFiles::new());
    files.insert("/lib/blob", vec![7u8; 64]);
    let fd = files.open("/lib/blob", OpenFlags::read_only()).unwrap();
    let stream = FileStream::new(files.clone(), fd, 0, Some(64), InterruptFlag::new(), 16);

    let mut buf = [0u8; 64];
    assert_eq!(stream.read(&mut buf, 0).unwrap(), 64);
    assert_eq!(files.pread_calls.load(std::sync::atomic::Ordering::SeqCst), 4);
}

#[test]
fn test_file_stream_size_from_single_fstat()
{
    let files = Arc::new(MockFiles::new());
    files.insert("/lib/blob", vec![0u8; 1000]);
    let stream = file_stream(&files, "/lib/blob", 200, None);

    assert_eq!(stream.stat().unwrap(), 800);
    assert_eq!(stream.stat().unwrap(), 800);
    let mut buf = [0u8; 4];
    stream.read(&mut buf, 0).unwrap();
    assert_eq!(files.fstats(), 1);
}

#[test]
fn test_file_stream_known_size_skips_fstat()
{
    let files = Arc::new(MockFiles::new());
    files.insert("/lib/blob", vec![0u8; 1000]);
    let stream = file_stream(&files, "/lib/blob", 0, Some(100));

    assert_eq!(stream.stat().unwrap(), 100);
    assert_eq!(files.fstats(), 0);
}

#[test]
fn test_file_stream_offset_past_end_is_bad_value()
{
    let files = Arc::new(MockFiles::new());
    files.insert("/lib/blob", vec![0u8; 100]);

    for offset in [100, 5000] {
        let stream = file_stream(&files, "/lib/blob", offset, None);
        assert!(matches!(stream.stat(), Err(LoaderError::BadValue(_))));
    }
}

#[test]
fn test_file_stream_interrupt_aborts_read()
{
    let files = Arc::new(MockFiles::new());
    files.insert("/lib/blob", vec![1u8; 64]);
    let interrupt = InterruptFlag::new();
    let fd = files.open("/lib/blob", OpenFlags::read_only()).unwrap();
    let stream = FileStream::new(files.clone(), fd, 0, Some(64), interrupt.clone(), 8);

    interrupt.raise();
    let mut buf = [0u8; 64];
    let err = stream.read(&mut buf, 0).unwrap_err();
    assert!(err.is_interrupt());

    // Only the aborted operation fails.
    interrupt.clear();
    assert_eq!(stream.read(&mut buf, 0).unwrap(), 64);
}

#[test]
fn test_file_stream_closes_handle_once_on_drop()
{
    let files = Arc::new(MockFiles::new());
    files.insert("/lib/blob", vec![0u8; 16]);
    let stream = file_stream(&files, "/lib/blob", 0, None);
    assert_eq!(files.open_count(), 1);

    drop(stream);
    assert_eq!(files.open_count(), 0);
    assert_eq!(files.closes(), 1);
}

#[test]
fn test_memory_snapshot_is_isolated_from_target()
{
    let memory = MockMemory::new();
    memory.map(0x7000, vec![0xAA; 32]);
    let stream = MemoryStream::snapshot(&memory, Address::from(0x7000), 32, 1 << 20).unwrap();

    memory.write(0x7000, &[0x55; 32]);
    memory.unmap_all();

    let mut buf = [0u8; 32];
    assert_eq!(stream.read(&mut buf, 0).unwrap(), 32);
    assert_eq!(buf, [0xAA; 32]);
    assert_eq!(stream.stat().unwrap(), 32);
}

#[test]
fn test_memory_snapshot_of_unmapped_range_fails()
{
    let memory = MockMemory::new();
    memory.map(0x7000, vec![0; 16]);
    let err = MemoryStream::snapshot(&memory, Address::from(0x7008), 16, 1 << 20).unwrap_err();
    assert!(matches!(err, LoaderError::MemoryRead { address: 0x7008, len: 16 }));
}

#[test]
fn test_memory_snapshot_over_limit_reads_nothing()
{
    let memory = MockMemory::new();
    memory.map(0x7000, vec![0; 64]);
    let err = MemoryStream::snapshot(&memory, Address::from(0x7000), 64, 32).unwrap_err();
    assert!(matches!(err, LoaderError::BadValue(_)));
    assert_eq!(memory.reads.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn test_file_stream_position_overflow_is_bad_value()
{
    let files = Arc::new(MockFiles::new());
    files.insert("/tmp/a.co", vec![0; 64]);
    let stream = file_stream(&files, "/tmp/a.co", 0xffff_ffff_ffff_fff0, Some(256));

    let mut buf = [0u8; 8];
    let err = stream.read(&mut buf, 32).unwrap_err();
    assert!(matches!(err, LoaderError::BadValue(_)));
    assert_eq!(files.pread_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}
