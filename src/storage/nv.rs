//! Byte-addressed non-volatile storage.
//!
//! The queue talks to its medium through the [`NvStore`] trait, which models
//! a small EEPROM-like device: individually readable and writable bytes with
//! a finite write-endurance budget. The cardinal rule lives in
//! [`NvStore::update`]: a byte is rewritten only when the new value differs
//! from the stored one, so callers can be naive about repeated writes without
//! burning endurance.
//!
//! Two implementations are provided:
//! - [`FileNv`]: a memory-mapped fixed-size file, the host-side equivalent
//!   of the on-chip EEPROM. Survives process restarts.
//! - [`MemNv`]: an in-memory store that counts physical writes, used by the
//!   tests to verify the wear bounds.

use crate::error::{NodeError, NodeResult};
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::Path;
use tracing::warn;

/// A small byte-addressed non-volatile medium.
///
/// Addresses must be below `len()`; the queue derives every address from its
/// fixed layout constants and never goes out of range.
pub trait NvStore {
    /// Size of the medium in bytes.
    fn len(&self) -> usize;

    /// Whether the medium has zero capacity.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one byte.
    fn read(&self, addr: usize) -> u8;

    /// Write one byte unconditionally.
    fn write(&mut self, addr: usize, value: u8);

    /// Change-detecting write: touches the medium only when the stored byte
    /// differs from `value`.
    fn update(&mut self, addr: usize, value: u8) {
        if self.read(addr) != value {
            self.write(addr, value);
        }
    }

    /// Push buffered writes down to the medium. Best-effort; default no-op.
    fn sync(&mut self) {}
}

/// Non-volatile store backed by a memory-mapped file.
pub struct FileNv {
    mmap: MmapMut,
}

impl FileNv {
    /// Open (or create) the backing file and map it.
    ///
    /// A fresh file is zero-filled, which the queue reads as an empty header.
    /// An existing file shorter than `size` is extended in place; the new
    /// bytes are zero, matching a blank medium.
    pub fn open(path: &Path, size: usize) -> NodeResult<Self> {
        let wrap = |e: std::io::Error| NodeError::Storage(format!("{}: {e}", path.display()));

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(wrap)?;

        let current = file.metadata().map_err(wrap)?.len();
        if current < size as u64 {
            file.set_len(size as u64).map_err(wrap)?;
        }

        // SAFETY: the file was just opened read-write and sized; the map is
        // dropped before the file handle goes away.
        let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file).map_err(wrap)? };

        Ok(Self { mmap })
    }
}

impl NvStore for FileNv {
    fn len(&self) -> usize {
        self.mmap.len()
    }

    fn read(&self, addr: usize) -> u8 {
        self.mmap[addr]
    }

    fn write(&mut self, addr: usize, value: u8) {
        self.mmap[addr] = value;
    }

    fn sync(&mut self) {
        if let Err(e) = self.mmap.flush() {
            warn!("storage flush failed: {e}");
        }
    }
}

/// In-memory store that counts physical writes.
#[derive(Debug, Clone)]
pub struct MemNv {
    bytes: Vec<u8>,
    writes: usize,
}

impl MemNv {
    /// Create a zero-filled store of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
            writes: 0,
        }
    }

    /// Create a store with preexisting contents (e.g. a corrupted image).
    pub fn with_contents(bytes: Vec<u8>) -> Self {
        Self { bytes, writes: 0 }
    }

    /// Number of physical writes performed so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Raw view of the image, for layout assertions.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl NvStore for MemNv {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, addr: usize) -> u8 {
        self.bytes[addr]
    }

    fn write(&mut self, addr: usize, value: u8) {
        self.bytes[addr] = value;
        self.writes += 1;
    }
}
