//! Named shared-memory access.
//!
//! Simulators publish telemetry through named, read-only memory mappings.
//! Sources open them through the [`SharedMemory`] trait so the decoding and
//! reconnect logic can be exercised against [`InMemorySharedMemory`] on any
//! platform, while [`PlatformSharedMemory`] talks to the real OS mappings.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use simhud_telemetry_core::SourceError;

#[cfg(windows)]
mod win32;

/// An open, read-only view of a named mapping.
pub trait MappedRegion: Send {
    /// Size of the view in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// Reads are not synchronized with the writer; a concurrent update may
    /// produce a torn sample, which callers tolerate.
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), SourceError>;
}

/// Opens named mappings.
pub trait SharedMemory: Send {
    /// Map the whole mapping called `name`.
    ///
    /// Fails with [`SourceError::Truncated`] when the mapping is shorter than
    /// `min_len`; the returned view may be longer.
    fn open(&self, name: &str, min_len: usize) -> Result<Box<dyn MappedRegion>, SourceError>;
}

/// Check that `offset..offset + len` lies inside a region of `size` bytes.
pub(crate) fn check_bounds(size: usize, offset: usize, len: usize) -> Result<(), SourceError> {
    let end = offset.checked_add(len).ok_or(SourceError::Truncated {
        needed: usize::MAX,
        got: size,
    })?;
    if end > size {
        return Err(SourceError::Truncated {
            needed: end,
            got: size,
        });
    }
    Ok(())
}

/// The operating system's named mappings.
///
/// Only Windows exposes the simulators' mappings; on other platforms every
/// open reports [`SourceError::Unsupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformSharedMemory;

impl SharedMemory for PlatformSharedMemory {
    #[cfg(windows)]
    fn open(&self, name: &str, min_len: usize) -> Result<Box<dyn MappedRegion>, SourceError> {
        let region = win32::Win32Region::open(name, min_len)?;
        Ok(Box::new(region))
    }

    #[cfg(not(windows))]
    fn open(&self, name: &str, _min_len: usize) -> Result<Box<dyn MappedRegion>, SourceError> {
        Err(SourceError::Unsupported(format!(
            "named shared memory '{name}' is only available on Windows"
        )))
    }
}

#[derive(Debug)]
struct Segment {
    data: RwLock<Vec<u8>>,
    closed: AtomicBool,
}

/// Process-local named buffers standing in for simulator mappings.
///
/// Clones share the same segment table, so a test can keep one handle to
/// publish or withdraw segments while a source owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemorySharedMemory {
    segments: Arc<RwLock<HashMap<String, Arc<Segment>>>>,
    open_calls: Arc<AtomicU64>,
}

impl InMemorySharedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the segment `name`.
    ///
    /// Replacing closes views opened on the previous contents, the same way
    /// a simulator restart invalidates old mappings.
    pub fn publish(&self, name: &str, bytes: Vec<u8>) {
        let segment = Arc::new(Segment {
            data: RwLock::new(bytes),
            closed: AtomicBool::new(false),
        });
        if let Some(previous) = self.segments.write().insert(name.to_string(), segment) {
            previous.closed.store(true, Ordering::Release);
        }
    }

    /// Overwrite bytes of an existing segment in place.
    ///
    /// Returns false when the segment does not exist or is too small.
    pub fn write(&self, name: &str, offset: usize, bytes: &[u8]) -> bool {
        let Some(segment) = self.segments.read().get(name).cloned() else {
            return false;
        };
        let mut data = segment.data.write();
        let Some(end) = offset.checked_add(bytes.len()) else {
            return false;
        };
        match data.get_mut(offset..end) {
            Some(target) => {
                target.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    /// Withdraw a segment; open views start failing their reads.
    pub fn remove(&self, name: &str) {
        if let Some(segment) = self.segments.write().remove(name) {
            segment.closed.store(true, Ordering::Release);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.segments.read().contains_key(name)
    }

    /// Total number of `open` calls made through any clone.
    pub fn open_calls(&self) -> u64 {
        self.open_calls.load(Ordering::Relaxed)
    }
}

impl SharedMemory for InMemorySharedMemory {
    fn open(&self, name: &str, min_len: usize) -> Result<Box<dyn MappedRegion>, SourceError> {
        self.open_calls.fetch_add(1, Ordering::Relaxed);

        let segment = self
            .segments
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::not_found(name))?;

        let len = segment.data.read().len();
        if len < min_len {
            return Err(SourceError::Truncated {
                needed: min_len,
                got: len,
            });
        }

        Ok(Box::new(InMemoryRegion { segment, len }))
    }
}

struct InMemoryRegion {
    segment: Arc<Segment>,
    len: usize,
}

impl MappedRegion for InMemoryRegion {
    fn len(&self) -> usize {
        self.len
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), SourceError> {
        if self.segment.closed.load(Ordering::Acquire) {
            return Err(SourceError::Platform("mapping was closed".to_string()));
        }
        check_bounds(self.len, offset, buf.len())?;

        let data = self.segment.data.read();
        let end = offset.saturating_add(buf.len());
        let source = data.get(offset..end).ok_or(SourceError::Truncated {
            needed: end,
            got: data.len(),
        })?;
        buf.copy_from_slice(source);
        Ok(())
    }
}
