//! Win32 file-mapping views (`OpenFileMappingW` + `MapViewOfFile`).
//!
//! Views are opened with `FILE_MAP_READ` only; nothing here ever writes
//! into simulator memory.

#![expect(unsafe_code, reason = "Win32 file mapping FFI")]

use std::ffi::OsStr;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::ptr;

use simhud_telemetry_core::SourceError;
use tracing::debug;
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::memoryapi::{
    FILE_MAP_READ, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, VirtualQuery,
};
use winapi::um::winnt::{HANDLE, MEMORY_BASIC_INFORMATION};

use super::{MappedRegion, check_bounds};

pub(crate) struct Win32Region {
    handle: HANDLE,
    base_ptr: *const u8,
    len: usize,
}

// SAFETY: the view is read-only and owned exclusively by this value; the raw
// pointer is only dereferenced through `read_at`, which copies out bytes.
unsafe impl Send for Win32Region {}

impl Win32Region {
    /// Map the whole mapping called `name`, which must span at least `min_len` bytes.
    pub(crate) fn open(name: &str, min_len: usize) -> Result<Self, SourceError> {
        let name_wide: Vec<u16> = OsStr::new(name)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: `name_wide` is a NUL-terminated UTF-16 string that outlives the call.
        let handle = unsafe { OpenFileMappingW(FILE_MAP_READ, 0, name_wide.as_ptr()) };
        if handle.is_null() || handle == INVALID_HANDLE_VALUE {
            return Err(SourceError::not_found(name));
        }

        // SAFETY: `handle` is a valid file-mapping handle opened above.
        let base_ptr = unsafe { MapViewOfFile(handle, FILE_MAP_READ, 0, 0, 0) } as *const u8;
        if base_ptr.is_null() {
            // SAFETY: `handle` is valid and not used after this point.
            unsafe { CloseHandle(handle) };
            return Err(SourceError::Platform(format!(
                "failed to map a view of '{name}'"
            )));
        }

        let mut region = Self {
            handle,
            base_ptr,
            len: 0,
        };
        // Dropping `region` on the error paths unmaps the view and closes the handle.
        let len = region.query_view_len()?;
        if len < min_len {
            return Err(SourceError::Truncated {
                needed: min_len,
                got: len,
            });
        }

        debug!(mapping = name, len, "Mapped shared memory view");
        region.len = len;
        Ok(region)
    }

    /// Size of the mapped view, in whole pages.
    fn query_view_len(&self) -> Result<usize, SourceError> {
        // SAFETY: MEMORY_BASIC_INFORMATION is plain data; all-zero is a valid value.
        let mut info: MEMORY_BASIC_INFORMATION = unsafe { mem::zeroed() };
        // SAFETY: `base_ptr` is the start of a live view and `info` is a valid out-buffer
        // of the size passed.
        let written = unsafe {
            VirtualQuery(
                self.base_ptr.cast(),
                &mut info,
                mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        if written == 0 {
            return Err(SourceError::Platform(
                "failed to query the mapped view size".to_string(),
            ));
        }
        Ok(info.RegionSize)
    }
}

impl MappedRegion for Win32Region {
    fn len(&self) -> usize {
        self.len
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), SourceError> {
        check_bounds(self.len, offset, buf.len())?;
        let src = self.base_ptr.wrapping_add(offset);
        // SAFETY: bounds were checked against the mapped view length and the
        // destination is a distinct, exclusively borrowed buffer.
        unsafe { ptr::copy_nonoverlapping(src, buf.as_mut_ptr(), buf.len()) };
        Ok(())
    }
}

impl Drop for Win32Region {
    fn drop(&mut self) {
        // SAFETY: `base_ptr` came from `MapViewOfFile` and is unmapped exactly once.
        unsafe { UnmapViewOfFile(self.base_ptr.cast()) };
        // SAFETY: `handle` came from `OpenFileMappingW` and is closed exactly once.
        unsafe { CloseHandle(self.handle) };
    }
}
