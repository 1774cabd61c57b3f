//! memfd-backed mapping with the data region mapped twice back to back.
//!
//! ```text
//! virtual: [ meta page ][ data 0..cap ][ data 0..cap (again) ]
//! memfd:   [ 0..page   ][ page..page+cap                     ]
//! ```
//!
//! A record starting near the end of the data region continues into the second
//! mapping, so readers and writers always see it as one contiguous slice.

use std::num::NonZeroUsize;
use std::os::fd::OwnedFd;
use std::ptr::NonNull;

use nix::sys::memfd::{ memfd_create, MFdFlags };
use nix::sys::mman::{ mmap, mmap_anonymous, munmap, MapFlags, ProtFlags };
use nix::unistd::ftruncate;

use crate::error::{ Result, RingError };

pub(crate) struct Memory {
    base: NonNull<u8>,
    reserved_len: usize,
    page_size: usize,
    capacity: usize,
    fd: OwnedFd,
}

impl Memory {
    pub(crate) fn new(capacity: usize) -> Result<Self> {
        let page_size = page_size();
        if !capacity.is_power_of_two() || capacity < page_size {
            return Err(
                crate::config_error!("Capacity must be a power of 2 and at least {} bytes", page_size)
            );
        }

        let fd = memfd_create(c"ringview", MFdFlags::MFD_CLOEXEC)?;
        ftruncate(&fd, (page_size + capacity) as libc::off_t)?;

        let reserved_len = page_size + 2 * capacity;
        let base = unsafe {
            mmap_anonymous(
                None,
                non_zero(reserved_len)?,
                ProtFlags::PROT_NONE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS
            )?
        };

        let memory = Memory {
            base: base.cast::<u8>(),
            reserved_len,
            page_size,
            capacity,
            fd,
        };

        // On error `memory` drops and releases the whole reservation.
        memory.map_fixed(0, page_size, 0)?;
        memory.map_fixed(page_size, capacity, page_size)?;
        memory.map_fixed(page_size + capacity, capacity, page_size)?;

        Ok(memory)
    }

    fn map_fixed(&self, at: usize, len: usize, file_offset: usize) -> Result<()> {
        let addr = NonZeroUsize::new(self.base.as_ptr() as usize + at).ok_or_else(||
            RingError::config("mapping address is null")
        )?;
        unsafe {
            mmap(
                Some(addr),
                non_zero(len)?,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED | MapFlags::MAP_FIXED,
                &self.fd,
                file_offset as libc::off_t
            )?;
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn metadata_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    #[inline]
    pub(crate) fn data_ptr(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(self.page_size) }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn page_size(&self) -> usize {
        self.page_size
    }
}

impl Drop for Memory {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.base.cast(), self.reserved_len);
        }
    }
}

// Raw pointers into a mapping owned by this value; access is coordinated
// through the atomics in the metadata page.
unsafe impl Send for Memory {}
unsafe impl Sync for Memory {}

/// System page size; ring capacities must be a power-of-2 multiple of it.
pub fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

fn non_zero(len: usize) -> Result<NonZeroUsize> {
    NonZeroUsize::new(len).ok_or_else(|| RingError::config("mapping length must be non-zero"))
}
