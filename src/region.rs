use std::{marker::PhantomData, ptr::NonNull};

use crate::error::Result;

/// A contiguous byte region an arena can carve allocations out of.
///
/// # Safety
///
/// Implementors must guarantee that `as_ptr()` is valid for reads and writes
/// of `len()` bytes for as long as the region lives, that both values never
/// change, and that nothing else accesses those bytes while the region is
/// held by an arena.
pub unsafe trait Region {
  /// Start of the region.
  fn as_ptr(&self) -> NonNull<u8>;

  /// Size of the region in bytes.
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Gives the region back to whoever owns the underlying memory.
  fn release(self) -> Result<()>
  where
    Self: Sized;
}

/// A caller-owned buffer lent to an arena.
///
/// The arena never allocates or frees this memory; releasing it only ends
/// the borrow.
pub struct FixedBuffer<'a> {
  ptr: NonNull<u8>,
  len: usize,
  _buf: PhantomData<&'a mut [u8]>,
}

impl<'a> FixedBuffer<'a> {
  pub fn new(buf: &'a mut [u8]) -> Self {
    Self {
      len: buf.len(),
      ptr: NonNull::from(buf).cast::<u8>(),
      _buf: PhantomData,
    }
  }
}

impl<'a> From<&'a mut [u8]> for FixedBuffer<'a> {
  fn from(buf: &'a mut [u8]) -> Self {
    Self::new(buf)
  }
}

// SAFETY: the pointer comes from an exclusive borrow held for 'a.
unsafe impl Region for FixedBuffer<'_> {
  fn as_ptr(&self) -> NonNull<u8> {
    self.ptr
  }

  fn len(&self) -> usize {
    self.len
  }

  fn release(self) -> Result<()> {
    Ok(())
  }
}

// SAFETY: equivalent to sending the `&mut [u8]` it was built from.
unsafe impl Send for FixedBuffer<'_> {}

#[cfg(unix)]
pub use mapped::MappedRegion;

#[cfg(unix)]
mod mapped {
  use std::{io, mem::ManuallyDrop, ptr, ptr::NonNull};

  use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_int, mmap, munmap};
  use tracing::{debug, error};

  use super::Region;
  use crate::{
    config::ArenaConfig,
    error::{ArenaError, Result},
  };

  /// An anonymous, private mapping obtained straight from the OS.
  ///
  /// Unmapped by [`Region::release`], or on drop if it was never released.
  pub struct MappedRegion {
    ptr: NonNull<u8>,
    len: usize,
  }

  impl MappedRegion {
    /// Maps `capacity` bytes of zero-filled, read-write memory.
    pub fn reserve(capacity: usize) -> Result<Self> {
      Self::reserve_with(&ArenaConfig::default().with_capacity(capacity))
    }

    pub fn reserve_with(config: &ArenaConfig) -> Result<Self> {
      let capacity = config.capacity;
      let flags = MAP_PRIVATE | MAP_ANONYMOUS | populate_flag(config.prefault);

      // SAFETY: anonymous mapping with a null hint; the kernel validates
      // the length and reports failure as MAP_FAILED.
      let addr = unsafe {
        mmap(
          ptr::null_mut(),
          capacity,
          PROT_READ | PROT_WRITE,
          flags,
          -1,
          0,
        )
      };

      if addr == MAP_FAILED {
        return Err(ArenaError::Init {
          capacity,
          source: io::Error::last_os_error(),
        });
      }

      let ptr = NonNull::new(addr.cast::<u8>()).ok_or_else(|| ArenaError::Init {
        capacity,
        source: io::Error::other("mmap returned a null mapping"),
      })?;

      debug!(capacity, addr = ?ptr, prefault = config.prefault, "reserved arena region");

      Ok(Self { ptr, len: capacity })
    }

    /// # Safety
    ///
    /// Must be called at most once; the region is unusable afterwards.
    unsafe fn unmap(&self) -> Result<()> {
      // SAFETY: ptr/len describe a live mapping created by reserve_with.
      let rc = unsafe { munmap(self.ptr.as_ptr().cast(), self.len) };

      if rc != 0 {
        return Err(ArenaError::Release {
          capacity: self.len,
          source: io::Error::last_os_error(),
        });
      }

      debug!(capacity = self.len, addr = ?self.ptr, "released arena region");
      Ok(())
    }
  }

  #[cfg(target_os = "linux")]
  fn populate_flag(prefault: bool) -> c_int {
    if prefault { libc::MAP_POPULATE } else { 0 }
  }

  #[cfg(not(target_os = "linux"))]
  fn populate_flag(_prefault: bool) -> c_int {
    0
  }

  // SAFETY: the mapping is private to this process and owned exclusively.
  unsafe impl Region for MappedRegion {
    fn as_ptr(&self) -> NonNull<u8> {
      self.ptr
    }

    fn len(&self) -> usize {
      self.len
    }

    fn release(self) -> Result<()> {
      let this = ManuallyDrop::new(self);
      // SAFETY: ManuallyDrop keeps Drop from unmapping a second time.
      unsafe { this.unmap() }
    }
  }

  impl Drop for MappedRegion {
    fn drop(&mut self) {
      // SAFETY: release() bypasses Drop, so this is the only unmap.
      if let Err(err) = unsafe { self.unmap() } {
        error!(%err, "failed to unmap arena region on drop");
      }
    }
  }

  // SAFETY: the mapping is not tied to the thread that created it.
  unsafe impl Send for MappedRegion {}

}
