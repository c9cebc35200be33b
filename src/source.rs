//! The OS boundary: where heap pages come from.
//!
//! The allocator only ever asks for one thing: "grow the heap by N bytes and
//! tell me where the old end was". [`Sbrk`] answers with the real program
//! break; [`FixedSource`] answers from a pre-reserved arena, which caps the
//! heap and keeps tests independent of the process-wide break.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use libc::{c_void, intptr_t, sbrk};

use crate::align::GRANULE;

/// Fixed unit of heap growth, in bytes.
pub const PAGE_SIZE: usize = 4096;

/// A brk-style growth primitive. `grow` extends the heap by `len` bytes and
/// returns the previous heap end, or `None` when no more memory is available.
/// Successive grants are contiguous.
pub trait PageSource {
  fn grow(&mut self, len: usize) -> Option<NonNull<u8>>;
}

/// Grows the heap by moving the program break with `sbrk(2)`.
///
/// The first grant rounds the break up to the allocator granule so every
/// later payload lands on a 16-byte boundary. Contiguity of later grants
/// holds only while nothing else in the process moves the break.
pub struct Sbrk {
  aligned: bool,
}

impl Sbrk {
  pub fn new() -> Self {
    Self { aligned: false }
  }
}

impl PageSource for Sbrk {
  fn grow(&mut self, len: usize) -> Option<NonNull<u8>> {
    unsafe {
      if !self.aligned {
        let brk = sbrk(0);
        if brk == usize::MAX as *mut c_void {
          return None;
        }

        let pad = (brk as *mut u8).align_offset(GRANULE);
        if pad > 0 && sbrk(pad as intptr_t) == usize::MAX as *mut c_void {
          return None;
        }

        self.aligned = true;
      }

      let address = sbrk(len as intptr_t);

      if address == usize::MAX as *mut c_void {
        return None;
      }

      NonNull::new(address as *mut u8)
    }
  }
}

/// Grows the heap inside one pre-reserved, page-aligned arena and refuses
/// once the arena is spent. The arena is released when the source is dropped,
/// so payload pointers must not outlive the allocator that owns it.
pub struct FixedSource {
  base: NonNull<u8>,
  capacity: usize,
  used: usize,
}

impl FixedSource {
  /// Reserves an arena of `pages` pages. Returns `None` when the reservation
  /// itself fails. Zero pages is allowed and yields a source that refuses
  /// every grow.
  pub fn new(pages: usize) -> Option<Self> {
    let capacity = pages.checked_mul(PAGE_SIZE)?;

    let base = if capacity == 0 {
      NonNull::dangling()
    } else {
      let layout = Layout::from_size_align(capacity, PAGE_SIZE).ok()?;
      NonNull::new(unsafe { alloc::alloc(layout) })?
    };

    Some(Self { base, capacity, used: 0 })
  }

  /// Bytes granted so far.
  pub fn used(&self) -> usize {
    self.used
  }
}

impl PageSource for FixedSource {
  fn grow(&mut self, len: usize) -> Option<NonNull<u8>> {
    if len > self.capacity - self.used {
      return None;
    }

    let previous_end = unsafe { self.base.as_ptr().add(self.used) };
    self.used += len;

    NonNull::new(previous_end)
  }
}

impl Drop for FixedSource {
  fn drop(&mut self) {
    if self.capacity > 0 {
      // Layout construction succeeded in new, so it succeeds here too.
      if let Ok(layout) = Layout::from_size_align(self.capacity, PAGE_SIZE) {
        unsafe { alloc::dealloc(self.base.as_ptr(), layout) };
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fixed_source_contiguous_grants() {
    let mut source = FixedSource::new(2).unwrap();

    let first = source.grow(PAGE_SIZE).unwrap();
    let second = source.grow(PAGE_SIZE).unwrap();

    assert_eq!(second.as_ptr() as usize, first.as_ptr() as usize + PAGE_SIZE);
    assert_eq!(first.as_ptr() as usize % PAGE_SIZE, 0);
    assert_eq!(source.used(), 2 * PAGE_SIZE);
  }

  #[test]
  fn test_fixed_source_exhaustion() {
    let mut source = FixedSource::new(1).unwrap();

    assert!(source.grow(PAGE_SIZE).is_some());
    assert!(source.grow(PAGE_SIZE).is_none());

    // A refused grow does not consume capacity bookkeeping.
    assert_eq!(source.used(), PAGE_SIZE);
  }

  #[test]
  fn test_fixed_source_empty() {
    let mut source = FixedSource::new(0).unwrap();

    assert!(source.grow(PAGE_SIZE).is_none());
  }
}
