//! Block headers and navigation.
//!
//! A block is one machine word of metadata followed by its payload. The word
//! packs the block's total size (a multiple of 16, so its low four bits are
//! always zero) together with an allocation flag in bit 0. There is no side
//! structure: walking the heap means striding from header to header by each
//! block's recorded size.

use std::mem;

use crate::align::GRANULE;

/// Width of a block header, in bytes. One machine word.
pub const HEADER_SIZE: usize = mem::size_of::<usize>();

/// One block header: size and allocation flag packed into a single word.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Header(usize);

impl Header {
  /// The terminal sentinel: size zero, allocated. Marks the end of the heap
  /// and is never handed to a caller.
  pub const TERMINAL: Header = Header(1);

  /// Packs a header from an already granule-rounded size and a flag.
  pub fn new(size: usize, allocated: bool) -> Self {
    debug_assert_eq!(size % GRANULE, 0);
    Header(size | allocated as usize)
  }

  /// Total bytes this block occupies, header included.
  pub fn size(self) -> usize {
    self.0 & !(GRANULE - 1)
  }

  pub fn is_allocated(self) -> bool {
    self.0 & 1 == 1
  }

  pub fn is_terminal(self) -> bool {
    self.size() == 0 && self.is_allocated()
  }
}

/// Reads the header stored at `block` as one whole word.
pub unsafe fn read(block: *mut u8) -> Header {
  unsafe { Header((block as *const usize).read()) }
}

/// Writes `header` at `block` as one whole word. Size and flag are never
/// updated separately.
pub unsafe fn write(block: *mut u8, header: Header) {
  unsafe { (block as *mut usize).write(header.0) }
}

/// Address of the payload that follows the header at `block`.
pub unsafe fn payload(block: *mut u8) -> *mut u8 {
  unsafe { block.add(HEADER_SIZE) }
}

/// Address of the block contiguously following `block`. Undefined on the
/// terminal sentinel; callers check `is_terminal` first.
pub unsafe fn next(block: *mut u8) -> *mut u8 {
  unsafe { block.add(read(block).size()) }
}

/// Address of the block immediately preceding `block`, found by a forward
/// scan from `first`. Returns `None` when `block` is the first block, and
/// also when the scan reaches the sentinel without meeting `block` (which
/// means `block` is not a real block boundary).
pub unsafe fn prev(first: *mut u8, block: *mut u8) -> Option<*mut u8> {
  unsafe {
    let mut prev_block = None;
    let mut curr = first;

    while curr != block {
      if read(curr).is_terminal() {
        return None;
      }
      prev_block = Some(curr);
      curr = next(curr);
    }

    prev_block
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[repr(align(16))]
  struct Arena([u8; 256]);

  #[test]
  fn test_header_codec() {
    let header = Header::new(112, true);
    assert_eq!(header.size(), 112);
    assert!(header.is_allocated());
    assert!(!header.is_terminal());

    let header = Header::new(4080, false);
    assert_eq!(header.size(), 4080);
    assert!(!header.is_allocated());

    assert_eq!(Header::TERMINAL.size(), 0);
    assert!(Header::TERMINAL.is_allocated());
    assert!(Header::TERMINAL.is_terminal());
  }

  #[test]
  fn test_walk() {
    let mut arena = Arena([0; 256]);

    unsafe {
      // Headers sit one word before each granule boundary, like on the real
      // heap: padding word, three blocks, sentinel.
      let first = arena.0.as_mut_ptr().add(HEADER_SIZE);
      write(first, Header::new(32, true));

      let second = next(first);
      assert_eq!(second, first.add(32));
      write(second, Header::new(64, false));

      let third = next(second);
      write(third, Header::new(48, true));

      let sentinel = next(third);
      write(sentinel, Header::TERMINAL);

      assert_eq!(prev(first, first), None);
      assert_eq!(prev(first, second), Some(first));
      assert_eq!(prev(first, third), Some(second));

      // An address that is not a block boundary has no predecessor.
      assert_eq!(prev(first, first.add(8)), None);

      assert!(!read(first).is_terminal());
      assert!(read(sentinel).is_terminal());

      assert_eq!(payload(first), first.add(HEADER_SIZE));
    }
  }
}
