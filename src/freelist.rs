use std::marker::PhantomData;
use std::ptr;

use log::{debug, error, trace};

use crate::align;
use crate::align::GRANULE;
use crate::block::{self, HEADER_SIZE, Header};
use crate::source::{PAGE_SIZE, PageSource, Sbrk};

/// A first-fit allocator over one growable heap region.
///
/// All bookkeeping lives inside the region itself: every block carries a
/// one-word header, blocks are contiguous, and a zero-size allocated sentinel
/// marks the end of the heap. Allocation is a linear first-fit scan with
/// splitting; deallocation coalesces with both neighbors on the spot; when
/// nothing fits, the heap grows by one page and the scan restarts.
pub struct FreeListAllocator<S = Sbrk> {
  base: *mut u8,
  size: usize,
  source: S,
}

impl FreeListAllocator<Sbrk> {
  /// An allocator backed by the program break. The heap is claimed lazily on
  /// the first allocation.
  pub fn new() -> Self {
    Self::with_source(Sbrk::new())
  }
}

impl<S: PageSource> FreeListAllocator<S> {
  pub fn with_source(source: S) -> Self {
    Self {
      base: ptr::null_mut(),
      size: 0,
      source,
    }
  }

  /// Total bytes currently under management. Zero before the first
  /// allocation claims the heap.
  pub fn heap_size(&self) -> usize {
    self.size
  }

  unsafe fn first_block(&self) -> *mut u8 {
    unsafe { self.base.add(HEADER_SIZE) }
  }

  unsafe fn sentinel(&self) -> *mut u8 {
    unsafe { self.base.add(self.size - HEADER_SIZE) }
  }

  /// Claims the first page: one padding word to keep payloads granule
  /// aligned, one free block spanning the rest, and the sentinel in the
  /// page's last word.
  fn initialize(&mut self) -> bool {
    let Some(base) = self.source.grow(PAGE_SIZE) else {
      error!("heap init failed: page source refused {} bytes", PAGE_SIZE);
      return false;
    };

    let base = base.as_ptr();
    if base as usize % GRANULE != 0 {
      error!("heap init failed: base {:p} is not granule aligned", base);
      return false;
    }

    unsafe {
      let first = base.add(HEADER_SIZE);
      block::write(first, Header::new(PAGE_SIZE - 2 * HEADER_SIZE, false));

      let sentinel = base.add(PAGE_SIZE - HEADER_SIZE);
      block::write(sentinel, Header::TERMINAL);
    }

    self.base = base;
    self.size = PAGE_SIZE;

    debug!(
      "heap init: starts at {:p}, {} bytes, first free block {} bytes",
      base,
      self.size,
      PAGE_SIZE - 2 * HEADER_SIZE
    );

    true
  }

  /// Grows the heap by one page: the old sentinel becomes a page-sized free
  /// block, a fresh sentinel goes after it, and the new block is coalesced
  /// with a free predecessor.
  fn extend(&mut self) -> bool {
    let Some(previous_end) = self.source.grow(PAGE_SIZE) else {
      debug!("heap extend refused at {} bytes", self.size);
      return false;
    };

    unsafe {
      if previous_end.as_ptr() != self.base.add(self.size) {
        // Something else moved the break; the grant is not contiguous and
        // cannot be linked into the block chain.
        error!(
          "heap extend failed: expected grant at {:p}, got {:p}",
          self.base.add(self.size),
          previous_end.as_ptr()
        );
        return false;
      }

      let old_sentinel = self.sentinel();
      block::write(old_sentinel, Header::new(PAGE_SIZE, false));

      let sentinel = block::next(old_sentinel);
      block::write(sentinel, Header::TERMINAL);

      self.size += PAGE_SIZE;
      self.coalesce(old_sentinel);
    }

    debug!("heap extend: now {} bytes", self.size);

    true
  }

  /// Allocates at least `size` bytes and returns the payload address, or
  /// null when `size` is zero or the page source is exhausted. The payload
  /// is always 16-byte aligned.
  pub unsafe fn allocate(&mut self, size: usize) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }

    if self.base.is_null() && !self.initialize() {
      return ptr::null_mut();
    }

    // Header rides inside the block, so round the whole thing together.
    let needed = align!(size + HEADER_SIZE);

    loop {
      if let Some(found) = unsafe { self.find_fit(needed) } {
        return unsafe { self.place(found, needed) };
      }

      if !self.extend() {
        error!("allocate failed: {} bytes requested, heap cannot grow", size);
        return ptr::null_mut();
      }
    }
  }

  /// First-fit scan. A block qualifies when it is free and strictly larger
  /// than `needed`, so the split always leaves room for the remainder's
  /// header.
  unsafe fn find_fit(&self, needed: usize) -> Option<*mut u8> {
    unsafe {
      let mut curr = self.first_block();
      let mut header = block::read(curr);

      while !header.is_terminal() {
        if !header.is_allocated() && needed < header.size() {
          return Some(curr);
        }

        curr = block::next(curr);
        header = block::read(curr);
      }

      None
    }
  }

  /// Carves `needed` bytes out of the free block at `found` and gives the
  /// remainder its own free header.
  unsafe fn place(&mut self, found: *mut u8, needed: usize) -> *mut u8 {
    unsafe {
      let old_size = block::read(found).size();
      block::write(found, Header::new(needed, true));

      let remainder = old_size - needed;
      if remainder > 0 {
        block::write(found.add(needed), Header::new(remainder, false));
      }

      let payload = block::payload(found);
      trace!("allocate: {} bytes at {:p} (block {:p})", needed, payload, found);

      payload
    }
  }

  /// Releases the block whose payload starts at `address` and merges it with
  /// free neighbors. Null is a no-op. An address that does not look like a
  /// live payload of this heap is logged and ignored; this is a plausibility
  /// check, not a guarantee against every forged pointer.
  pub unsafe fn deallocate(&mut self, address: *mut u8) {
    if address.is_null() {
      return;
    }

    if !self.plausible(address) {
      error!("free ignored: {:p} is not a live payload of this heap", address);
      return;
    }

    unsafe {
      let found = address.sub(HEADER_SIZE);
      trace!("free: addr {:p} (block {:p})", address, found);

      self.coalesce(found);
    }
  }

  /// A payload address is plausible when it lies inside the heap on a
  /// granule boundary and the word before it reads as an allocated header
  /// whose size stays inside the heap.
  fn plausible(&self, address: *mut u8) -> bool {
    if self.base.is_null() {
      return false;
    }

    let first_payload = self.base as usize + 2 * HEADER_SIZE;
    let sentinel = self.base as usize + self.size - HEADER_SIZE;
    let addr = address as usize;

    if addr < first_payload || addr >= sentinel || addr % GRANULE != 0 {
      return false;
    }

    let header = unsafe { block::read(address.sub(HEADER_SIZE)) };

    header.is_allocated()
      && header.size() != 0
      && addr - HEADER_SIZE + header.size() <= sentinel
  }

  /// Writes `found` back as free, absorbing a free successor and then a free
  /// predecessor. The merged-away headers become dead bytes inside the new
  /// block. One header write, size and flag together.
  unsafe fn coalesce(&mut self, found: *mut u8) {
    unsafe {
      let mut target = found;
      let mut size = block::read(found).size();

      let next = block::read(block::next(found));
      if !next.is_allocated() {
        size += next.size();
      }

      if let Some(prev) = block::prev(self.first_block(), found) {
        let header = block::read(prev);
        if !header.is_allocated() {
          target = prev;
          size += header.size();
        }
      }

      block::write(target, Header::new(size, false));
    }
  }

  /// Walks every real block in address order. Empty before the heap exists.
  pub fn blocks(&self) -> HeapWalk<'_> {
    HeapWalk {
      cursor: if self.base.is_null() {
        ptr::null_mut()
      } else {
        unsafe { self.first_block() }
      },
      _heap: PhantomData,
    }
  }

  /// Walks the heap and verifies its invariants, tracing every block the way
  /// the blocks sit in memory. Returns false on the first violation: a
  /// misaligned payload, a zero-size non-sentinel header, two adjacent free
  /// blocks, or a walk that does not end exactly on the sentinel.
  pub fn check(&self) -> bool {
    if self.base.is_null() {
      return true;
    }

    unsafe {
      let sentinel = self.sentinel();
      let mut prev_free = false;
      let mut curr = self.first_block();

      loop {
        if curr == sentinel {
          return block::read(curr).is_terminal();
        }

        if curr > sentinel {
          error!("heapcheck: block chain overran the sentinel at {:p}", curr);
          return false;
        }

        let header = block::read(curr);
        let size = header.size();
        let aligned = block::payload(curr) as usize % GRANULE == 0;

        trace!(
          "heapcheck: block {:p}, size: {}, allocated: {}, aligned: {}",
          curr,
          size,
          header.is_allocated(),
          aligned
        );

        if header.is_terminal() || size == 0 || !aligned {
          error!("heapcheck: bad header at {:p}", curr);
          return false;
        }

        if !header.is_allocated() {
          if prev_free {
            error!("heapcheck: adjacent free blocks at {:p}", curr);
            return false;
          }
          prev_free = true;
        } else {
          prev_free = false;
        }

        curr = block::next(curr);
      }
    }
  }
}

/// One entry of a heap walk: a block's header address, total size and state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockInfo {
  pub address: *mut u8,
  pub size: usize,
  pub allocated: bool,
}

/// Iterator over a heap's blocks, sentinel excluded.
pub struct HeapWalk<'a> {
  cursor: *mut u8,
  _heap: PhantomData<&'a ()>,
}

impl Iterator for HeapWalk<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    if self.cursor.is_null() {
      return None;
    }

    let header = unsafe { block::read(self.cursor) };
    if header.is_terminal() {
      return None;
    }

    let info = BlockInfo {
      address: self.cursor,
      size: header.size(),
      allocated: header.is_allocated(),
    };

    self.cursor = unsafe { block::next(self.cursor) };

    Some(info)
  }
}
