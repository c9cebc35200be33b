//! # fralloc - A First-Fit Free-List Allocator
//!
//! This crate provides a simple **first-fit allocator** with an implicit free
//! list, managing a single heap region grown page by page via the `sbrk`
//! system call.
//!
//! ## Overview
//!
//! Every block carries one word of metadata directly in front of its payload.
//! There is no separate free list and no metadata table: the heap itself is
//! the data structure.
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌─────┬────────┬──────────┬────────┬──────────┬────────┬─────────┬─────┐
//!   │ pad │ header │ payload  │ header │ payload  │ header │ payload │ end │
//!   │ 8B  │ A (y)  │ A        │ B (n)  │ B (free) │ C (y)  │ C       │ 0|1 │
//!   └─────┴────────┴──────────┴────────┴──────────┴────────┴─────────┴─────┘
//!   ▲             ▲                                                  ▲
//!   │             │                                                  │
//!   heap base     16-byte aligned payloads               terminal sentinel
//!
//!   header word = size (multiple of 16, high bits) | allocated (bit 0)
//!   next block  = this block + size
//! ```
//!
//! Allocation scans the blocks in address order and takes the first free one
//! strictly larger than the rounded request, splitting off the remainder as a
//! new free block. Freeing marks the block free and merges it with free
//! neighbors on the spot, so no two adjacent blocks are ever both free. When
//! nothing fits, the heap grows by one 4096-byte page and the scan restarts.
//!
//! ## Crate Structure
//!
//! ```text
//!   fralloc
//!   ├── align      - Alignment macro and granule constant
//!   ├── block      - Header codec and block navigation (internal)
//!   ├── source     - Page sources: Sbrk, FixedSource
//!   └── freelist   - FreeListAllocator implementation
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fralloc::FreeListAllocator;
//!
//! fn main() {
//!     let mut allocator = FreeListAllocator::new();
//!
//!     unsafe {
//!         // Allocate at least 100 bytes, 16-byte aligned.
//!         let ptr = allocator.allocate(100) as *mut u64;
//!
//!         // Use the memory
//!         *ptr = 42;
//!         println!("Value: {}", *ptr);
//!
//!         // Free the memory
//!         allocator.deallocate(ptr as *mut u8);
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - **In-place metadata**: all state lives inside the managed region
//! - **Immediate coalescing**: adjacent free blocks merge on every free
//! - **On-demand growth**: one page per growth, repeated until the request fits
//! - **Pluggable page source**: `sbrk` in production, a fixed arena in tests
//! - **Best-effort misuse detection**: implausible frees are logged and ignored
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives
//! - **Memory is never returned to the OS**: the heap only grows
//! - **Linear search**: allocation cost is O(number of blocks)
//! - **Unix-only with `Sbrk`**: anything else in the process that moves the
//!   program break (including the system allocator) breaks contiguity; growth
//!   then fails cleanly and `allocate` returns null
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! All allocation and deallocation operations require `unsafe` blocks, and
//! payload pointers must not outlive the allocator that produced them.

pub mod align;
mod block;
mod freelist;
mod source;

pub use block::HEADER_SIZE;
pub use freelist::{BlockInfo, FreeListAllocator, HeapWalk};
pub use source::{FixedSource, PAGE_SIZE, PageSource, Sbrk};
