use fralloc::{FreeListAllocator, PageSource};

/// Prints the block table of the heap: one line per block, in address order.
/// Handy next to `RUST_LOG=trace` output when following how splits and
/// merges reshape the heap.
fn dump_heap<S: PageSource>(label: &str, allocator: &FreeListAllocator<S>) {
  println!("[{}] heap: {} bytes", label, allocator.heap_size());

  for block in allocator.blocks() {
    println!(
      "[{}]   block {:p}, size: {}, allocated: {}",
      label, block.address, block.size, block.allocated
    );
  }

  println!("[{}] invariants ok: {}", label, allocator.check());
}

fn main() {
  env_logger::init();

  let mut allocator = FreeListAllocator::new();

  unsafe {
    // --------------------------------------------------------------------
    // 1) Three allocations carve the first page into four blocks
    //    (three used, one free remainder).
    // --------------------------------------------------------------------
    let first = allocator.allocate(100);
    let second = allocator.allocate(300);
    let third = allocator.allocate(500);

    println!("[1] allocated 100 @ {:p}, 300 @ {:p}, 500 @ {:p}", first, second, third);
    dump_heap("1", &allocator);

    // --------------------------------------------------------------------
    // 2) Free everything in order. Coalescing folds the heap back into a
    //    single free block.
    // --------------------------------------------------------------------
    allocator.deallocate(first);
    allocator.deallocate(second);
    allocator.deallocate(third);
    dump_heap("2", &allocator);

    // --------------------------------------------------------------------
    // 3) A mixed batch. The small ones reuse reclaimed space; the big ones
    //    force the heap to grow page by page.
    // --------------------------------------------------------------------
    for size in [50, 250, 700, 3000, 50, 10000] {
      let addr = allocator.allocate(size);
      println!("[3] allocate {} -> {:p}", size, addr);
    }

    dump_heap("3", &allocator);
  }
}
