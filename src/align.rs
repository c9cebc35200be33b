/// Granularity of the allocator, in bytes. Every block size is a multiple of
/// this, every payload address satisfies it, and the header's allocation flag
/// lives in the low bits it leaves free.
pub const GRANULE: usize = 16;

/// Rounds the given size up to the nearest multiple of [`GRANULE`].
///
/// # Examples
///
/// ```rust
/// use fralloc::align;
///
/// assert_eq!(align!(1), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(17), 32);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::GRANULE - 1) & !($crate::align::GRANULE - 1)
  };
}

#[cfg(test)]
mod tests {
  use super::GRANULE;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (GRANULE * i + 1)..=(GRANULE * (i + 1));

      let expected_alignment = GRANULE * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_zero() {
    assert_eq!(0, align!(0));
  }
}
