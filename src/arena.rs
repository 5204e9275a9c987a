use std::{
  cell::Cell,
  fmt,
  ops::{Deref, DerefMut},
  slice,
};

use tracing::trace;

#[cfg(unix)]
use crate::{config::ArenaConfig, region::MappedRegion};
use crate::{
  align::forward_offset,
  error::{Exhausted, Result},
  region::{FixedBuffer, Region},
};

/// A linear allocator over a single fixed-capacity region.
///
/// The arena tracks one number, the watermark: how many bytes from the start
/// of the region are live. Pushing bumps it forward, popping moves it back,
/// clearing resets it to zero. Individual allocations are never tracked.
///
/// Pushes take `&self` and hand out borrows of the region, while [`pop`],
/// [`restore`] and [`clear`] take `&mut self`, so no [`Allocation`] can
/// survive the watermark moving back over it.
///
/// [`pop`]: Arena::pop
/// [`restore`]: Arena::restore
/// [`clear`]: Arena::clear
pub struct Arena<R: Region> {
  region: R,
  watermark: Cell<usize>,
}

/// A snapshot of the watermark, see [`Arena::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mark(usize);

impl Mark {
  pub fn offset(self) -> usize {
    self.0
  }
}

/// Bytes handed out by a push.
///
/// Derefs to the allocated slice. [`offset`](Allocation::offset) is where the
/// aligned block starts, counted from the beginning of the arena's region.
pub struct Allocation<'a> {
  offset: usize,
  bytes: &'a mut [u8],
}

impl<'a> Allocation<'a> {
  pub fn offset(&self) -> usize {
    self.offset
  }

  pub fn into_slice(self) -> &'a mut [u8] {
    self.bytes
  }
}

impl Deref for Allocation<'_> {
  type Target = [u8];

  fn deref(&self) -> &[u8] {
    &*self.bytes
  }
}

impl DerefMut for Allocation<'_> {
  fn deref_mut(&mut self) -> &mut [u8] {
    &mut *self.bytes
  }
}

impl fmt::Debug for Allocation<'_> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Allocation")
      .field("offset", &self.offset)
      .field("len", &self.bytes.len())
      .field("addr", &self.bytes.as_ptr())
      .finish()
  }
}

impl<R: Region> Arena<R> {
  /// Wraps `region` with the watermark at zero.
  pub fn new(region: R) -> Self {
    Self {
      region,
      watermark: Cell::new(0),
    }
  }

  /// Total size of the region in bytes.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.region.len()
  }

  /// Current watermark: bytes from the start of the region that are in use.
  #[inline]
  pub fn size(&self) -> usize {
    self.watermark.get()
  }

  /// Bytes still free between the watermark and the end of the region.
  #[inline]
  pub fn remaining(&self) -> usize {
    self.capacity() - self.size()
  }

  /// True when nothing is pushed.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.size() == 0
  }

  /// Address of the first byte of the region.
  pub fn base_addr(&self) -> usize {
    self.region.as_ptr().as_ptr().addr()
  }

  /// Carves `size` bytes aligned to `align` out of the free space.
  ///
  /// `align` must be zero (no requirement) or a power of two; the
  /// requirement applies to the real address, not just the offset. The
  /// contents are whatever the region held before.
  ///
  /// On [`Exhausted`] the watermark is left untouched.
  ///
  /// # Panics
  ///
  /// Panics if `align` is neither zero nor a power of two.
  pub fn push(
    &self,
    size: usize,
    align: usize,
  ) -> std::result::Result<Allocation<'_>, Exhausted> {
    let offset = self.bump(size, align)?;

    // SAFETY: bump() reserved [offset, offset + size) inside the region and
    // moved the watermark past it. The watermark only moves back through
    // &mut self, which cannot coexist with this borrow, so no other live
    // Allocation overlaps these bytes.
    let bytes = unsafe {
      slice::from_raw_parts_mut(self.region.as_ptr().as_ptr().add(offset), size)
    };

    Ok(Allocation { offset, bytes })
  }

  /// Like [`push`](Arena::push), but the returned bytes are zeroed.
  ///
  /// Exactly `size` bytes from the aligned address are cleared; padding is
  /// left as it was.
  pub fn push_zero(
    &self,
    size: usize,
    align: usize,
  ) -> std::result::Result<Allocation<'_>, Exhausted> {
    let mut allocation = self.push(size, align)?;
    allocation.fill(0);
    Ok(allocation)
  }

  /// Pushes `data.len()` bytes and copies `data` into them.
  pub fn push_bytes(
    &self,
    data: &[u8],
    align: usize,
  ) -> std::result::Result<Allocation<'_>, Exhausted> {
    let mut allocation = self.push(data.len(), align)?;
    allocation.copy_from_slice(data);
    Ok(allocation)
  }

  /// Moves the watermark back by `size` bytes, stopping at zero.
  ///
  /// The arena cannot tell whether `size` matches earlier pushes. Giving
  /// back bytes in the reverse order they were taken, padding included, is
  /// up to the caller.
  pub fn pop(
    &mut self,
    size: usize,
  ) {
    let watermark = self.watermark.get_mut();
    *watermark -= size.min(*watermark);
  }

  /// Resets the watermark to zero. The region's bytes are left as they are.
  pub fn clear(&mut self) {
    *self.watermark.get_mut() = 0;
  }

  /// Snapshots the watermark so it can be [`restore`](Arena::restore)d later.
  pub fn mark(&self) -> Mark {
    Mark(self.size())
  }

  /// Pops everything pushed since `mark` was taken.
  ///
  /// A mark above the current watermark (taken before a pop or clear) is a
  /// no-op.
  pub fn restore(
    &mut self,
    mark: Mark,
  ) {
    let excess = self.size().saturating_sub(mark.0);
    self.pop(excess);
  }

  /// Releases the backing region, consuming the arena.
  pub fn release(self) -> Result<()> {
    self.region.release()
  }

  /// Takes the backing region back without releasing it.
  pub fn into_region(self) -> R {
    self.region
  }

  fn bump(
    &self,
    size: usize,
    align: usize,
  ) -> std::result::Result<usize, Exhausted> {
    let watermark = self.watermark.get();
    let padding = forward_offset(self.base_addr() + watermark, align);

    let end = watermark
      .checked_add(padding)
      .and_then(|start| start.checked_add(size))
      .filter(|&end| end <= self.capacity());

    match end {
      Some(end) => {
        self.watermark.set(end);
        Ok(watermark + padding)
      }
      None => {
        let remaining = self.remaining();
        trace!(size, align, padding, remaining, "arena exhausted");
        Err(Exhausted {
          requested: size,
          padding,
          remaining,
        })
      }
    }
  }
}

impl<'a> Arena<FixedBuffer<'a>> {
  /// Borrows `buf` as the arena's region. The buffer stays the caller's.
  pub fn from_buffer(buf: &'a mut [u8]) -> Self {
    Self::new(FixedBuffer::new(buf))
  }
}

#[cfg(unix)]
impl Arena<MappedRegion> {
  /// Maps a fresh `capacity` byte region from the OS.
  pub fn reserve(capacity: usize) -> Result<Self> {
    MappedRegion::reserve(capacity).map(Self::new)
  }

  pub fn with_config(config: &ArenaConfig) -> Result<Self> {
    MappedRegion::reserve_with(config).map(Self::new)
  }
}

impl<R: Region> fmt::Debug for Arena<R> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Arena")
      .field("base", &self.region.as_ptr())
      .field("size", &self.size())
      .field("capacity", &self.capacity())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  const PAGE: usize = 4096;

  #[repr(C, align(4096))]
  struct Page([u8; PAGE]);

  fn page() -> Box<Page> {
    Box::new(Page([0xFF; PAGE]))
  }

  #[test]
  fn test_push_bumps_watermark() {
    let mut backing = page();
    let arena = Arena::from_buffer(&mut backing.0);
    let base = arena.base_addr();

    let first = arena.push(10, 1).unwrap();
    assert_eq!(0, first.offset());
    assert_eq!(base, first.as_ptr().addr());
    assert_eq!(10, first.len());
    assert_eq!(10, arena.size());

    let second = arena.push(8, 8).unwrap();
    assert_eq!(16, second.offset());
    assert_eq!(24, arena.size());
    assert_eq!(PAGE - 24, arena.remaining());
  }

  #[test]
  fn test_allocations_do_not_overlap() {
    let mut backing = page();
    let arena = Arena::from_buffer(&mut backing.0);

    let mut a = arena.push(4, 4).unwrap();
    let mut b = arena.push(4, 4).unwrap();
    a.copy_from_slice(&[1, 2, 3, 4]);
    b.copy_from_slice(&[5, 6, 7, 8]);

    assert_eq!([1, 2, 3, 4], *a);
    assert_eq!([5, 6, 7, 8], *b);
  }

  #[test]
  fn test_zero_sized_push_is_a_snapshot() {
    let mut backing = page();
    let arena = Arena::from_buffer(&mut backing.0);

    arena.push(3, 0).unwrap();
    let snapshot = arena.push(0, 0).unwrap();
    assert_eq!(3, snapshot.offset());
    assert!(snapshot.is_empty());
    assert_eq!(3, arena.size());
  }

  #[test]
  fn test_exhausted_leaves_watermark() {
    let mut backing = page();
    let arena = Arena::from_buffer(&mut backing.0);

    arena.push(PAGE - 3, 1).unwrap();
    let err = arena.push(2, 4).unwrap_err();
    assert_eq!(
      Exhausted {
        requested: 2,
        padding: 3,
        remaining: 3,
      },
      err
    );
    assert_eq!(PAGE - 3, arena.size());

    // Still fits without the padding.
    arena.push(3, 1).unwrap();
    assert_eq!(0, arena.remaining());
  }

  #[test]
  fn test_huge_push_does_not_overflow() {
    let mut backing = page();
    let arena = Arena::from_buffer(&mut backing.0);

    arena.push(1, 1).unwrap();
    assert!(arena.push(usize::MAX, 2).is_err());
    assert!(arena.push(usize::MAX, 0).is_err());
    assert_eq!(1, arena.size());
  }

  #[test]
  fn test_push_zero() {
    let mut backing = page();
    let arena = Arena::from_buffer(&mut backing.0);

    let dirty = arena.push(1, 1).unwrap();
    assert_eq!(0xFF, dirty[0]);

    let zeroed = arena.push_zero(16, 8).unwrap();
    assert_eq!(8, zeroed.offset());
    assert!(zeroed.iter().all(|&b| b == 0));

    drop(zeroed);
    drop(arena);

    // Padding between the two pushes is untouched.
    assert!(backing.0[1..8].iter().all(|&b| b == 0xFF));
    assert!(backing.0[8..24].iter().all(|&b| b == 0));
    assert_eq!(0xFF, backing.0[24]);
  }

  #[test]
  fn test_push_bytes() {
    let mut backing = page();
    let arena = Arena::from_buffer(&mut backing.0);

    let hello = arena.push_bytes(b"hello", 1).unwrap();
    assert_eq!(b"hello", &*hello);
    assert_eq!(5, arena.size());
  }

  #[test]
  fn test_pop_clamps_at_zero() {
    let mut backing = page();
    let mut arena = Arena::from_buffer(&mut backing.0);

    arena.push(100, 0).unwrap();
    arena.pop(40);
    assert_eq!(60, arena.size());

    arena.pop(1000);
    assert_eq!(0, arena.size());
    assert!(arena.is_empty());
  }

  #[test]
  fn test_clear_reuses_first_address() {
    let mut backing = page();
    let mut arena = Arena::from_buffer(&mut backing.0);

    let initial = arena.push(0, 0).unwrap().as_ptr();
    arena.push(512, 16).unwrap();
    arena.push(7, 0).unwrap();

    arena.clear();
    assert_eq!(0, arena.size());
    assert_eq!(initial, arena.push(0, 0).unwrap().as_ptr());
  }

  #[test]
  fn test_mark_and_restore() {
    let mut backing = page();
    let mut arena = Arena::from_buffer(&mut backing.0);

    arena.push(32, 0).unwrap();
    let mark = arena.mark();
    assert_eq!(32, mark.offset());

    arena.push(64, 16).unwrap();
    arena.push(3, 0).unwrap();
    arena.restore(mark);
    assert_eq!(32, arena.size());

    arena.clear();
    arena.restore(mark);
    assert_eq!(0, arena.size());
  }

  #[test]
  #[should_panic(expected = "power of two")]
  fn test_non_power_of_two_alignment_panics() {
    let mut backing = page();
    let arena = Arena::from_buffer(&mut backing.0);
    let _ = arena.push(8, 3);
  }

  #[test]
  fn test_into_region_keeps_buffer() {
    let mut backing = page();
    let arena = Arena::from_buffer(&mut backing.0);
    arena.push_bytes(&[1, 2, 3], 0).unwrap();

    let region = arena.into_region();
    assert_eq!(PAGE, region.len());
    region.release().unwrap();

    assert_eq!([1, 2, 3], backing.0[..3]);
  }

  #[cfg(unix)]
  #[test]
  fn test_reserved_arena() {
    let arena = Arena::reserve(crate::kib!(64)).unwrap();
    assert_eq!(crate::kib!(64), arena.capacity());

    let block = arena.push_zero(crate::kib!(64), 4).unwrap();
    assert_eq!(arena.base_addr(), block.as_ptr().addr());
    drop(block);

    assert!(arena.push(1, 0).is_err());
    arena.release().unwrap();
  }

  #[cfg(unix)]
  #[test]
  fn test_reserved_arena_from_config() {
    let config = ArenaConfig::default().with_capacity(crate::kib!(8));
    let arena = Arena::with_config(&config).unwrap();
    assert_eq!(crate::kib!(8), arena.capacity());
  }

  #[derive(Debug, Clone)]
  enum Op {
    Push { size: usize, align: usize },
    PushZero { size: usize, align: usize },
    Pop(usize),
    Clear,
  }

  fn op() -> impl Strategy<Value = Op> {
    let align = prop_oneof![Just(0usize), (0u32..=10).prop_map(|shift| 1usize << shift)];
    prop_oneof![
      4 => (0usize..1024, align.clone()).prop_map(|(size, align)| Op::Push { size, align }),
      2 => (0usize..1024, align).prop_map(|(size, align)| Op::PushZero { size, align }),
      2 => (0usize..2048).prop_map(Op::Pop),
      1 => Just(Op::Clear),
    ]
  }

  proptest! {
    #[test]
    fn watermark_stays_within_capacity(ops in prop::collection::vec(op(), 0..64)) {
      let mut backing = page();
      let mut arena = Arena::from_buffer(&mut backing.0);

      for op in ops {
        let before = arena.size();
        match op {
          Op::Push { size, align } | Op::PushZero { size, align } => {
            let zero = matches!(op, Op::PushZero { .. });
            let result = if zero { arena.push_zero(size, align) } else { arena.push(size, align) };
            match result {
              Ok(allocation) => {
                prop_assert_eq!(size, allocation.len());
                if align > 0 {
                  prop_assert_eq!(0, allocation.as_ptr().addr() % align);
                }
                if zero {
                  prop_assert!(allocation.iter().all(|&b| b == 0));
                }
                prop_assert!(allocation.offset() >= before);
              }
              Err(err) => {
                prop_assert_eq!(before, arena.size());
                prop_assert!(err.padding + err.requested > err.remaining);
              }
            }
          }
          Op::Pop(size) => {
            arena.pop(size);
            prop_assert_eq!(before.saturating_sub(size), arena.size());
          }
          Op::Clear => {
            arena.clear();
            prop_assert_eq!(0, arena.size());
          }
        }
        prop_assert!(arena.size() <= arena.capacity());
      }
    }

    #[test]
    fn push_honors_alignment(start in 0usize..64, shift in 0u32..=10, size in 0usize..128) {
      let mut backing = page();
      let arena = Arena::from_buffer(&mut backing.0);
      let align = 1usize << shift;

      arena.push(start, 0).unwrap();
      let allocation = arena.push(size, align).unwrap();
      prop_assert_eq!(0, allocation.as_ptr().addr() % align);
      prop_assert!(allocation.offset() - start < align);
    }
  }
}
