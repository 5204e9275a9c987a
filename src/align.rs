/// Number of bytes in `$n` kibibytes.
///
/// # Examples
///
/// ```rust
/// use rarena::kib;
///
/// assert_eq!(kib!(4), 4096);
/// ```
#[macro_export]
macro_rules! kib {
  ($n:expr) => {
    (($n as usize) << 10)
  };
}

/// Number of bytes in `$n` mebibytes.
#[macro_export]
macro_rules! mib {
  ($n:expr) => {
    (($n as usize) << 20)
  };
}

/// Number of bytes in `$n` gibibytes.
#[macro_export]
macro_rules! gib {
  ($n:expr) => {
    (($n as usize) << 30)
  };
}

#[inline]
pub(crate) const fn is_power_of_two(value: usize) -> bool {
  value != 0 && value & (value - 1) == 0
}

/// Bytes to skip forward from `addr` to reach the next multiple of `align`.
///
/// An `align` of zero means "no requirement" and yields zero.
///
/// # Panics
///
/// Panics if `align` is neither zero nor a power of two.
#[inline]
pub(crate) fn forward_offset(
  addr: usize,
  align: usize,
) -> usize {
  if align == 0 {
    return 0;
  }

  assert!(
    is_power_of_two(align),
    "alignment must be zero or a power of two, got {align}"
  );

  let modulo = addr & (align - 1);
  if modulo == 0 { 0 } else { align - modulo }
}
