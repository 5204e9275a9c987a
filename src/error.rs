use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArenaError>;

/// Failures establishing or tearing down an arena's backing region.
#[derive(Debug, Error)]
pub enum ArenaError {
  /// The OS could not map a region of the requested size.
  #[error("failed to reserve {capacity} bytes: {source}")]
  Init {
    capacity: usize,
    #[source]
    source: io::Error,
  },

  /// The OS refused to unmap the region.
  #[error("failed to release {capacity} byte region: {source}")]
  Release {
    capacity: usize,
    #[source]
    source: io::Error,
  },
}

/// A push did not fit in the space left after the watermark.
///
/// Nothing was allocated and the watermark did not move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("arena exhausted: requested {requested} bytes (+{padding} padding), {remaining} remaining")]
pub struct Exhausted {
  /// Bytes asked for, not counting padding.
  pub requested: usize,
  /// Bytes that would have been skipped to reach the alignment.
  pub padding: usize,
  /// Free bytes after the watermark when the push was refused.
  pub remaining: usize,
}
