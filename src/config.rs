use crate::mib;

/// Default capacity for a reserved arena: 64 MiB.
pub const DEFAULT_CAPACITY: usize = mib!(64);

/// Settings for an arena backed by an OS mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaConfig {
  /// Size of the mapping in bytes. Fixed for the arena's lifetime.
  pub capacity: usize,
  /// Ask the OS to back every page up front (`MAP_POPULATE` on Linux).
  pub prefault: bool,
}

impl Default for ArenaConfig {
  fn default() -> Self {
    Self {
      capacity: DEFAULT_CAPACITY,
      prefault: false,
    }
  }
}

impl ArenaConfig {
  /// Sets the mapping size in bytes.
  pub fn with_capacity(
    mut self,
    capacity: usize,
  ) -> Self {
    self.capacity = capacity;
    self
  }

  /// Sets whether pages are populated when the region is mapped.
  pub fn with_prefault(
    mut self,
    prefault: bool,
  ) -> Self {
    self.prefault = prefault;
    self
  }
}
