//! # rarena - A Linear Memory Arena
//!
//! This crate provides a **linear (bump-pointer) arena**: a fixed-capacity
//! region of memory from which allocations are carved out one after another.
//!
//! ## Overview
//!
//! The arena tracks a single offset, the watermark. Everything before it is
//! live, everything after it is free:
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                          ARENA REGION                                │
//!   │                                                                      │
//!   │   ┌─────┬──┬─────┬─────┬──────────────────────────────────────────┐  │
//!   │   │ A1  │▒▒│ A2  │ A3  │               Free Space                 │  │
//!   │   └─────┴──┴─────┴─────┴──────────────────────────────────────────┘  │
//!   │   ▲      ▲             ▲                                          ▲  │
//!   │   │      │             │                                          │  │
//!   │  base  padding     watermark                                 capacity│
//!   │                   (next push)                                        │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   push:  skip padding up to the alignment, then bump the watermark.
//!   pop:   move the watermark back by a byte count (never below zero).
//!   clear: watermark = 0.
//! ```
//!
//! There are no headers and no free lists: every operation is O(1).
//!
//! ## Crate Structure
//!
//! ```text
//!   rarena
//!   ├── align   - Forward alignment padding, kib!/mib!/gib! macros
//!   ├── arena   - Arena, Allocation, Mark
//!   ├── config  - ArenaConfig for OS-mapped arenas
//!   ├── error   - ArenaError, Exhausted
//!   └── region  - Region trait, FixedBuffer, MappedRegion
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rarena::{Arena, kib};
//!
//! let mut buf = vec![0u8; kib!(4)];
//! let mut arena = Arena::from_buffer(&mut buf);
//!
//! let mark = arena.mark();
//! {
//!   let mut header = arena.push_zero(16, 8).unwrap();
//!   header[0] = 0x7F;
//!   let name = arena.push_bytes(b"arena", 1).unwrap();
//!   assert_eq!(b"arena", &*name);
//! }
//!
//! arena.restore(mark);
//! assert_eq!(0, arena.size());
//! ```
//!
//! ## Backing Storage
//!
//! ```text
//!   FixedBuffer<'a>   caller-owned &mut [u8]; the arena never frees it
//!   MappedRegion      anonymous private mmap(2); munmap(2) on release/drop
//! ```
//!
//! Both implement [`Region`], and [`Arena`] is generic over it, so the
//! backing is chosen when the arena is built.
//!
//! ## Limitations
//!
//! - **Single-threaded**: an arena is `Send` but not `Sync`
//! - **No per-object free**: only LIFO pops by byte count, or a full clear
//! - **No growth**: capacity is fixed when the region is acquired
//! - **Unix-only mapping**: `MappedRegion` requires `libc` `mmap`

mod align;
mod arena;
mod config;
mod error;
mod region;

pub use arena::{Allocation, Arena, Mark};
pub use config::{ArenaConfig, DEFAULT_CAPACITY};
pub use error::{ArenaError, Exhausted, Result};
#[cfg(unix)]
pub use region::MappedRegion;
pub use region::{FixedBuffer, Region};
