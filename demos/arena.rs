use std::io::Read;

use rarena::{Arena, ArenaConfig, mib};
use tracing_subscriber::EnvFilter;

/// Waits for ENTER when run with `--step`, so the mapping can be inspected
/// with `pmap`, `/proc/<pid>/maps` or `gdb` between stages.
fn pause(step: bool) {
  if step {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

fn report<R: rarena::Region>(
  label: &str,
  arena: &Arena<R>,
) {
  println!(
    "[{}] watermark = {} / {} bytes, remaining = {}",
    label,
    arena.size(),
    arena.capacity(),
    arena.remaining()
  );
}

fn main() -> rarena::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let step = std::env::args().any(|arg| arg == "--step");

  let config = ArenaConfig::default().with_capacity(mib!(1));
  let mut arena = Arena::with_config(&config)?;
  println!("PID = {}, base = {:#X}", std::process::id(), arena.base_addr());
  report("start", &arena);
  pause(step);

  // 1) A u32 worth of bytes, 4-byte aligned.
  {
    let mut word = arena.push(4, 4).expect("fresh arena has room");
    word.copy_from_slice(&0xDEADBEEFu32.to_ne_bytes());
    println!("\n[1] u32 at offset {}, address {:?}", word.offset(), word.as_ptr());
  }
  report("1", &arena);

  // 2) An odd-sized block with no alignment requirement.
  let mark = arena.mark();
  {
    let mut odd = arena.push(12, 0).expect("room for 12 bytes");
    odd.fill(0xAB);
    println!("\n[2] 12 bytes at offset {}", odd.offset());
  }
  report("2", &arena);

  // 3) A u64 forces padding back up to an 8-byte boundary.
  {
    let before = arena.size();
    let wide = arena.push_zero(8, 8).expect("room for a u64");
    println!(
      "\n[3] u64 at offset {} (padding {}), addr % 8 = {}",
      wide.offset(),
      wide.offset() - before,
      wide.as_ptr().addr() % 8
    );
  }
  report("3", &arena);
  pause(step);

  // 4) Roll back everything since the mark.
  arena.restore(mark);
  println!("\n[4] restored to offset {}", mark.offset());
  report("4", &arena);

  // 5) Ask for more than is left.
  match arena.push(mib!(2), 16) {
    Ok(_) => unreachable!("a 1 MiB arena cannot hold 2 MiB"),
    Err(err) => println!("\n[5] {err}"),
  }
  report("5", &arena);
  pause(step);

  // 6) Clear is O(1): the watermark resets, the bytes stay put.
  arena.clear();
  report("clear", &arena);

  arena.release()?;
  println!("\n[6] Region returned to the OS.");
  Ok(())
}
