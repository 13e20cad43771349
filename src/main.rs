//! Stress and throughput driver for `rw-spinlock`.
//!
//! Two phases:
//!
//! 1. **Sharded counting**: every thread increments per-key counters in a
//!    [`Sharded`] map and interleaves shared lookups, then the totals are
//!    checked for lost updates.
//! 2. **Single lock contention**: reader threads cycle shared acquisitions
//!    on one lock while a writer cycles exclusive ones; an occupancy counter
//!    checks that the two never overlap.
//!
//! ```text
//! cargo run --release --features cli --bin rw-spinlock-stress -- --threads 8 --log-level debug
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering::SeqCst};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::{debug, info, Level, LevelFilter, Log, Metadata, Record};
use rw_spinlock::{RawRwSpinLock, Sharded};

#[derive(Parser, Debug)]
#[command(version, about = "Stress the reader-writer spinlock and report throughput")]
struct Args {
    /// Worker threads (defaults to the logical CPU count)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Shards in the counting phase (defaults to threads squared)
    #[arg(short, long)]
    shards: Option<usize>,

    /// Distinct keys in the counting phase
    #[arg(short, long, default_value = "4096")]
    keys: u64,

    /// Shared acquire/release cycles per reader thread
    #[arg(long, default_value = "10000")]
    reader_cycles: usize,

    /// Exclusive acquire/release cycles for the writer thread
    #[arg(long, default_value = "100")]
    writer_cycles: usize,

    /// Counter increments per thread in the counting phase
    #[arg(long, default_value = "100000")]
    increments: u64,

    /// error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

/// Writes log records to stderr with the level padded like the record header.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!(
            "\u{1B}[{}m[{:>5}]\u{1B}[0m {}",
            level_to_color_code(record.level()),
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

fn level_to_color_code(level: Level) -> u8 {
    match level {
        Level::Error => 31,
        Level::Warn => 93,
        Level::Info => 34,
        Level::Debug => 32,
        Level::Trace => 90,
    }
}

fn init_logging(level: LevelFilter) -> Result<()> {
    static LOGGER: StderrLogger = StderrLogger;
    log::set_logger(&LOGGER).context("installing logger")?;
    log::set_max_level(level);
    Ok(())
}

/// Phase 1: per-key counters in a sharded map.
fn sharded_counting(threads: usize, shards: usize, keys: u64, increments: u64) -> Result<()> {
    let map: Arc<Sharded<HashMap<u64, u64>>> = Arc::new(Sharded::new(shards, HashMap::new));
    let hits = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let (map, hits) = (map.clone(), hits.clone());
            thread::spawn(move || {
                let mut local_hits = 0;
                for i in 0..increments {
                    let key = (t as u64).wrapping_mul(0x9E37_79B9).wrapping_add(i) % keys;
                    *map.write(&key).entry(key).or_default() += 1;

                    let probe = (key + 1) % keys;
                    local_hits += map.read(&probe).contains_key(&probe) as usize;
                }
                hits.fetch_add(local_hits, SeqCst);
            })
        })
        .collect();

    for h in handles {
        h.join()
            .map_err(|_| anyhow::anyhow!("counting thread panicked"))?;
    }

    let elapsed = start.elapsed();
    let total = map.fold_read(0u64, |n, m| n + m.values().sum::<u64>());
    let distinct = map.fold_read(0usize, |n, m| n + m.len());

    info!(
        "sharded counting: {} ms (ops={}, distinct={}, hits={}, shards={})",
        elapsed.as_millis(),
        total,
        distinct,
        hits.load(SeqCst),
        map.shard_count()
    );

    let expected = threads as u64 * increments;
    ensure!(total == expected, "lost updates: counted {total}, expected {expected}");
    ensure!(
        map.iter().all(|l| l.raw().state().is_free()),
        "a shard lock was left held"
    );
    Ok(())
}

/// Phase 2: readers against one writer on a single raw lock.
fn single_lock_contention(readers: usize, reader_cycles: usize, writer_cycles: usize) -> Result<()> {
    let lock = Arc::new(RawRwSpinLock::new());
    let readers_in = Arc::new(AtomicI64::new(0));
    let writer_in = Arc::new(AtomicBool::new(false));
    let violations = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let mut handles = Vec::with_capacity(readers + 1);
    for _ in 0..readers {
        let (lock, readers_in, writer_in, violations) =
            (lock.clone(), readers_in.clone(), writer_in.clone(), violations.clone());
        handles.push(thread::spawn(move || {
            for _ in 0..reader_cycles {
                lock.lock_shared();
                readers_in.fetch_add(1, SeqCst);
                if writer_in.load(SeqCst) {
                    violations.fetch_add(1, SeqCst);
                }
                readers_in.fetch_sub(1, SeqCst);
                unsafe { lock.unlock_shared() };
            }
        }));
    }

    let writer_elapsed = {
        let (lock, readers_in, writer_in, violations) =
            (lock.clone(), readers_in.clone(), writer_in.clone(), violations.clone());
        thread::spawn(move || {
            let start = Instant::now();
            for _ in 0..writer_cycles {
                lock.lock();
                if writer_in.swap(true, SeqCst) || readers_in.load(SeqCst) != 0 {
                    violations.fetch_add(1, SeqCst);
                }
                writer_in.store(false, SeqCst);
                unsafe { lock.unlock() };
            }
            start.elapsed()
        })
    };

    for h in handles {
        h.join()
            .map_err(|_| anyhow::anyhow!("reader thread panicked"))?;
    }
    let writer_elapsed = writer_elapsed
        .join()
        .map_err(|_| anyhow::anyhow!("writer thread panicked"))?;

    info!(
        "single lock contention: {} ms (readers={}x{}, writer={} cycles in {} ms)",
        start.elapsed().as_millis(),
        readers,
        reader_cycles,
        writer_cycles,
        writer_elapsed.as_millis()
    );

    let violations = violations.load(SeqCst);
    ensure!(violations == 0, "mutual exclusion violated {violations} times");
    ensure!(lock.state().is_free(), "lock left in state {:?}", lock.state());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level)?;

    let threads = args.threads.unwrap_or_else(num_cpus::get).max(1);
    let shards = args.shards.unwrap_or(threads * threads);
    ensure!(args.keys > 0, "--keys must be at least 1");
    debug!("{args:?}");

    info!("Starting rw-spinlock stress with {threads} threads...");

    sharded_counting(threads, shards, args.keys, args.increments)?;
    single_lock_contention(threads.saturating_sub(1).max(1), args.reader_cycles, args.writer_cycles)?;

    info!("all checks passed");
    Ok(())
}
