//! In this module, we implement all the monitoring logic for the debug stream.
//! This includes the processor's own frame/byte/error counters as well as
//! host-side stats about frames we read, lost to a full ring buffer, or
//! skipped on purpose by the rate drop.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use tracing::info;

use crate::processor::{lock, StreamSampleProcessor};

/// Snapshot of the processor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub frames: u64,
    pub bytes: u64,
    pub errors: u64,
}

impl Counters {
    pub(crate) fn record_frame(&mut self, bytes: usize) {
        self.frames += 1;
        self.bytes += bytes as u64;
    }

    pub(crate) fn record_error(&mut self) {
        self.errors += 1;
    }
}

/// Stats kept by the host threads, shared between them
#[derive(Debug, Default)]
pub struct HostStats {
    frames_read: AtomicU64,
    bytes_read: AtomicU64,
    overruns: AtomicU64,
    rate_dropped: AtomicU64,
}

impl HostStats {
    pub fn record_read(&self, bytes: usize) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_drop(&self) {
        self.rate_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read.load(Ordering::Relaxed)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn rate_dropped(&self) -> u64 {
        self.rate_dropped.load(Ordering::Relaxed)
    }
}

fn log_once(processor: &Mutex<StreamSampleProcessor>, stats: &HostStats, elapsed: Duration) {
    let counters = lock(processor).counters();
    let rate = stats.bytes_read() as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        frames = counters.frames,
        bytes = counters.bytes,
        errors = counters.errors,
        read = stats.frames_read(),
        overruns = stats.overruns(),
        rate_dropped = stats.rate_dropped(),
        "Read rate {:.3} MB/s",
        rate / 1e6
    );
}

/// Periodically report counters until `running` is cleared
pub fn log_stats(
    processor: Arc<Mutex<StreamSampleProcessor>>,
    stats: Arc<HostStats>,
    interval: Duration,
    running: Arc<AtomicBool>,
) {
    let start = Instant::now();
    let mut last = Instant::now();
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(50));
        if last.elapsed() >= interval {
            last = Instant::now();
            log_once(&processor, &stats, start.elapsed());
        }
    }
    // One last report on the way out
    log_once(&processor, &stats, start.elapsed());
}
