//! This module contains all the frame capture logic

// Two halves live here. The processor side validates a frame and unpacks
// its interleaved I/Q words into the capture buffers. The host side reads
// raw frames from a source as fast as it can and hands them to the
// processing thread through an rtrb ring buffer, never blocking on it.

use std::{
    io::{self, Read},
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use tracing::{debug, trace};

use crate::{complex::IqSample, error::FrameError, monitoring::HostStats};

/// Raw bytes of a single frame as delivered by the transport
pub type FrameBytes = Vec<u8>;

/// Check a frame and return how many I/Q pairs we will take from it
/// (clamped to `max_size`, the tail of an oversized frame is dropped)
pub fn validate(frame: &[u8], max_size: usize) -> Result<usize, FrameError> {
    if frame.is_empty() {
        return Err(FrameError::Empty);
    }
    if frame.len() % 2 != 0 {
        return Err(FrameError::OddLength(frame.len()));
    }
    let pairs = frame.len() / IqSample::BYTES;
    if pairs > max_size {
        trace!(pairs, max_size, "Truncating oversized frame");
    }
    Ok(pairs.min(max_size))
}

/// De-interleave the first `n` pairs of `frame` into `real` and `imag`.
/// Everything past `n` is left alone.
pub fn unpack(frame: &[u8], real: &mut [i16], imag: &mut [i16], n: usize) {
    assert!(n <= real.len() && n <= imag.len());
    for (i, word) in frame.chunks_exact(IqSample::BYTES).take(n).enumerate() {
        let sample = IqSample::from_le_bytes([word[0], word[1], word[2], word[3]]);
        real[i] = sample.re;
        imag[i] = sample.im;
    }
}

/// Forward at most one frame per `period`, everything else is dropped
#[derive(Debug, Clone)]
pub struct RateDrop {
    period: Duration,
    last: Option<Instant>,
}

impl RateDrop {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// Should a frame arriving at `now` be forwarded?
    pub fn allow_at(&mut self, now: Instant) -> bool {
        if self.period.is_zero() {
            return true;
        }
        match self.last {
            Some(last) if now.duration_since(last) < self.period => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }
}

/// Fill `buf` as far as the reader lets us, returning how many bytes we got
fn read_frame<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Chop `reader` into frames of `frame_bytes` and push them to the ring buffer.
/// A short final frame is forwarded as-is, the processor decides what to do with it.
/// Returns once the reader is exhausted or `running` is cleared.
pub fn capture_frames<R: Read>(
    mut reader: R,
    frame_bytes: usize,
    producer: &mut rtrb::Producer<FrameBytes>,
    rate_drop: &mut RateDrop,
    running: &AtomicBool,
    stats: &HostStats,
) -> io::Result<()> {
    let mut buf = vec![0u8; frame_bytes];
    while running.load(Ordering::Relaxed) {
        let n = read_frame(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        stats.record_read(n);
        if !rate_drop.allow() {
            stats.record_rate_drop();
            continue;
        }
        // Never wait on the consumer, if it can't keep up we lose the frame
        if producer.push(buf[..n].to_vec()).is_err() {
            debug!("Frame ring buffer full, dropping frame");
            stats.record_overrun();
        }
        if n < frame_bytes {
            break;
        }
    }
    Ok(())
}
