//! This module is responsible for getting frames into the processor and
//! spectra back out of it

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use byte_slice_cast::AsByteSlice;
use chrono::{DateTime, Datelike, Timelike, Utc};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info};

use crate::{
    capture::FrameBytes,
    processor::{lock, Ingest, StreamSampleProcessor},
};

/// An averaged magnitude spectrum, pushed every time the average moves
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSnapshot {
    /// Value of the frame counter when this spectrum was produced
    pub frame: u64,
    /// Averaged magnitude in dBFS
    pub magnitude: Vec<f64>,
}

/// Convert a chrono DateTime into the timestamp we stamp files with
fn file_timestamp(time: &DateTime<Utc>) -> String {
    format!(
        "{}-{:02}-{:02}-{:02}:{:02}:{:02}",
        time.year(),
        time.month(),
        time.day(),
        time.hour(),
        time.minute(),
        time.second()
    )
}

/// Where to write the spectra of a run started at `time`
pub fn spectra_path(dir: &Path, time: &DateTime<Utc>) -> PathBuf {
    dir.join(format!("rfsoc-dbg-{}.spec", file_timestamp(time)))
}

/// Feed one frame to the shared processor, returning the new average if there is one.
/// The lock is held for the whole ingest so configuration changes can't interleave.
pub fn ingest_shared(
    processor: &Mutex<StreamSampleProcessor>,
    frame: &[u8],
) -> Option<SpectrumSnapshot> {
    let mut p = lock(processor);
    match p.ingest(frame) {
        Ingest::Averaged => Some(SpectrumSnapshot {
            frame: p.frame_count(),
            magnitude: p.magnitude().to_vec(),
        }),
        _ => None,
    }
}

/// Drain frames from the ring buffer into the processor until the capture side
/// is `done` and the ring is empty, or `running` is cleared.
/// New averages are offered to `sender`, we don't care if nobody takes them.
pub fn process_frames(
    mut consumer: rtrb::Consumer<FrameBytes>,
    processor: &Mutex<StreamSampleProcessor>,
    sender: Sender<SpectrumSnapshot>,
    done: &AtomicBool,
    running: &AtomicBool,
) {
    while running.load(Ordering::Relaxed) {
        let frame;
        if let Ok(f) = consumer.pop() {
            frame = f;
        } else {
            if done.load(Ordering::Acquire) && consumer.is_empty() {
                break;
            }
            // Spin until there's data
            std::hint::spin_loop();
            continue;
        }
        if let Some(snapshot) = ingest_shared(processor, &frame) {
            let _ = sender.try_send(snapshot);
        }
    }
    debug!("Frame consumer finished");
}

/// Write every spectrum we receive as raw native-endian f64s. Returns how many we wrote.
pub fn write_spectra<W: Write>(receiver: Receiver<SpectrumSnapshot>, writer: W) -> io::Result<u64> {
    let mut writer = writer;
    let mut written = 0;
    for snapshot in receiver {
        writer.write_all(snapshot.magnitude.as_byte_slice())?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Create a timestamped spectra file in `dir` and stream into it
pub fn spectra_file_consumer(receiver: Receiver<SpectrumSnapshot>, dir: &Path) -> io::Result<()> {
    let path = spectra_path(dir, &Utc::now());
    info!(path = %path.display(), "Writing spectra");
    let written = write_spectra(receiver, BufWriter::new(File::create(&path)?))?;
    info!(spectra = written, "Spectra file closed");
    Ok(())
}

/// Log where the peak of every spectrum is, for when we aren't writing them out
pub fn log_spectra(receiver: Receiver<SpectrumSnapshot>, frequency: Vec<f64>) {
    for snapshot in receiver {
        let peak = snapshot
            .magnitude
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1));
        if let Some((bin, db)) = peak {
            debug!(
                frame = snapshot.frame,
                "Peak {:.2} dBFS at {:.3} kHz",
                db,
                frequency.get(bin).copied().unwrap_or_default()
            );
        }
    }
}
