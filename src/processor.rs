//! The debug-stream sample processor.
//!
//! Each frame out of a DSP debug ring buffer is a run of interleaved 16-bit
//! I/Q pairs. We keep the latest frame around in fixed-size capture buffers,
//! take the dBFS spectrum of its real channel, and fold that into a running
//! average. Everything the display layer wants is available through getters.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::{
    averaging::AveragingWindow,
    capture::{unpack, validate},
    error::{ConfigError, FrameError},
    f_engine::FftEngine,
    monitoring::Counters,
    DEFAULT_MAX_AVE, DEFAULT_MAX_SIZE, DEFAULT_SAMPLE_RATE,
};

/// Construction-time configuration of a processor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessorConfig {
    /// Sample rate of the debug stream in Hz
    pub sample_rate: f64,
    /// Capture length in I/Q pairs, a power of two
    pub max_size: usize,
    /// Largest number of spectra that can be averaged
    pub max_ave: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_size: DEFAULT_MAX_SIZE,
            max_ave: DEFAULT_MAX_AVE,
        }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.max_size < 2 || !self.max_size.is_power_of_two() {
            return Err(ConfigError::InvalidMaxSize(self.max_size));
        }
        if self.max_ave < 1 {
            return Err(ConfigError::InvalidMaxAve);
        }
        Ok(())
    }

    /// Spacing of the time axis in microseconds
    pub fn time_step(&self) -> f64 {
        1e6 / self.sample_rate
    }

    /// Spacing of the frequency axis in kHz
    pub fn freq_step(&self) -> f64 {
        (0.5e3 / self.time_step()) / (self.max_size / 2) as f64
    }
}

/// What happened to a frame handed to [`StreamSampleProcessor::ingest`].
/// Purely informational, nothing needs to act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Rx is disabled, the frame was ignored
    Ignored,
    /// Frame dropped and counted as an error
    Malformed(FrameError),
    /// Capture buffers updated, but the spectrum had an empty bin so the
    /// average was left alone
    Captured,
    /// Capture buffers and averaged magnitude both updated
    Averaged,
}

#[derive(Debug)]
pub struct StreamSampleProcessor {
    config: ProcessorConfig,
    rx_enabled: bool,
    time: Vec<f64>,
    frequency: Vec<f64>,
    real: Vec<i16>,
    imag: Vec<i16>,
    spectrum: Vec<f64>,
    magnitude: Vec<f64>,
    window: AveragingWindow,
    engine: FftEngine,
    counters: Counters,
}

impl StreamSampleProcessor {
    pub fn new(config: ProcessorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let n = config.max_size;
        let bins = n / 2;
        let time_step = config.time_step();
        let freq_step = config.freq_step();
        Ok(Self {
            config,
            rx_enabled: true,
            time: (0..n).map(|i| i as f64 * time_step).collect(),
            frequency: (0..bins).map(|k| k as f64 * freq_step).collect(),
            real: vec![0; n],
            imag: vec![0; n],
            spectrum: vec![0.0; bins],
            magnitude: vec![0.0; bins],
            window: AveragingWindow::new(config.max_ave, bins),
            engine: FftEngine::new(n),
            counters: Counters::default(),
        })
    }

    /// Process one frame from the debug stream.
    ///
    /// Never fails: malformed frames only bump the error counter, frames
    /// with more pairs than the capture length are truncated, and the
    /// average skips spectra with empty bins.
    pub fn ingest(&mut self, frame: &[u8]) -> Ingest {
        if !self.rx_enabled {
            return Ingest::Ignored;
        }
        let n = match validate(frame, self.config.max_size) {
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "Dropping malformed frame");
                self.counters.record_error();
                return Ingest::Malformed(e);
            }
        };
        unpack(frame, &mut self.real, &mut self.imag, n);
        self.counters.record_frame(frame.len());

        if !self.engine.log_magnitude(&self.real, &mut self.spectrum) {
            trace!(
                frame = self.counters.frames,
                "Spectrum has an empty bin, not averaging"
            );
            return Ingest::Captured;
        }
        self.window.fold(&self.spectrum, &mut self.magnitude);
        Ingest::Averaged
    }

    /// Set how many spectra are averaged together. Always restarts the
    /// average, even if the depth didn't change.
    pub fn set_averaging_depth(&mut self, depth: usize) -> Result<(), ConfigError> {
        if !(1..=self.config.max_ave).contains(&depth) {
            return Err(ConfigError::InvalidAveragingDepth {
                depth,
                max: self.config.max_ave,
            });
        }
        self.window.set_depth(depth);
        debug!(depth, "Averaging depth set");
        Ok(())
    }

    pub fn reset_averaging(&mut self) {
        self.window.reset();
    }

    pub fn averaging_depth(&self) -> usize {
        self.window.depth()
    }

    pub fn set_rx_enabled(&mut self, enabled: bool) {
        self.rx_enabled = enabled;
    }

    pub fn rx_enabled(&self) -> bool {
        self.rx_enabled
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Time axis in microseconds
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Frequency axis in kHz
    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    pub fn real(&self) -> &[i16] {
        &self.real
    }

    pub fn imag(&self) -> &[i16] {
        &self.imag
    }

    /// Averaged magnitude in dBFS
    pub fn magnitude(&self) -> &[f64] {
        &self.magnitude
    }

    pub fn frame_count(&self) -> u64 {
        self.counters.frames
    }

    pub fn byte_count(&self) -> u64 {
        self.counters.bytes
    }

    pub fn error_count(&self) -> u64 {
        self.counters.errors
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    #[cfg(test)]
    pub(crate) fn window(&self) -> &AveragingWindow {
        &self.window
    }
}

/// Lock a processor shared between host threads, taking over a poisoned lock
pub fn lock(shared: &Mutex<StreamSampleProcessor>) -> MutexGuard<'_, StreamSampleProcessor> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::f_engine::FULL_SCALE;

    fn interleave(pairs: &[(i16, i16)]) -> Vec<u8> {
        pairs
            .iter()
            .flat_map(|(i, q)| i.to_le_bytes().into_iter().chain(q.to_le_bytes()))
            .collect()
    }

    fn impulse(n: usize, amp: i16) -> Vec<u8> {
        let mut pairs = vec![(0i16, 0i16); n];
        pairs[0] = (amp, -amp);
        interleave(&pairs)
    }

    fn impulse_db(n: usize, amp: i16) -> f64 {
        20.0 * ((amp as f64 / n as f64) / FULL_SCALE).log10()
    }

    fn small() -> StreamSampleProcessor {
        StreamSampleProcessor::new(ProcessorConfig {
            sample_rate: 1e6,
            max_size: 8,
            max_ave: 4,
        })
        .unwrap()
    }

    fn assert_all_close(actual: &[f64], expected: f64) {
        for v in actual {
            assert!((v - expected).abs() < 1e-9, "{v} != {expected}");
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(ProcessorConfig::default().validate().is_ok());
        let bad_size = ProcessorConfig {
            max_size: 1000,
            ..Default::default()
        };
        assert_eq!(
            Err(ConfigError::InvalidMaxSize(1000)),
            StreamSampleProcessor::new(bad_size).map(|_| ())
        );
        let bad_rate = ProcessorConfig {
            sample_rate: 0.0,
            ..Default::default()
        };
        assert!(bad_rate.validate().is_err());
        let bad_ave = ProcessorConfig {
            max_ave: 0,
            ..Default::default()
        };
        assert_eq!(Err(ConfigError::InvalidMaxAve), bad_ave.validate());
    }

    #[test]
    fn test_defaults() {
        let p = StreamSampleProcessor::new(ProcessorConfig::default()).unwrap();
        assert_eq!(1024, p.real().len());
        assert_eq!(1024, p.imag().len());
        assert_eq!(1024, p.time().len());
        assert_eq!(512, p.frequency().len());
        assert_eq!(512, p.magnitude().len());
        assert_eq!(4, p.averaging_depth());
        assert!(p.rx_enabled());
        // 312.5 MHz / 64 gives a 0.2048 us step
        assert!((p.time()[1] - 0.2048).abs() < 1e-12);
        // and 2441.40625 kHz over 512 bins
        assert!((p.frequency()[1] - 2441.40625 / 512.0).abs() < 1e-9);
    }

    #[test]
    fn test_deinterleave_and_counters() {
        let mut p = small();
        let pairs = [(1, -1), (2, -2), (3, -3)];
        let frame = interleave(&pairs);
        p.ingest(&frame);
        assert_eq!(&[1, 2, 3], &p.real()[..3]);
        assert_eq!(&[-1, -2, -3], &p.imag()[..3]);
        assert_eq!(1, p.frame_count());
        assert_eq!(12, p.byte_count());
        assert_eq!(0, p.error_count());
    }

    #[test]
    fn test_stale_tail_is_kept() {
        let mut p = small();
        p.ingest(&interleave(&[(5, 6); 8]));
        p.ingest(&interleave(&[(1, 2); 3]));
        assert_eq!(&[1, 1, 1, 5, 5, 5, 5, 5], p.real());
        assert_eq!(&[2, 2, 2, 6, 6, 6, 6, 6], p.imag());
    }

    #[test]
    fn test_oversized_frame_truncated() {
        let mut p = small();
        let pairs: Vec<(i16, i16)> = (0..12).map(|i| (i, 100 + i)).collect();
        let frame = interleave(&pairs);
        p.ingest(&frame);
        assert_eq!(&[0, 1, 2, 3, 4, 5, 6, 7], p.real());
        assert_eq!(&[100, 101, 102, 103, 104, 105, 106, 107], p.imag());
        assert_eq!(0, p.error_count());
        assert_eq!(1, p.frame_count());
        assert_eq!(48, p.byte_count());
    }

    #[test]
    fn test_malformed_frames() {
        let mut p = small();
        assert_eq!(
            Ingest::Malformed(FrameError::OddLength(3)),
            p.ingest(&[1, 2, 3])
        );
        assert_eq!(Ingest::Malformed(FrameError::Empty), p.ingest(&[]));
        assert_eq!(2, p.error_count());
        assert_eq!(0, p.frame_count());
        assert_eq!(0, p.byte_count());
        assert!(p.real().iter().all(|&x| x == 0));
        assert!(p.imag().iter().all(|&x| x == 0));
        assert_eq!(0, p.window().write_index());
    }

    #[test]
    fn test_dc_scenario() {
        let mut p = small();
        let frame = interleave(&[(1000, 0); 8]);
        let outcome = p.ingest(&frame);
        assert_eq!(&[1000; 8], p.real());
        assert_eq!(&[0; 8], p.imag());
        assert_eq!(4, p.magnitude().len());
        if outcome == Ingest::Averaged {
            let m = p.magnitude();
            assert!((m[0] - 20.0 * (1000.0 / FULL_SCALE).log10()).abs() < 1e-9);
            assert!(m[1..].iter().all(|v| *v < m[0]));
        } else {
            // Exactly zero side bins, the average is untouched
            assert_eq!(Ingest::Captured, outcome);
            assert!(p.magnitude().iter().all(|v| *v == 0.0));
        }
    }

    #[test]
    fn test_degenerate_spectrum_skips_average() {
        let mut p = small();
        p.ingest(&impulse(8, 1000));
        let before = p.magnitude().to_vec();
        assert_eq!(Ingest::Captured, p.ingest(&interleave(&[(0, 7); 8])));
        assert_eq!(before, p.magnitude());
        assert_eq!(&[0; 8], p.real());
        assert_eq!(&[7; 8], p.imag());
        assert_eq!(2, p.frame_count());
        assert_eq!(0, p.error_count());
        assert_eq!(1, p.window().write_index());
    }

    #[test]
    fn test_averaging_convergence() {
        let mut p = small();
        let frame = impulse(8, 1000);
        p.ingest(&frame);
        let single = p.magnitude().to_vec();
        for _ in 1..p.averaging_depth() {
            assert_eq!(Ingest::Averaged, p.ingest(&frame));
        }
        for (a, b) in single.iter().zip(p.magnitude()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_running_mean() {
        let mut p = small();
        p.set_averaging_depth(2).unwrap();
        p.ingest(&impulse(8, 1000));
        assert_all_close(p.magnitude(), impulse_db(8, 1000));
        p.ingest(&impulse(8, 4000));
        let expected = (impulse_db(8, 1000) + impulse_db(8, 4000)) / 2.0;
        assert_all_close(p.magnitude(), expected);
        // Wraps, the 1000 row is replaced
        p.ingest(&impulse(8, 2000));
        let expected = (impulse_db(8, 2000) + impulse_db(8, 4000)) / 2.0;
        assert_all_close(p.magnitude(), expected);
    }

    #[test]
    fn test_depth_one_replaces() {
        let mut p = small();
        p.set_averaging_depth(1).unwrap();
        for amp in [1000, 3000, 500] {
            p.ingest(&impulse(8, amp));
            assert_all_close(p.magnitude(), impulse_db(8, amp));
        }
    }

    #[test]
    fn test_set_averaging_depth() {
        let mut p = small();
        p.ingest(&impulse(8, 1000));
        p.ingest(&impulse(8, 1000));
        assert_eq!(
            Err(ConfigError::InvalidAveragingDepth { depth: 0, max: 4 }),
            p.set_averaging_depth(0)
        );
        assert_eq!(
            Err(ConfigError::InvalidAveragingDepth { depth: 5, max: 4 }),
            p.set_averaging_depth(5)
        );
        // Rejected values don't touch the average
        assert_eq!(4, p.averaging_depth());
        assert_eq!(2, p.window().write_index());
        assert_eq!(3, p.window().ave_size());

        // Same depth still resets
        p.set_averaging_depth(4).unwrap();
        assert_eq!(0, p.window().write_index());
        assert_eq!(1, p.window().ave_size());
        p.ingest(&impulse(8, 3000));
        assert_all_close(p.magnitude(), impulse_db(8, 3000));
    }

    #[test]
    fn test_reset_averaging() {
        let mut p = small();
        p.ingest(&impulse(8, 1000));
        p.ingest(&impulse(8, 2000));
        p.reset_averaging();
        p.ingest(&impulse(8, 3000));
        assert_all_close(p.magnitude(), impulse_db(8, 3000));
        assert_eq!(4, p.averaging_depth());
    }

    #[test]
    fn test_axes_never_change() {
        let mut p = small();
        let time = p.time().to_vec();
        let freq = p.frequency().to_vec();
        p.ingest(&impulse(8, 1000));
        p.ingest(&[1]);
        p.ingest(&interleave(&[(3, 4); 20]));
        p.set_averaging_depth(2).unwrap();
        assert_eq!(time, p.time());
        assert_eq!(freq, p.frequency());
        assert_eq!(1.0, time[1]);
        assert_eq!(125.0, freq[1]);
    }

    #[test]
    fn test_rx_disabled_ignores_frames() {
        let mut p = small();
        p.set_rx_enabled(false);
        assert_eq!(Ingest::Ignored, p.ingest(&impulse(8, 1000)));
        assert_eq!(Ingest::Ignored, p.ingest(&[]));
        assert_eq!(Counters::default(), p.counters());
        p.set_rx_enabled(true);
        assert_eq!(Ingest::Averaged, p.ingest(&impulse(8, 1000)));
        assert_eq!(1, p.frame_count());
    }
}
