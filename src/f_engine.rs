use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Full scale of a signed 16-bit sample, our 0 dBFS reference
pub const FULL_SCALE: f64 = 32767.0;

// For each captured frame we only transform the real (I) channel.
// The imaginary channel is kept around for display, it never makes
// it into the spectral estimate.
//
// To get to dBFS we
// * promote the real samples to complex
// * FFT
// * normalize by the transform length
// * keep the first half (one-sided)
// * 20 log10(|X| / full scale)

/// Planned forward FFT plus the buffers it works in, allocated once
pub struct FftEngine {
    fft: Arc<dyn Fft<f64>>,
    buf: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl std::fmt::Debug for FftEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftEngine").field("len", &self.len()).finish()
    }
}

impl FftEngine {
    pub fn new(len: usize) -> Self {
        let fft = FftPlanner::<f64>::new().plan_fft_forward(len);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buf: vec![Complex::default(); len],
            scratch,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Compute the one-sided dBFS spectrum of `real` into `out`.
    ///
    /// Returns `false` if any bin came out as `-inf` (an exactly zero bin),
    /// in which case the contents of `out` shouldn't be averaged.
    pub fn log_magnitude(&mut self, real: &[i16], out: &mut [f64]) -> bool {
        let n = self.len();
        assert_eq!(real.len(), n);
        assert_eq!(out.len(), n / 2);
        for (c, &x) in self.buf.iter_mut().zip(real) {
            *c = Complex::new(x as f64, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buf, &mut self.scratch);
        let scale = n as f64;
        let mut finite = true;
        for (o, bin) in out.iter_mut().zip(&self.buf) {
            *o = 20.0 * (bin.norm() / scale / FULL_SCALE).log10();
            finite &= o.is_finite();
        }
        finite
    }
}
