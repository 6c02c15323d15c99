pub mod args;
pub mod averaging;
pub mod capture;
pub mod channel;
pub mod complex;
pub mod error;
pub mod exfil;
pub mod f_engine;
pub mod monitoring;
pub mod processor;

pub use complex::IqSample;
pub use error::{ConfigError, FrameError};
pub use processor::{Ingest, ProcessorConfig, StreamSampleProcessor};

/// Sample rate of the DSP debug streams (312.5 MHz decimated by 64)
pub const DEFAULT_SAMPLE_RATE: f64 = 312.5e6 / 64.0;
/// Capture length in I/Q pairs
pub const DEFAULT_MAX_SIZE: usize = 1024;
/// Most spectra we will ever average together
pub const DEFAULT_MAX_AVE: usize = 4;
