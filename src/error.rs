//! Error types for frame ingestion and configuration

use thiserror::Error;

/// A frame that can't be interpreted as interleaved 16-bit I/Q pairs.
/// These never leave the processor, they only bump the error counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("odd frame length ({0} bytes)")]
    OddLength(usize),
}

/// Rejected configuration, reported synchronously to the caller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("averaging depth {depth} outside of [1, {max}]")]
    InvalidAveragingDepth { depth: usize, max: usize },
    #[error("capture size {0} must be a power of two of at least 2")]
    InvalidMaxSize(usize),
    #[error("sample rate {0} Hz must be positive and finite")]
    InvalidSampleRate(f64),
    #[error("averaging capacity must be at least 1")]
    InvalidMaxAve,
    #[error("channel address {0} outside of [0, 2047]")]
    InvalidChannel(u16),
}
