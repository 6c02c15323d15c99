//! Argument parsing for running from the command line

use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::{
    channel::ChannelAddress, error::ConfigError, processor::ProcessorConfig, DEFAULT_MAX_AVE,
    DEFAULT_MAX_SIZE, DEFAULT_SAMPLE_RATE,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Raw capture of interleaved little-endian 16-bit I/Q samples
    #[clap(short, long)]
    pub input: PathBuf,
    /// Bytes per frame handed to the processor
    #[clap(short, long, default_value_t = (4 * DEFAULT_MAX_SIZE) as u64)]
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    pub frame_bytes: u64,
    /// Sample rate of the debug stream in Hz
    #[clap(short, long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: f64,
    /// Capture length in I/Q pairs (power of two)
    #[clap(long, default_value_t = DEFAULT_MAX_SIZE)]
    pub max_size: usize,
    /// Largest number of spectra that can be averaged
    #[clap(long, default_value_t = DEFAULT_MAX_AVE)]
    pub max_ave: usize,
    /// Number of spectra to average together (defaults to max-ave)
    #[clap(short, long)]
    pub averaging: Option<usize>,
    /// Frame ring buffer capacity
    #[clap(short, long, default_value_t = 256)]
    pub capacity: usize,
    /// Forward at most one frame per this many seconds (0 forwards everything)
    #[clap(short, long, default_value_t = 0.0, value_parser = valid_period)]
    pub rate_drop: f64,
    /// Seconds between stats reports
    #[clap(long, default_value_t = 1.0, value_parser = valid_period)]
    pub stats_interval: f64,
    /// Filter bank channel routed to the debug stream (0-2047)
    #[clap(long, default_value_t = 0)]
    pub channel: u16,
    /// Directory to write averaged spectra to
    #[clap(short, long)]
    pub out_dir: Option<PathBuf>,
    /// Replay the input until interrupted
    #[clap(long)]
    pub repeat: bool,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
}

impl Args {
    pub fn processor_config(&self) -> Result<ProcessorConfig, ConfigError> {
        let config = ProcessorConfig {
            sample_rate: self.sample_rate,
            max_size: self.max_size,
            max_ave: self.max_ave,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn channel_address(&self) -> Result<ChannelAddress, ConfigError> {
        ChannelAddress::new(self.channel)
    }

    pub fn rate_drop_period(&self) -> Duration {
        Duration::from_secs_f64(self.rate_drop)
    }

    pub fn stats_period(&self) -> Duration {
        Duration::from_secs_f64(self.stats_interval)
    }
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

fn valid_period(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err("Expected a non-negative number of seconds".to_string()),
    }
}
