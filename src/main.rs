use std::{
    fs::File,
    io::BufReader,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
};

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::bounded;
use rfsoc_dbg::{
    args::{self, Args},
    capture::{capture_frames, RateDrop},
    channel::ChannelLabels,
    exfil::{log_spectra, process_frames, spectra_file_consumer},
    monitoring::{log_stats, HostStats},
    StreamSampleProcessor,
};
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    // Get the CLI options
    let cli = Args::parse();
    // Get tracing going
    tracing_subscriber::fmt()
        .with_max_level(args::convert_filter(cli.verbose.log_level_filter()))
        .init();

    // Build the processor
    let mut processor = StreamSampleProcessor::new(cli.processor_config()?)?;
    if let Some(depth) = cli.averaging {
        processor.set_averaging_depth(depth)?;
    }
    info!(
        sample_rate = processor.config().sample_rate,
        max_size = processor.config().max_size,
        averaging = processor.averaging_depth(),
        "Processor ready"
    );
    let channel = cli.channel_address()?;
    info!(
        "Debug channel {} spans {}",
        channel.get(),
        ChannelLabels::new(channel)
    );
    let frequency = processor.frequency().to_vec();
    let processor = Arc::new(Mutex::new(processor));

    // Shutdown handling
    let running = Arc::new(AtomicBool::new(true));
    let done = Arc::new(AtomicBool::new(false));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            info!("Interrupted, shutting down");
            running.store(false, Ordering::Relaxed);
        })?;
    }

    // Setup the frame ring buffer and the spectrum channel
    let (mut producer, consumer) = rtrb::RingBuffer::new(cli.capacity);
    let (sp_sender, sp_receiver) = bounded(16);
    let stats = Arc::new(HostStats::default());

    // Start the spectrum consumer
    let spectra_handle = match cli.out_dir.clone() {
        Some(dir) => thread::spawn(move || {
            if let Err(e) = spectra_file_consumer(sp_receiver, &dir) {
                error!("Spectra writer failed - {}", e);
            }
        }),
        None => thread::spawn(move || log_spectra(sp_receiver, frequency)),
    };

    // Start the processing thread
    let processing_handle = {
        let processor = processor.clone();
        let done = done.clone();
        let running = running.clone();
        thread::spawn(move || process_frames(consumer, &processor, sp_sender, &done, &running))
    };

    // Start the stats thread
    let stats_handle = {
        let processor = processor.clone();
        let stats = stats.clone();
        let running = running.clone();
        let period = cli.stats_period();
        thread::spawn(move || log_stats(processor, stats, period, running))
    };

    // Capture on this thread
    let frame_bytes = usize::try_from(cli.frame_bytes).context("frame size too large")?;
    let mut rate_drop = RateDrop::new(cli.rate_drop_period());
    let capture = (|| -> anyhow::Result<()> {
        loop {
            let file = File::open(&cli.input)
                .with_context(|| format!("opening {}", cli.input.display()))?;
            capture_frames(
                BufReader::new(file),
                frame_bytes,
                &mut producer,
                &mut rate_drop,
                &running,
                &stats,
            )?;
            if !cli.repeat || !running.load(Ordering::Relaxed) {
                return Ok(());
            }
        }
    })();

    // Let the consumer drain, then stop everything else
    done.store(true, Ordering::Release);
    let _ = processing_handle.join();
    running.store(false, Ordering::Relaxed);
    let _ = stats_handle.join();
    let _ = spectra_handle.join();
    capture
}
