//! CAN Capture CLI Application
//!
//! Command-line front end for the can-capture library:
//! - Loads signal definitions from config.toml and/or the built-in catalog
//! - Replays a dump log through the capture pipeline (optionally in real time)
//! - Prints capture statistics and the latest value of every signal
//! - Exports raw frames and stored series (CSV/JSON/dump log)

use anyhow::{Context, Result};
use can_capture::signals::id_display_name;
use can_capture::{
    formats, CapturePipeline, Decoder, ExportFormat, PipelineState, ReplaySource, SignalCatalog,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mod config;

/// CAN Capture - Decode CAN signals through a real-time capture pipeline
#[derive(Parser, Debug)]
#[command(name = "can-capture-cli")]
#[command(about = "Capture and decode CAN signals from recorded dump logs", long_about = None)]
#[command(version)]
struct Args {
    /// Dump log to replay (`(ts) can0 259#0102...` lines)
    #[arg(short, long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Path to configuration file (capture.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Register the built-in analog module signals
    #[arg(long)]
    defaults: bool,

    /// Replay frames at their recorded pace instead of as fast as possible
    #[arg(long)]
    realtime: bool,

    /// Stop capturing after this many seconds
    #[arg(short, long, value_name = "SECONDS")]
    duration: Option<f64>,

    /// Stop capturing after this many frames have been received
    #[arg(short = 'n', long, value_name = "FRAMES")]
    count: Option<u64>,

    /// Export format for --output (csv, json, dump)
    #[arg(short, long, value_name = "FORMAT")]
    export: Option<ExportFormat>,

    /// Output file for captured raw frames
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output file for stored signal time series
    #[arg(long, value_name = "FILE")]
    series_output: Option<PathBuf>,

    /// Print the registered signals and exit
    #[arg(long)]
    list_signals: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Capture CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using capture library v{}", can_capture::VERSION);

    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => config::AppConfig::default(),
    };

    let decoder = Arc::new(Decoder::new());
    load_signals(&decoder, &app_config, args.defaults)?;

    if args.list_signals {
        print_signals(&decoder);
        return Ok(());
    }

    match &args.replay {
        Some(path) => capture_mode(path, &args, &app_config, decoder),
        None => {
            // No input - show help
            println!("CAN Capture - No input specified");
            println!("\nQuick Start:");
            println!("  can-capture-cli --replay trace.log --defaults");
            println!("  can-capture-cli --replay trace.log --config capture.toml --export csv -o frames.csv");
            println!("\nUse --help for more options");
            Ok(())
        }
    }
}

/// Register configured signals; the built-in catalog is used when asked for
/// or when nothing else is configured
fn load_signals(decoder: &Decoder, app_config: &config::AppConfig, defaults: bool) -> Result<()> {
    if defaults || app_config.use_default_signals || app_config.signals.is_empty() {
        SignalCatalog::defaults()
            .apply(decoder)
            .context("Failed to register built-in signals")?;
    }
    if !app_config.signals.is_empty() {
        let count = app_config
            .catalog()
            .apply(decoder)
            .context("Failed to register configured signals")?;
        log::debug!("Registered {} configured signals", count);
    }
    Ok(())
}

fn print_signals(decoder: &Decoder) {
    let stats = decoder.stats();
    println!("\n📊 Signal Database:");
    println!("  IDs:       {}", stats.num_ids);
    println!("  Signals:   {}", stats.num_signals);
    println!("  Overrides: {}", stats.num_overrides);

    for id in decoder.registered_ids() {
        let label = id_display_name(id).unwrap_or("custom");
        println!("\n  0x{:03X} ({})", id, label);
        for def in decoder.definitions(id) {
            println!(
                "    • {:<24} bytes {}..{}  ×{} {:+}  {}",
                def.name,
                def.byte_offset,
                def.required_len(),
                def.scale,
                def.offset,
                def.unit
            );
        }
    }
}

/// Replay mode - run the pipeline over a recorded log, then report and export
fn capture_mode(
    log_path: &Path,
    args: &Args,
    app_config: &config::AppConfig,
    decoder: Arc<Decoder>,
) -> Result<()> {
    println!("═══════════════════════════════════════════════");
    println!("  CAN Capture - Replay");
    println!("═══════════════════════════════════════════════\n");

    let source = ReplaySource::from_dump_log(log_path)
        .with_context(|| format!("Failed to load dump log: {:?}", log_path))?
        .with_realtime(args.realtime);
    println!("📄 Replaying {} frames from {:?}", source.remaining(), log_path);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::Release))
            .context("Failed to install Ctrl-C handler")?;
    }

    let mut pipeline = CapturePipeline::new(app_config.capture.clone(), Arc::clone(&decoder))
        .context("Failed to create capture pipeline")?;
    pipeline.start(source).context("Failed to start capture")?;

    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));
    let mut last_report = Instant::now();
    while running.load(Ordering::Acquire) && !pipeline.is_finished() {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            log::info!("Capture duration reached");
            break;
        }
        if frame_limit_reached(pipeline.stats().frames_received, args.count) {
            log::info!("Frame count reached");
            break;
        }
        if last_report.elapsed() >= Duration::from_secs(1) {
            let stats = pipeline.stats();
            log::info!(
                "{} frames received, {} decoded, {} dropped",
                stats.frames_received,
                stats.frames_decoded,
                stats.frames_dropped
            );
            last_report = Instant::now();
        }
        thread::sleep(Duration::from_millis(50));
    }
    if !running.load(Ordering::Acquire) {
        println!("\n⏹  Interrupted");
    }

    pipeline.stop();
    if let PipelineState::Failed(reason) = pipeline.status() {
        eprintln!("⚠️  Capture ended with a source failure: {}", reason);
    }

    print_summary(&pipeline);
    export_results(&pipeline, args, app_config)?;
    Ok(())
}

fn frame_limit_reached(received: u64, count: Option<u64>) -> bool {
    count.is_some_and(|limit| received >= limit)
}

fn print_summary(pipeline: &CapturePipeline) {
    let stats = pipeline.stats();
    println!("\n📊 Capture Statistics:");
    println!("  Received:  {}", stats.frames_received);
    println!("  Filtered:  {}", stats.frames_filtered);
    println!("  Decoded:   {}", stats.frames_decoded);
    println!("  Dropped:   {} ({:.2}%)", stats.frames_dropped, stats.drop_rate());
    println!("  Errors:    {}", stats.decode_errors);
    println!("  Warnings:  {}", stats.signal_warnings);

    let store = pipeline.store();
    let keys = store.keys();
    if keys.is_empty() {
        println!("\nNo signal values decoded");
        return;
    }

    println!("\n📈 Latest Values:");
    println!("───────────────────────────────────────────────");
    for key in keys {
        let Some(sample) = store.latest(key.arbitration_id, &key.signal) else {
            continue;
        };
        let unit = pipeline
            .decoder()
            .definition(key.arbitration_id, &key.signal)
            .map(|def| def.unit)
            .unwrap_or_default();
        println!(
            "  0x{:03X} {:<24} {:>12.3} {:<4} ({} samples, {})",
            key.arbitration_id,
            key.signal,
            sample.value,
            unit,
            store.len(key.arbitration_id, &key.signal),
            sample.timestamp().format("%H:%M:%S%.3f")
        );
    }
}

fn export_results(pipeline: &CapturePipeline, args: &Args, app_config: &config::AppConfig) -> Result<()> {
    let format = args.export.unwrap_or(app_config.output.format);
    let decoder = pipeline.decoder();

    if let Some(path) = args.output.as_ref().or(app_config.output.path.as_ref()) {
        let frames = pipeline.frame_log().snapshot();
        formats::export_frames_to_file(format, path, &frames, decoder, &pipeline.config().bus.channel)
            .with_context(|| format!("Failed to export frames to {:?}", path))?;
        println!("\n✓ Exported {} frames ({}) to {:?}", frames.len(), format, path);
    }

    if let Some(path) = args.series_output.as_ref().or(app_config.output.series_path.as_ref()) {
        // Series have no dump-log form; fall back to CSV
        let series_format = match format {
            ExportFormat::DumpLog => ExportFormat::Csv,
            other => other,
        };
        let series = pipeline.store().snapshot_all();
        formats::export_series_to_file(series_format, path, &series, decoder)
            .with_context(|| format!("Failed to export series to {:?}", path))?;
        println!("✓ Exported {} series ({}) to {:?}", series.len(), series_format, path);
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
