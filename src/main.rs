use clap::Parser;
use env_logger::Builder;
use env_logger::Env;
use log::{error, info, Level};

mod capture;
mod config;
mod frame;
mod fusion;
mod heuristic;
mod hsv;
mod image_input;
mod model;
mod pipeline;
mod roi;
mod segmentation;
mod species;
mod stats;
mod verdict;
mod watch;

use anyhow::Result;
use capture::CaptureWriter;
use colored::*;
use config::{
    AnalyzeCommand, AnalyzeConfig, GlobalArgs, StatsCommand, WatchCommand, WatchRunConfig,
};
use frame::Frame;
use model::ModelClassifier;
use pipeline::{CycleKind, FramePipeline};
use stats::StatsStore;
use std::io::Write;
use std::path::Path;
use watch::{DirectoryFrameSource, WatchSession};

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Classify fruit in one or more images
    Analyze(AnalyzeCommand),

    /// Continuously classify a stream of frames
    Watch(WatchCommand),

    /// Show or reset detection statistics
    Stats(StatsCommand),

    /// Show version information
    Version,
}

#[derive(Parser)]
#[command(name = "fruitscan")]
#[command(about = "Fruit inspection toolkit")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn get_log_level_from_verbosity(
    verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::ErrorLevel>,
) -> log::LevelFilter {
    let base_level = verbosity.log_level_filter();
    let adjusted_level = match base_level {
        log::LevelFilter::Off => log::LevelFilter::Off, // -qq -> OFF
        log::LevelFilter::Error => log::LevelFilter::Warn, // default -> WARN
        log::LevelFilter::Warn => log::LevelFilter::Info, // -v -> INFO
        log::LevelFilter::Info => log::LevelFilter::Debug, // -vv -> DEBUG
        log::LevelFilter::Debug => log::LevelFilter::Trace, // -vvv -> TRACE
        log::LevelFilter::Trace => log::LevelFilter::Trace, // -vvvv -> TRACE (max)
    };

    // clap-verbosity-flag doesn't distinguish default from -q, so check the
    // quiet flag directly.
    if verbosity.is_silent() {
        log::LevelFilter::Error // -q -> ERROR
    } else {
        adjusted_level
    }
}

fn main() {
    let cli = Cli::parse();

    // If user didn't pass -v/-q and RUST_LOG is set, honor the env var.
    let use_env = !cli.global.verbosity.is_present() && std::env::var_os("RUST_LOG").is_some();

    let mut logger = if use_env {
        Builder::from_env(Env::default())
    } else {
        let level_filter = get_log_level_from_verbosity(cli.global.verbosity.clone());

        let mut b = Builder::new();
        b.filter_level(level_filter);
        b
    };

    if cli.global.no_color {
        colored::control::set_override(false);
    }

    logger
        .format(|buf, record| {
            let level_str = match record.level() {
                Level::Error => "ERROR".red().bold().to_string(),
                Level::Warn => "WARN".yellow().to_string(),
                Level::Info => "INFO".green().to_string(),
                Level::Debug => "DEBUG".blue().to_string(),
                Level::Trace => "TRACE".magenta().to_string(),
            };
            writeln!(buf, "[{}] {}", level_str, record.args())
        })
        .init();

    match &cli.command {
        Some(Commands::Analyze(analyze_cmd)) => {
            let sources_desc = if analyze_cmd.sources.len() == 1 {
                analyze_cmd.sources[0].clone()
            } else {
                format!("{} inputs", analyze_cmd.sources.len())
            };

            info!(
                "🔍 Analyzing: {} | model: {} | heuristic: {}",
                sources_desc,
                analyze_cmd.model_path.as_deref().unwrap_or("none"),
                if analyze_cmd.rich_heuristic {
                    "rich"
                } else {
                    "basic"
                }
            );

            let internal_config = AnalyzeConfig::from_args(cli.global.clone(), analyze_cmd.clone());
            match run_analyze(internal_config) {
                Ok(_) => {}
                Err(e) => {
                    error!("❌ Analysis failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Watch(watch_cmd)) => {
            info!(
                "🎥 Watching: {} | fps: {} | model: {}",
                watch_cmd.frames,
                watch_cmd.fps,
                watch_cmd.model_path.as_deref().unwrap_or("none")
            );

            let internal_config = match WatchRunConfig::from_args(cli.global.clone(), watch_cmd.clone())
            {
                Ok(config) => config,
                Err(e) => {
                    error!("❌ Invalid arguments: {e}");
                    std::process::exit(1);
                }
            };
            match run_watch(internal_config) {
                Ok(_) => {}
                Err(e) => {
                    error!("❌ Watch session failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Stats(stats_cmd)) => {
            if let Err(e) = run_stats(&cli.global.stats_file, stats_cmd) {
                error!("❌ Stats command failed: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Version) => {
            println!("fruitscan v{}", env!("CARGO_PKG_VERSION"));
        }
        None => {
            // Show help if no command specified
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().unwrap();
        }
    }
}

/// Load the model if a path was given; a failing load degrades to
/// heuristic-only instead of aborting.
fn load_model(path: Option<&Path>) -> Option<ModelClassifier> {
    let path = path?;
    match ModelClassifier::load(path) {
        Ok(model) => Some(model),
        Err(e) => {
            log::warn!("⚠️  Could not load model, running heuristic-only: {e}");
            None
        }
    }
}

fn run_analyze(config: AnalyzeConfig) -> Result<usize> {
    let image_files = image_input::collect_images_from_sources(&config.sources, config.strict)?;
    if image_files.is_empty() {
        log::warn!("No valid images found to process");
        return Ok(0);
    }
    info!("🎯 Found {} image(s) to process", image_files.len());

    let model = load_model(config.model_path.as_deref());
    let mut pipeline = FramePipeline::new(config.pipeline.clone(), model);
    let mut stats = StatsStore::open(&config.stats_file);
    let writer = match &config.output_dir {
        Some(dir) => Some(CaptureWriter::new(dir)?),
        None => None,
    };

    let mut successful = 0usize;
    for (index, image_path) in image_files.iter().enumerate() {
        let outcome = Frame::open(image_path)
            .and_then(|frame| Ok((pipeline.process(&frame, CycleKind::OnDemand)?, frame)));
        match outcome {
            Ok((output, frame)) => {
                successful += 1;
                let result = &output.result;
                info!(
                    "✅ {} ({}/{}): {} [{}] conf {:.2} species {}",
                    image_path.display(),
                    index + 1,
                    image_files.len(),
                    result.label,
                    result.source,
                    result.confidence,
                    result.species,
                );
                for diagnostic in &result.diagnostics {
                    log::debug!("   📋 {diagnostic}");
                }
                stats.record(result)?;

                if let Some(writer) = &writer {
                    let stem = image_path
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_else(|| format!("frame_{index}"));
                    let paths = writer.save(&frame, &output, &stem)?;
                    log::debug!("💾 Saved artifacts: {}", paths.annotated.display());
                }
            }
            Err(e) => {
                if config.strict {
                    return Err(e);
                }
                log::warn!("⚠️  Failed to process {}: {e}", image_path.display());
            }
        }
    }

    info!("✅ Processed {successful} image(s)");
    Ok(successful)
}

fn run_watch(config: WatchRunConfig) -> Result<()> {
    let source = DirectoryFrameSource::open(&config.frames_dir, config.loop_frames)?;
    info!("🎞️  {} frame(s) available", source.len());

    let model = load_model(config.model_path.as_deref());
    let pipeline = FramePipeline::new(config.pipeline.clone(), model);
    let stats = StatsStore::open(&config.stats_file);

    let session = WatchSession::spawn(pipeline, stats, source, config.watch.clone());
    let report = session.join()?;

    info!(
        "✅ Session done: {} frame(s) processed, {} detection(s) recorded",
        report.frames_processed, report.detections_recorded
    );
    Ok(())
}

fn run_stats(stats_file: &str, cmd: &StatsCommand) -> Result<()> {
    let mut store = StatsStore::open(Path::new(stats_file));

    if cmd.reset {
        store.reset()?;
        info!("🧹 Statistics reset");
        return Ok(());
    }

    let stats = store.stats();
    let summary = &stats.summary;
    println!("Detections: {}", summary.total_detections);
    println!(
        "Fruits: {} ({} non-fruit)",
        summary.total_fruits, summary.total_non_fruits
    );
    println!("Success rate: {:.1}%", summary.success_rate * 100.0);
    for (fruit_type, breakdown) in &summary.fruits_by_type {
        println!(
            "  {fruit_type}: {} total, {} OK, {} spoiled",
            breakdown.total, breakdown.ok, breakdown.spoiled
        );
    }

    let tail = stats.history_tail(cmd.limit);
    if !tail.is_empty() {
        println!("Last {} detection(s):", tail.len());
        for entry in tail {
            println!(
                "  {} {} ({}) conf {:.2}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.classification,
                entry.fruit_type,
                entry.confidence
            );
        }
    }
    Ok(())
}
