//! Configuration layer separating CLI arguments from internal pipeline
//! configuration.
//!
//! CLI structs own argument parsing, help text and validation; the internal
//! configs own processing parameters. `from_args` conversions bridge the
//! two, so the pipeline never sees clap types.

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use std::path::PathBuf;
use std::time::Duration;

use crate::heuristic::{HeuristicConfig, HeuristicVariant};
use crate::pipeline::PipelineConfig;
use crate::segmentation::SegmenterConfig;
use crate::watch::WatchConfig;

/// Parse probability value (must be between 0.0 and 1.0)
pub fn parse_probability(s: &str) -> Result<f32, String> {
    let val = s
        .parse::<f32>()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if !(0.0..=1.0).contains(&val) {
        return Err(format!("Must be between 0.0 and 1.0, got {val}"));
    }
    Ok(val)
}

/// Global CLI arguments that apply to all fruitscan commands
#[derive(Parser, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory for capture artifacts (masks, ROI crops, annotated frames)
    #[arg(long, global = true)]
    pub output_dir: Option<String>,

    /// Path to the detection statistics JSON file
    #[arg(long, global = true, default_value = "detection_stats.json")]
    pub stats_file: String,

    /// Verbosity level (-q/--quiet, -v/-vv/-vvv/-vvvv for info/debug/trace)
    #[command(flatten)]
    pub verbosity: Verbosity,

    /// Use permissive mode for input validation (warn instead of error for
    /// unsupported files)
    #[arg(long, global = true)]
    pub permissive: bool,

    /// Disable colored output (also respects NO_COLOR)
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// CLI command for one-shot image analysis
#[derive(Parser, Debug, Clone)]
pub struct AnalyzeCommand {
    /// Path(s) to input images or directories
    #[arg(value_name = "IMAGES_OR_DIRS", required = true)]
    pub sources: Vec<String>,

    /// Path to the ONNX classification model. Without it the pipeline runs
    /// heuristic-only.
    #[arg(long)]
    pub model_path: Option<String>,

    /// Use the stricter segmentation profile (gray exclusion, shape caps)
    #[arg(long)]
    pub strict_segmentation: bool,

    /// Use the rich spoilage heuristic (bruise/mold ratios + fruit gate)
    #[arg(long)]
    pub rich_heuristic: bool,

    /// Save capture artifacts for each analyzed image
    #[arg(long)]
    pub save_outputs: bool,
}

/// CLI command for continuous frame-stream analysis
#[derive(Parser, Debug, Clone)]
pub struct WatchCommand {
    /// Directory of frames to stream through the pipeline
    #[arg(long, value_name = "DIR")]
    pub frames: String,

    /// Path to the ONNX classification model
    #[arg(long)]
    pub model_path: Option<String>,

    /// Target cadence in frames per second
    #[arg(long, default_value = "30.0")]
    pub fps: f32,

    /// Stop after this many frames (default: run until frames run out)
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Replay the frame directory in a loop
    #[arg(long)]
    pub loop_frames: bool,

    /// Use the stricter segmentation profile
    #[arg(long)]
    pub strict_segmentation: bool,

    /// Use the rich spoilage heuristic
    #[arg(long)]
    pub rich_heuristic: bool,
}

/// CLI command for inspecting the detection ledger
#[derive(Parser, Debug, Clone)]
pub struct StatsCommand {
    /// Number of history entries to print
    #[arg(long, default_value = "50")]
    pub limit: usize,

    /// Reset the ledger to an empty state
    #[arg(long)]
    pub reset: bool,
}

/// Internal configuration for one-shot analysis
#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    pub sources: Vec<String>,
    pub model_path: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub stats_file: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub strict: bool,
}

impl AnalyzeConfig {
    pub fn from_args(global: GlobalArgs, cmd: AnalyzeCommand) -> Self {
        Self {
            sources: cmd.sources,
            model_path: cmd.model_path.map(PathBuf::from),
            pipeline: build_pipeline_config(cmd.strict_segmentation, cmd.rich_heuristic),
            stats_file: PathBuf::from(global.stats_file),
            output_dir: if cmd.save_outputs {
                Some(PathBuf::from(
                    global.output_dir.unwrap_or_else(|| "captures".to_string()),
                ))
            } else {
                None
            },
            strict: !global.permissive,
        }
    }
}

/// Internal configuration for a continuous session
#[derive(Debug, Clone)]
pub struct WatchRunConfig {
    pub frames_dir: PathBuf,
    pub model_path: Option<PathBuf>,
    pub loop_frames: bool,
    pub pipeline: PipelineConfig,
    pub watch: WatchConfig,
    pub stats_file: PathBuf,
}

impl WatchRunConfig {
    pub fn from_args(global: GlobalArgs, cmd: WatchCommand) -> Result<Self, String> {
        if cmd.fps <= 0.0 {
            return Err(format!("fps must be positive, got {}", cmd.fps));
        }
        Ok(Self {
            frames_dir: PathBuf::from(cmd.frames),
            model_path: cmd.model_path.map(PathBuf::from),
            loop_frames: cmd.loop_frames,
            pipeline: build_pipeline_config(cmd.strict_segmentation, cmd.rich_heuristic),
            watch: WatchConfig {
                frame_interval: Duration::from_secs_f32(1.0 / cmd.fps),
                max_frames: cmd.max_frames,
            },
            stats_file: PathBuf::from(global.stats_file),
        })
    }
}

fn build_pipeline_config(strict_segmentation: bool, rich_heuristic: bool) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    if strict_segmentation {
        config.segmenter = SegmenterConfig::strict();
    }
    if rich_heuristic {
        config.heuristic = HeuristicConfig {
            variant: HeuristicVariant::Rich,
            ..HeuristicConfig::default()
        };
    }
    config
}
