use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use swimframe::{
    CaptureMode, CaptureSession, ExtractOptions, FallbackAdvice, FfmpegBackend, FfmpegLogLevel,
    FrameExtractor, FrameResult, HttpAnalyzer, MediaSource, ProgressCallback, ProgressInfo,
    SampleSpec, SessionOptions,
};
use tracing_subscriber::EnvFilter;

const CLI_AFTER_HELP: &str = "Examples:\n  swimframe probe lap.mp4 --json\n  swimframe frame lap.mp4 --at 0:04 --out stroke.jpg\n  swimframe sample lap.mp4 --out frames --start 3 --end 7 --count 5 --progress\n  swimframe analyze lap.mp4 --mode range --start 3 --end 7\n  swimframe completions zsh > _swimframe";

#[derive(Debug, Parser)]
#[command(
    name = "swimframe",
    version,
    about = "Capture frames from swimming videos and get coaching advice",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// JPEG quality for captured frames (1-100).
    #[arg(long, global = true, default_value_t = 85)]
    quality: u8,

    /// Deadline for one extraction attempt, in seconds.
    #[arg(long, global = true, default_value_t = 5.0)]
    timeout: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Single,
    Range,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print duration and dimensions of a video.
    #[command(
        about = "Print video metadata",
        after_help = "Examples:\n  swimframe probe lap.mp4\n  swimframe probe lap.mp4 --json"
    )]
    Probe {
        /// Input video path.
        input: PathBuf,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Capture one frame to a JPEG file.
    #[command(
        about = "Capture a single frame",
        after_help = "Examples:\n  swimframe frame lap.mp4 --at 4.5 --out stroke.jpg\n  swimframe frame lap.mp4 --at 00:01:02 --out turn.jpg --attempts 5"
    )]
    Frame {
        /// Input video path.
        input: PathBuf,
        /// Timestamp (seconds, MM:SS or HH:MM:SS). Defaults to the midpoint.
        #[arg(long)]
        at: Option<String>,
        /// Output JPEG path.
        #[arg(long)]
        out: PathBuf,
        /// Attempts before giving up.
        #[arg(long, default_value_t = 3)]
        attempts: u32,
    },

    /// Capture several frames into a directory.
    #[command(
        about = "Sample frames evenly or across a range",
        after_help = "Examples:\n  swimframe sample lap.mp4 --out frames --count 8\n  swimframe sample lap.mp4 --out frames --start 0:03 --end 0:07 --count 5 --progress"
    )]
    Sample {
        /// Input video path.
        input: PathBuf,
        /// Output directory for captured frames.
        #[arg(long)]
        out: PathBuf,
        /// Number of frames.
        #[arg(long, default_value_t = 5)]
        count: usize,
        /// Range start; sample evenly across the whole video when omitted.
        #[arg(long, requires = "end")]
        start: Option<String>,
        /// Range end.
        #[arg(long, requires = "start")]
        end: Option<String>,
        /// Attempts per frame.
        #[arg(long, default_value_t = 3)]
        attempts: u32,
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
    },

    /// Capture frames and request coaching advice.
    #[command(
        about = "Analyze a swimming video",
        after_help = "Examples:\n  swimframe analyze lap.mp4 --at 4.5\n  SWIMFRAME_ENDPOINT=http://localhost:3000/api/analyze swimframe analyze lap.mp4 --mode range"
    )]
    Analyze {
        /// Input video path.
        input: PathBuf,
        /// Analysis endpoint URL.
        #[arg(
            long,
            env = "SWIMFRAME_ENDPOINT",
            default_value = "http://localhost:3000/api/analyze"
        )]
        endpoint: String,
        /// Capture mode.
        #[arg(long, value_enum, default_value_t = ModeArg::Single)]
        mode: ModeArg,
        /// Timestamp for single mode. Defaults to the midpoint.
        #[arg(long)]
        at: Option<String>,
        /// Range start for range mode.
        #[arg(long)]
        start: Option<String>,
        /// Range end for range mode.
        #[arg(long)]
        end: Option<String>,
        /// Substitute general tips when the analysis returns fewer than three items.
        #[arg(long)]
        fallback_advice: bool,
        /// Print the analysis as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_timecode(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return seconds_to_duration(seconds, trimmed);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!("invalid time format: {trimmed}").into());
    }

    let (hours, minutes, seconds_str) = if parts.len() == 3 {
        (parts[0].parse::<u64>()?, parts[1].parse::<u64>()?, parts[2])
    } else {
        (0_u64, parts[0].parse::<u64>()?, parts[1])
    };

    let seconds = seconds_str.parse::<f64>()?;
    let total_seconds = (hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds;
    seconds_to_duration(total_seconds, trimmed)
}

fn seconds_to_duration(seconds: f64, value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    Duration::try_from_secs_f64(seconds.max(0.0))
        .map_err(|error| format!("time out of range: {value} ({error})").into())
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Ignore a second initialisation in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(global.verbose);

    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        swimframe::set_ffmpeg_log_level(parsed);
    }

    if !(global.timeout.is_finite() && global.timeout > 0.0) {
        return Err("--timeout must be a positive number of seconds".into());
    }

    Ok(())
}

fn base_extract_options(global: &GlobalOptions) -> ExtractOptions {
    ExtractOptions::new()
        .with_jpeg_quality(global.quality)
        .with_attempt_timeout(Duration::from_secs_f64(global.timeout))
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

async fn open_source(input: &Path) -> Result<MediaSource, Box<dyn std::error::Error>> {
    let source = MediaSource::from_path(input).await?;
    source.validate_media_type()?;
    Ok(source)
}

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(total: u64) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_length(info.total);
        self.bar.set_position(info.current);
        if let Some(timestamp) = info.current_timestamp {
            self.bar.set_message(format!(
                "{:.2}s ({} ok)",
                timestamp.as_secs_f64(),
                info.succeeded
            ));
        }
        if info.current >= info.total {
            self.bar.finish();
        }
    }
}

fn print_format_guide() {
    eprintln!();
    eprintln!("{}", "Video format help".yellow().bold());
    eprintln!("{}", swimframe::FORMAT_GUIDE);
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Probe { input, json } => {
            let source = open_source(&input).await?;
            let extractor = FrameExtractor::new(FfmpegBackend::new(), base_extract_options(&cli.global));
            let metadata = match extractor.probe(&source).await {
                Ok(metadata) => metadata,
                Err(error) => {
                    if error.indicates_format_problem() {
                        print_format_guide();
                    }
                    return Err(error.into());
                }
            };

            if json {
                let payload = json!({
                    "name": source.name(),
                    "mime": source.mime(),
                    "size_bytes": source.size(),
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "width": metadata.natural_width,
                    "height": metadata.natural_height,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("File: {} ({})", source.name(), source.human_size());
                if let Some(mime) = source.mime() {
                    println!("Type: {mime}");
                }
                println!("Duration: {:.3}s", metadata.duration.as_secs_f64());
                println!(
                    "Video: {}x{}",
                    metadata.natural_width, metadata.natural_height
                );
            }
        }
        Commands::Frame {
            input,
            at,
            out,
            attempts,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let source = open_source(&input).await?;
            let extractor = FrameExtractor::new(FfmpegBackend::new(), base_extract_options(&cli.global));
            let timestamp = match at {
                Some(value) => parse_timecode(&value)?,
                None => extractor.probe(&source).await?.duration / 2,
            };

            let frame = extractor
                .extract_frame(&source, timestamp, attempts)
                .await
                .into_result()?;
            fs::write(&out, &frame.jpeg)?;
            println!(
                "{} {} ({}x{} at {:.3}s)",
                "saved".green().bold(),
                out.display(),
                frame.width,
                frame.height,
                frame.timestamp.as_secs_f64()
            );
        }
        Commands::Sample {
            input,
            out,
            count,
            start,
            end,
            attempts,
            progress,
        } => {
            if count == 0 {
                return Err("--count must be greater than 0".into());
            }
            if out.exists() && !cli.global.overwrite {
                return Err(format!(
                    "output directory already exists: {} (use --overwrite)",
                    out.display()
                )
                .into());
            }

            let spec = match (start, end) {
                (Some(start), Some(end)) => SampleSpec::Range {
                    start: parse_timecode(&start)?,
                    end: parse_timecode(&end)?,
                    count,
                },
                _ => SampleSpec::Even { count },
            };

            let mut options = base_extract_options(&cli.global);
            if progress {
                options = options.with_progress(Arc::new(BarProgress::new(count as u64)?));
            }

            let source = open_source(&input).await?;
            let extractor = FrameExtractor::new(FfmpegBackend::new(), options);
            let duration = extractor.probe(&source).await?.duration;
            let batch = extractor
                .sample_frames(&source, duration, spec, attempts)
                .await?;

            fs::create_dir_all(&out)?;
            for (index, result) in batch.results().iter().enumerate() {
                match result {
                    FrameResult::Captured(frame) => {
                        let path = out.join(format!(
                            "frame_{index:03}_{:08.3}s.jpg",
                            frame.timestamp.as_secs_f64()
                        ));
                        fs::write(&path, &frame.jpeg)?;
                        if cli.global.verbose {
                            println!("{} {}", "saved".green().bold(), path.display());
                        }
                    }
                    FrameResult::Failed(failure) => {
                        eprintln!(
                            "{} frame {} at {:.3}s: {} ({})",
                            "warning:".yellow().bold(),
                            index,
                            failure.requested.as_secs_f64(),
                            failure.message,
                            failure.kind
                        );
                    }
                }
            }

            println!(
                "{} {} of {} frame(s) to {}",
                "success:".green().bold(),
                batch.success_count(),
                batch.len(),
                out.display()
            );
        }
        Commands::Analyze {
            input,
            endpoint,
            mode,
            at,
            start,
            end,
            fallback_advice,
            json,
        } => {
            let source = MediaSource::from_path(&input).await?;
            let extractor = Arc::new(FrameExtractor::new(
                FfmpegBackend::new(),
                base_extract_options(&cli.global),
            ));
            let mut options = SessionOptions::new();
            if fallback_advice {
                options = options.with_fallback_advice(FallbackAdvice::default());
            }
            let mut session =
                CaptureSession::new(extractor, HttpAnalyzer::new(endpoint), options);

            let loaded = session.load(source).await.map(|_| ());
            if let Err(error) = loaded {
                if session.state().show_format_help() {
                    print_format_guide();
                }
                return Err(error.into());
            }

            match mode {
                ModeArg::Single => {
                    if let Some(value) = at {
                        session.select_instant(parse_timecode(&value)?)?;
                    }
                }
                ModeArg::Range => {
                    session.set_mode(CaptureMode::Range)?;
                    let (default_start, default_end) = session.state().range();
                    let start = start.map(|value| parse_timecode(&value)).transpose()?;
                    let end = end.map(|value| parse_timecode(&value)).transpose()?;
                    if start.is_some() || end.is_some() {
                        session.select_range(
                            start.unwrap_or(default_start),
                            end.unwrap_or(default_end),
                        )?;
                    }
                }
            }

            let spinner = ProgressBar::new_spinner();
            spinner.set_message("rendering preview");
            spinner.enable_steady_tick(Duration::from_millis(120));
            if let Some(preview) = session.preview_settled().await {
                if let Some(kind) = preview.visible_error() {
                    spinner.finish_and_clear();
                    return Err(format!("preview failed ({kind})").into());
                }
            }

            spinner.set_message("analyzing");
            let outcome = session.submit().await;
            spinner.finish_and_clear();

            let analysis = match outcome {
                Ok(analysis) => analysis,
                Err(error) => {
                    if session.state().show_format_help() {
                        print_format_guide();
                    }
                    return Err(error.into());
                }
            };

            if json {
                let payload = json!({
                    "mode": match session.state().mode() {
                        CaptureMode::Single => "single",
                        CaptureMode::Range => "range",
                    },
                    "advice": analysis.advice,
                    "frames_analyzed": analysis.frames_analyzed,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", "Coaching advice".green().bold());
                println!("{}", swimframe::format_numbered(&analysis.advice));
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "swimframe", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands, ModeArg, parse_log_level, parse_timecode};

    #[test]
    fn parse_timecode_formats() {
        let seconds = parse_timecode("75").unwrap();
        assert_eq!(seconds.as_secs(), 75);

        let mm_ss = parse_timecode("01:15").unwrap();
        assert_eq!(mm_ss.as_secs(), 75);

        let hh_mm_ss = parse_timecode("00:01:15.5").unwrap();
        assert_eq!(hh_mm_ss.as_millis(), 75_500);

        assert!(parse_timecode("").is_err());
        assert!(parse_timecode("1:2:3:4").is_err());
    }

    #[test]
    fn parse_timecode_rejects_unrepresentable_values() {
        assert!(parse_timecode("inf").is_err());
        assert!(parse_timecode("1e30").is_err());
        assert!(parse_timecode("00:00:1e30").is_err());
        assert_eq!(parse_timecode("-3").unwrap(), std::time::Duration::ZERO);
    }

    #[test]
    fn parse_log_level_aliases() {
        assert!(parse_log_level("warn").is_some());
        assert!(parse_log_level("QUIET").is_some());
        assert!(parse_log_level("loud").is_none());
    }

    #[test]
    fn analyze_defaults_to_single_mode() {
        let cli = Cli::try_parse_from([
            "swimframe",
            "analyze",
            "lap.mp4",
            "--endpoint",
            "http://127.0.0.1:9/api/analyze",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze { mode, endpoint, .. } => {
                assert_eq!(mode, ModeArg::Single);
                assert_eq!(endpoint, "http://127.0.0.1:9/api/analyze");
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.global.quality, 85);
    }

    #[test]
    fn sample_range_requires_both_ends() {
        let result = Cli::try_parse_from([
            "swimframe", "sample", "lap.mp4", "--out", "frames", "--start", "3",
        ]);
        assert!(result.is_err());
    }
}
