use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use thumbnailer::{
    CancellationToken, FfmpegLogLevel, FfmpegVideo, ItemOutcome, ProgressCallback, ProgressInfo,
    SqliteCatalog, ThumbnailSize, ThumbnailState, Thumbnailer, ThumbnailerConfig, VideoSource,
    config::MAX_THUMBNAIL_EDGE, naming, validation,
};

const CLI_AFTER_HELP: &str = "Examples:\n  thumbnailer --catalog media.db run --thumbnails data/thumbnails --archives data/archives --limit 500 --progress\n  thumbnailer --catalog media.db status --json\n  thumbnailer --catalog media.db clear-errors\n  thumbnailer probe clip.mp4\n  thumbnailer completions zsh > _thumbnailer";

#[derive(Debug, Parser)]
#[command(
    name = "thumbnailer",
    version,
    about = "Generate thumbnails for catalogued images and videos",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    ffmpeg_log_level: Option<String>,

    /// Path to the SQLite media catalog.
    #[arg(long, global = true, default_value = "catalog.db")]
    catalog: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate thumbnails for pending catalog records.
    #[command(
        about = "Run a thumbnail generation pass",
        after_help = "Examples:\n  thumbnailer run --thumbnails data/thumbnails --archives data/archives\n  thumbnailer run --thumbnails thumbs --archives archives --size 256x256 --limit 100 --timeout 5"
    )]
    Run {
        /// Directory thumbnails are written to.
        #[arg(long)]
        thumbnails: PathBuf,
        /// Root that catalog file paths are resolved against.
        #[arg(long)]
        archives: PathBuf,
        /// Thumbnail bounding box as WIDTHxHEIGHT.
        #[arg(long, default_value = "128x128", value_parser = parse_size)]
        size: ThumbnailSize,
        /// Stop after this many thumbnails have been generated.
        #[arg(long)]
        limit: Option<u64>,
        /// Video decode timeout in seconds.
        #[arg(long, default_value = "10", value_parser = parse_timeout)]
        timeout: Duration,
        /// JPEG quality (1-100).
        #[arg(long, default_value_t = 75)]
        quality: u8,
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show how many records are pending, generated and failed.
    #[command(about = "Show catalog thumbnail counts")]
    Status {
        /// Output counts as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// List records carrying an error sentinel.
    #[command(about = "List failed records")]
    Failures {
        /// Output failures as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Clear error sentinels so failed records are retried.
    #[command(
        about = "Clear error sentinels",
        after_help = "Examples:\n  thumbnailer clear-errors\n  thumbnailer clear-errors --id 42"
    )]
    ClearErrors {
        /// Clear the thumbnail of a single record instead.
        #[arg(long)]
        id: Option<i64>,
    },

    /// Print the thumbnail filename for a platform id.
    #[command(about = "Compute a thumbnail filename")]
    Name {
        /// Stable platform identifier of the media item.
        id_on_platform: String,
        /// Thumbnail bounding box as WIDTHxHEIGHT.
        #[arg(long, default_value = "128x128", value_parser = parse_size)]
        size: ThumbnailSize,
    },

    /// Inspect a video with the corruption heuristics.
    #[command(about = "Probe a video for corruption")]
    Probe {
        /// Input video path.
        input: PathBuf,
        /// Output diagnostics as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_size(value: &str) -> Result<ThumbnailSize, String> {
    let size: ThumbnailSize = value
        .parse()
        .map_err(|error: thumbnailer::ThumbnailError| error.to_string())?;
    if size.width == 0 || size.height == 0 {
        return Err(format!("thumbnail size must be non-zero: {value}"));
    }
    if size.width > MAX_THUMBNAIL_EDGE || size.height > MAX_THUMBNAIL_EDGE {
        return Err(format!(
            "thumbnail size must not exceed {MAX_THUMBNAIL_EDGE} per edge: {value}"
        ));
    }
    Ok(size)
}

/// Route Ctrl-C into a cancellation token. The first press lets the item in
/// flight finish and stops the run; a second press exits immediately.
fn interrupt_token() -> Result<CancellationToken, ctrlc::Error> {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            std::process::exit(130);
        }
        eprintln!(
            "{} stopping after the current item (Ctrl-C again to quit)",
            "interrupt".yellow().bold()
        );
        handler_token.cancel();
    })?;
    Ok(token)
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    let seconds = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid timeout: {value}"))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("timeout must be a positive number of seconds: {value}"));
    }
    Duration::try_from_secs_f64(seconds).map_err(|error| format!("invalid timeout: {error}"))
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let default_filter = if global.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    if let Some(level) = &global.ffmpeg_log_level {
        let parsed: FfmpegLogLevel = level
            .parse()
            .map_err(|_| format!("unsupported --ffmpeg-log-level: {level}"))?;
        thumbnailer::set_ffmpeg_log_level(parsed);
    }

    Ok(())
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(length: u64) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(length);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        match (info.limit, info.outcome) {
            (Some(_), ItemOutcome::Generated) | (None, _) => self.bar.inc(1),
            _ => {}
        }
        self.bar.set_message(format!(
            "{} ok, {} failed, {} conflicts",
            info.generated, info.failed, info.conflicts
        ));
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "thumbnailer", &mut std::io::stdout());
        return Ok(());
    }

    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Run {
            thumbnails,
            archives,
            size,
            limit,
            timeout,
            quality,
            progress,
            json,
        } => {
            let catalog = SqliteCatalog::open(&cli.global.catalog)?;
            let pending = catalog.counts()?.pending;
            let interrupt = interrupt_token()?;

            let mut config = ThumbnailerConfig::new(thumbnails, archives)
                .with_size(size)
                .with_video_timeout(timeout)
                .with_jpeg_quality(quality)
                .with_cancellation(interrupt.clone());

            let terminal = if progress {
                let length = limit.map_or(pending, |limit| limit.min(pending));
                let terminal = Arc::new(TerminalProgress::new(length)?);
                config = config.with_progress(Arc::clone(&terminal) as Arc<dyn ProgressCallback>);
                Some(terminal)
            } else {
                None
            };

            let mut thumbnailer = Thumbnailer::new(catalog, config)?;
            let summary = thumbnailer.run(limit)?;

            if let Some(terminal) = terminal {
                terminal.bar.finish_and_clear();
            }
            if interrupt.is_cancelled() {
                log::warn!("Run interrupted after {} records", summary.claimed);
            }

            if json {
                let payload = json!({
                    "claimed": summary.claimed,
                    "generated": summary.generated,
                    "failed": summary.failed,
                    "conflicts": summary.conflicts,
                    "elapsed_seconds": summary.elapsed.as_secs_f64(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {} generated, {} failed, {} conflicts in {:.1?}",
                    "done".green().bold(),
                    summary.generated,
                    summary.failed,
                    summary.conflicts,
                    summary.elapsed
                );
            }
        }
        Commands::Status { json } => {
            let catalog = SqliteCatalog::open(&cli.global.catalog)?;
            let counts = catalog.counts()?;
            if json {
                let payload = json!({
                    "pending": counts.pending,
                    "generated": counts.generated,
                    "failed": counts.failed,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Pending: {}", counts.pending);
                println!("Generated: {}", counts.generated);
                println!("Failed: {}", counts.failed);
            }
        }
        Commands::Failures { json } => {
            let catalog = SqliteCatalog::open(&cli.global.catalog)?;
            let failures = catalog.failures()?;
            if json {
                let payload: Vec<_> = failures
                    .iter()
                    .map(|record| {
                        let reason = match &record.thumbnail {
                            ThumbnailState::Failed { reason } => Some(reason.as_str()),
                            _ => None,
                        };
                        json!({
                            "id": record.id,
                            "id_on_platform": record.id_on_platform,
                            "media_type": record.media_type.as_column(),
                            "local_path": record.local_path,
                            "reason": reason,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if failures.is_empty() {
                println!("{}", "no failed records".green());
            } else {
                for record in &failures {
                    if let ThumbnailState::Failed { reason } = &record.thumbnail {
                        println!(
                            "{} {} [{}] {}: {}",
                            "failed".red().bold(),
                            record.id,
                            record.media_type,
                            record.local_path,
                            reason
                        );
                    }
                }
            }
        }
        Commands::ClearErrors { id } => {
            let catalog = SqliteCatalog::open(&cli.global.catalog)?;
            match id {
                Some(id) => {
                    if catalog.clear_thumbnail(id)? {
                        println!("{} media ID {id}", "cleared".green().bold());
                    } else {
                        return Err(format!("no media record with ID {id}").into());
                    }
                }
                None => {
                    let cleared = catalog.clear_errors()?;
                    println!("{} {cleared} error sentinels", "cleared".green().bold());
                }
            }
        }
        Commands::Name {
            id_on_platform,
            size,
        } => {
            println!("{}", naming::thumbnail_filename(&id_on_platform, size));
        }
        Commands::Probe { input, json } => {
            let video = FfmpegVideo::open(&input, CancellationToken::new())?;
            let diagnostics = video.diagnostics();
            let verdict =
                validation::validate(diagnostics, &validation::CorruptionThresholds::default());

            if json {
                let payload = json!({
                    "frame_count": diagnostics.frame_count,
                    "width": diagnostics.width,
                    "height": diagnostics.height,
                    "fps": diagnostics.frames_per_second,
                    "codec": diagnostics.codec_tag,
                    "backend": diagnostics.backend_name,
                    "byte_size": diagnostics.byte_size,
                    "error": verdict.as_ref().err().map(ToString::to_string),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{diagnostics}");
                match verdict {
                    Ok(()) => println!("{}", "ok".green().bold()),
                    Err(error) => println!("{} {error}", "corrupt".red().bold()),
                }
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
