//! clipseek - cut recordings between two frames found by ffmpeg image matching.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipseek::batch::{BatchDriver, FilenameTitle, TesseractTitle, TitleSource};
use clipseek::config::{ConfigLoader, Settings};
use clipseek::display;
use clipseek::ffmpeg::{FfmpegTool, Timecode};
use clipseek::supervisor::{CancellationRegistry, ExitState, ProcessSupervisor};

#[derive(Parser)]
#[command(
    name = "clipseek",
    about = "Cut recordings between two frames found by ffmpeg image matching",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to ./clipseek.toml, then the user config dir).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every recording in the configured source folder.
    Run {
        /// Override the source folder.
        #[arg(long)]
        source: Option<PathBuf>,
        /// Override the output folder.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Override the file name filter.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Find the first frame of a movie that matches a still image.
    Find {
        movie: PathBuf,
        image: PathBuf,
    },
    /// Extract one frame as a still image.
    Extract {
        movie: PathBuf,
        output: PathBuf,
        /// Position as hh:mm:ss.
        #[arg(long, default_value = "00:00:00")]
        start: Timecode,
    },
    /// Convert a time range of a video.
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Start as hh:mm:ss.
        #[arg(long)]
        start: Timecode,
        /// Duration as hh:mm:ss.
        #[arg(long)]
        duration: Timecode,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Cancel everything, including steps not yet started, once Ctrl-C is pressed.
fn spawn_interrupt_handler(registry: Arc<CancellationRegistry>, extra: Option<CancellationToken>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping");
            if let Some(token) = extra {
                token.cancel();
            }
            registry.close();
        }
    });
}

fn title_source(settings: &Settings, registry: &Arc<CancellationRegistry>) -> Box<dyn TitleSource> {
    if settings.ocr.enabled {
        let supervisor = ProcessSupervisor::new()
            .with_terminate_grace(settings.tool.terminate_grace())
            .with_max_runtime(settings.tool.max_runtime());
        Box::new(TesseractTitle::new(
            settings.ocr.tesseract_path.clone(),
            settings.ocr.min_confidence,
            supervisor,
            Arc::clone(registry),
        ))
    } else {
        Box::new(FilenameTitle)
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let loader = cli.config.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let mut settings = loader.load()?;

    let registry = Arc::new(CancellationRegistry::new());
    let ffmpeg = FfmpegTool::new(
        settings.tool.clone(),
        settings.detect.clone(),
        Arc::clone(&registry),
    );

    match cli.command {
        Commands::Run {
            source,
            output,
            filter,
        } => {
            if let Some(source) = source {
                settings.batch.source_folder = source;
            }
            if let Some(output) = output {
                settings.batch.output_folder = output;
            }
            if let Some(filter) = filter {
                settings.batch.filename_filter = filter;
            }

            let titles = title_source(&settings, &registry);
            let driver = BatchDriver::new(
                settings.batch.clone(),
                settings.detect.clone(),
                ffmpeg,
                titles,
            );
            spawn_interrupt_handler(Arc::clone(&registry), Some(driver.shutdown_token()));
            let summary = driver.run().await?;
            if summary.failed > 0 {
                return Err(format!("{} file(s) failed", summary.failed).into());
            }
        }
        Commands::Find { movie, image } => {
            spawn_interrupt_handler(Arc::clone(&registry), None);
            let found = ffmpeg.find_frame_by_image(&movie, &image).await?;
            display::print_match(&image, found);
        }
        Commands::Extract {
            movie,
            output,
            start,
        } => {
            spawn_interrupt_handler(Arc::clone(&registry), None);
            let report = ffmpeg.extract_image(&movie, &output, start).await?;
            if report.state != ExitState::NaturalExit {
                return Err("extraction interrupted".into());
            }
        }
        Commands::Convert {
            input,
            output,
            start,
            duration,
        } => {
            spawn_interrupt_handler(Arc::clone(&registry), None);
            let report = ffmpeg.convert(&input, &output, start, duration).await?;
            if report.state != ExitState::NaturalExit {
                return Err("conversion interrupted".into());
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
