use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use livecheck_core::LivenessConfig;
use livecheck_verify::CaptureConfig;
use tracing_subscriber::EnvFilter;

mod check_image;
mod replay;
mod status;

#[derive(Parser)]
#[command(name = "livecheck", about = "Liveness detection tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded detection stream (JSON lines) through the liveness engine
    Replay {
        /// Recording to replay
        file: PathBuf,
        /// TOML file with liveness thresholds
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Check a captured image: quality report, compression, mock uniform verification
    CheckImage {
        /// Encoded image (JPEG, PNG, ...)
        path: PathBuf,
        /// Seed for a reproducible mock verification
        #[arg(long)]
        seed: Option<u64>,
        /// Upload budget in KiB
        #[arg(long, default_value_t = 2048)]
        max_size_kb: usize,
    },
    /// Show status of the running livecheckd
    Status {
        /// Use the session bus instead of the system bus
        #[arg(long)]
        session_bus: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Replay { file, config } => {
            let config = match config {
                Some(path) => LivenessConfig::from_toml_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => LivenessConfig::default(),
            };
            let reader = BufReader::new(
                File::open(&file).with_context(|| format!("opening {}", file.display()))?,
            );
            let report = replay::replay(reader, config)?;
            for transition in &report.transitions {
                println!("{transition}");
            }
            println!("{} frames replayed", report.frames);
            println!("{}", serde_json::to_string_pretty(&report.snapshot)?);
        }
        Command::CheckImage {
            path,
            seed,
            max_size_kb,
        } => {
            let bytes =
                std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let config = CaptureConfig {
                max_size_kb,
                ..CaptureConfig::default()
            };
            let report = check_image::check_image(&bytes, &config, seed)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Status { session_bus } => {
            let status = status::status(session_bus).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
