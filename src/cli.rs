use crate::config::{DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_FILE_SIZE};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "plate-reader")]
#[command(about = "Number plate recognition from still images")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP upload server
    Serve(ServeArgs),
    /// Detect the plate in a single image and print the result as JSON
    Detect(DetectArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Host address to bind to
    #[arg(long, env = "PLATE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PLATE_PORT", default_value = "5000")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 16MB)
    #[arg(long, env = "PLATE_MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: usize,

    /// Detection log entries kept in memory
    #[arg(long, env = "PLATE_HISTORY_CAPACITY", default_value_t = DEFAULT_HISTORY_CAPACITY)]
    pub history_capacity: usize,

    /// Preload the vehicle registry with demo records
    #[arg(long, env = "PLATE_SAMPLE_VEHICLES")]
    pub sample_vehicles: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(clap::Args, Debug)]
pub struct DetectArgs {
    /// Image to read
    pub image: PathBuf,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct EngineArgs {
    /// OCR backend ("tesseract-cli", or "tesseract" when built with engine-tesseract)
    #[arg(long, env = "PLATE_ENGINE", default_value = "tesseract-cli")]
    pub engine: String,

    /// Path to the tesseract executable
    #[arg(long, env = "TESSERACT_CMD", default_value = "tesseract")]
    pub tesseract_cmd: String,

    /// Path to tessdata directory (uses TESSDATA_PREFIX env var if not set)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<String>,

    /// OCR language (e.g., "eng")
    #[arg(long, env = "PLATE_LANGUAGE", default_value = "eng")]
    pub language: String,
}
