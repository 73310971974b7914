use clap::Parser;
use plate_reader::cli::{Args, Command, DetectArgs};
use plate_reader::config::{Config, EngineConfig, PipelineConfig};
use plate_reader::engines::BackendRegistry;
use plate_reader::{server, PlateDetector};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so `detect` output stays clean JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Serve(serve) => {
            let config = Config::from(serve);

            tracing::info!("Starting plate-reader v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!("Binding to {}:{}", config.host, config.port);

            server::run(config).await
        }
        Command::Detect(detect) => run_detect(detect).await,
    }
}

async fn run_detect(args: DetectArgs) -> anyhow::Result<()> {
    let engine = EngineConfig::from(args.engine);
    let registry = BackendRegistry::new(&engine)?;
    let backend = registry.select(&engine.backend)?;
    let detector = PlateDetector::new(backend, PipelineConfig::default());

    let path = args.image;
    let result = tokio::task::spawn_blocking(move || detector.detect_path(&path)).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
