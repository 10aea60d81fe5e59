use anyhow::Result;
use clap::Parser;
use rampartctl::{
    cli::{self, Cli},
    loader::{CONFIG_PATH_VAR, ConfigLoader},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::from_process_env()?;
    if let Some(path) = &cli.config {
        loader = loader.with_var(CONFIG_PATH_VAR, path.to_string_lossy());
    }
    let (config, source) = loader.load()?;

    // RUST_LOG wins over the configured filter.
    let fallback = config.log_filter.clone().unwrap_or_else(|| "info".into());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(target: "rampart::ctl", source = %source, "configuration loaded");

    let mut stdout = std::io::stdout().lock();
    cli::run(cli.command, config, &source, &mut stdout).await
}
