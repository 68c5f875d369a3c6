use anyhow::Result;
use clap::Parser;
use orgstats::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout only carries the rendered template.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Cli::parse().into_settings()?;

    let mut stdout = std::io::stdout().lock();
    orgstats::run(settings, &mut stdout).await
}
