pub mod cli;
pub mod contributors;
pub mod github;
pub mod render;
pub mod repos;
pub mod scheduler;
pub mod stats;

use anyhow::{Context, Result};
use std::io::Write;
use tracing::{error, info};

use cli::Settings;
use github::GithubClient;
use scheduler::{TokioClock, collect};

/// Collect contributor stats for every configured organization and write
/// the rendered template to `out`.
///
/// Returns once every repository's statistics have been gathered. A template
/// that fails to render is logged and produces no output.
pub async fn run<W: Write>(settings: Settings, out: &mut W) -> Result<()> {
    let client = GithubClient::new(settings.token)?.with_base_url(settings.api_url);
    info!(
        orgs = ?settings.orgs,
        pattern = settings.filter.as_str(),
        authenticated = client.is_authenticated(),
        "collecting contributor stats"
    );

    let records = collect(
        &client,
        &client,
        &TokioClock,
        settings.interval,
        &settings.orgs,
        &settings.filter,
    )
    .await;

    match render::render(&settings.template, &records) {
        Ok(text) => {
            out.write_all(text.as_bytes())
                .context("Failed to write rendered output")?;
            out.flush().context("Failed to flush rendered output")?;
        }
        Err(e) => error!(error = %format!("{e:#}"), "error executing template"),
    }

    Ok(())
}
