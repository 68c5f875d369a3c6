use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::github::DEFAULT_API_URL;
use crate::render::DEFAULT_TEMPLATE;
use crate::repos::RepoFilter;
use crate::scheduler::DEFAULT_RETRY_INTERVAL;

/// Aggregate contributor commit counts across the repositories of one or
/// more organizations and print them through a template.
#[derive(Debug, Parser)]
#[command(name = "orgstats", version, after_long_help = crate::render::template_fields())]
pub struct Cli {
    /// Comma separated list of organizations
    #[arg(short = 'o', long, default_value = "devopsfaith")]
    pub orgs: String,

    /// Regex pattern for filtering repositories by name
    #[arg(short = 'p', long, default_value = RepoFilter::MATCH_ALL)]
    pub pattern: String,

    /// Personal access token
    #[arg(short = 't', long, env = "ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Template used to render the results [default: one login per line]
    #[arg(short = 'f', long, conflicts_with = "template_file")]
    pub template: Option<String>,

    /// Read the template from a file
    #[arg(long, value_name = "PATH")]
    pub template_file: Option<PathBuf>,

    /// Seconds to wait between retries of repositories whose stats are not ready
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_RETRY_INTERVAL.as_secs())]
    pub interval: u64,

    /// API root of the hosting service
    #[arg(long, value_name = "URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,
}

/// Validated run configuration.
#[derive(Debug)]
pub struct Settings {
    pub orgs: Vec<String>,
    pub filter: RepoFilter,
    pub token: Option<String>,
    pub template: String,
    pub interval: Duration,
    pub api_url: String,
}

impl Cli {
    pub fn into_settings(self) -> Result<Settings> {
        let orgs = parse_orgs(&self.orgs)?;
        let filter = RepoFilter::new(&self.pattern)?;

        let template = match (self.template, self.template_file) {
            (Some(inline), _) => inline,
            (None, Some(path)) => std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template file {}", path.display()))?,
            (None, None) => DEFAULT_TEMPLATE.to_string(),
        };

        Ok(Settings {
            orgs,
            filter,
            token: self.token.filter(|t| !t.is_empty()),
            template,
            interval: Duration::from_secs(self.interval),
            api_url: self.api_url,
        })
    }
}

/// Split a comma separated organization list, ignoring blank entries.
pub fn parse_orgs(list: &str) -> Result<Vec<String>> {
    let orgs: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();
    if orgs.is_empty() {
        anyhow::bail!("No organization given in {list:?}");
    }
    Ok(orgs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let settings = Cli::parse_from(["orgstats"]).into_settings().unwrap();
        assert_eq!(settings.orgs, vec!["devopsfaith"]);
        assert_eq!(settings.filter.as_str(), ".*");
        assert_eq!(settings.template, DEFAULT_TEMPLATE);
        assert_eq!(settings.interval, DEFAULT_RETRY_INTERVAL);
        assert_eq!(settings.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn short_flags() {
        let settings = Cli::parse_from([
            "orgstats", "-o", "org1, org2", "-p", "^svc-", "-t", "secret", "-f", "{{login}}",
        ])
        .into_settings()
        .unwrap();
        assert_eq!(settings.orgs, vec!["org1", "org2"]);
        assert!(settings.filter.accepts("svc-a"));
        assert!(!settings.filter.accepts("lib-x"));
        assert_eq!(settings.token.as_deref(), Some("secret"));
        assert_eq!(settings.template, "{{login}}");
    }

    #[test]
    fn blank_orgs_are_dropped() {
        assert_eq!(parse_orgs("a,,b, ").unwrap(), vec!["a", "b"]);
        assert!(parse_orgs(" , ").is_err());
    }

    #[test]
    fn bad_pattern_fails_before_any_request() {
        let err = Cli::parse_from(["orgstats", "-p", "("])
            .into_settings()
            .unwrap_err();
        assert!(format!("{err:#}").contains("pattern"));
    }

    #[test]
    fn template_from_file() {
        let path = std::env::temp_dir().join(format!("orgstats-tmpl-{}.hbs", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{{{{#each this}}}}{{{{login}}}},{{{{/each}}}}").unwrap();

        let settings = Cli::parse_from(["orgstats", "--template-file", path.to_str().unwrap()])
            .into_settings()
            .unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(settings.template, "{{#each this}}{{login}},{{/each}}");
    }

    #[test]
    fn inline_and_file_template_conflict() {
        let res = Cli::try_parse_from(["orgstats", "-f", "x", "--template-file", "t.hbs"]);
        assert!(res.is_err());
    }
}
