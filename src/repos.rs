use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::error;

#[cfg(test)]
use mockall::automock;

/// Source of repository names for an organization.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RepoLister: Send + Sync {
    /// Every public repository name owned by `org`, in listing order.
    async fn list_repos(&self, org: &str) -> Result<Vec<String>>;
}

/// Repository name filter.
///
/// Matching is a regex search anywhere in the name, so `svc` accepts
/// `my-svc`. Anchor the pattern (`^svc-.*$`) for a whole-name match.
#[derive(Debug, Clone)]
pub struct RepoFilter {
    re: Regex,
}

impl RepoFilter {
    pub const MATCH_ALL: &'static str = ".*";

    pub fn new(pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern)
            .with_context(|| format!("Invalid repository name pattern {pattern:?}"))?;
        Ok(Self { re })
    }

    pub fn accepts(&self, name: &str) -> bool {
        self.re.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        self.re.as_str()
    }
}

/// List `org` and keep the names `filter` accepts.
///
/// A listing failure is logged and yields no repositories; it never stops
/// the run.
pub async fn list_matching<L>(lister: &L, org: &str, filter: &RepoFilter) -> Vec<String>
where
    L: RepoLister + ?Sized,
{
    match lister.list_repos(org).await {
        Ok(names) => names.into_iter().filter(|n| filter.accepts(n)).collect(),
        Err(e) => {
            error!(org, error = %format!("{e:#}"), "failed to list repositories");
            Vec::new()
        }
    }
}
