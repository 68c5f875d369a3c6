use anyhow::Result;
use async_trait::async_trait;

use crate::contributors::ContributorStat;

#[cfg(test)]
use mockall::automock;

/// Source of per-repository contributor statistics.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatsFetcher: Send + Sync {
    /// Contributor statistics for `org/repo`. The service computes these in
    /// the background, so early calls may fail until the data is ready.
    async fn contributor_stats(&self, org: &str, repo: &str) -> Result<Vec<ContributorStat>>;
}

/// Result of one statistics request, as the retry loop sees it.
#[derive(Debug)]
pub enum FetchOutcome {
    Ready(Vec<ContributorStat>),
    /// Any failure. "Still computing" and permanent errors are not told
    /// apart; both are retried.
    NotReady(anyhow::Error),
}

impl From<Result<Vec<ContributorStat>>> for FetchOutcome {
    fn from(res: Result<Vec<ContributorStat>>) -> Self {
        match res {
            Ok(stats) => FetchOutcome::Ready(stats),
            Err(e) => FetchOutcome::NotReady(e),
        }
    }
}
