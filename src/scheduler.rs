use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{info, warn};

use crate::contributors::{Aggregator, ContributorRecord};
use crate::repos::{RepoFilter, RepoLister, list_matching};
use crate::stats::{FetchOutcome, StatsFetcher};

/// Wait between retry sweeps (the interval the service suggests polling at).
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Timer used between sweeps, injectable so tests need not wait.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock waits on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Repositories whose statistics were not ready, grouped by organization.
///
/// An organization only has an entry while it has at least one repository
/// outstanding.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingSet {
    by_org: BTreeMap<String, Vec<String>>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `repo` behind the others of `org`. Already queued repos are ignored.
    pub fn push(&mut self, org: &str, repo: &str) {
        let repos = self.by_org.entry(org.to_string()).or_default();
        if !repos.iter().any(|r| r == repo) {
            repos.push(repo.to_string());
        }
    }

    pub fn contains(&self, org: &str, repo: &str) -> bool {
        self.by_org
            .get(org)
            .is_some_and(|repos| repos.iter().any(|r| r == repo))
    }

    pub fn is_empty(&self) -> bool {
        self.by_org.is_empty()
    }

    /// Number of pending repositories across all organizations.
    pub fn len(&self) -> usize {
        self.by_org.values().map(Vec::len).sum()
    }

    fn take(&mut self) -> BTreeMap<String, Vec<String>> {
        std::mem::take(&mut self.by_org)
    }
}

/// What happened to one `(org, repo)` pair on one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Resolved,
    Pending,
    /// Already resolved earlier in the run; not fetched.
    Skipped,
}

/// Owns the run's state: the tally, the pending set and the resolved pairs.
///
/// A pair that resolves is merged once and never fetched again. A pending
/// pair is retried on every sweep with no cap, one request at a time.
pub struct Collector<'a, F: ?Sized, C: ?Sized> {
    fetcher: &'a F,
    clock: &'a C,
    interval: Duration,
    aggregator: Aggregator,
    pending: PendingSet,
    resolved: HashSet<(String, String)>,
    fetched: usize,
    sweeps: usize,
}

impl<'a, F, C> Collector<'a, F, C>
where
    F: StatsFetcher + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(fetcher: &'a F, clock: &'a C, interval: Duration) -> Self {
        Self {
            fetcher,
            clock,
            interval,
            aggregator: Aggregator::new(),
            pending: PendingSet::new(),
            resolved: HashSet::new(),
            fetched: 0,
            sweeps: 0,
        }
    }

    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Retry sweeps run so far, not counting the first pass.
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn is_resolved(&self, org: &str, repo: &str) -> bool {
        self.resolved.contains(&(org.to_string(), repo.to_string()))
    }

    /// Fetch `org/repo` once. On success the stats are merged and the pair
    /// is marked resolved; the caller queues the pair on `Pending`.
    pub async fn attempt(&mut self, org: &str, repo: &str) -> Attempt {
        if self.is_resolved(org, repo) {
            return Attempt::Skipped;
        }

        match FetchOutcome::from(self.fetcher.contributor_stats(org, repo).await) {
            FetchOutcome::Ready(stats) => {
                self.aggregator.merge_all(stats);
                self.resolved.insert((org.to_string(), repo.to_string()));
                self.fetched += 1;
                Attempt::Resolved
            }
            FetchOutcome::NotReady(e) => {
                warn!(org, repo, error = %format!("{e:#}"), "error collecting stats");
                Attempt::Pending
            }
        }
    }

    /// List every organization and attempt each matching repository once.
    pub async fn first_pass<L>(&mut self, lister: &L, orgs: &[String], filter: &RepoFilter)
    where
        L: RepoLister + ?Sized,
    {
        for org in orgs {
            for repo in list_matching(lister, org, filter).await {
                if self.is_resolved(org, &repo) || self.pending.contains(org, &repo) {
                    continue;
                }
                info!("repo #{:02}: {}/{}", self.fetched, org, repo);
                if self.attempt(org, &repo).await == Attempt::Pending {
                    self.pending.push(org, &repo);
                }
            }
        }
    }

    /// One retry pass over everything pending, in order. Failures are
    /// queued again for the next sweep.
    pub async fn sweep(&mut self) {
        self.sweeps += 1;
        for (org, repos) in self.pending.take() {
            for repo in repos {
                info!(org = %org, repo = %repo, sweep = self.sweeps, "retrying repo");
                if self.attempt(&org, &repo).await == Attempt::Pending {
                    self.pending.push(&org, &repo);
                }
            }
        }
    }

    /// Sleep and sweep until nothing is pending.
    pub async fn settle(&mut self) {
        while !self.pending.is_empty() {
            self.clock.sleep(self.interval).await;
            self.sweep().await;
            if !self.pending.is_empty() {
                info!(pending = self.pending.len(), "repositories still waiting on stats");
            }
        }
    }

    /// Hand out the tally in final order.
    pub fn finish(self) -> Vec<ContributorRecord> {
        self.aggregator.finalize()
    }
}

/// Run a whole collection: first pass, retries until settled, final order.
pub async fn collect<L, F, C>(
    lister: &L,
    fetcher: &F,
    clock: &C,
    interval: Duration,
    orgs: &[String],
    filter: &RepoFilter,
) -> Vec<ContributorRecord>
where
    L: RepoLister + ?Sized,
    F: StatsFetcher + ?Sized,
    C: Clock + ?Sized,
{
    let mut collector = Collector::new(fetcher, clock, interval);
    collector.first_pass(lister, orgs, filter).await;
    collector.settle().await;
    let records = collector.finish();
    info!(
        contributors = records.len(),
        "dumping contributor stats for {} contributors",
        records.len()
    );
    records
}
