use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::contributors::{Contributor, ContributorStat, null_as_default};
use crate::repos::RepoLister;
use crate::stats::StatsFetcher;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Repositories requested per listing page (the service maximum).
const PER_PAGE: usize = 100;

#[derive(Deserialize)]
struct RepoNode {
    name: String,
}

#[derive(Deserialize)]
struct ContributorStatsNode {
    #[serde(default, deserialize_with = "null_as_default")]
    total: u64,
    author: Option<AuthorNode>,
}

impl ContributorStatsNode {
    /// Nodes without an author (deleted accounts) carry nothing to tally.
    fn into_stat(self) -> Option<ContributorStat> {
        let author = self.author?;
        let count = author.contributions.unwrap_or(self.total);
        Some(ContributorStat::new(author.profile, count))
    }
}

#[derive(Deserialize)]
struct AuthorNode {
    #[serde(flatten)]
    profile: Contributor,
    contributions: Option<u64>,
}

/// REST client for the hosting service, built once and shared by reference.
///
/// Without a token every request is anonymous, which works for public data
/// but hits a much lower rate limit.
#[derive(Clone)]
pub struct GithubClient {
    token: Option<Arc<String>>,
    base_url: Arc<String>,
    http: Arc<Client>,
}

impl GithubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("orgstats/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            token: token.filter(|t| !t.is_empty()).map(Arc::new),
            base_url: Arc::new(DEFAULT_API_URL.to_string()),
            http: Arc::new(http),
        })
    }

    /// Point the client at another API root (GitHub Enterprise, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url: String = base_url.into();
        self.base_url = Arc::new(url.trim_end_matches('/').to_string());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Low-level GET. Only transport failures are errors here; status
    /// handling is left to the caller.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .http
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .query(query);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token.as_str());
        }

        req.send()
            .await
            .map_err(|e| anyhow::anyhow!("Network error requesting {url}: {e}"))
    }

    async fn fail(resp: Response) -> anyhow::Error {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::anyhow!("GitHub API returned HTTP {}: {}", status.as_u16(), body.trim())
    }

    /// One page of public repositories for `org` (1-based).
    pub async fn list_repos_page(&self, org: &str, page: usize) -> Result<Vec<String>> {
        let resp = self
            .get(
                &format!("/orgs/{org}/repos"),
                &[
                    ("type", "public".to_string()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ],
            )
            .await?;

        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }

        let nodes: Vec<RepoNode> = resp
            .json()
            .await
            .with_context(|| format!("Failed to deserialize repository page {page} of {org}"))?;
        Ok(nodes.into_iter().map(|n| n.name).collect())
    }

    /// All public repositories of `org`, walking pages until a short one.
    ///
    /// Only a failure on the first page is an error; a later failure keeps
    /// whatever was listed before it.
    pub async fn list_org_repos(&self, org: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut page = 1;

        loop {
            let names = match self.list_repos_page(org, page).await {
                Ok(names) => names,
                Err(e) if page > 1 => {
                    warn!(org, page, error = %format!("{e:#}"), "stopping repository listing early");
                    break;
                }
                Err(e) => {
                    return Err(e.context(format!("Failed to list repositories of {org}")));
                }
            };

            let last = names.len() < PER_PAGE;
            debug!(org, page, count = names.len(), "listed repository page");
            out.extend(names);
            if last {
                break;
            }
            page += 1;
        }

        Ok(out)
    }

    /// Contributor statistics for one repository.
    ///
    /// `202 Accepted` means the service started computing the statistics and
    /// has nothing to return yet; that is reported as an error so the caller
    /// asks again later. `204 No Content` is an empty repository.
    pub async fn repo_contributor_stats(
        &self,
        org: &str,
        repo: &str,
    ) -> Result<Vec<ContributorStat>> {
        let resp = self
            .get(&format!("/repos/{org}/{repo}/stats/contributors"), &[])
            .await?;

        match resp.status() {
            StatusCode::ACCEPTED => {
                return Err(anyhow::anyhow!(
                    "statistics for {org}/{repo} are still being computed"
                ));
            }
            StatusCode::NO_CONTENT => return Ok(Vec::new()),
            s if !s.is_success() => return Err(Self::fail(resp).await),
            _ => {}
        }

        let nodes: Vec<ContributorStatsNode> = resp
            .json()
            .await
            .with_context(|| format!("Failed to deserialize contributor stats of {org}/{repo}"))?;

        Ok(nodes
            .into_iter()
            .filter_map(ContributorStatsNode::into_stat)
            .collect())
    }
}

#[async_trait]
impl RepoLister for GithubClient {
    async fn list_repos(&self, org: &str) -> Result<Vec<String>> {
        self.list_org_repos(org).await
    }
}

#[async_trait]
impl StatsFetcher for GithubClient {
    async fn contributor_stats(&self, org: &str, repo: &str) -> Result<Vec<ContributorStat>> {
        self.repo_contributor_stats(org, repo).await
    }
}
