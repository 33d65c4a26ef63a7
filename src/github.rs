//! Minimal GitHub REST client used by the scheduler and the metadata session.
//!
//! Requests that hit a rate limit (HTTP 429, or a 403 with an exhausted
//! `x-ratelimit-remaining` or a `retry-after` header) or a server error (5xx)
//! are retried with exponential backoff (1s, 2s, 4s, ...) up to
//! `github.max_retries` times. Network failures are retried only for GET and
//! PATCH; a POST may already have taken effect. Other client errors fail
//! immediately.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::GitHubConfig;

/// Label that marks automation pull requests as safe to merge.
pub const AUTO_MERGE_LABEL: &str = "auto-merge";

/// One entry of the releases listing.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    /// Unset on drafts.
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

/// One open pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl PullRequest {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label.name == name)
    }
}

#[derive(Serialize)]
struct NewPullRequest<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Deserialize)]
struct CreatedPullRequest {
    number: u64,
}

#[derive(Serialize)]
struct AddLabels<'a> {
    labels: &'a [&'a str],
}

/// Client bound to one `owner/name` repository.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    owner: String,
    name: String,
    token: String,
    max_retries: u32,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig, owner: &str, name: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("specs-examples/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
            token: token.to_string(),
            max_retries: config.max_retries,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// One page of releases, newest first as GitHub returns them.
    pub async fn list_releases(&self, per_page: u32, page: u32) -> Result<Vec<GitHubRelease>> {
        let path = format!("releases?per_page={}&page={}", per_page, page);
        let body = self.send(Method::GET, &path, None).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Open a pull request and return its number.
    pub async fn create_pull_request(&self, title: &str, head: &str, base: &str) -> Result<u64> {
        let request = serde_json::to_value(NewPullRequest { title, head, base })?;
        let body = self.send(Method::POST, "pulls", Some(request)).await?;
        let created: CreatedPullRequest = serde_json::from_str(&body)?;
        info!(number = created.number, "Pull request created: {}", title);
        Ok(created.number)
    }

    pub async fn add_labels(&self, number: u64, labels: &[&str]) -> Result<()> {
        let request = serde_json::to_value(AddLabels { labels })?;
        self.send(Method::POST, &format!("issues/{}/labels", number), Some(request))
            .await?;
        Ok(())
    }

    /// Open pull requests (first 100).
    pub async fn list_pull_requests(&self) -> Result<Vec<PullRequest>> {
        let body = self
            .send(Method::GET, "pulls?state=open&per_page=100", None)
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn merge_pull_request(&self, number: u64) -> Result<()> {
        let request = serde_json::json!({ "merge_method": "squash" });
        self.send(Method::PUT, &format!("pulls/{}/merge", number), Some(request))
            .await?;
        info!(number, "Pull request merged");
        Ok(())
    }

    /// Send one request with retry; returns the response body on success.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String> {
        let url = format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.name, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                warn!(attempt, "retrying {} {} in {:?}", method, url, delay);
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .http
                .request(method.clone(), &url)
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28");
            if !self.token.is_empty() {
                request = request.bearer_auth(&self.token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.text().await?);
                    }

                    let retryable = is_rate_limited(status, response.headers())
                        || status.is_server_error();
                    let text = response.text().await.unwrap_or_default();
                    if retryable {
                        last_err = Some(anyhow::anyhow!(
                            "GitHub API error {} on {} {}: {}",
                            status,
                            method,
                            url,
                            text
                        ));
                        continue;
                    }

                    bail!("GitHub API error {} on {} {}: {}", status, method, url, text);
                }
                Err(e) if method == Method::GET || method == Method::PATCH => {
                    last_err = Some(e.into());
                    continue;
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("GitHub request {} {} failed", method, url)));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("GitHub request failed after retries")))
    }
}

fn is_rate_limited(status: reqwest::StatusCode, headers: &reqwest::header::HeaderMap) -> bool {
    match status.as_u16() {
        429 => true,
        403 => {
            headers.contains_key("retry-after")
                || headers
                    .get("x-ratelimit-remaining")
                    .and_then(|value| value.to_str().ok())
                    .is_some_and(|value| value.trim() == "0")
        }
        _ => false,
    }
}

/// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, ... capped at 32s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}
