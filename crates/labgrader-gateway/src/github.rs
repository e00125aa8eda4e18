//! GitHub REST adapter
//!
//! Implements [`SourceHost`] over the GitHub REST API v3. Log bundles are
//! assembled from the plain-text logs of every job in a run, so no archive
//! handling is needed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use labgrader_state::{
    GatewayResult, LogLocator, RepoHandle, SourceHost, WorkflowRun, WorkflowStatus,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{build_client, check_status, read_json, send_error};

const SERVICE: &str = "github";

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const RUNS_PER_PAGE: u32 = 100;

/// GitHub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// API base URL, without trailing slash
    pub api_url: String,
    /// Personal access or app token; anonymous access is heavily rate limited
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_url: std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }
}

impl GithubConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config for a specific API endpoint
    pub fn new(api_url: &str) -> Self {
        GithubConfig {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}

/// GitHub client
pub struct GithubClient {
    config: GithubConfig,
    http_client: reqwest::Client,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> GatewayResult<Self> {
        Ok(GithubClient {
            config,
            http_client: build_client(SERVICE)?,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> GatewayResult<Self> {
        Self::new(GithubConfig::from_env())
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.api_url, path);
        let request = self
            .http_client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET that maps 404 to `None`.
    async fn get_optional<T: serde::de::DeserializeOwned>(&self, path: &str) -> GatewayResult<Option<T>> {
        let resp = self.get(path).send().await.map_err(|e| send_error(SERVICE, e))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_json(SERVICE, resp).await.map(Some)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        let resp = self.get(path).send().await.map_err(|e| send_error(SERVICE, e))?;
        read_json(SERVICE, resp).await
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OwnerDto {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoDto {
    name: String,
    owner: OwnerDto,
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct CommitDto {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct BranchDto {
    commit: CommitDto,
}

#[derive(Debug, Deserialize)]
struct RunDto {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    head_sha: String,
    status: Option<String>,
    conclusion: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RunsPage {
    workflow_runs: Vec<RunDto>,
}

#[derive(Debug, Deserialize)]
struct JobDto {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct JobsPage {
    jobs: Vec<JobDto>,
}

/// Collapse GitHub's `status` + `conclusion` pair.
fn map_status(status: Option<&str>, conclusion: Option<&str>) -> WorkflowStatus {
    match status {
        Some("queued" | "in_progress" | "waiting" | "requested" | "pending") => {
            WorkflowStatus::Pending
        }
        Some("completed") => match conclusion {
            Some("success") => WorkflowStatus::Completed,
            Some("failure" | "timed_out" | "startup_failure") => WorkflowStatus::Failed,
            Some(other) => WorkflowStatus::Other(other.to_string()),
            None => WorkflowStatus::Other("completed".to_string()),
        },
        Some(other) => WorkflowStatus::Other(other.to_string()),
        None => WorkflowStatus::Other("unknown".to_string()),
    }
}

impl RunDto {
    fn into_run(self, repo: &RepoHandle) -> WorkflowRun {
        let status = map_status(self.status.as_deref(), self.conclusion.as_deref());
        // The last update of a finished run is when it finished.
        let completed_at = match status {
            WorkflowStatus::Pending => None,
            _ => self.updated_at,
        };
        WorkflowRun {
            name: self.name.unwrap_or_else(|| format!("run-{}", self.id)),
            head_sha: self.head_sha,
            status,
            completed_at,
            logs: LogLocator {
                owner: repo.owner.clone(),
                repo: repo.name.clone(),
                run_id: self.id,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// SourceHost
// ---------------------------------------------------------------------------

#[async_trait]
impl SourceHost for GithubClient {
    async fn user_exists(&self, handle: &str) -> GatewayResult<bool> {
        let resp = self
            .get(&format!("/users/{handle}"))
            .send()
            .await
            .map_err(|e| send_error(SERVICE, e))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(SERVICE, resp).await?;
        Ok(true)
    }

    async fn get_repo(&self, org: &str, name: &str) -> GatewayResult<Option<RepoHandle>> {
        let Some(repo) = self.get_optional::<RepoDto>(&format!("/repos/{org}/{name}")).await? else {
            debug!(org = %org, repo = %name, "repository not found");
            return Ok(None);
        };
        let branch: BranchDto = self
            .get_json(&format!(
                "/repos/{}/{}/branches/{}",
                repo.owner.login, repo.name, repo.default_branch
            ))
            .await?;

        Ok(Some(RepoHandle {
            owner: repo.owner.login,
            name: repo.name,
            default_branch: repo.default_branch,
            head_sha: branch.commit.sha,
        }))
    }

    async fn list_workflow_runs(&self, repo: &RepoHandle) -> GatewayResult<Vec<WorkflowRun>> {
        let page: RunsPage = self
            .get_json(&format!(
                "/repos/{}/{}/actions/runs?branch={}&head_sha={}&per_page={}",
                repo.owner, repo.name, repo.default_branch, repo.head_sha, RUNS_PER_PAGE
            ))
            .await?;
        debug!(repo = %repo.full_name(), runs = page.workflow_runs.len(), "listed workflow runs");
        Ok(page
            .workflow_runs
            .into_iter()
            .map(|run| run.into_run(repo))
            .collect())
    }

    async fn fetch_log_bundle(&self, locator: &LogLocator) -> GatewayResult<String> {
        let jobs: JobsPage = self
            .get_json(&format!(
                "/repos/{}/{}/actions/runs/{}/jobs?per_page=100",
                locator.owner, locator.repo, locator.run_id
            ))
            .await?;

        let mut bundle = String::new();
        for job in jobs.jobs {
            let resp = self
                .get(&format!(
                    "/repos/{}/{}/actions/jobs/{}/logs",
                    locator.owner, locator.repo, job.id
                ))
                .send()
                .await
                .map_err(|e| send_error(SERVICE, e))?;
            let text = check_status(SERVICE, resp)
                .await?
                .text()
                .await
                .map_err(|e| send_error(SERVICE, e))?;
            debug!(run = %locator, job = %job.name, bytes = text.len(), "fetched job log");
            bundle.push_str(&text);
            if !bundle.ends_with('\n') {
                bundle.push('\n');
            }
        }
        Ok(bundle)
    }
}
