//! GitHub hosting client
//!
//! GraphQL for commit history and pull request details, REST for tags,
//! commits, repository metadata and the pull request template. Every call is
//! a single attempt; callers decide how to treat failures.

use crate::collector::url::{convert_to_git_timestamp, has_related_pull_request, DATE_FORMAT};
use crate::config::GithubConfig;
use crate::error::{DeepReleaseError, Result};
use crate::types::PullRequestInfo;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Request timeout duration
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Number of commit messages fetched per pull request
const MAX_COMMITS_PER_PR: u32 = 10;

/// Locations GitHub accepts for a pull request template
const TEMPLATE_FILENAMES: [&str; 3] = [
    "PULL_REQUEST_TEMPLATE.md",
    "pull_request_template.md",
    "PULL_REQUEST_TEMPLATE",
];

const PULL_REQUESTS_DURING_QUERY: &str = r#"
query($owner: String!, $name: String!, $since: GitTimestamp!, $until: GitTimestamp!) {
  repository(name: $name, owner: $owner) {
    defaultBranchRef {
      target {
        ... on Commit {
          history(since: $since, until: $until) {
            nodes {
              oid
              associatedPullRequests(first: 1) {
                nodes {
                  url
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

const PULL_REQUEST_INFO_QUERY: &str = r#"
query($owner: String!, $name: String!, $num: Int!, $commits: Int!) {
  repository(name: $name, owner: $owner) {
    pullRequest(number: $num) {
      commits(first: $commits) {
        nodes {
          commit {
            message
          }
        }
      }
      title
      bodyText
    }
  }
}
"#;

/// A default-branch commit and the pull request it was merged through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedPullRequestRef {
    pub oid: String,
    pub url: String,
}

/// Operations the collector needs from a source-code hosting service
#[async_trait]
pub trait HostingClient: Send + Sync {
    /// Commit and `YYYYMMDDHHMM` date of the newest tag
    ///
    /// Without tags the commit is `"None"` and the date is the repository creation date.
    async fn get_last_release(&self, owner: &str, name: &str) -> Result<(String, String)>;

    /// Pull requests merged on the default branch between two `YYYYMMDDHHMM` dates
    async fn get_pull_requests_during(
        &self,
        owner: &str,
        name: &str,
        since: &str,
        until: Option<&str>,
    ) -> Result<Vec<MergedPullRequestRef>>;

    /// Title, body text and first commit messages of a pull request
    async fn get_pull_request_info(
        &self,
        owner: &str,
        name: &str,
        number: u64,
    ) -> Result<PullRequestInfo>;

    /// Pull request template content, empty if the repository has none
    async fn get_template_content(&self, _owner: &str, _name: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// GraphQL request body
#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct TagResponse {
    commit: TagCommit,
}

#[derive(Debug, Deserialize)]
struct TagCommit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    committer: CommitSignature,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    created_at: DateTime<Utc>,
}

/// GitHub client over reqwest
pub struct GithubClient {
    config: GithubConfig,
    token: String,
    client: reqwest::Client,
}

impl GithubClient {
    /// Create a new client; the token comes from config or GITHUB_TOKEN
    pub fn new(config: GithubConfig) -> Result<Self> {
        let token = config.token().ok_or_else(|| {
            DeepReleaseError::Config(
                "GitHub token not set. Use --token, github.token or GITHUB_TOKEN".to_string(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("deeprelease/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config,
            token,
            client,
        })
    }

    /// POST a GraphQL query and surface the first reported error, if any
    async fn query_graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.config.graphql_url)
            .header("Authorization", format!("token {}", self.token))
            .json(&GraphqlRequest { query, variables })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DeepReleaseError::HostingApi(format!(
                "GraphQL request failed with status {}: {}",
                status, error_text
            )));
        }

        let data: Value = response.json().await?;
        check_graphql_errors(&data)?;
        Ok(data)
    }

    /// GET a REST resource and decode it
    async fn get_rest<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.config.rest_url, path))
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DeepReleaseError::HostingApi(format!(
                "GET {} failed with status {}: {}",
                path, status, error_text
            )));
        }

        Ok(response.json().await?)
    }
}

/// Turn a GraphQL `errors` array into a hosting API error
pub fn check_graphql_errors(data: &Value) -> Result<()> {
    match data.get("errors").and_then(Value::as_array) {
        Some(errors) if !errors.is_empty() => {
            let message = errors[0]
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(DeepReleaseError::HostingApi(format!("Bad query: {}", message)))
        }
        _ => Ok(()),
    }
}

/// Extract merged pull request references from a history response
pub fn parse_history(data: &Value) -> Result<Vec<MergedPullRequestRef>> {
    let nodes = data
        .pointer("/data/repository/defaultBranchRef/target/history/nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            DeepReleaseError::HostingApi("history response has no commit nodes".to_string())
        })?;

    let mut refs = Vec::new();
    for node in nodes {
        let oid = node.get("oid").and_then(Value::as_str).unwrap_or_default();
        if !has_related_pull_request(node) {
            debug!("Commit {} has no related pull request", oid);
            continue;
        }
        if let Some(url) = node
            .pointer("/associatedPullRequests/nodes/0/url")
            .and_then(Value::as_str)
        {
            refs.push(MergedPullRequestRef {
                oid: oid.to_string(),
                url: url.to_string(),
            });
        }
    }
    Ok(refs)
}

/// Extract title, body and commit messages from a pull request response
pub fn parse_pull_request_info(data: &Value) -> Result<PullRequestInfo> {
    let pr = data
        .pointer("/data/repository/pullRequest")
        .filter(|v| !v.is_null())
        .ok_or_else(|| {
            DeepReleaseError::HostingApi("pull request not found in response".to_string())
        })?;

    let commit_messages = pr
        .pointer("/commits/nodes")
        .and_then(Value::as_array)
        .map(|nodes| {
            nodes
                .iter()
                .filter_map(|n| n.pointer("/commit/message").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(PullRequestInfo {
        title: pr
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        body_text: pr
            .get("bodyText")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        commit_messages,
    })
}

#[async_trait]
impl HostingClient for GithubClient {
    async fn get_last_release(&self, owner: &str, name: &str) -> Result<(String, String)> {
        let tags: Vec<TagResponse> = self
            .get_rest(&format!("/repos/{}/{}/tags?per_page=1", owner, name))
            .await?;

        match tags.first() {
            Some(tag) => {
                let commit: CommitResponse = self
                    .get_rest(&format!("/repos/{}/{}/commits/{}", owner, name, tag.commit.sha))
                    .await?;
                let date = commit.commit.committer.date.format(DATE_FORMAT).to_string();
                Ok((tag.commit.sha.clone(), date))
            }
            None => {
                warn!("Can not find git tags for {}/{}", owner, name);
                let repo: RepositoryResponse =
                    self.get_rest(&format!("/repos/{}/{}", owner, name)).await?;
                Ok(("None".to_string(), repo.created_at.format(DATE_FORMAT).to_string()))
            }
        }
    }

    async fn get_pull_requests_during(
        &self,
        owner: &str,
        name: &str,
        since: &str,
        until: Option<&str>,
    ) -> Result<Vec<MergedPullRequestRef>> {
        let until = match until {
            Some(until) => until.to_string(),
            None => Utc::now().format(DATE_FORMAT).to_string(),
        };

        let variables = json!({
            "owner": owner,
            "name": name,
            "since": convert_to_git_timestamp(since)?,
            "until": convert_to_git_timestamp(&until)?,
        });

        let data = self
            .query_graphql(PULL_REQUESTS_DURING_QUERY, variables)
            .await?;
        let refs = parse_history(&data)?;
        debug!(
            "{} merged pull request commits from {} to {}",
            refs.len(),
            since,
            until
        );
        Ok(refs)
    }

    async fn get_pull_request_info(
        &self,
        owner: &str,
        name: &str,
        number: u64,
    ) -> Result<PullRequestInfo> {
        let variables = json!({
            "owner": owner,
            "name": name,
            "num": number,
            "commits": MAX_COMMITS_PER_PR,
        });

        let data = self.query_graphql(PULL_REQUEST_INFO_QUERY, variables).await?;
        parse_pull_request_info(&data)
    }

    async fn get_template_content(&self, owner: &str, name: &str) -> Result<String> {
        for filename in TEMPLATE_FILENAMES {
            let response = self
                .client
                .get(format!(
                    "{}/repos/{}/{}/contents/.github/{}",
                    self.config.rest_url, owner, name, filename
                ))
                .header("Authorization", format!("token {}", self.token))
                .header("Accept", "application/vnd.github.raw")
                .send()
                .await?;

            if response.status().is_success() {
                return Ok(response.text().await?);
            }
            debug!(
                "Failed to get content from `.github/{}`: {}",
                filename,
                response.status()
            );
        }
        Ok(String::new())
    }
}
