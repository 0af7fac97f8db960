//! Collect the pull requests merged since the last release

use crate::collector::client::HostingClient;
use crate::collector::template::remove_template;
use crate::collector::url::pull_request_url_is_valid;
use crate::error::Result;
use crate::types::PullRequest;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Gathers merged pull requests for one repository
pub struct PullRequestsCollector {
    client: Arc<dyn HostingClient>,
    owner: String,
    name: String,
}

impl PullRequestsCollector {
    pub fn new(client: Arc<dyn HostingClient>, owner: &str, name: &str) -> Self {
        Self {
            client,
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }

    /// All pull requests merged between the last release and `until` (now if absent)
    ///
    /// Invalid URLs are dropped, and of several references to one pull request the first wins.
    /// Pull requests of other repositories referenced from the history are dropped.
    /// Pull requests whose details can not be fetched are logged and skipped.
    pub async fn get_all_since_last_release(&self, until: Option<&str>) -> Result<Vec<PullRequest>> {
        let (commit, since) = self.client.get_last_release(&self.owner, &self.name).await?;
        info!(
            "Last release of {}/{}: commit {} at {}",
            self.owner, self.name, commit, since
        );

        let refs = self
            .client
            .get_pull_requests_during(&self.owner, &self.name, &since, until)
            .await?;

        let template = match self.client.get_template_content(&self.owner, &self.name).await {
            Ok(template) => template,
            Err(e) => {
                warn!("Failed to fetch pull request template: {}", e);
                String::new()
            }
        };

        let mut seen = HashSet::new();
        let mut pull_requests = Vec::new();
        for pr_ref in refs {
            if !pull_request_url_is_valid(&pr_ref.url) {
                debug!("Ignoring invalid pull request url: {}", pr_ref.url);
                continue;
            }

            let mut pr = match PullRequest::new(&pr_ref.url, &pr_ref.oid) {
                Ok(pr) => pr,
                Err(e) => {
                    debug!("Ignoring pull request {}: {}", pr_ref.url, e);
                    continue;
                }
            };
            // Numbers are only unique within one repository
            if !self.is_target_repository(&pr) {
                debug!("Ignoring pull request from another repository: {}", pr.url);
                continue;
            }
            if !seen.insert(pr.number) {
                continue;
            }

            match self
                .client
                .get_pull_request_info(&pr.owner, &pr.name, pr.number)
                .await
            {
                Ok(mut info) => {
                    if !template.is_empty() {
                        info.body_text = remove_template(&info.body_text, &template);
                    }
                    pr.set_data(&info);
                    pull_requests.push(pr);
                }
                Err(e) => warn!("Failed to fetch pull request {}: {}", pr.url, e),
            }
        }

        info!("Collected {} pull requests", pull_requests.len());
        Ok(pull_requests)
    }

    /// GitHub owner and repository names are case-insensitive
    fn is_target_repository(&self, pr: &PullRequest) -> bool {
        pr.owner.eq_ignore_ascii_case(&self.owner) && pr.name.eq_ignore_ascii_case(&self.name)
    }
}
