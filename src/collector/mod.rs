//! Pull request collection from the hosting service
//!
//! - `client`: the [`HostingClient`] trait and its GitHub implementation
//! - `pull_requests`: gathers merged pull requests since the last release
//! - `template`: strips pull request template text from descriptions
//! - `url`: URL and date helpers

pub mod client;
pub mod pull_requests;
pub mod template;
pub mod url;

pub use client::{GithubClient, HostingClient, MergedPullRequestRef};
pub use pull_requests::PullRequestsCollector;
