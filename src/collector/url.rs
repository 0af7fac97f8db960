//! Pull request URL helpers and git timestamp conversion

use crate::error::{DeepReleaseError, Result};
use chrono::{NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static PR_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://github\.com/[0-9A-Za-z\-_.]+/[0-9A-Za-z\-_.]+/pull/\d+$")
        .expect("valid pull request url regex")
});

/// Timestamp layout used for release dates (`YYYYMMDDHHMM`)
pub const DATE_FORMAT: &str = "%Y%m%d%H%M";

/// Check if the url is a valid pull request url
pub fn pull_request_url_is_valid(url: &str) -> bool {
    PR_URL_PATTERN.is_match(url)
}

/// Parse a pull request URL into (owner, name, number)
pub fn parse_pull_request_url(url: &str) -> Result<(String, String, u64)> {
    let parts: Vec<&str> = url.trim_end_matches('/').split('/').collect();
    if parts.len() != 7 || parts[5] != "pull" {
        return Err(DeepReleaseError::InvalidUrl(url.to_string()));
    }

    let number = parts[6]
        .parse::<u64>()
        .map_err(|_| DeepReleaseError::InvalidUrl(url.to_string()))?;

    Ok((parts[3].to_string(), parts[4].to_string(), number))
}

/// Whether a history node has at least one associated pull request
pub fn has_related_pull_request(commit: &Value) -> bool {
    commit
        .pointer("/associatedPullRequests/nodes")
        .and_then(Value::as_array)
        .map_or(false, |nodes| !nodes.is_empty())
}

/// Parse a `YYYYMMDDHHMM` date
pub fn parse_date(date: &str) -> Result<NaiveDateTime> {
    if date.len() != 12 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DeepReleaseError::InvalidDate(date.to_string()));
    }
    NaiveDateTime::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| DeepReleaseError::InvalidDate(date.to_string()))
}

/// Convert a `YYYYMMDDHHMM` date into a GraphQL `GitTimestamp` (RFC 3339, UTC)
pub fn convert_to_git_timestamp(date: &str) -> Result<String> {
    let naive = parse_date(date)?;
    Ok(Utc
        .from_utc_datetime(&naive)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_pull_request_url() {
        assert!(pull_request_url_is_valid(
            "https://github.com/apache/skywalking-python/pull/175"
        ));
        assert!(!pull_request_url_is_valid("https://google.com"));
        assert!(!pull_request_url_is_valid(
            "https://github.com/apache/skywalking-python/issues/175"
        ));
    }

    #[test]
    fn test_parse_pull_request_url() {
        let (owner, name, number) =
            parse_pull_request_url("https://github.com/apache/skywalking-python/pull/175").unwrap();
        assert_eq!(owner, "apache");
        assert_eq!(name, "skywalking-python");
        assert_eq!(number, 175);

        assert!(parse_pull_request_url("https://github.com/apache/pull/x").is_err());
    }

    #[test]
    fn test_has_related_pull_request() {
        assert!(!has_related_pull_request(
            &json!({"associatedPullRequests": {"nodes": []}})
        ));
        assert!(has_related_pull_request(
            &json!({"associatedPullRequests": {"nodes": [1, 2, 3]}})
        ));
        assert!(!has_related_pull_request(&json!({"oid": "abc"})));
    }

    #[test]
    fn test_convert_to_git_timestamp() {
        assert_eq!(
            convert_to_git_timestamp("202210142230").unwrap(),
            "2022-10-14T22:30:00Z"
        );
        assert!(convert_to_git_timestamp("20221014").is_err());
        assert!(convert_to_git_timestamp("202213142230").is_err());
    }
}
