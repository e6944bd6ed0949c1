//! ABAP Environment Git repository tagging.
//!
//! The step builds a backlog of repository/tag work items, primes a CSRF
//! session against the MANAGE_GIT_REPOSITORY OData service, then performs a
//! create+poll cycle per tag. See `backlog`, `tags` and `poll`.

use std::path::PathBuf;

pub mod backlog;
pub mod poll;
pub mod tags;

/// Connection state for one request sequence against the ABAP system.
///
/// The CSRF token is fetched once per batch by the tag session and reused
/// for every write in that batch.
#[derive(Debug, Clone)]
pub struct ConnectionDetails {
    pub url: String,
    pub host: String,
    pub user: String,
    pub password: String,
    pub csrf_token: Option<String>,
}

impl ConnectionDetails {
    /// Headers for a request against this connection. Writes carry the
    /// session's CSRF token once it has been fetched.
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        if let Some(token) = &self.csrf_token {
            headers.push(("x-csrf-token".to_string(), token.clone()));
        }
        headers
    }
}

/// Remote operation state as reported by the status endpoint.
///
/// The backend encodes status as a single character; `R` is the only
/// non-terminal value and `E` the only explicit failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Running,
    Failed,
    Completed(String),
}

impl OperationStatus {
    pub fn from_code(code: &str) -> Self {
        match code {
            "R" => OperationStatus::Running,
            "E" => OperationStatus::Failed,
            other => OperationStatus::Completed(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Running)
    }
}

/// Options for the tag-creation step.
#[derive(Debug, Clone, Default)]
pub struct CreateTagConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    /// Path to the addon descriptor listing repositories to tag.
    pub repositories: Option<PathBuf>,
    /// Explicit single repository/commit pair, tagged in addition to the
    /// descriptor's repositories.
    pub repository_name: Option<String>,
    pub commit_id: Option<String>,
    /// Extra tag broadcast to every backlog item.
    pub tag_name: Option<String>,
    pub tag_description: Option<String>,
    /// Broadcast a `<addonProduct>-<addonVersion>` tag to every item.
    pub create_tag_for_addon_product_version: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_is_the_only_non_terminal_status() {
        assert!(!OperationStatus::from_code("R").is_terminal());
        assert!(OperationStatus::from_code("E").is_terminal());
        assert!(OperationStatus::from_code("S").is_terminal());
    }

    #[test]
    fn unknown_codes_are_treated_as_completed() {
        assert_eq!(
            OperationStatus::from_code("X"),
            OperationStatus::Completed("X".to_string())
        );
        assert_eq!(OperationStatus::from_code("E"), OperationStatus::Failed);
    }

    #[test]
    fn csrf_token_is_attached_once_present() {
        let mut connection = ConnectionDetails {
            url: "https://abap.example".to_string(),
            host: "https://abap.example".to_string(),
            user: "user".to_string(),
            password: "pass".to_string(),
            csrf_token: None,
        };
        assert!(!connection
            .headers()
            .iter()
            .any(|(n, _)| n == "x-csrf-token"));

        connection.csrf_token = Some("abc".to_string());
        assert!(connection
            .headers()
            .contains(&("x-csrf-token".to_string(), "abc".to_string())));
    }
}
