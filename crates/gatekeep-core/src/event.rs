//! Inbound source-control notifications.

use crate::ids::EventId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Role of a pull request author relative to the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorRole {
    Member,
    NonMember,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::str::FromStr for AuthorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "MEMBER" => Ok(AuthorRole::Member),
            "NON_MEMBER" => Ok(AuthorRole::NonMember),
            "UNKNOWN" => Ok(AuthorRole::Unknown),
            other => Err(format!("Unknown author role: {}", other)),
        }
    }
}

/// Kind of source-control event a trigger listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VcsEventKind {
    Push,
    PullRequest,
}

/// A single notification from the source-control webhook listener.
///
/// Created per notification and consumed within one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VcsEvent {
    #[serde(default)]
    pub id: Option<EventId>,
    pub branch: String,
    #[serde(default)]
    pub commit_message: String,
    #[serde(default)]
    pub is_pull_request: bool,
    #[serde(default)]
    pub author_role: AuthorRole,
    #[serde(default)]
    pub target_branch: Option<String>,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub changed_paths: Vec<String>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

impl VcsEvent {
    /// A push to `branch` with the given commit message.
    pub fn push(branch: impl Into<String>, commit_message: impl Into<String>) -> Self {
        Self {
            id: Some(EventId::new()),
            branch: branch.into(),
            commit_message: commit_message.into(),
            is_pull_request: false,
            author_role: AuthorRole::Unknown,
            target_branch: None,
            is_draft: false,
            changed_paths: vec![],
            commit_sha: None,
            author: None,
        }
    }

    /// A pull request from `branch` into `target_branch`.
    pub fn pull_request(
        branch: impl Into<String>,
        target_branch: impl Into<String>,
        author_role: AuthorRole,
    ) -> Self {
        Self {
            is_pull_request: true,
            author_role,
            target_branch: Some(target_branch.into()),
            ..Self::push(branch, "")
        }
    }

    pub fn with_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.changed_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn draft(mut self) -> Self {
        self.is_draft = true;
        self
    }

    pub fn kind(&self) -> VcsEventKind {
        if self.is_pull_request {
            VcsEventKind::PullRequest
        } else {
            VcsEventKind::Push
        }
    }

    /// Branch name with any `refs/heads/` prefix removed.
    pub fn logical_branch(&self) -> &str {
        strip_ref_prefix(&self.branch)
    }
}

/// Strip the `refs/heads/` prefix git uses for fully-qualified branch refs.
pub fn strip_ref_prefix(branch: &str) -> &str {
    branch.strip_prefix("refs/heads/").unwrap_or(branch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_role_parse() {
        assert_eq!("member".parse::<AuthorRole>().unwrap(), AuthorRole::Member);
        assert_eq!("non-member".parse::<AuthorRole>().unwrap(), AuthorRole::NonMember);
        assert!("owner".parse::<AuthorRole>().is_err());
    }

    #[test]
    fn test_author_role_deserialize_unknown() {
        let role: AuthorRole = serde_json::from_str("\"COLLABORATOR\"").unwrap();
        assert_eq!(role, AuthorRole::Unknown);
    }

    #[test]
    fn test_logical_branch() {
        let event = VcsEvent::push("refs/heads/release/15.6", "bump");
        assert_eq!(event.logical_branch(), "release/15.6");
        assert_eq!(VcsEvent::push("develop", "").logical_branch(), "develop");
    }

    #[test]
    fn test_kind() {
        assert_eq!(VcsEvent::push("develop", "").kind(), VcsEventKind::Push);
        let pr = VcsEvent::pull_request("feature/login", "develop", AuthorRole::Member);
        assert_eq!(pr.kind(), VcsEventKind::PullRequest);
    }

    #[test]
    fn test_event_from_minimal_json() {
        let event: VcsEvent = serde_json::from_str(r#"{"branch": "develop"}"#).unwrap();
        assert!(!event.is_pull_request);
        assert_eq!(event.author_role, AuthorRole::Unknown);
        assert!(event.changed_paths.is_empty());
    }
}
