//! GitHub-specific API surface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tokensync_common::Result;

use crate::remote::RemoteRepository;

/// Permission flags of the authenticated user on a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryPermissions {
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub maintain: bool,
    #[serde(default)]
    pub push: bool,
    #[serde(default)]
    pub pull: bool,
}

impl RepositoryPermissions {
    pub fn can_push(&self) -> bool {
        self.admin || self.maintain || self.push
    }
}

/// Repository as returned by `GET /repos/{owner}/{repo}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubRepository {
    pub id: u64,
    pub full_name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    /// Only present for authenticated requests.
    #[serde(default)]
    pub permissions: Option<RepositoryPermissions>,
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubUser {
    pub id: u64,
    pub login: String,
}

/// Whether a collaborator permission name allows pushing.
///
/// GitHub reports `admin`, `maintain`, `write`, `triage`, `read` or `none`.
pub fn permission_allows_push(permission: &str) -> bool {
    matches!(permission, "admin" | "maintain" | "write")
}

/// GitHub REST operations on top of the shared repository calls.
#[async_trait]
pub trait GithubApi: RemoteRepository {
    async fn repository(&self, owner: &str, repo: &str) -> Result<GithubRepository>;

    async fn current_user(&self) -> Result<GithubUser>;

    /// Permission name of `login` on `owner/repo`.
    async fn collaborator_permission(&self, owner: &str, repo: &str, login: &str)
        -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_names() {
        assert!(permission_allows_push("admin"));
        assert!(permission_allows_push("maintain"));
        assert!(permission_allows_push("write"));
        assert!(!permission_allows_push("triage"));
        assert!(!permission_allows_push("read"));
        assert!(!permission_allows_push("none"));
    }

    #[test]
    fn test_repository_permissions() {
        let repo: GithubRepository = serde_json::from_value(serde_json::json!({
            "id": 1296269,
            "full_name": "six7/figma-tokens",
            "default_branch": "main",
            "permissions": { "admin": false, "push": true, "pull": true }
        }))
        .unwrap();

        let permissions = repo.permissions.unwrap();
        assert!(permissions.can_push());
        assert!(!permissions.maintain);
    }

    #[test]
    fn test_repository_without_permissions() {
        let repo: GithubRepository =
            serde_json::from_str(r#"{"id": 1, "full_name": "a/b"}"#).unwrap();
        assert!(repo.permissions.is_none());
    }
}
