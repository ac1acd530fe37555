//! GitLab-specific API surface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tokensync_common::Result;

use crate::context::ProjectId;
use crate::remote::RemoteRepository;

/// Lowest access level that may push.
///
/// GitLab access levels:
/// - 10: Guest
/// - 20: Reporter
/// - 30: Developer
/// - 40: Maintainer
/// - 50: Owner
pub const DEVELOPER_ACCESS: u32 = 30;

/// Namespace (user or group) owning a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitlabNamespace {
    pub id: u64,
    #[serde(default)]
    pub full_path: String,
}

/// Project as returned by the projects search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitlabProject {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub path_with_namespace: String,
    pub namespace: GitlabNamespace,
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitlabUser {
    pub id: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// Membership record of a group or project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitlabMember {
    pub access_level: u32,
}

impl GitlabMember {
    pub fn can_push(&self) -> bool {
        self.access_level >= DEVELOPER_ACCESS
    }
}

/// GitLab REST operations on top of the shared repository calls.
#[async_trait]
pub trait GitlabApi: RemoteRepository {
    /// Search projects by name.
    ///
    /// With `membership`, only projects the user is a member of are returned.
    async fn search_projects(&self, query: &str, membership: bool) -> Result<Vec<GitlabProject>>;

    async fn current_user(&self) -> Result<GitlabUser>;

    /// Membership of `user_id` in group `group_id`, inherited ones included.
    async fn group_member(&self, group_id: u64, user_id: u64) -> Result<GitlabMember>;

    /// Membership of `user_id` in `project`, inherited ones included.
    async fn project_member(&self, project: &ProjectId, user_id: u64) -> Result<GitlabMember>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_levels() {
        let level = |access_level| GitlabMember { access_level };
        assert!(!level(10).can_push());
        assert!(!level(20).can_push());
        assert!(level(30).can_push());
        assert!(level(40).can_push());
        assert!(level(50).can_push());
    }

    #[test]
    fn test_project_deserialization() {
        let project: GitlabProject = serde_json::from_value(serde_json::json!({
            "name": "figma-tokens",
            "id": 35102363,
            "path": "figma-tokens",
            "path_with_namespace": "six7/figma-tokens",
            "namespace": { "full_path": "six7", "id": 51634506, "kind": "group" },
            "default_branch": "main"
        }))
        .unwrap();

        assert_eq!(project.id, 35102363);
        assert_eq!(project.namespace.id, 51634506);
    }

    #[test]
    fn test_user_without_username() {
        let user: GitlabUser =
            serde_json::from_str(r#"{"id": 11289475, "state": "active"}"#).unwrap();
        assert_eq!(user.id, 11289475);
        assert_eq!(user.state.as_deref(), Some("active"));
    }
}
