//! Repository resolution and write-permission check for GitHub.

use tracing::{debug, info};

use tokensync_common::{Error, Result};

use crate::context::{ProjectId, ProjectRef};

use super::api::{permission_allows_push, GithubApi};

/// Look up `owner/repository` and confirm the host reports the same name.
///
/// GitHub names are case-insensitive, so is the comparison. A missing or
/// hidden repository is reported as not accessible.
pub async fn resolve_project<A>(api: &A, owner: &str, repository: &str) -> Result<ProjectRef>
where
    A: GithubApi + ?Sized,
{
    let full_name = format!("{}/{}", owner, repository);
    let repo = match api.repository(owner, repository).await {
        Ok(repo) => repo,
        Err(Error::NotFound(_)) => return Err(Error::ProjectNotAccessible(full_name)),
        Err(e) => return Err(e),
    };

    if !repo.full_name.eq_ignore_ascii_case(&full_name) {
        debug!(expected = %full_name, found = %repo.full_name, "Repository name mismatch");
        return Err(Error::ProjectNotAccessible(full_name));
    }

    info!(repository = %full_name, repository_id = repo.id, "Resolved GitHub repository");
    Ok(ProjectRef {
        project_id: ProjectId::from(full_name),
        group_id: None,
    })
}

/// Whether the current user may push to the repository.
///
/// Uses the collaborator permission; when that lookup fails the repository's
/// own `permissions.push` flag decides.
pub async fn check_write_access<A>(api: &A, owner: &str, repository: &str) -> Result<bool>
where
    A: GithubApi + ?Sized,
{
    let user = api.current_user().await?;

    match api
        .collaborator_permission(owner, repository, &user.login)
        .await
    {
        Ok(permission) => {
            debug!(permission = %permission, login = %user.login, "GitHub collaborator permission");
            Ok(permission_allows_push(&permission))
        }
        Err(e) => {
            debug!(error = %e, "Collaborator permission lookup failed; using repository flags");
            let repo = api.repository(owner, repository).await?;
            Ok(repo.permissions.map(|p| p.can_push()).unwrap_or(false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{HostCall, MemoryHost, Operation};

    fn host() -> MemoryHost {
        let host = MemoryHost::new();
        host.add_project(1, "six7/figma-tokens", 2);
        host.set_current_user(7, "octocat");
        host
    }

    #[tokio::test]
    async fn test_resolve_case_insensitive() {
        let host = host();
        let project = resolve_project(&host, "Six7", "Figma-Tokens").await.unwrap();

        assert_eq!(project.project_id.as_str(), "Six7/Figma-Tokens");
        assert_eq!(project.group_id, None);
    }

    #[tokio::test]
    async fn test_resolve_missing_repository() {
        let host = host();
        let result = resolve_project(&host, "six7", "unknown").await;

        assert!(matches!(result, Err(Error::ProjectNotAccessible(_))));
    }

    #[tokio::test]
    async fn test_resolve_network_error_propagates() {
        let host = host();
        host.fail(Operation::Repository);

        let result = resolve_project(&host, "six7", "figma-tokens").await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_write_from_collaborator_permission() {
        let host = host();
        host.set_project_access(1, 7, 30);

        assert!(check_write_access(&host, "six7", "figma-tokens").await.unwrap());
        assert!(host.calls().contains(&HostCall::CollaboratorPermission {
            owner: "six7".to_string(),
            repo: "figma-tokens".to_string(),
            login: "octocat".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_read_only_collaborator() {
        let host = host();
        host.set_project_access(1, 7, 20);

        assert!(!check_write_access(&host, "six7", "figma-tokens").await.unwrap());
    }

    #[tokio::test]
    async fn test_falls_back_to_repository_flags() {
        let host = host();
        host.set_project_access(1, 7, 40);
        host.fail(Operation::CollaboratorPermission);

        assert!(check_write_access(&host, "six7", "figma-tokens").await.unwrap());
        assert!(matches!(host.calls().last(), Some(HostCall::Repository { .. })));
    }
}
