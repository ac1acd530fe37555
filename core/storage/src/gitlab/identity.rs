//! Project resolution and write-permission check for GitLab.

use tracing::{debug, info};

use tokensync_common::{Error, Result};

use crate::context::{ProjectId, ProjectRef};

use super::api::GitlabApi;

/// Find the project whose full path is exactly `owner/repository`.
///
/// Searches the user's projects by repository name; a search hit in
/// another namespace does not count.
///
/// # Errors
/// - `ProjectNotAccessible` when nothing matches exactly
pub async fn resolve_project<A>(api: &A, owner: &str, repository: &str) -> Result<ProjectRef>
where
    A: GitlabApi + ?Sized,
{
    let full_name = format!("{}/{}", owner, repository);
    let candidates = api.search_projects(repository, true).await?;
    debug!(candidates = candidates.len(), query = %repository, "Searched GitLab projects");

    let project = candidates
        .into_iter()
        .find(|p| p.path_with_namespace == full_name)
        .ok_or_else(|| Error::ProjectNotAccessible(full_name.clone()))?;

    info!(
        project = %full_name,
        project_id = project.id,
        group_id = project.namespace.id,
        "Resolved GitLab project"
    );

    Ok(ProjectRef {
        project_id: ProjectId::from(project.id),
        group_id: Some(project.namespace.id),
    })
}

/// Whether the current user has at least developer access.
///
/// Group membership is consulted first. Only when that lookup fails is the
/// project membership used; a group member with low access stays low.
pub async fn check_write_access<A>(api: &A, project: &ProjectRef) -> Result<bool>
where
    A: GitlabApi + ?Sized,
{
    let user = api.current_user().await?;

    let member = match project.group_id {
        Some(group_id) => match api.group_member(group_id, user.id).await {
            Ok(member) => member,
            Err(e) => {
                debug!(error = %e, group_id, "Group membership lookup failed; trying project");
                api.project_member(&project.project_id, user.id).await?
            }
        },
        None => api.project_member(&project.project_id, user.id).await?,
    };

    debug!(access_level = member.access_level, user_id = user.id, "GitLab access level");
    Ok(member.can_push())
}
