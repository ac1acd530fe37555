//! GitLab token storage provider.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::warn;

use tokensync_common::{RemoteFile, Result};

use crate::context::{FileLayout, ProjectRef, ProviderContext};
use crate::provider::TokenStorage;
use crate::remote::CommitInfo;
use crate::sync;

use super::api::GitlabApi;
use super::client::GitlabClient;
use super::identity;

/// Token storage backed by a GitLab project.
///
/// The project is looked up by `owner/repository` on first use and kept
/// for the lifetime of the instance, as is the permission check.
pub struct GitlabTokenStorage<A = GitlabClient> {
    api: A,
    context: ProviderContext,
    project: OnceCell<ProjectRef>,
    writable: OnceCell<bool>,
}

impl GitlabTokenStorage<GitlabClient> {
    /// Create a provider talking to the host named in `context`.
    ///
    /// # Errors
    /// - Invalid base URL
    pub fn new(context: ProviderContext) -> Result<Self> {
        let api = GitlabClient::new(context.secret.clone(), context.base_url.as_deref())?;
        Ok(Self::with_api(api, context))
    }
}

impl<A: GitlabApi> GitlabTokenStorage<A> {
    /// Create a provider on top of an existing API implementation.
    pub fn with_api(api: A, context: ProviderContext) -> Self {
        Self {
            api,
            context,
            project: OnceCell::new(),
            writable: OnceCell::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    async fn try_read(&self) -> Result<Vec<RemoteFile>> {
        let project = self.assign_project_id().await?;
        sync::pull(&self.api, &project.project_id, &self.context).await
    }
}

#[async_trait]
impl<A: GitlabApi> TokenStorage for GitlabTokenStorage<A> {
    fn name(&self) -> &str {
        "gitlab"
    }

    fn context(&self) -> &ProviderContext {
        &self.context
    }

    fn select_branch(&mut self, branch: &str) {
        self.context.branch = branch.to_string();
    }

    fn change_path(&mut self, path: &str) {
        self.context.set_path(path);
    }

    fn enable_multi_file(&mut self) {
        self.context.layout = FileLayout::MultiFile;
    }

    fn disable_multi_file(&mut self) {
        self.context.layout = FileLayout::SingleFile;
    }

    async fn assign_project_id(&self) -> Result<ProjectRef> {
        self.project
            .get_or_try_init(|| {
                identity::resolve_project(&self.api, &self.context.owner, &self.context.repository)
            })
            .await
            .cloned()
    }

    async fn can_write(&self) -> Result<bool> {
        let project = self.assign_project_id().await?;
        self.writable
            .get_or_try_init(|| identity::check_write_access(&self.api, &project))
            .await
            .copied()
    }

    async fn read(&self) -> Vec<RemoteFile> {
        match self.try_read().await {
            Ok(files) => files,
            Err(e) => {
                warn!(
                    error = %e,
                    repository = %self.context.full_name(),
                    path = %self.context.path,
                    "Failed to read tokens from GitLab"
                );
                Vec::new()
            }
        }
    }

    async fn write(&self, files: &[RemoteFile]) -> Result<CommitInfo> {
        let (message, blobs) = sync::prepare(files, &self.context)?;
        let project = self.assign_project_id().await?;
        sync::push(&self.api, &project.project_id, &self.context, &message, blobs).await
    }

    async fn fetch_branches(&self) -> Result<Vec<String>> {
        let project = self.assign_project_id().await?;
        sync::branch_names(&self.api, &project.project_id).await
    }

    async fn create_branch(&self, name: &str, source: &str) -> Result<bool> {
        let project = self.assign_project_id().await?;
        sync::create_branch(&self.api, &project.project_id, name, source).await
    }
}
