//! Token storage provider trait definition.

use async_trait::async_trait;

use tokensync_common::{RemoteFile, Result};

use crate::context::{FileLayout, ProjectRef, ProviderContext};
use crate::remote::CommitInfo;

/// Storage provider trait for the supported git hosts.
///
/// Each implementation owns its [`ProviderContext`] and caches the resolved
/// project and the permission check for its own lifetime. Configuration
/// methods never touch the network.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Get the provider name (e.g., "gitlab", "github").
    fn name(&self) -> &str;

    /// Current configuration.
    fn context(&self) -> &ProviderContext;

    /// Read from and commit to `branch` from now on.
    fn select_branch(&mut self, branch: &str);

    /// Point at another file (single-file) or directory (multi-file).
    fn change_path(&mut self, path: &str);

    /// Switch to the one-file-per-token-set layout.
    fn enable_multi_file(&mut self);

    /// Switch back to the consolidated document layout.
    fn disable_multi_file(&mut self);

    fn is_multi_file(&self) -> bool {
        self.context().layout == FileLayout::MultiFile
    }

    /// Resolve the configured `owner/repository` to a remote project.
    ///
    /// # Postconditions
    /// - The result is cached; later calls issue no requests
    ///
    /// # Errors
    /// - No accessible project matches exactly (`ProjectNotAccessible`)
    /// - Network/authentication errors (not cached)
    async fn assign_project_id(&self) -> Result<ProjectRef>;

    /// Whether the credential may push to the project.
    ///
    /// Decided from the host's membership or permission records; never by
    /// attempting a write. Cached like [`TokenStorage::assign_project_id`].
    async fn can_write(&self) -> Result<bool>;

    /// Read the workspace from the configured branch and path.
    ///
    /// Themes come first, then token sets. Any failure is logged and
    /// yields an empty list.
    async fn read(&self) -> Vec<RemoteFile>;

    /// Commit `files` to the configured branch as a single commit.
    ///
    /// # Preconditions
    /// - Token set names are unique and not reserved
    ///
    /// # Postconditions
    /// - Exactly one commit is created; metadata files only contribute the
    ///   commit message
    ///
    /// # Errors
    /// - Invalid token set names (before any request)
    /// - Identity, network or remote errors
    async fn write(&self, files: &[RemoteFile]) -> Result<CommitInfo>;

    /// Branch names in remote order.
    async fn fetch_branches(&self) -> Result<Vec<String>>;

    /// Create `name` from the head of `source`.
    ///
    /// Returns `false` when the host accepted the request without
    /// reporting the new branch.
    async fn create_branch(&self, name: &str, source: &str) -> Result<bool>;
}
