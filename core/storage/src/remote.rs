//! Remote repository client capability set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tokensync_common::Result;

use crate::context::ProjectId;

/// Kind of a repository tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEntryKind {
    Blob,
    Tree,
    /// Submodule reference.
    Commit,
}

/// An entry of a repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Object id (blob or tree sha).
    pub id: String,
    pub mode: String,
    /// Base name of the entry.
    pub name: String,
    /// Full path from the repository root.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: TreeEntryKind,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == TreeEntryKind::Blob
    }
}

/// A branch on the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
}

/// Reply to a branch creation request.
///
/// Hosts that accept the request echo the branch name. An empty or
/// unreadable success body leaves `name` unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBranch {
    #[serde(default)]
    pub name: Option<String>,
}

/// What a commit action does to its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitActionKind {
    Create,
    Update,
    Delete,
}

/// One file change inside a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAction {
    pub action: CommitActionKind,
    pub file_path: String,
    /// New file content; empty for `delete`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
}

impl CommitAction {
    /// Remove `file_path` from the branch.
    pub fn delete(file_path: impl Into<String>) -> Self {
        Self {
            action: CommitActionKind::Delete,
            file_path: file_path.into(),
            content: String::new(),
        }
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Commit sha.
    pub id: Option<String>,
    pub message: Option<String>,
    /// Browser URL of the commit, when the host reports one.
    pub web_url: Option<String>,
}

/// REST operations every supported git host provides.
///
/// Implementations issue one logical request per call and do not retry.
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// List blobs and trees below `path` (recursively) at `git_ref`.
    async fn list_tree(
        &self,
        project: &ProjectId,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<TreeEntry>>;

    /// Fetch the raw text of a file at `git_ref`.
    async fn get_raw_file(&self, project: &ProjectId, path: &str, git_ref: &str)
        -> Result<String>;

    /// List branches in remote order.
    async fn list_branches(&self, project: &ProjectId) -> Result<Vec<Branch>>;

    /// Create branch `name` from `source_ref` (e.g. `heads/main`).
    ///
    /// # Errors
    /// - Transport or non-success status. A success reply that does not
    ///   name the branch is not an error.
    async fn create_branch(
        &self,
        project: &ProjectId,
        name: &str,
        source_ref: &str,
    ) -> Result<CreatedBranch>;

    /// Apply all `actions` to `branch` as a single commit.
    ///
    /// # Postconditions
    /// - Either every action is applied or none is
    async fn create_commit(
        &self,
        project: &ProjectId,
        branch: &str,
        message: &str,
        actions: &[CommitAction],
        parent_sha: Option<&str>,
    ) -> Result<CommitInfo>;
}
