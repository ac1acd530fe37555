//! Per-provider configuration and resolved remote identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use tokensync_common::{Error, Result, Secret};

/// Opaque identifier of a project on the remote host.
///
/// GitLab uses the numeric project id, GitHub the `owner/repo` path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for ProjectId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ProjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    pub project_id: ProjectId,
    /// Owning group, for hosts that group projects.
    pub group_id: Option<u64>,
}

/// How a workspace is laid out in the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileLayout {
    /// One JSON document holding every token set and the themes.
    #[default]
    SingleFile,
    /// A directory with one JSON file per token set plus `$themes.json`.
    MultiFile,
}

impl FileLayout {
    /// Layout a caller would typically pick for `path`.
    ///
    /// Paths ending in `.json` name a document, anything else a directory.
    /// The storage providers never call this; the layout is always explicit.
    pub fn suggested_for(path: &str) -> Self {
        if path.trim_end_matches('/').ends_with(".json") {
            FileLayout::SingleFile
        } else {
            FileLayout::MultiFile
        }
    }

    pub fn is_multi_file(self) -> bool {
        self == FileLayout::MultiFile
    }
}

/// Configuration owned by a single storage provider instance.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    /// Access token for the host.
    pub secret: Secret,
    /// Owner, organisation or (possibly nested) namespace.
    pub owner: String,
    /// Repository / project name.
    pub repository: String,
    /// Host base URL; the public host when absent.
    pub base_url: Option<String>,
    /// Branch read from and committed to.
    pub branch: String,
    /// File (single-file) or directory (multi-file) inside the repository.
    pub path: String,
    pub layout: FileLayout,
}

impl ProviderContext {
    /// Create a context targeting `main` at the repository root.
    pub fn new(secret: Secret, owner: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            secret,
            owner: owner.into(),
            repository: repository.into(),
            base_url: None,
            branch: "main".to_string(),
            path: String::new(),
            layout: FileLayout::SingleFile,
        }
    }

    /// Create a context from an `owner/repo` string.
    ///
    /// Splits on the last `/`, so nested namespaces such as
    /// `group/subgroup/project` keep their full owner path.
    ///
    /// # Errors
    /// - Missing `/`, empty owner or empty repository
    pub fn from_full_name(secret: Secret, full_name: &str) -> Result<Self> {
        let full_name = full_name.trim().trim_matches('/');
        match full_name.rsplit_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => {
                Ok(Self::new(secret, owner, repo))
            }
            _ => Err(Error::InvalidInput(format!(
                "Expected 'owner/repository', got '{}'",
                full_name
            ))),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Set the working path.
    pub fn with_path(mut self, path: &str) -> Self {
        self.set_path(path);
        self
    }

    /// Set the layout.
    pub fn with_layout(mut self, layout: FileLayout) -> Self {
        self.layout = layout;
        self
    }

    /// `owner/repository`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }

    /// Replace the working path, dropping leading and trailing slashes.
    pub fn set_path(&mut self, path: &str) {
        self.path = path.trim_matches('/').to_string();
    }
}

/// Join a repository directory and a relative path.
pub(crate) fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Parent directory of a repository path (`""` for top-level files).
pub(crate) fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_full_name() {
        let ctx = ProviderContext::from_full_name(Secret::new("t"), "six7/figma-tokens").unwrap();
        assert_eq!(ctx.owner, "six7");
        assert_eq!(ctx.repository, "figma-tokens");
        assert_eq!(ctx.full_name(), "six7/figma-tokens");
        assert_eq!(ctx.branch, "main");
    }

    #[test]
    fn test_from_full_name_nested_namespace() {
        let ctx =
            ProviderContext::from_full_name(Secret::new("t"), "design/web/tokens").unwrap();
        assert_eq!(ctx.owner, "design/web");
        assert_eq!(ctx.repository, "tokens");
    }

    #[test]
    fn test_from_full_name_invalid() {
        assert!(ProviderContext::from_full_name(Secret::new("t"), "tokens").is_err());
        assert!(ProviderContext::from_full_name(Secret::new("t"), "/tokens").is_err());
    }

    #[test]
    fn test_path_is_trimmed() {
        let ctx = ProviderContext::new(Secret::new("t"), "o", "r").with_path("/data/tokens/");
        assert_eq!(ctx.path, "data/tokens");
    }

    #[test]
    fn test_suggested_layout() {
        assert_eq!(FileLayout::suggested_for("data/tokens.json"), FileLayout::SingleFile);
        assert_eq!(FileLayout::suggested_for("data/tokens"), FileLayout::MultiFile);
        assert_eq!(FileLayout::suggested_for(""), FileLayout::MultiFile);
    }

    #[test]
    fn test_join_and_parent() {
        assert_eq!(join_path("", "global.json"), "global.json");
        assert_eq!(join_path("data", "global.json"), "data/global.json");
        assert_eq!(parent_dir("data/tokens.json"), "data");
        assert_eq!(parent_dir("tokens.json"), "");
    }

    #[test]
    fn test_project_id_from_numeric() {
        assert_eq!(ProjectId::from(35102363u64).as_str(), "35102363");
    }
}
