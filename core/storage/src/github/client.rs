//! GitHub REST API client.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use tokensync_common::{Error, Result, Secret};

use crate::context::ProjectId;
use crate::remote::{
    Branch, CommitAction, CommitActionKind, CommitInfo, CreatedBranch, RemoteRepository,
    TreeEntry, TreeEntryKind,
};
use crate::rest::{decode, AuthScheme, RestClient};

use super::api::{GithubApi, GithubRepository, GithubUser};

/// Public GitHub API.
pub const GITHUB_DEFAULT_API: &str = "https://api.github.com";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct GitTree {
    #[serde(default)]
    tree: Vec<GitTreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct GitTreeItem {
    path: String,
    mode: String,
    #[serde(rename = "type")]
    kind: TreeEntryKind,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentsFile {
    sha: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitBlob {
    content: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    #[serde(rename = "ref")]
    name: String,
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitCommit {
    sha: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    tree: GitObject,
}

/// Entry of a new tree relative to `base_tree`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum NewTreeItem<'a> {
    Blob {
        path: &'a str,
        mode: &'static str,
        #[serde(rename = "type")]
        kind: &'static str,
        content: &'a str,
    },
    /// `sha: null` removes the path from the tree.
    Removed {
        path: &'a str,
        mode: &'static str,
        #[serde(rename = "type")]
        kind: &'static str,
        sha: Option<&'a str>,
    },
}

impl<'a> From<&'a CommitAction> for NewTreeItem<'a> {
    fn from(action: &'a CommitAction) -> Self {
        match action.action {
            CommitActionKind::Delete => NewTreeItem::Removed {
                path: &action.file_path,
                mode: "100644",
                kind: "blob",
                sha: None,
            },
            CommitActionKind::Create | CommitActionKind::Update => NewTreeItem::Blob {
                path: &action.file_path,
                mode: "100644",
                kind: "blob",
                content: &action.content,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct CollaboratorPermission {
    #[serde(default)]
    permission: Option<String>,
}

/// GitHub API client.
pub struct GithubClient {
    rest: RestClient,
}

impl GithubClient {
    /// Create a client for `base_url`, or api.github.com when absent.
    ///
    /// Enterprise URLs (e.g. `https://github.example.com/api/v3`) are used
    /// as given.
    ///
    /// # Errors
    /// - `base_url` is not an http(s) URL
    pub fn new(secret: Secret, base_url: Option<&str>) -> Result<Self> {
        let base_url = api_base_url(base_url)?;
        debug!(base_url = %base_url, "Creating GitHub client");
        let rest =
            RestClient::new(base_url, secret, AuthScheme::Bearer)?.with_accept(GITHUB_ACCEPT);
        Ok(Self { rest })
    }

    /// API root the client talks to.
    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    async fn branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        let endpoint = format!("{}/git/ref/heads/{}", repo, encode(branch));
        let head: GitRef = self.rest.get_json(&endpoint, &[]).await?;
        Ok(head.object.sha)
    }
}

fn api_base_url(base_url: Option<&str>) -> Result<String> {
    let raw = base_url
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(GITHUB_DEFAULT_API)
        .trim_end_matches('/');

    let parsed = Url::parse(raw)
        .map_err(|e| Error::InvalidInput(format!("Invalid GitHub URL '{}': {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "GitHub URL must use http or https: {}",
            raw
        )));
    }
    Ok(raw.to_string())
}

/// Encode each segment of `path`, keeping the `/` separators.
fn encode(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// `/repos/{owner}/{repo}` for an `owner/repo` project id.
fn repo_path(project: &ProjectId) -> Result<String> {
    match project.as_str().split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => {
            Ok(format!("/repos/{}/{}", encode(owner), encode(repo)))
        }
        _ => Err(Error::InvalidInput(format!(
            "GitHub project must be 'owner/repository', got '{}'",
            project
        ))),
    }
}

fn decode_content(content: &str) -> Result<String> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| Error::MalformedContent(format!("Invalid base64 content: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::MalformedContent(format!("File is not UTF-8: {}", e)))
}

/// Keep the blobs and trees below `path`, shaped like a GitLab listing.
///
/// A truncated listing is an error: a partial workspace must not pass for a
/// complete one.
fn entries_below(tree: GitTree, path: &str) -> Result<Vec<TreeEntry>> {
    if tree.truncated {
        warn!(path = %path, "GitHub truncated the recursive tree listing");
        return Err(Error::MalformedContent(format!(
            "Tree listing for '{}' was truncated by GitHub",
            path
        )));
    }

    let prefix = format!("{}/", path);
    let entries: Vec<TreeEntry> = tree
        .tree
        .into_iter()
        .filter(|item| path.is_empty() || item.path.starts_with(&prefix))
        .map(|item| TreeEntry {
            id: item.sha,
            mode: item.mode,
            name: item.path.rsplit('/').next().unwrap_or(&item.path).to_string(),
            path: item.path,
            kind: item.kind,
        })
        .collect();

    if entries.is_empty() && !path.is_empty() {
        return Err(Error::NotFound(format!("Tree not found: {}", path)));
    }
    Ok(entries)
}

#[async_trait]
impl RemoteRepository for GithubClient {
    async fn list_tree(
        &self,
        project: &ProjectId,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<TreeEntry>> {
        let endpoint = format!("{}/git/trees/{}", repo_path(project)?, encode(git_ref));
        let tree: GitTree = self.rest.get_json(&endpoint, &[("recursive", "1")]).await?;
        entries_below(tree, path)
    }

    async fn get_raw_file(
        &self,
        project: &ProjectId,
        path: &str,
        git_ref: &str,
    ) -> Result<String> {
        let repo = repo_path(project)?;
        let endpoint = format!("{}/contents/{}", repo, encode(path));
        let file: ContentsFile = self.rest.get_json(&endpoint, &[("ref", git_ref)]).await?;

        match (file.encoding.as_deref(), file.content) {
            (Some("base64"), Some(content)) => decode_content(&content),
            _ => {
                // Files above 1 MB come without inline content.
                let endpoint = format!("{}/git/blobs/{}", repo, file.sha);
                let blob: GitBlob = self.rest.get_json(&endpoint, &[]).await?;
                decode_content(&blob.content)
            }
        }
    }

    async fn list_branches(&self, project: &ProjectId) -> Result<Vec<Branch>> {
        let endpoint = format!("{}/branches", repo_path(project)?);
        let per_page = PER_PAGE.to_string();
        let mut branches = Vec::new();
        let mut page = 1usize;

        loop {
            let page_str = page.to_string();
            let batch: Vec<Branch> = self
                .rest
                .get_json(
                    &endpoint,
                    &[("per_page", per_page.as_str()), ("page", page_str.as_str())],
                )
                .await?;
            let full = batch.len() == PER_PAGE;
            branches.extend(batch);
            if !full {
                break;
            }
            page += 1;
        }

        Ok(branches)
    }

    async fn create_branch(
        &self,
        project: &ProjectId,
        name: &str,
        source_ref: &str,
    ) -> Result<CreatedBranch> {
        let repo = repo_path(project)?;
        let source: GitRef = self
            .rest
            .get_json(&format!("{}/git/ref/{}", repo, encode(source_ref)), &[])
            .await?;

        let body = json!({
            "ref": format!("refs/heads/{}", name),
            "sha": source.object.sha,
        });
        let response = self
            .rest
            .send(
                self.rest
                    .request(Method::POST, &format!("{}/git/refs", repo))
                    .json(&body),
            )
            .await?;

        let created: Option<GitRef> = decode(response).await.ok();
        Ok(CreatedBranch {
            name: created.and_then(|r| r.name.strip_prefix("refs/heads/").map(str::to_string)),
        })
    }

    async fn create_commit(
        &self,
        project: &ProjectId,
        branch: &str,
        message: &str,
        actions: &[CommitAction],
        parent_sha: Option<&str>,
    ) -> Result<CommitInfo> {
        let repo = repo_path(project)?;

        let parent = match parent_sha {
            Some(sha) => sha.to_string(),
            None => self.branch_head(&repo, branch).await?,
        };
        let parent_commit: GitCommit = self
            .rest
            .get_json(&format!("{}/git/commits/{}", repo, parent), &[])
            .await?;

        let items: Vec<NewTreeItem<'_>> = actions.iter().map(NewTreeItem::from).collect();
        let tree: GitObject = self
            .rest
            .post_json(
                &format!("{}/git/trees", repo),
                &json!({ "base_tree": parent_commit.tree.sha, "tree": items }),
            )
            .await?;

        let commit: GitCommit = self
            .rest
            .post_json(
                &format!("{}/git/commits", repo),
                &json!({ "message": message, "tree": tree.sha, "parents": [parent] }),
            )
            .await?;

        let _: GitRef = self
            .rest
            .patch_json(
                &format!("{}/git/refs/heads/{}", repo, encode(branch)),
                &json!({ "sha": commit.sha, "force": false }),
            )
            .await?;

        Ok(CommitInfo {
            id: Some(commit.sha),
            message: commit.message,
            web_url: commit.html_url,
        })
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn repository(&self, owner: &str, repo: &str) -> Result<GithubRepository> {
        let endpoint = format!("/repos/{}/{}", encode(owner), encode(repo));
        self.rest.get_json(&endpoint, &[]).await
    }

    async fn current_user(&self) -> Result<GithubUser> {
        self.rest.get_json("/user", &[]).await
    }

    async fn collaborator_permission(
        &self,
        owner: &str,
        repo: &str,
        login: &str,
    ) -> Result<String> {
        let endpoint = format!(
            "/repos/{}/{}/collaborators/{}/permission",
            encode(owner),
            encode(repo),
            encode(login)
        );
        let reply: CollaboratorPermission = self.rest.get_json(&endpoint, &[]).await?;
        Ok(reply.permission.unwrap_or_else(|| "none".to_string()))
    }
}
