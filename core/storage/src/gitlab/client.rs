//! GitLab REST API v4 client.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use tokensync_common::{Error, Result, Secret};

use crate::context::ProjectId;
use crate::remote::{
    Branch, CommitAction, CommitInfo, CreatedBranch, RemoteRepository, TreeEntry,
};
use crate::rest::{decode, AuthScheme, RestClient};

use super::api::{GitlabApi, GitlabMember, GitlabProject, GitlabUser};

/// Public GitLab host.
pub const GITLAB_DEFAULT_HOST: &str = "https://gitlab.com";
const API_SUFFIX: &str = "/api/v4";
const PER_PAGE: &str = "100";
const NEXT_PAGE_HEADER: &str = "x-next-page";

#[derive(Serialize)]
struct CommitRequest<'a> {
    branch: &'a str,
    commit_message: &'a str,
    actions: &'a [CommitAction],
    #[serde(skip_serializing_if = "Option::is_none")]
    start_sha: Option<&'a str>,
}

/// GitLab API client.
pub struct GitlabClient {
    rest: RestClient,
}

impl GitlabClient {
    /// Create a client for `base_url`, or gitlab.com when absent.
    ///
    /// `/api/v4` is appended unless the URL already ends with it.
    ///
    /// # Errors
    /// - `base_url` is not an http(s) URL
    pub fn new(secret: Secret, base_url: Option<&str>) -> Result<Self> {
        let base_url = api_base_url(base_url)?;
        debug!(base_url = %base_url, "Creating GitLab client");
        Ok(Self {
            rest: RestClient::new(base_url, secret, AuthScheme::PrivateToken)?,
        })
    }

    /// API root the client talks to.
    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    /// Follow `x-next-page` until the listing is exhausted.
    async fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = "1".to_string();

        loop {
            let response = self
                .rest
                .send(
                    self.rest
                        .request(Method::GET, path)
                        .query(query)
                        .query(&[("per_page", PER_PAGE), ("page", page.as_str())]),
                )
                .await?;

            let next = response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            let batch: Vec<T> = decode(response).await?;
            items.extend(batch);

            match next {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(items)
    }
}

fn api_base_url(base_url: Option<&str>) -> Result<String> {
    let raw = base_url
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(GITLAB_DEFAULT_HOST)
        .trim_end_matches('/');

    let parsed = Url::parse(raw)
        .map_err(|e| Error::InvalidInput(format!("Invalid GitLab URL '{}': {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "GitLab URL must use http or https: {}",
            raw
        )));
    }

    if raw.ends_with(API_SUFFIX) {
        Ok(raw.to_string())
    } else {
        Ok(format!("{}{}", raw, API_SUFFIX))
    }
}

/// Encode a whole path as one URL segment (`/` becomes `%2F`).
fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn project_path(project: &ProjectId) -> String {
    format!("/projects/{}", encode(project.as_str()))
}

#[async_trait]
impl RemoteRepository for GitlabClient {
    async fn list_tree(
        &self,
        project: &ProjectId,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<TreeEntry>> {
        let endpoint = format!("{}/repository/tree", project_path(project));
        let mut query = vec![("ref", git_ref), ("recursive", "true")];
        if !path.is_empty() {
            query.push(("path", path));
        }
        self.get_paged(&endpoint, &query).await
    }

    async fn get_raw_file(
        &self,
        project: &ProjectId,
        path: &str,
        git_ref: &str,
    ) -> Result<String> {
        let endpoint = format!(
            "{}/repository/files/{}/raw",
            project_path(project),
            encode(path)
        );
        self.rest.get_text(&endpoint, &[("ref", git_ref)]).await
    }

    async fn list_branches(&self, project: &ProjectId) -> Result<Vec<Branch>> {
        let endpoint = format!("{}/repository/branches", project_path(project));
        self.get_paged(&endpoint, &[]).await
    }

    async fn create_branch(
        &self,
        project: &ProjectId,
        name: &str,
        source_ref: &str,
    ) -> Result<CreatedBranch> {
        let endpoint = format!("{}/repository/branches", project_path(project));
        let response = self
            .rest
            .send(
                self.rest
                    .request(Method::POST, &endpoint)
                    .query(&[("branch", name), ("ref", source_ref)]),
            )
            .await?;

        let body = response.bytes().await.unwrap_or_default();
        Ok(serde_json::from_slice(&body).unwrap_or_default())
    }

    async fn create_commit(
        &self,
        project: &ProjectId,
        branch: &str,
        message: &str,
        actions: &[CommitAction],
        parent_sha: Option<&str>,
    ) -> Result<CommitInfo> {
        let endpoint = format!("{}/repository/commits", project_path(project));
        let request = CommitRequest {
            branch,
            commit_message: message,
            actions,
            start_sha: parent_sha,
        };
        self.rest.post_json(&endpoint, &request).await
    }
}

#[async_trait]
impl GitlabApi for GitlabClient {
    async fn search_projects(&self, query: &str, membership: bool) -> Result<Vec<GitlabProject>> {
        let membership = if membership { "true" } else { "false" };
        self.get_paged("/projects", &[("search", query), ("membership", membership)])
            .await
    }

    async fn current_user(&self) -> Result<GitlabUser> {
        self.rest.get_json("/user", &[]).await
    }

    async fn group_member(&self, group_id: u64, user_id: u64) -> Result<GitlabMember> {
        let endpoint = format!("/groups/{}/members/all/{}", group_id, user_id);
        self.rest.get_json(&endpoint, &[]).await
    }

    async fn project_member(&self, project: &ProjectId, user_id: u64) -> Result<GitlabMember> {
        let endpoint = format!("{}/members/all/{}", project_path(project), user_id);
        self.rest.get_json(&endpoint, &[]).await
    }
}
