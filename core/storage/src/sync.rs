//! Pull and push orchestration shared by every storage provider.
//!
//! The providers resolve identity and then delegate here; nothing in this
//! module knows which host it talks to.

use std::collections::HashSet;
use tracing::{debug, info};

use tokensync_common::{RemoteFile, Result};

use crate::context::{parent_dir, FileLayout, ProjectId, ProviderContext};
use crate::format::{self, Blob, MultiFileEntry};
use crate::remote::{CommitAction, CommitActionKind, CommitInfo, RemoteRepository, TreeEntry};

/// Fetch and parse the workspace at the context's branch and path.
///
/// Multi-file blobs are fetched one after another, themes first.
pub async fn pull<R>(
    remote: &R,
    project: &ProjectId,
    context: &ProviderContext,
) -> Result<Vec<RemoteFile>>
where
    R: RemoteRepository + ?Sized,
{
    match context.layout {
        FileLayout::SingleFile => {
            let content = remote
                .get_raw_file(project, &context.path, &context.branch)
                .await?;
            format::unmarshal_single(&context.path, &content)
        }
        FileLayout::MultiFile => {
            let entries = remote
                .list_tree(project, &context.path, &context.branch)
                .await?;
            let plan = format::plan_multi_file_read(&context.path, &entries);
            debug!(files = plan.len(), path = %context.path, "Reading multi-file workspace");

            let mut files = Vec::with_capacity(plan.len());
            for entry in &plan {
                let content = remote
                    .get_raw_file(project, entry.path(), &context.branch)
                    .await?;
                files.push(format::unmarshal_multi_file(entry, &content)?);
            }
            Ok(files)
        }
    }
}

/// Serialize `files` for the context's layout.
///
/// Runs before any request so invalid input never reaches the remote.
pub fn prepare(files: &[RemoteFile], context: &ProviderContext) -> Result<(String, Vec<Blob>)> {
    let blobs = format::marshal(files, context.layout, &context.path)?;
    Ok((format::commit_message(files), blobs))
}

/// Commit `blobs` to the context's branch as a single commit.
///
/// Each blob becomes an `update` if the file already exists and a `create`
/// otherwise. In multi-file mode every token set file left in the directory
/// without a matching blob is deleted in the same commit. A directory that
/// cannot be listed is treated as empty.
pub async fn push<R>(
    remote: &R,
    project: &ProjectId,
    context: &ProviderContext,
    message: &str,
    blobs: Vec<Blob>,
) -> Result<CommitInfo>
where
    R: RemoteRepository + ?Sized,
{
    let listing = list_target(remote, project, context).await;
    let existing: HashSet<&str> = listing
        .iter()
        .filter(|entry| entry.is_blob())
        .map(|entry| entry.path.as_str())
        .collect();

    let stale: Vec<CommitAction> = match context.layout {
        FileLayout::SingleFile => Vec::new(),
        FileLayout::MultiFile => format::plan_multi_file_read(&context.path, &listing)
            .into_iter()
            .filter(|entry| matches!(entry, MultiFileEntry::TokenSet { .. }))
            .filter(|entry| !blobs.iter().any(|blob| blob.path == entry.path()))
            .map(|entry| CommitAction::delete(entry.path()))
            .collect(),
    };

    let mut actions: Vec<CommitAction> = blobs
        .into_iter()
        .map(|blob| CommitAction {
            action: if existing.contains(blob.path.as_str()) {
                CommitActionKind::Update
            } else {
                CommitActionKind::Create
            },
            file_path: blob.path,
            content: blob.content,
        })
        .collect();
    actions.extend(stale);

    info!(
        project = %project,
        branch = %context.branch,
        files = actions.len(),
        "Committing token files"
    );

    remote
        .create_commit(project, &context.branch, message, &actions, None)
        .await
}

/// Branch names in remote order.
pub async fn branch_names<R>(remote: &R, project: &ProjectId) -> Result<Vec<String>>
where
    R: RemoteRepository + ?Sized,
{
    Ok(remote
        .list_branches(project)
        .await?
        .into_iter()
        .map(|branch| branch.name)
        .collect())
}

/// Create `name` from `source` and report whether the host confirmed it.
pub async fn create_branch<R>(
    remote: &R,
    project: &ProjectId,
    name: &str,
    source: &str,
) -> Result<bool>
where
    R: RemoteRepository + ?Sized,
{
    let reply = remote
        .create_branch(project, name, &format!("heads/{}", source))
        .await?;
    let created = reply.name.as_deref() == Some(name);
    if created {
        info!(branch = %name, from = %source, "Created branch");
    } else {
        debug!(branch = %name, "Branch creation not confirmed by the host");
    }
    Ok(created)
}

async fn list_target<R>(
    remote: &R,
    project: &ProjectId,
    context: &ProviderContext,
) -> Vec<TreeEntry>
where
    R: RemoteRepository + ?Sized,
{
    let dir = match context.layout {
        FileLayout::SingleFile => parent_dir(&context.path),
        FileLayout::MultiFile => context.path.as_str(),
    };

    match remote.list_tree(project, dir, &context.branch).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(error = %e, dir = %dir, "Target directory not listed; creating every file");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{HostCall, MemoryHost, Operation};
    use tokensync_common::{Secret, SingleToken, ThemeObject, TokenSet, TokenSetStatus, Workspace};

    fn context(layout: FileLayout, path: &str) -> ProviderContext {
        ProviderContext::new(Secret::new("t"), "six7", "figma-tokens")
            .with_path(path)
            .with_layout(layout)
    }

    fn workspace() -> Workspace {
        let mut set = TokenSet::new();
        set.insert("red", SingleToken::new("color", "#ff0000"));

        let files = vec![
            RemoteFile::Themes {
                path: "$themes.json".to_string(),
                data: vec![ThemeObject::new("light", "Light")
                    .with_set("global", TokenSetStatus::Enabled)],
            },
            RemoteFile::TokenSet {
                name: "global".to_string(),
                path: "global.json".to_string(),
                data: set,
            },
        ];
        Workspace::from_remote_files(&files).unwrap()
    }

    async fn push_workspace(host: &MemoryHost, ctx: &ProviderContext, message: &str) -> CommitInfo {
        let (msg, blobs) = prepare(&workspace().to_remote_files(Some(message)), ctx).unwrap();
        push(host, &ProjectId::from(1u64), ctx, &msg, blobs)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_push_then_pull_both_layouts() {
        for (layout, path) in [
            (FileLayout::SingleFile, "data/tokens.json"),
            (FileLayout::MultiFile, "data"),
        ] {
            let host = MemoryHost::new();
            host.add_project(1, "six7/figma-tokens", 2);
            let ctx = context(layout, path);

            push_workspace(&host, &ctx, "Initial commit").await;
            let files = pull(&host, &ProjectId::from(1u64), &ctx).await.unwrap();

            assert_eq!(Workspace::from_remote_files(&files).unwrap(), workspace());
            assert_eq!(host.commits(1, "main")[0].message, "Initial commit");
        }
    }

    #[tokio::test]
    async fn test_second_push_updates() {
        let host = MemoryHost::new();
        host.add_project(1, "six7/figma-tokens", 2);
        let ctx = context(FileLayout::MultiFile, "data");

        push_workspace(&host, &ctx, "first").await;
        push_workspace(&host, &ctx, "second").await;

        let commits = host.commits(1, "main");
        assert_eq!(commits.len(), 2);
        assert!(commits[1]
            .actions
            .iter()
            .all(|a| a.action == CommitActionKind::Update));
    }

    #[tokio::test]
    async fn test_removed_set_is_deleted_in_both_layouts() {
        let mut two = workspace();
        let mut brand = TokenSet::new();
        brand.insert("primary", SingleToken::new("color", "#0000ff"));
        two.set_token_set("brand", brand);
        let mut one = two.clone();
        one.remove_token_set("brand");

        for (layout, path) in [
            (FileLayout::SingleFile, "data/tokens.json"),
            (FileLayout::MultiFile, "data"),
        ] {
            let host = MemoryHost::new();
            host.add_project(1, "six7/figma-tokens", 2);
            host.put_file(1, "main", "data/README.md", "docs");
            let project = ProjectId::from(1u64);
            let ctx = context(layout, path);

            for workspace in [&two, &one] {
                let (message, blobs) = prepare(&workspace.to_remote_files(None), &ctx).unwrap();
                push(&host, &project, &ctx, &message, blobs).await.unwrap();
            }

            let files = pull(&host, &project, &ctx).await.unwrap();
            assert_eq!(Workspace::from_remote_files(&files).unwrap(), one);
            assert_eq!(host.commits(1, "main").len(), 2);
            assert!(host.file(1, "main", "data/README.md").is_some());
        }
    }

    #[tokio::test]
    async fn test_multi_file_push_deletes_only_stale_sets() {
        let host = MemoryHost::new();
        host.add_project(1, "six7/figma-tokens", 2);
        host.put_file(1, "main", "data/old.json", "{}");
        host.put_file(1, "main", "data/nested/legacy.json", "{}");
        host.put_file(1, "main", "data/$metadata.json", "{}");
        let ctx = context(FileLayout::MultiFile, "data");

        push_workspace(&host, &ctx, "m").await;

        let commits = host.commits(1, "main");
        let deleted: Vec<&str> = commits[0]
            .actions
            .iter()
            .filter(|a| a.action == CommitActionKind::Delete)
            .map(|a| a.file_path.as_str())
            .collect();
        assert_eq!(deleted, vec!["data/nested/legacy.json", "data/old.json"]);
        assert!(host.file(1, "main", "data/$metadata.json").is_some());
    }

    #[tokio::test]
    async fn test_unlisted_directory_creates_files() {
        let host = MemoryHost::new();
        host.add_project(1, "six7/figma-tokens", 2);
        host.fail(Operation::ListTree);
        let ctx = context(FileLayout::SingleFile, "tokens.json");

        push_workspace(&host, &ctx, "m").await;

        let commits = host.commits(1, "main");
        assert_eq!(commits[0].actions[0].action, CommitActionKind::Create);
        assert_eq!(commits[0].actions[0].file_path, "tokens.json");
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_before_io() {
        let ctx = context(FileLayout::SingleFile, "tokens.json");
        let set = RemoteFile::TokenSet {
            name: "global".to_string(),
            path: "global.json".to_string(),
            data: TokenSet::new(),
        };

        assert!(prepare(&[set.clone(), set], &ctx).is_err());
    }

    #[tokio::test]
    async fn test_create_branch_prefixes_source() {
        let host = MemoryHost::new();
        host.add_project(1, "six7/figma-tokens", 2);
        let project = ProjectId::from(1u64);

        assert!(create_branch(&host, &project, "development", "main")
            .await
            .unwrap());
        assert_eq!(
            host.calls(),
            vec![HostCall::CreateBranch {
                project: project.clone(),
                name: "development".to_string(),
                source_ref: "heads/main".to_string(),
            }]
        );
        assert_eq!(
            branch_names(&host, &project).await.unwrap(),
            vec!["main", "development"]
        );
    }
}
