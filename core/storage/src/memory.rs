//! In-memory git host for testing.

use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

use tokensync_common::{Error, Result};

use crate::context::{join_path, ProjectId};
use crate::github::api::{GithubApi, GithubRepository, GithubUser, RepositoryPermissions};
use crate::gitlab::api::{
    GitlabApi, GitlabMember, GitlabNamespace, GitlabProject, GitlabUser, DEVELOPER_ACCESS,
};
use crate::remote::{
    Branch, CommitAction, CommitActionKind, CommitInfo, CreatedBranch, RemoteRepository,
    TreeEntry, TreeEntryKind,
};

/// Host operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SearchProjects,
    CurrentUser,
    GroupMember,
    ProjectMember,
    Repository,
    CollaboratorPermission,
    ListTree,
    RawFile,
    ListBranches,
    CreateBranch,
    CreateCommit,
}

/// A recorded call, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    SearchProjects {
        query: String,
        membership: bool,
    },
    CurrentUser,
    GroupMember {
        group_id: u64,
        user_id: u64,
    },
    ProjectMember {
        project: ProjectId,
        user_id: u64,
    },
    Repository {
        owner: String,
        repo: String,
    },
    CollaboratorPermission {
        owner: String,
        repo: String,
        login: String,
    },
    ListTree {
        project: ProjectId,
        path: String,
        git_ref: String,
    },
    RawFile {
        project: ProjectId,
        path: String,
        git_ref: String,
    },
    ListBranches {
        project: ProjectId,
    },
    CreateBranch {
        project: ProjectId,
        name: String,
        source_ref: String,
    },
    CreateCommit {
        project: ProjectId,
        branch: String,
        message: String,
        actions: Vec<CommitAction>,
        parent_sha: Option<String>,
    },
}

impl HostCall {
    pub fn operation(&self) -> Operation {
        match self {
            HostCall::SearchProjects { .. } => Operation::SearchProjects,
            HostCall::CurrentUser => Operation::CurrentUser,
            HostCall::GroupMember { .. } => Operation::GroupMember,
            HostCall::ProjectMember { .. } => Operation::ProjectMember,
            HostCall::Repository { .. } => Operation::Repository,
            HostCall::CollaboratorPermission { .. } => Operation::CollaboratorPermission,
            HostCall::ListTree { .. } => Operation::ListTree,
            HostCall::RawFile { .. } => Operation::RawFile,
            HostCall::ListBranches { .. } => Operation::ListBranches,
            HostCall::CreateBranch { .. } => Operation::CreateBranch,
            HostCall::CreateCommit { .. } => Operation::CreateCommit,
        }
    }
}

/// A commit applied to a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommit {
    pub id: String,
    pub message: String,
    pub actions: Vec<CommitAction>,
}

#[derive(Debug, Clone, Default)]
struct BranchState {
    files: BTreeMap<String, String>,
    commits: Vec<HostCommit>,
}

impl BranchState {
    fn head(&self) -> Option<&str> {
        self.commits.last().map(|c| c.id.as_str())
    }
}

#[derive(Debug, Clone)]
struct HostProject {
    id: u64,
    full_name: String,
    namespace_id: u64,
    branches: IndexMap<String, BranchState>,
    members: HashMap<u64, u32>,
}

impl HostProject {
    fn name(&self) -> &str {
        self.full_name.rsplit('/').next().unwrap_or(&self.full_name)
    }

    fn namespace(&self) -> &str {
        self.full_name
            .rsplit_once('/')
            .map(|(owner, _)| owner)
            .unwrap_or("")
    }

    fn matches(&self, project: &ProjectId) -> bool {
        match project.as_str().parse::<u64>() {
            Ok(id) => id == self.id,
            Err(_) => self.full_name.eq_ignore_ascii_case(project.as_str()),
        }
    }

    fn branch(&self, name: &str) -> Result<&BranchState> {
        self.branches
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("404 Branch '{}' Not Found", name)))
    }
}

#[derive(Debug, Default)]
struct HostState {
    projects: Vec<HostProject>,
    user: Option<GitlabUser>,
    group_members: HashMap<(u64, u64), u32>,
    failing: HashSet<Operation>,
    branch_reply: Option<CreatedBranch>,
    calls: Vec<HostCall>,
}

impl HostState {
    fn project(&self, project: &ProjectId) -> Result<&HostProject> {
        self.projects
            .iter()
            .find(|p| p.matches(project))
            .ok_or_else(|| Error::NotFound(format!("404 Project '{}' Not Found", project)))
    }

    fn project_mut(&mut self, project: &ProjectId) -> Result<&mut HostProject> {
        self.projects
            .iter_mut()
            .find(|p| p.matches(project))
            .ok_or_else(|| Error::NotFound(format!("404 Project '{}' Not Found", project)))
    }

    fn by_id_mut(&mut self, id: u64) -> Option<&mut HostProject> {
        let found = self.projects.iter_mut().find(|p| p.id == id);
        if found.is_none() {
            warn!(project_id = id, "Unknown project in memory host");
        }
        found
    }

    /// Effective access of `user_id`: direct or inherited from the namespace.
    fn access_level(&self, project: &HostProject, user_id: u64) -> Option<u32> {
        let direct = project.members.get(&user_id).copied();
        let inherited = self
            .group_members
            .get(&(project.namespace_id, user_id))
            .copied();
        direct.max(inherited)
    }
}

/// In-memory git host implementing both the GitLab and the GitHub API shape.
///
/// Useful for testing and development. Every call is recorded, any
/// operation can be made to fail, and commits follow GitLab's rules: a
/// `create` on an existing file or an `update` on a missing one rejects the
/// whole commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    state: Arc<Mutex<HostState>>,
}

impl MemoryHost {
    /// Create an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `call` and fail it if its operation is marked failing.
    fn enter(&self, call: HostCall) -> Result<MutexGuard<'_, HostState>> {
        let mut state = self.state();
        let operation = call.operation();
        debug!(?call, "Memory host call");
        state.calls.push(call);

        if state.failing.contains(&operation) {
            return Err(Error::Network(format!("Injected failure for {:?}", operation)));
        }
        Ok(state)
    }

    /// Add a project with an empty `main` branch.
    pub fn add_project(&self, id: u64, full_name: &str, namespace_id: u64) {
        let mut branches = IndexMap::new();
        branches.insert("main".to_string(), BranchState::default());

        self.state().projects.push(HostProject {
            id,
            full_name: full_name.to_string(),
            namespace_id,
            branches,
            members: HashMap::new(),
        });
    }

    /// Make sure `full_name` exists and the current user may write to it.
    ///
    /// Creates the project (and a default user) when missing. Returns the
    /// project id.
    pub fn seed(&self, full_name: &str) -> u64 {
        let mut state = self.state();
        if let Some(project) = state
            .projects
            .iter()
            .find(|p| p.full_name.eq_ignore_ascii_case(full_name))
        {
            return project.id;
        }

        let id = state.projects.len() as u64 + 1;
        let user_id = match &state.user {
            Some(user) => user.id,
            None => {
                state.user = Some(GitlabUser {
                    id: 1,
                    username: "tokensync".to_string(),
                    state: Some("active".to_string()),
                });
                1
            }
        };

        let mut branches = IndexMap::new();
        branches.insert("main".to_string(), BranchState::default());
        let mut members = HashMap::new();
        members.insert(user_id, DEVELOPER_ACCESS);

        state.projects.push(HostProject {
            id,
            full_name: full_name.to_string(),
            namespace_id: id,
            branches,
            members,
        });
        id
    }

    /// Add an empty branch.
    pub fn add_branch(&self, project_id: u64, name: &str) {
        if let Some(project) = self.state().by_id_mut(project_id) {
            project.branches.entry(name.to_string()).or_default();
        }
    }

    /// Set the user the credential belongs to.
    pub fn set_current_user(&self, id: u64, username: &str) {
        self.state().user = Some(GitlabUser {
            id,
            username: username.to_string(),
            state: Some("active".to_string()),
        });
    }

    pub fn set_group_access(&self, group_id: u64, user_id: u64, access_level: u32) {
        self.state()
            .group_members
            .insert((group_id, user_id), access_level);
    }

    pub fn set_project_access(&self, project_id: u64, user_id: u64, access_level: u32) {
        if let Some(project) = self.state().by_id_mut(project_id) {
            project.members.insert(user_id, access_level);
        }
    }

    /// Store a file directly, outside any commit. Creates the branch if needed.
    pub fn put_file(&self, project_id: u64, branch: &str, path: &str, content: impl Into<String>) {
        if let Some(project) = self.state().by_id_mut(project_id) {
            project
                .branches
                .entry(branch.to_string())
                .or_default()
                .files
                .insert(path.to_string(), content.into());
        }
    }

    /// Current content of a file.
    pub fn file(&self, project_id: u64, branch: &str, path: &str) -> Option<String> {
        let state = self.state();
        let project = state.projects.iter().find(|p| p.id == project_id)?;
        project.branches.get(branch)?.files.get(path).cloned()
    }

    /// Commits applied to `branch`, oldest first.
    pub fn commits(&self, project_id: u64, branch: &str) -> Vec<HostCommit> {
        let state = self.state();
        state
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .and_then(|p| p.branches.get(branch))
            .map(|b| b.commits.clone())
            .unwrap_or_default()
    }

    /// Make every call of `operation` fail with a network error.
    pub fn fail(&self, operation: Operation) {
        self.state().failing.insert(operation);
    }

    /// Undo [`MemoryHost::fail`].
    pub fn recover(&self, operation: Operation) {
        self.state().failing.remove(&operation);
    }

    /// Answer branch creation with `reply` instead of echoing the name.
    ///
    /// The branch is still created.
    pub fn reply_to_create_branch(&self, reply: CreatedBranch) {
        self.state().branch_reply = Some(reply);
    }

    /// Calls recorded so far, oldest first.
    pub fn calls(&self) -> Vec<HostCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

fn blob_id(content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn tree_entry(path: &str, id: String, kind: TreeEntryKind) -> TreeEntry {
    TreeEntry {
        id,
        mode: match kind {
            TreeEntryKind::Tree => "040000".to_string(),
            _ => "100644".to_string(),
        },
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        kind,
    }
}

fn bad_request(message: impl Into<String>) -> Error {
    Error::RemoteApi {
        status: 400,
        message: message.into(),
    }
}

#[async_trait]
impl RemoteRepository for MemoryHost {
    async fn list_tree(
        &self,
        project: &ProjectId,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<TreeEntry>> {
        let state = self.enter(HostCall::ListTree {
            project: project.clone(),
            path: path.to_string(),
            git_ref: git_ref.to_string(),
        })?;
        let branch = state.project(project)?.branch(git_ref)?;

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };

        let mut dirs = IndexSet::new();
        let mut entries = Vec::new();
        for (file_path, content) in &branch.files {
            let Some(relative) = file_path.strip_prefix(prefix.as_str()) else {
                continue;
            };

            let mut dir = path.to_string();
            let mut segments: Vec<&str> = relative.split('/').collect();
            segments.pop();
            for segment in segments {
                dir = join_path(&dir, segment);
                if dirs.insert(dir.clone()) {
                    entries.push(tree_entry(&dir, blob_id(&dir), TreeEntryKind::Tree));
                }
            }
            entries.push(tree_entry(file_path, blob_id(content), TreeEntryKind::Blob));
        }

        if entries.is_empty() && !path.is_empty() {
            return Err(Error::NotFound("404 Tree Not Found".to_string()));
        }
        Ok(entries)
    }

    async fn get_raw_file(
        &self,
        project: &ProjectId,
        path: &str,
        git_ref: &str,
    ) -> Result<String> {
        let state = self.enter(HostCall::RawFile {
            project: project.clone(),
            path: path.to_string(),
            git_ref: git_ref.to_string(),
        })?;
        state
            .project(project)?
            .branch(git_ref)?
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound("404 File Not Found".to_string()))
    }

    async fn list_branches(&self, project: &ProjectId) -> Result<Vec<Branch>> {
        let state = self.enter(HostCall::ListBranches {
            project: project.clone(),
        })?;
        Ok(state
            .project(project)?
            .branches
            .keys()
            .map(|name| Branch { name: name.clone() })
            .collect())
    }

    async fn create_branch(
        &self,
        project: &ProjectId,
        name: &str,
        source_ref: &str,
    ) -> Result<CreatedBranch> {
        let mut state = self.enter(HostCall::CreateBranch {
            project: project.clone(),
            name: name.to_string(),
            source_ref: source_ref.to_string(),
        })?;
        let reply = state.branch_reply.clone();
        let target = state.project_mut(project)?;

        let source = source_ref.strip_prefix("heads/").unwrap_or(source_ref);
        if target.branches.contains_key(name) {
            return Err(bad_request("Branch already exists"));
        }
        let copy = target
            .branches
            .get(source)
            .cloned()
            .ok_or_else(|| bad_request("Invalid reference name"))?;
        target.branches.insert(name.to_string(), copy);

        Ok(reply.unwrap_or(CreatedBranch {
            name: Some(name.to_string()),
        }))
    }

    async fn create_commit(
        &self,
        project: &ProjectId,
        branch: &str,
        message: &str,
        actions: &[CommitAction],
        parent_sha: Option<&str>,
    ) -> Result<CommitInfo> {
        let mut state = self.enter(HostCall::CreateCommit {
            project: project.clone(),
            branch: branch.to_string(),
            message: message.to_string(),
            actions: actions.to_vec(),
            parent_sha: parent_sha.map(str::to_string),
        })?;
        let target = state
            .project_mut(project)?
            .branches
            .get_mut(branch)
            .ok_or_else(|| {
                bad_request("You can only create or edit files when you are on a branch")
            })?;

        if let Some(parent) = parent_sha {
            if target.head() != Some(parent) {
                return Err(bad_request("Start commit is not the branch head"));
            }
        }

        for action in actions {
            let exists = target.files.contains_key(&action.file_path);
            match action.action {
                CommitActionKind::Create if exists => {
                    return Err(bad_request(format!(
                        "A file with this name already exists: {}",
                        action.file_path
                    )))
                }
                CommitActionKind::Update | CommitActionKind::Delete if !exists => {
                    return Err(bad_request(format!(
                        "A file with this name doesn't exist: {}",
                        action.file_path
                    )))
                }
                _ => {}
            }
        }

        for action in actions {
            match action.action {
                CommitActionKind::Delete => {
                    target.files.remove(&action.file_path);
                }
                CommitActionKind::Create | CommitActionKind::Update => {
                    target
                        .files
                        .insert(action.file_path.clone(), action.content.clone());
                }
            }
        }

        let commit = HostCommit {
            id: Uuid::new_v4().simple().to_string(),
            message: message.to_string(),
            actions: actions.to_vec(),
        };
        let info = CommitInfo {
            id: Some(commit.id.clone()),
            message: Some(commit.message.clone()),
            web_url: None,
        };
        target.commits.push(commit);

        Ok(info)
    }
}

#[async_trait]
impl GitlabApi for MemoryHost {
    async fn search_projects(&self, query: &str, membership: bool) -> Result<Vec<GitlabProject>> {
        let state = self.enter(HostCall::SearchProjects {
            query: query.to_string(),
            membership,
        })?;
        let query = query.to_lowercase();

        Ok(state
            .projects
            .iter()
            .filter(|p| p.name().to_lowercase().contains(&query))
            .map(|p| GitlabProject {
                id: p.id,
                name: p.name().to_string(),
                path: p.name().to_string(),
                path_with_namespace: p.full_name.clone(),
                namespace: GitlabNamespace {
                    id: p.namespace_id,
                    full_path: p.namespace().to_string(),
                },
            })
            .collect())
    }

    async fn current_user(&self) -> Result<GitlabUser> {
        let state = self.enter(HostCall::CurrentUser)?;
        state
            .user
            .clone()
            .ok_or_else(|| Error::Authentication("401 Unauthorized".to_string()))
    }

    async fn group_member(&self, group_id: u64, user_id: u64) -> Result<GitlabMember> {
        let state = self.enter(HostCall::GroupMember { group_id, user_id })?;
        state
            .group_members
            .get(&(group_id, user_id))
            .map(|&access_level| GitlabMember { access_level })
            .ok_or_else(|| Error::NotFound("404 Not found".to_string()))
    }

    async fn project_member(&self, project: &ProjectId, user_id: u64) -> Result<GitlabMember> {
        let state = self.enter(HostCall::ProjectMember {
            project: project.clone(),
            user_id,
        })?;
        let found = state.project(project)?;
        state
            .access_level(found, user_id)
            .map(|access_level| GitlabMember { access_level })
            .ok_or_else(|| Error::NotFound("404 Not found".to_string()))
    }
}

#[async_trait]
impl GithubApi for MemoryHost {
    async fn repository(&self, owner: &str, repo: &str) -> Result<GithubRepository> {
        let state = self.enter(HostCall::Repository {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })?;
        let full_name = format!("{}/{}", owner, repo);
        let project = state
            .projects
            .iter()
            .find(|p| p.full_name.eq_ignore_ascii_case(&full_name))
            .ok_or_else(|| Error::NotFound("Not Found".to_string()))?;

        let permissions = state.user.as_ref().map(|user| {
            let level = state.access_level(project, user.id).unwrap_or(0);
            RepositoryPermissions {
                admin: level >= 50,
                maintain: level >= 40,
                push: level >= 30,
                pull: level >= 10,
            }
        });

        Ok(GithubRepository {
            id: project.id,
            full_name: project.full_name.clone(),
            default_branch: project.branches.keys().next().cloned(),
            permissions,
        })
    }

    async fn current_user(&self) -> Result<GithubUser> {
        let state = self.enter(HostCall::CurrentUser)?;
        state
            .user
            .as_ref()
            .map(|user| GithubUser {
                id: user.id,
                login: user.username.clone(),
            })
            .ok_or_else(|| Error::Authentication("Bad credentials".to_string()))
    }

    async fn collaborator_permission(
        &self,
        owner: &str,
        repo: &str,
        login: &str,
    ) -> Result<String> {
        let state = self.enter(HostCall::CollaboratorPermission {
            owner: owner.to_string(),
            repo: repo.to_string(),
            login: login.to_string(),
        })?;
        let project = state.project(&ProjectId::from(format!("{}/{}", owner, repo)))?;

        let level = state
            .user
            .as_ref()
            .filter(|user| user.username == login)
            .and_then(|user| state.access_level(project, user.id))
            .unwrap_or(0);

        let permission = match level {
            50..=u32::MAX => "admin",
            40..=49 => "maintain",
            30..=39 => "write",
            10..=29 => "read",
            _ => "none",
        };
        Ok(permission.to_string())
    }
}
