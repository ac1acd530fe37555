//! GitLab storage provider.
//!
//! Stores the token workspace in a GitLab project using REST API v4.
//! The project is found through the projects search and write access is
//! derived from group or project membership.

pub mod api;
pub mod client;
pub mod identity;
pub mod provider;

pub use api::{
    GitlabApi, GitlabMember, GitlabNamespace, GitlabProject, GitlabUser, DEVELOPER_ACCESS,
};
pub use client::{GitlabClient, GITLAB_DEFAULT_HOST};
pub use provider::GitlabTokenStorage;
