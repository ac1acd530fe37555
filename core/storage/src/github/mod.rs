//! GitHub storage provider.
//!
//! Stores the token workspace in a GitHub repository. Files are read
//! through the contents API and written with the Git Data API so that one
//! write is one commit.

pub mod api;
pub mod client;
pub mod identity;
pub mod provider;

pub use api::{GithubApi, GithubRepository, GithubUser, RepositoryPermissions};
pub use client::{GithubClient, GITHUB_DEFAULT_API};
pub use provider::GithubTokenStorage;
