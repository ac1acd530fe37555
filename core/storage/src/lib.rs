//! Storage providers for tokensync.
//!
//! This module provides a trait-based interface for persisting a token
//! workspace in repositories hosted by REST git services (GitLab, GitHub)
//! and a provider registry for dynamic provider resolution.
//!
//! # Design Principles
//! - Provider isolation: each host gets its own client, identity resolver
//!   and facade; they share only the `TokenStorage` contract
//! - Shared translation: both hosts use the same single-file / multi-file
//!   format translator
//! - Soft reads, hard writes: `read` never fails, `write` always reports
//! - One commit per write

pub mod config;
pub mod context;
pub mod format;
pub mod github;
pub mod gitlab;
pub mod memory;
pub mod provider;
pub mod registry;
pub mod remote;
mod rest;
pub mod sync;

pub use config::StorageConfig;
pub use context::{FileLayout, ProjectId, ProjectRef, ProviderContext};
pub use github::{GithubClient, GithubTokenStorage};
pub use gitlab::{GitlabClient, GitlabTokenStorage};
pub use memory::{HostCall, HostCommit, MemoryHost, Operation};
pub use provider::TokenStorage;
pub use registry::{create_default_registry, memory_factory, ProviderFactory, ProviderRegistry};
pub use remote::{
    Branch, CommitAction, CommitActionKind, CommitInfo, CreatedBranch, RemoteRepository,
    TreeEntry, TreeEntryKind,
};
