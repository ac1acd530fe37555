//! Common utilities and types shared across tokensync crates.
//!
//! This module provides the design-token data model exchanged with remote
//! repositories, the in-memory workspace built from it, and the error type
//! used by every storage backend.

pub mod error;
pub mod types;
pub mod workspace;

pub use error::{Error, Result};
pub use types::{
    RemoteFile, RemoteMetadata, Secret, SingleToken, ThemeDraft, ThemeObject, TokenNode,
    TokenSet, TokenSetStatus,
};
pub use workspace::Workspace;
