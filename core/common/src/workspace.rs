//! In-memory token workspace.
//!
//! A workspace is the local, editable counterpart of what a storage provider
//! reads from and writes to a remote repository.

use chrono::Utc;
use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::types::{RemoteFile, RemoteMetadata, ThemeDraft, ThemeObject, TokenSet};

/// Path used for the themes file in remote file lists.
pub const THEMES_FILE: &str = "$themes.json";
/// Path used for the metadata file in remote file lists.
pub const METADATA_FILE: &str = "$metadata.json";

/// Token sets and themes edited locally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workspace {
    token_sets: IndexMap<String, TokenSet>,
    themes: Vec<ThemeObject>,
}

impl Workspace {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a workspace from files returned by a read.
    ///
    /// Metadata files are ignored. Multiple themes files are concatenated.
    ///
    /// # Errors
    /// - Two token sets share a name
    pub fn from_remote_files(files: &[RemoteFile]) -> Result<Self> {
        let mut workspace = Self::new();

        for file in files {
            match file {
                RemoteFile::TokenSet { name, data, .. } => {
                    if workspace.token_sets.contains_key(name) {
                        return Err(Error::InvalidInput(format!(
                            "Duplicate token set name: {}",
                            name
                        )));
                    }
                    workspace.token_sets.insert(name.clone(), data.clone());
                }
                RemoteFile::Themes { data, .. } => workspace.themes.extend(data.iter().cloned()),
                RemoteFile::Metadata { .. } => {}
            }
        }

        Ok(workspace)
    }

    /// Convert the workspace into files suitable for a write.
    ///
    /// Order: metadata (if a commit message is given), themes, token sets.
    pub fn to_remote_files(&self, commit_message: Option<&str>) -> Vec<RemoteFile> {
        let mut files = Vec::with_capacity(self.token_sets.len() + 2);

        if let Some(message) = commit_message {
            files.push(RemoteFile::Metadata {
                path: METADATA_FILE.to_string(),
                data: RemoteMetadata {
                    commit_message: Some(message.to_string()),
                    ..RemoteMetadata::default()
                },
            });
        }

        files.push(RemoteFile::Themes {
            path: THEMES_FILE.to_string(),
            data: self.themes.clone(),
        });

        for (name, set) in &self.token_sets {
            files.push(RemoteFile::TokenSet {
                name: name.clone(),
                path: format!("{}.json", name),
                data: set.clone(),
            });
        }

        files
    }

    /// Token set names in order.
    pub fn token_set_names(&self) -> Vec<&str> {
        self.token_sets.keys().map(String::as_str).collect()
    }

    /// Get a token set by name.
    pub fn token_set(&self, name: &str) -> Option<&TokenSet> {
        self.token_sets.get(name)
    }

    /// Insert or replace a token set.
    pub fn set_token_set(&mut self, name: impl Into<String>, set: TokenSet) {
        self.token_sets.insert(name.into(), set);
    }

    /// Remove a token set, returning it if present.
    pub fn remove_token_set(&mut self, name: &str) -> Option<TokenSet> {
        self.token_sets.shift_remove(name)
    }

    /// All themes in order.
    pub fn themes(&self) -> &[ThemeObject] {
        &self.themes
    }

    /// Get a theme by id.
    pub fn theme(&self, id: &str) -> Option<&ThemeObject> {
        self.themes.iter().find(|theme| theme.id == id)
    }

    /// Save a theme and return its id.
    ///
    /// A draft with an explicit id replaces the theme with that id, keeping
    /// its style references when the draft has none. Without an id, one is
    /// derived from the current time and the payload; on collision with an
    /// existing theme the time is advanced until the id is unique.
    pub fn save_theme(&mut self, draft: ThemeDraft) -> Result<String> {
        self.save_theme_at(draft, Utc::now().timestamp_millis())
    }

    /// Save a theme as if created at `created_at_millis`.
    pub fn save_theme_at(&mut self, draft: ThemeDraft, created_at_millis: i64) -> Result<String> {
        let id = match &draft.id {
            Some(id) => id.clone(),
            None => {
                let mut tick = created_at_millis;
                loop {
                    let candidate = ThemeObject::derive_id(tick, &draft)?;
                    if self.theme(&candidate).is_none() {
                        break candidate;
                    }
                    tick += 1;
                }
            }
        };

        let mut theme = draft.into_theme(id.clone());

        match self.themes.iter_mut().find(|existing| existing.id == id) {
            Some(existing) => {
                if theme.style_refs().is_none() {
                    theme.style_references = existing.style_references.take();
                    theme.legacy_style_references = existing.legacy_style_references.take();
                }
                *existing = theme;
            }
            None => self.themes.push(theme),
        }

        Ok(id)
    }

    /// Delete a theme by id. Returns whether a theme was removed.
    pub fn delete_theme(&mut self, id: &str) -> bool {
        let before = self.themes.len();
        self.themes.retain(|theme| theme.id != id);
        self.themes.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SingleToken, TokenSetStatus};

    fn sample_set() -> TokenSet {
        let mut set = TokenSet::new();
        set.insert("red", SingleToken::new("color", "#ff0000"));
        set
    }

    #[test]
    fn test_round_trip_through_remote_files() {
        let mut workspace = Workspace::new();
        workspace.set_token_set("global", sample_set());
        workspace.set_token_set("dark", TokenSet::new());
        workspace
            .save_theme(ThemeDraft {
                id: Some("light".to_string()),
                ..ThemeDraft::new("Light").with_set("global", TokenSetStatus::Enabled)
            })
            .unwrap();

        let files = workspace.to_remote_files(Some("Sync"));
        assert_eq!(files[0].commit_message(), Some("Sync"));
        assert_eq!(files[1].path(), THEMES_FILE);
        assert_eq!(files[2].path(), "global.json");

        let restored = Workspace::from_remote_files(&files).unwrap();
        assert_eq!(restored, workspace);
    }

    #[test]
    fn test_duplicate_token_set_names_rejected() {
        let files = vec![
            RemoteFile::TokenSet {
                name: "global".to_string(),
                path: "global.json".to_string(),
                data: sample_set(),
            },
            RemoteFile::TokenSet {
                name: "global".to_string(),
                path: "other/global.json".to_string(),
                data: TokenSet::new(),
            },
        ];

        let result = Workspace::from_remote_files(&files);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_save_theme_generates_unique_ids() {
        let mut workspace = Workspace::new();
        let draft = ThemeDraft::new("Dark").with_set("global", TokenSetStatus::Enabled);

        let first = workspace.save_theme_at(draft.clone(), 42).unwrap();
        let second = workspace.save_theme_at(draft.clone(), 42).unwrap();

        assert_ne!(first, second);
        assert_eq!(first, ThemeObject::derive_id(42, &draft).unwrap());
        assert_eq!(second, ThemeObject::derive_id(43, &draft).unwrap());
        assert_eq!(workspace.themes().len(), 2);
    }

    #[test]
    fn test_save_theme_with_existing_id_replaces() {
        let mut workspace = Workspace::new();
        let mut refs = IndexMap::new();
        refs.insert("colors.red".to_string(), "S:1".to_string());

        workspace
            .save_theme(ThemeDraft {
                id: Some("light".to_string()),
                style_references: Some(refs.clone()),
                ..ThemeDraft::new("Light")
            })
            .unwrap();
        workspace
            .save_theme(ThemeDraft {
                id: Some("light".to_string()),
                ..ThemeDraft::new("Light v2").with_set("global", TokenSetStatus::Source)
            })
            .unwrap();

        assert_eq!(workspace.themes().len(), 1);
        let theme = workspace.theme("light").unwrap();
        assert_eq!(theme.name, "Light v2");
        assert_eq!(theme.style_references.as_ref(), Some(&refs));
    }

    #[test]
    fn test_delete_theme_and_token_set() {
        let mut workspace = Workspace::new();
        workspace.set_token_set("global", sample_set());
        let id = workspace.save_theme(ThemeDraft::new("Light")).unwrap();

        assert!(workspace.delete_theme(&id));
        assert!(!workspace.delete_theme(&id));
        assert!(workspace.remove_token_set("global").is_some());
        assert!(workspace.token_set_names().is_empty());
    }
}
