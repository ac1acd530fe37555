//! Translation between remote files and repository blobs.
//!
//! Two layouts are supported:
//! - single file: one document `{ "$themes": [...], "<set>": {...}, ... }`
//! - multi file: `<dir>/<set>.json` per token set plus `<dir>/$themes.json`
//!
//! Metadata files only carry the commit message and are never committed.

use indexmap::IndexSet;
use serde_json::{Map, Value};

use tokensync_common::{Error, RemoteFile, Result, ThemeObject, TokenSet};

use crate::context::{join_path, FileLayout};
use crate::remote::TreeEntry;

/// Reserved key holding the themes in a single-file document.
pub const THEMES_KEY: &str = "$themes";
/// Reserved key for metadata; skipped when reading.
pub const METADATA_KEY: &str = "$metadata";
/// File name of the themes file in a multi-file directory.
pub const THEMES_FILE_NAME: &str = "$themes.json";
/// File name of the metadata file; never read or written remotely.
pub const METADATA_FILE_NAME: &str = "$metadata.json";
/// Commit message used when no metadata file supplies one.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Update design tokens";

/// Serialized file ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub path: String,
    pub content: String,
}

/// File to fetch when reading a multi-file directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiFileEntry {
    Themes { path: String },
    TokenSet { name: String, path: String },
}

impl MultiFileEntry {
    pub fn path(&self) -> &str {
        match self {
            MultiFileEntry::Themes { path } | MultiFileEntry::TokenSet { path, .. } => path,
        }
    }
}

/// Commit message from the first metadata file that has one.
pub fn commit_message(files: &[RemoteFile]) -> String {
    files
        .iter()
        .find_map(RemoteFile::commit_message)
        .unwrap_or(DEFAULT_COMMIT_MESSAGE)
        .to_string()
}

/// Serialize `files` for the given layout rooted at `path`.
///
/// # Errors
/// - Duplicate, empty or reserved token set names
pub fn marshal(files: &[RemoteFile], layout: FileLayout, path: &str) -> Result<Vec<Blob>> {
    validate(files)?;
    match layout {
        FileLayout::SingleFile => Ok(vec![marshal_single(files, path)?]),
        FileLayout::MultiFile => marshal_multi(files, path),
    }
}

/// Build the single-file document. `$themes` comes first, then token sets in
/// input order.
pub fn marshal_single(files: &[RemoteFile], path: &str) -> Result<Blob> {
    let mut document = Map::new();
    document.insert(
        THEMES_KEY.to_string(),
        serde_json::to_value(collect_themes(files))?,
    );

    for file in files {
        if let RemoteFile::TokenSet { name, data, .. } = file {
            document.insert(name.clone(), serde_json::to_value(data)?);
        }
    }

    Ok(Blob {
        path: path.to_string(),
        content: to_pretty(&Value::Object(document))?,
    })
}

/// Build one blob per token set plus `$themes.json` when themes are given.
pub fn marshal_multi(files: &[RemoteFile], dir: &str) -> Result<Vec<Blob>> {
    let mut blobs = Vec::new();

    if files.iter().any(|f| matches!(f, RemoteFile::Themes { .. })) {
        blobs.push(Blob {
            path: join_path(dir, THEMES_FILE_NAME),
            content: to_pretty(&serde_json::to_value(collect_themes(files))?)?,
        });
    }

    for file in files {
        if let RemoteFile::TokenSet { name, data, .. } = file {
            blobs.push(Blob {
                path: join_path(dir, &format!("{}.json", name)),
                content: to_pretty(&serde_json::to_value(data)?)?,
            });
        }
    }

    Ok(blobs)
}

/// Parse a single-file document.
///
/// Emits the themes file first, then one token set per remaining key in
/// document order. Emitted paths are relative to `path` as if the document
/// were a directory, matching what a multi-file read would produce.
///
/// # Errors
/// - Content is not a JSON object, or an entry has the wrong shape
pub fn unmarshal_single(path: &str, content: &str) -> Result<Vec<RemoteFile>> {
    let document: Map<String, Value> = match serde_json::from_str(content)? {
        Value::Object(map) => map,
        other => {
            return Err(Error::MalformedContent(format!(
                "Expected a JSON object in {}, found {}",
                path,
                kind_of(&other)
            )))
        }
    };

    let mut files = Vec::with_capacity(document.len());
    let themes = match document.get(THEMES_KEY) {
        Some(value) => parse_themes(value.clone())?,
        None => Vec::new(),
    };
    files.push(RemoteFile::Themes {
        path: join_path(path, THEMES_FILE_NAME),
        data: themes,
    });

    for (name, value) in document {
        if name == THEMES_KEY || name == METADATA_KEY {
            continue;
        }
        let data: TokenSet = serde_json::from_value(value).map_err(|e| {
            Error::MalformedContent(format!("Token set '{}' in {}: {}", name, path, e))
        })?;
        files.push(RemoteFile::TokenSet {
            path: join_path(path, &format!("{}.json", name)),
            name,
            data,
        });
    }

    Ok(files)
}

/// Decide which blobs of a multi-file directory listing to fetch.
///
/// The themes file comes first; token sets follow in listing order. Blobs
/// in subdirectories become token sets named by their relative path.
pub fn plan_multi_file_read(dir: &str, entries: &[TreeEntry]) -> Vec<MultiFileEntry> {
    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    };

    let mut themes = None;
    let mut sets = Vec::new();

    for entry in entries.iter().filter(|e| e.is_blob()) {
        let Some(relative) = entry.path.strip_prefix(prefix.as_str()) else {
            continue;
        };
        if relative == THEMES_FILE_NAME {
            themes = Some(MultiFileEntry::Themes {
                path: entry.path.clone(),
            });
            continue;
        }
        if relative == METADATA_FILE_NAME {
            continue;
        }
        if let Some(name) = relative.strip_suffix(".json") {
            sets.push(MultiFileEntry::TokenSet {
                name: name.to_string(),
                path: entry.path.clone(),
            });
        }
    }

    themes.into_iter().chain(sets).collect()
}

/// Parse one fetched multi-file blob.
pub fn unmarshal_multi_file(entry: &MultiFileEntry, content: &str) -> Result<RemoteFile> {
    let value: Value = serde_json::from_str(content)?;
    match entry {
        MultiFileEntry::Themes { path } => Ok(RemoteFile::Themes {
            path: path.clone(),
            data: parse_themes(value)?,
        }),
        MultiFileEntry::TokenSet { name, path } => {
            if !value.is_object() {
                return Err(Error::MalformedContent(format!(
                    "Expected a JSON object in {}, found {}",
                    path,
                    kind_of(&value)
                )));
            }
            Ok(RemoteFile::TokenSet {
                name: name.clone(),
                path: path.clone(),
                data: serde_json::from_value(value)?,
            })
        }
    }
}

/// Accept a themes array, a single theme object, or null.
fn parse_themes(value: Value) -> Result<Vec<ThemeObject>> {
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::MalformedContent(format!(
            "Expected themes array, found {}",
            kind_of(&other)
        ))),
    }
}

fn collect_themes(files: &[RemoteFile]) -> Vec<&ThemeObject> {
    files
        .iter()
        .filter_map(|file| match file {
            RemoteFile::Themes { data, .. } => Some(data.iter()),
            _ => None,
        })
        .flatten()
        .collect()
}

fn validate(files: &[RemoteFile]) -> Result<()> {
    let mut names = IndexSet::new();
    for file in files {
        if let RemoteFile::TokenSet { name, .. } = file {
            if name.is_empty() || name.starts_with('/') || name.ends_with('/') {
                return Err(Error::InvalidInput(format!(
                    "Invalid token set name: '{}'",
                    name
                )));
            }
            if name == THEMES_KEY || name == METADATA_KEY {
                return Err(Error::InvalidInput(format!(
                    "Token set name '{}' is reserved",
                    name
                )));
            }
            if !names.insert(name.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "Duplicate token set name: {}",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn to_pretty(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
