//! Design-token data model exchanged with remote repositories.

use blake2::{Blake2s256, Digest};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Result;

/// A single design token definition.
///
/// `value` is stored as raw text or structure; references such as
/// `{colors.primary}` are kept verbatim and never resolved here. `type` may
/// be missing when the token inherits it from its group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleToken {
    /// Token type (e.g. "color", "spacing").
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Literal value or reference expression.
    pub value: Value,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unresolved value as typed by the author, if it differs from `value`.
    #[serde(default, rename = "rawValue", skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<Value>,
    /// Any other keys found on the token, preserved as-is.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl SingleToken {
    /// Create a token with a type and value.
    pub fn new(token_type: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            token_type: Some(token_type.into()),
            value: value.into(),
            description: None,
            raw_value: None,
            extra: IndexMap::new(),
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Entry of a token set: a token, a group of nested entries, or any other
/// JSON kept verbatim (group-level `type`, `$value`-style tokens, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenNode {
    Token(SingleToken),
    Group(IndexMap<String, TokenNode>),
    Raw(Value),
}

/// A named collection of design tokens.
///
/// Key order is preserved so files re-serialize the way they were read,
/// but equality ignores it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSet(IndexMap<String, TokenNode>);

impl TokenSet {
    /// Create an empty token set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a top-level token.
    pub fn insert(&mut self, name: impl Into<String>, token: SingleToken) {
        self.0.insert(name.into(), TokenNode::Token(token));
    }

    /// Insert a top-level node (token or group).
    pub fn insert_node(&mut self, name: impl Into<String>, node: TokenNode) {
        self.0.insert(name.into(), node);
    }

    /// Get a top-level node by name.
    pub fn get(&self, name: &str) -> Option<&TokenNode> {
        self.0.get(name)
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over top-level entries in stored order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TokenNode)> {
        self.0.iter()
    }

    /// Flatten nested groups into `(dotted.path, token)` pairs.
    pub fn tokens(&self) -> Vec<(String, &SingleToken)> {
        fn walk<'a>(
            prefix: &str,
            nodes: &'a IndexMap<String, TokenNode>,
            out: &mut Vec<(String, &'a SingleToken)>,
        ) {
            for (name, node) in nodes {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", prefix, name)
                };
                match node {
                    TokenNode::Token(token) => out.push((path, token)),
                    TokenNode::Group(children) => walk(&path, children, out),
                    TokenNode::Raw(_) => {}
                }
            }
        }

        let mut out = Vec::new();
        walk("", &self.0, &mut out);
        out
    }
}

impl FromIterator<(String, SingleToken)> for TokenSet {
    fn from_iter<I: IntoIterator<Item = (String, SingleToken)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, token)| (name, TokenNode::Token(token)))
                .collect(),
        )
    }
}

/// Status of a token set inside a theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSetStatus {
    Enabled,
    Disabled,
    /// Set is used for reference resolution only.
    Source,
}

/// A named selection of token sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeObject {
    /// Immutable identifier assigned at creation.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Token set name to status.
    #[serde(default)]
    pub selected_token_sets: IndexMap<String, TokenSetStatus>,
    /// Style references keyed by token path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_references: Option<IndexMap<String, String>>,
    /// Style references under the older `$figmaStyleReferences` key. Kept
    /// under that key so files shared with older tools keep their shape.
    #[serde(
        default,
        rename = "$figmaStyleReferences",
        skip_serializing_if = "Option::is_none"
    )]
    pub legacy_style_references: Option<IndexMap<String, String>>,
    /// Any other keys found on the theme, preserved as-is.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ThemeObject {
    /// Create a theme with an explicit id.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            selected_token_sets: IndexMap::new(),
            style_references: None,
            legacy_style_references: None,
            extra: IndexMap::new(),
        }
    }

    /// Set the status of a token set.
    pub fn with_set(mut self, set: impl Into<String>, status: TokenSetStatus) -> Self {
        self.selected_token_sets.insert(set.into(), status);
        self
    }

    /// Style references under either key, `styleReferences` first.
    pub fn style_refs(&self) -> Option<&IndexMap<String, String>> {
        self.style_references
            .as_ref()
            .or(self.legacy_style_references.as_ref())
    }

    /// Derive a theme id from a creation time and the theme payload.
    ///
    /// The same `(created_at_millis, draft)` pair always yields the same id.
    /// Two drafts with identical payloads created in the same millisecond
    /// collide; callers needing uniqueness must check for it.
    pub fn derive_id(created_at_millis: i64, draft: &ThemeDraft) -> Result<String> {
        let payload = serde_json::to_vec(draft)?;

        let mut hasher = Blake2s256::new();
        hasher.update(created_at_millis.to_le_bytes());
        hasher.update(&payload);
        let digest = hasher.finalize();

        Ok(digest[..20].iter().map(|b| format!("{:02x}", b)).collect())
    }
}

/// Theme payload before an id has been assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeDraft {
    /// Explicit id; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub selected_token_sets: IndexMap<String, TokenSetStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_references: Option<IndexMap<String, String>>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ThemeDraft {
    /// Create a draft with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            selected_token_sets: IndexMap::new(),
            style_references: None,
            extra: IndexMap::new(),
        }
    }

    /// Set the status of a token set.
    pub fn with_set(mut self, set: impl Into<String>, status: TokenSetStatus) -> Self {
        self.selected_token_sets.insert(set.into(), status);
        self
    }

    /// Turn the draft into a theme with the given id.
    pub fn into_theme(self, id: String) -> ThemeObject {
        ThemeObject {
            id,
            name: self.name,
            selected_token_sets: self.selected_token_sets,
            style_references: self.style_references,
            legacy_style_references: None,
            extra: self.extra,
        }
    }
}

/// Transport-only metadata accompanying a write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMetadata {
    /// Commit message for the write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// Wire-level unit exchanged with the format translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RemoteFile {
    TokenSet {
        name: String,
        path: String,
        data: TokenSet,
    },
    Themes {
        path: String,
        data: Vec<ThemeObject>,
    },
    Metadata {
        path: String,
        data: RemoteMetadata,
    },
}

impl RemoteFile {
    /// Path of the file as emitted or supplied.
    pub fn path(&self) -> &str {
        match self {
            RemoteFile::TokenSet { path, .. }
            | RemoteFile::Themes { path, .. }
            | RemoteFile::Metadata { path, .. } => path,
        }
    }

    /// Commit message carried by a metadata file, if any.
    pub fn commit_message(&self) -> Option<&str> {
        match self {
            RemoteFile::Metadata { data, .. } => data.commit_message.as_deref(),
            _ => None,
        }
    }
}

/// Credential secret that zeroizes on drop.
#[derive(Clone, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Access the secret for use in a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_file_tagging() {
        let file: RemoteFile = serde_json::from_value(json!({
            "type": "tokenSet",
            "name": "global",
            "path": "global.json",
            "data": { "red": { "value": "#ff0000", "type": "color" } }
        }))
        .unwrap();

        match &file {
            RemoteFile::TokenSet { name, data, .. } => {
                assert_eq!(name, "global");
                assert_eq!(data.len(), 1);
            }
            other => panic!("unexpected variant: {:?}", other),
        }

        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["type"], "tokenSet");
    }

    #[test]
    fn test_metadata_commit_message() {
        let file: RemoteFile = serde_json::from_value(json!({
            "type": "metadata",
            "path": "$metadata.json",
            "data": { "commitMessage": "Initial commit" }
        }))
        .unwrap();
        assert_eq!(file.commit_message(), Some("Initial commit"));
        assert_eq!(file.path(), "$metadata.json");
    }

    #[test]
    fn test_token_preserves_unknown_keys() {
        let raw = json!({
            "type": "color",
            "value": "{colors.red}",
            "description": "Brand",
            "$extensions": { "studio": { "modify": "lighten" } }
        });
        let token: SingleToken = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(token.value, json!("{colors.red}"));
        assert!(token.extra.contains_key("$extensions"));
        assert_eq!(serde_json::to_value(&token).unwrap(), raw);
    }

    #[test]
    fn test_nested_groups_flatten() {
        let set: TokenSet = serde_json::from_value(json!({
            "colors": {
                "red": { "type": "color", "value": "#f00" },
                "shades": { "dark": { "type": "color", "value": "#300" } }
            },
            "space": { "type": "spacing", "value": 4 }
        }))
        .unwrap();

        let paths: Vec<String> = set.tokens().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["colors.red", "colors.shades.dark", "space"]);
    }

    #[test]
    fn test_group_typed_tokens_round_trip() {
        let raw = json!({
            "colors": {
                "type": "color",
                "red": { "value": "#f00" }
            },
            "spacing": {
                "$type": "dimension",
                "small": { "$value": "4px" }
            }
        });
        let set: TokenSet = serde_json::from_value(raw.clone()).unwrap();

        let tokens = set.tokens();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].0, "colors.red");
        assert_eq!(tokens[0].1.token_type, None);
        assert_eq!(serde_json::to_value(&set).unwrap(), raw);
    }

    #[test]
    fn test_token_set_must_be_an_object() {
        assert!(serde_json::from_value::<TokenSet>(json!([1, 2])).is_err());
        assert!(serde_json::from_value::<TokenSet>(json!("#ff0000")).is_err());
    }

    #[test]
    fn test_token_set_equality_ignores_order() {
        let a: TokenSet = serde_json::from_value(json!({
            "a": { "type": "color", "value": "1" },
            "b": { "type": "color", "value": "2" }
        }))
        .unwrap();
        let b: TokenSet = serde_json::from_value(json!({
            "b": { "type": "color", "value": "2" },
            "a": { "type": "color", "value": "1" }
        }))
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_theme_accepts_legacy_style_key() {
        let theme: ThemeObject = serde_json::from_value(json!({
            "id": "light",
            "name": "Light",
            "selectedTokenSets": { "global": "enabled", "core": "source" },
            "$figmaStyleReferences": { "colors.red": "S:123" }
        }))
        .unwrap();

        assert_eq!(
            theme.selected_token_sets.get("core"),
            Some(&TokenSetStatus::Source)
        );
        assert_eq!(
            theme
                .style_refs()
                .and_then(|refs| refs.get("colors.red"))
                .map(String::as_str),
            Some("S:123")
        );
    }

    #[test]
    fn test_legacy_style_key_round_trips() {
        let legacy = json!({
            "id": "l",
            "name": "L",
            "selectedTokenSets": {},
            "$figmaStyleReferences": { "a": "S:1" }
        });
        let theme: ThemeObject = serde_json::from_value(legacy.clone()).unwrap();
        assert_eq!(serde_json::to_value(&theme).unwrap(), legacy);

        let both = json!({
            "id": "l",
            "name": "L",
            "selectedTokenSets": {},
            "styleReferences": { "a": "S:2" },
            "$figmaStyleReferences": { "a": "S:1" }
        });
        let theme: ThemeObject = serde_json::from_value(both.clone()).unwrap();
        assert_eq!(theme.style_refs().and_then(|r| r.get("a")).map(String::as_str), Some("S:2"));
        assert_eq!(serde_json::to_value(&theme).unwrap(), both);
    }

    #[test]
    fn test_theme_serialization_omits_missing_references() {
        let theme = ThemeObject::new("light", "Light").with_set("global", TokenSetStatus::Enabled);
        assert_eq!(
            serde_json::to_value(&theme).unwrap(),
            json!({ "id": "light", "name": "Light", "selectedTokenSets": { "global": "enabled" } })
        );
    }

    #[test]
    fn test_derive_id_is_deterministic() {
        let draft = ThemeDraft::new("Dark").with_set("global", TokenSetStatus::Enabled);
        let a = ThemeObject::derive_id(1_700_000_000_000, &draft).unwrap();
        let b = ThemeObject::derive_id(1_700_000_000_000, &draft).unwrap();
        let c = ThemeObject::derive_id(1_700_000_000_001, &draft).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("glpat-abcdef");
        assert_eq!(format!("{:?}", secret), "Secret([REDACTED])");
        assert_eq!(secret.expose(), "glpat-abcdef");
    }
}
