//! Storage provider configuration.

use serde::Deserialize;
use std::path::Path;
use url::Url;

use tokensync_common::{Error, Result, Secret};

use crate::context::{FileLayout, ProviderContext};

fn default_branch() -> String {
    "main".to_string()
}

fn default_file_path() -> String {
    "tokens.json".to_string()
}

/// Configuration of one remote token store.
///
/// ```json
/// {
///   "provider": "gitlab",
///   "id": "six7/figma-tokens",
///   "secret": "glpat-...",
///   "baseUrl": "https://gitlab.example.com",
///   "branch": "main",
///   "filePath": "data/tokens.json",
///   "multiFile": false
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Registry name of the provider (`gitlab`, `github`, `memory`).
    pub provider: String,
    /// `owner/repository`.
    pub id: String,
    #[serde(default)]
    pub secret: Secret,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// File (single-file) or directory (multi-file) in the repository.
    #[serde(default = "default_file_path")]
    pub file_path: String,
    #[serde(default)]
    pub multi_file: bool,
}

impl StorageConfig {
    /// Parse a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("Invalid storage configuration: {}", e)))
    }

    /// Read and parse a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check the values that can be checked without network access.
    ///
    /// # Errors
    /// - Empty provider or branch
    /// - `id` not of the form `owner/repository`
    /// - `baseUrl` not an http(s) URL
    pub fn validate(&self) -> Result<()> {
        if self.provider.trim().is_empty() {
            return Err(Error::InvalidInput("Provider must not be empty".to_string()));
        }
        if self.branch.trim().is_empty() {
            return Err(Error::InvalidInput("Branch must not be empty".to_string()));
        }
        ProviderContext::from_full_name(Secret::default(), &self.id)?;

        if let Some(base_url) = &self.base_url {
            let url = Url::parse(base_url).map_err(|e| {
                Error::InvalidInput(format!("Invalid base URL '{}': {}", base_url, e))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::InvalidInput(format!(
                    "Base URL must use http or https: {}",
                    base_url
                )));
            }
        }
        Ok(())
    }

    pub fn layout(&self) -> FileLayout {
        if self.multi_file {
            FileLayout::MultiFile
        } else {
            FileLayout::SingleFile
        }
    }

    /// Build the provider context this configuration describes.
    pub fn to_context(&self) -> Result<ProviderContext> {
        self.validate()?;
        let mut context = ProviderContext::from_full_name(self.secret.clone(), &self.id)?
            .with_branch(self.branch.trim())
            .with_path(&self.file_path)
            .with_layout(self.layout());
        context.base_url = self.base_url.clone();
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::from_json(
            r#"{"provider": "gitlab", "id": "six7/figma-tokens", "secret": "abc"}"#,
        )
        .unwrap();

        assert_eq!(config.branch, "main");
        assert_eq!(config.file_path, "tokens.json");
        assert!(!config.multi_file);
        assert_eq!(config.secret.expose(), "abc");
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_to_context() {
        let config = StorageConfig::from_json(
            r#"{
                "provider": "gitlab",
                "id": "design/web/tokens",
                "baseUrl": "https://git.example.com",
                "branch": "develop",
                "filePath": "/data/",
                "multiFile": true
            }"#,
        )
        .unwrap();

        let context = config.to_context().unwrap();
        assert_eq!(context.owner, "design/web");
        assert_eq!(context.repository, "tokens");
        assert_eq!(context.branch, "develop");
        assert_eq!(context.path, "data");
        assert_eq!(context.layout, FileLayout::MultiFile);
        assert_eq!(context.base_url.as_deref(), Some("https://git.example.com"));
    }

    #[test]
    fn test_validation_errors() {
        let bad_id = StorageConfig::from_json(r#"{"provider": "github", "id": "tokens"}"#).unwrap();
        assert!(matches!(bad_id.validate(), Err(Error::InvalidInput(_))));

        let bad_url = StorageConfig::from_json(
            r#"{"provider": "github", "id": "a/b", "baseUrl": "not a url"}"#,
        )
        .unwrap();
        assert!(bad_url.validate().is_err());

        assert!(StorageConfig::from_json(r#"{"id": "a/b"}"#).is_err());
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let config =
            StorageConfig::from_json(r#"{"provider": "github", "id": "a/b", "secret": "ghp_x"}"#)
                .unwrap();
        assert!(!format!("{:?}", config).contains("ghp_x"));
    }
}
