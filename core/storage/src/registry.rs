//! Provider registry for resolving storage providers by name.

use std::collections::HashMap;

use tokensync_common::{Error, Result};

use crate::config::StorageConfig;
use crate::github::GithubTokenStorage;
use crate::gitlab::GitlabTokenStorage;
use crate::memory::MemoryHost;
use crate::provider::TokenStorage;

/// Factory function type for creating providers.
pub type ProviderFactory =
    Box<dyn Fn(&StorageConfig) -> Result<Box<dyn TokenStorage>> + Send + Sync>;

/// Registry for storage provider factories.
///
/// Allows dynamic registration and resolution of storage providers
/// by name and configuration.
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a provider factory.
    ///
    /// # Preconditions
    /// - `name` must be unique within the registry
    ///
    /// # Errors
    /// - Returns error if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: ProviderFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::InvalidInput(format!(
                "Provider '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Create the provider named by `config.provider`.
    ///
    /// # Errors
    /// - Provider not registered
    /// - Configuration invalid for the provider
    pub fn resolve(&self, config: &StorageConfig) -> Result<Box<dyn TokenStorage>> {
        let factory = self.factories.get(&config.provider).ok_or_else(|| {
            Error::NotFound(format!("Provider '{}' is not registered", config.provider))
        })?;
        factory(config)
    }

    /// Registered provider names, sorted.
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider is registered.
    pub fn has_provider(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory serving every configuration from `host`.
///
/// The configured repository is created on the host on first use and the
/// provider speaks the GitLab API shape.
pub fn memory_factory(host: MemoryHost) -> ProviderFactory {
    Box::new(
        move |config: &StorageConfig| -> Result<Box<dyn TokenStorage>> {
            let context = config.to_context()?;
            host.seed(&config.id);
            Ok(Box::new(GitlabTokenStorage::with_api(host.clone(), context)))
        },
    )
}

/// Create a registry with `gitlab`, `github` and `memory` providers.
pub fn create_default_registry() -> ProviderRegistry {
    let mut factories: HashMap<String, ProviderFactory> = HashMap::new();

    factories.insert(
        "gitlab".to_string(),
        Box::new(
            |config: &StorageConfig| -> Result<Box<dyn TokenStorage>> {
                Ok(Box::new(GitlabTokenStorage::new(config.to_context()?)?))
            },
        ),
    );
    factories.insert(
        "github".to_string(),
        Box::new(
            |config: &StorageConfig| -> Result<Box<dyn TokenStorage>> {
                Ok(Box::new(GithubTokenStorage::new(config.to_context()?)?))
            },
        ),
    );
    factories.insert("memory".to_string(), memory_factory(MemoryHost::new()));

    ProviderRegistry { factories }
}
