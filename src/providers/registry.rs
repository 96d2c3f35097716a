use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use super::descriptor::ProviderSummary;
use super::traits::ResolutionStrategy;
use crate::platform::Platform;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("provider not found: {0}")]
    NotFound(String),
}

/// Registry of resolution providers keyed by id
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ResolutionStrategy>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-registering an id replaces the earlier provider.
    pub fn register(&mut self, strategy: Arc<dyn ResolutionStrategy>) {
        let id = strategy.descriptor().id.clone();
        self.providers.insert(id, strategy);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn ResolutionStrategy>, RegistryError> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn has_provider(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// Providers serving `platform`, in priority order.
    ///
    /// Ties keep id order, so the sequence is stable for a given registry.
    pub fn providers_for(&self, platform: Platform) -> Vec<Arc<dyn ResolutionStrategy>> {
        let mut matching: Vec<_> = self
            .providers
            .values()
            .filter(|strategy| strategy.descriptor().supports(platform))
            .cloned()
            .collect();

        matching.sort_by_key(|strategy| strategy.descriptor().priority);
        matching
    }

    pub fn describe_available(&self, platform: Platform) -> Vec<ProviderSummary> {
        self.providers_for(platform)
            .iter()
            .map(|strategy| strategy.descriptor().summary())
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
