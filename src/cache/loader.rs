//! Artifact sources and the cache-backed loader.

use std::future::Future;

use super::ArtifactCache;
use crate::artifacts::{ModelArtifactBundle, ModelJson};
use crate::config::LoadOptions;

/// A mechanism able to produce a model artifact bundle
pub trait ArtifactSource: Send + Sync {
    /// Identifier used in log and error messages
    fn name(&self) -> &str;

    /// Retrieve the bundle.
    ///
    /// Sources without a retrieval capability keep the default, which fails
    /// with a configuration error.
    fn load(&self) -> impl Future<Output = crate::Result<ModelArtifactBundle>> + Send {
        let name = self.name().to_string();
        async move {
            Err(crate::GraphModelError::Configuration(format!(
                "artifact source '{}' does not support loading",
                name
            )))
        }
    }
}

/// Reads a topology document and a weight blob from an artifact cache
#[derive(Debug)]
pub struct CacheArtifactLoader<'a, C: ArtifactCache> {
    cache: &'a C,
    topology_key: String,
    weights_key: String,
}

impl<'a, C: ArtifactCache> CacheArtifactLoader<'a, C> {
    /// Create a loader; the options' key prefix is applied to both keys
    pub fn new(cache: &'a C, topology_key: &str, weights_key: &str, options: &LoadOptions) -> Self {
        Self {
            cache,
            topology_key: options.resolve_key(topology_key),
            weights_key: options.resolve_key(weights_key),
        }
    }

    pub fn topology_key(&self) -> &str {
        &self.topology_key
    }

    pub fn weights_key(&self) -> &str {
        &self.weights_key
    }

    async fn fetch(&self, key: &str) -> crate::Result<Vec<u8>> {
        self.cache
            .get(key)
            .await?
            .ok_or_else(|| crate::GraphModelError::NotFound(key.to_string()))
    }
}

impl<C: ArtifactCache> ArtifactSource for CacheArtifactLoader<'_, C> {
    fn name(&self) -> &str {
        &self.topology_key
    }

    async fn load(&self) -> crate::Result<ModelArtifactBundle> {
        let topology = self.fetch(&self.topology_key).await?;
        let model_json = ModelJson::from_slice(&topology).map_err(|e| match e {
            crate::GraphModelError::Deserialization(msg) => crate::GraphModelError::Deserialization(
                format!("{}: {}", self.topology_key, msg),
            ),
            other => other,
        })?;

        let weight_data = self.fetch(&self.weights_key).await?;
        tracing::debug!(
            "Read {} topology bytes and {} weight bytes from cache",
            topology.len(),
            weight_data.len()
        );

        ModelArtifactBundle::from_model_json(model_json, weight_data)
    }
}
