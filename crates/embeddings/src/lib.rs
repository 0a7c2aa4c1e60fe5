//! Embedding providers: fixed-dimensional text vectors for semantic search.
//!
//! A provider may be unavailable (unconfigured, unreachable, or timing out);
//! registration and search must behave correctly either way, so callers
//! always check [`EmbeddingProvider::is_available`] and treat `embed` errors
//! as degradation, never as request failure.

pub mod azure;
pub mod null;

pub use azure::AzureEmbeddings;
pub use null::NullEmbeddings;

use std::sync::Arc;

use async_trait::async_trait;

use arcp_domain::config::EmbeddingConfig;
use arcp_domain::error::Result;

/// Abstraction over an embeddings backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text` into a vector of [`dimensions`](Self::dimensions) floats.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Whether the provider is configured and expected to serve calls.
    fn is_available(&self) -> bool;

    /// Dimensionality of the produced vectors.
    fn dimensions(&self) -> usize;
}

/// Build the configured provider, or the null provider when the embedding
/// endpoint is unset.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match (&config.azure_endpoint, &config.azure_api_key) {
        (Some(endpoint), Some(api_key)) => {
            tracing::info!(
                deployment = %config.azure_deployment,
                dimensions = config.dimensions,
                "embedding provider ready"
            );
            Ok(Arc::new(AzureEmbeddings::new(
                endpoint.clone(),
                api_key.clone(),
                config.azure_deployment.clone(),
                config.azure_api_version.clone(),
                config.dimensions,
                config.timeout_secs,
            )?))
        }
        _ => {
            tracing::info!("no embedding provider configured — search will use lexical fallback");
            Ok(Arc::new(NullEmbeddings::new(config.dimensions)))
        }
    }
}
