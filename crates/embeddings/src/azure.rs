//! Azure OpenAI embeddings over the REST deployments API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use arcp_domain::error::{Error, Result};

use crate::EmbeddingProvider;

pub struct AzureEmbeddings {
    client: reqwest::Client,
    url: String,
    api_key: String,
    dimensions: usize,
    timeout: Duration,
}

#[derive(Deserialize)]
struct EmbeddingsBody {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl AzureEmbeddings {
    pub fn new(
        endpoint: String,
        api_key: String,
        deployment: String,
        api_version: String,
        dimensions: usize,
        timeout_secs: u64,
    ) -> Result<Self> {
        let base = endpoint.trim_end_matches('/');
        let url =
            format!("{base}/openai/deployments/{deployment}/embeddings?api-version={api_version}");
        let timeout = Duration::from_secs(timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Embedding(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url,
            api_key,
            dimensions,
            timeout,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for AzureEmbeddings {
    /// One embedding per call. The outer `tokio::time::timeout` is the hard
    /// bound; the reqwest client timeout covers connect/read stalls inside it.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&serde_json::json!({ "input": text }));

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| Error::Timeout("embedding call".into()))?
            .map_err(|e| Error::Embedding(format!("request: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Embedding(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let body: EmbeddingsBody = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("decode: {e}")))?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Embedding("empty embeddings response".into()))?;

        if vector.len() != self.dimensions {
            tracing::warn!(
                got = vector.len(),
                expected = self.dimensions,
                "embedding dimensionality mismatch"
            );
        }
        Ok(vector)
    }

    fn is_available(&self) -> bool {
        true
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
