//! Null provider used when no embeddings backend is configured.

use async_trait::async_trait;

use arcp_domain::error::{Error, Result};

use crate::EmbeddingProvider;

pub struct NullEmbeddings {
    dimensions: usize,
}

impl NullEmbeddings {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for NullEmbeddings {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::Embedding("no embedding provider configured".into()))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
