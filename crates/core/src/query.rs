use crate::embeddings::Embedder;
use crate::models::DEFAULT_TOP_K;
use crate::traits::VectorIndex;
use crate::{DocumentStore, SearchMatch, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub context: Vec<SearchMatch>,
    pub question: String,
}

/// Embeds a question and returns the closest stored chunks. Holds no state
/// beyond the shared store handle.
pub struct QueryService<E, V> {
    store: Arc<DocumentStore<E, V>>,
    top_k: usize,
}

impl<E, V> Clone for QueryService<E, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            top_k: self.top_k,
        }
    }
}

impl<E, V> QueryService<E, V>
where
    E: Embedder + 'static,
    V: VectorIndex,
{
    pub fn new(store: Arc<DocumentStore<E, V>>) -> Self {
        Self {
            store,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn answer(&self, question: &str) -> Result<QueryResponse, StoreError> {
        let query_vector = self.store.embed_query(question).await?;
        let context = self.store.search(&query_vector, self.top_k).await?;

        Ok(QueryResponse {
            context,
            question: question.to_string(),
        })
    }
}
