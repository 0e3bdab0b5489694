use crate::{DocumentRecord, SearchMatch, StoreError};
use async_trait::async_trait;

/// Persistent nearest-neighbour index behind a [`crate::DocumentStore`].
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn count(&self) -> Result<u64, StoreError>;

    async fn insert(&self, records: &[DocumentRecord]) -> Result<(), StoreError>;

    /// At most `top_k` records, most similar first.
    async fn nearest(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchMatch>, StoreError>;
}

#[async_trait]
impl<T: VectorIndex + ?Sized> VectorIndex for Box<T> {
    async fn count(&self) -> Result<u64, StoreError> {
        (**self).count().await
    }

    async fn insert(&self, records: &[DocumentRecord]) -> Result<(), StoreError> {
        (**self).insert(records).await
    }

    async fn nearest(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchMatch>, StoreError> {
        (**self).nearest(query_vector, top_k).await
    }
}
