use crate::embeddings::Embedder;
use crate::traits::VectorIndex;
use crate::{DocumentRecord, EmbedError, Metadata, SearchMatch, StoreError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Embedder plus vector index: the handle both ingestion and queries share.
///
/// Record ids come from a counter owned by the store. It is seeded from the
/// index size on first write and only advanced while the write lock is held,
/// so two writers on one handle never hand out the same `doc_<n>`.
///
/// Embedding runs on tokio's blocking pool; model loading and inference never
/// occupy an async worker.
pub struct DocumentStore<E, V> {
    embedder: Arc<E>,
    index: V,
    next_seq: Mutex<Option<u64>>,
}

impl<E, V> DocumentStore<E, V>
where
    E: Embedder + 'static,
    V: VectorIndex,
{
    pub fn new(embedder: E, index: V) -> Self {
        Self {
            embedder: Arc::new(embedder),
            index,
            next_seq: Mutex::new(None),
        }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        self.index.count().await
    }

    /// Embeds `texts` on the blocking pool, one vector per input.
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbedError> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || embedder.embed_many(&texts))
            .await
            .map_err(|error| EmbedError::Inference(format!("embedding task failed: {error}")))?
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbedError::BatchSize {
                expected: 1,
                actual: 0,
            })
    }

    /// Embeds `docs` in one batch and appends them with sequential ids.
    ///
    /// An empty `metadatas` means every record gets empty metadata; otherwise
    /// there must be exactly one entry per document. Returns the new ids.
    pub async fn add(
        &self,
        docs: &[String],
        metadatas: Vec<Metadata>,
    ) -> Result<Vec<String>, StoreError> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let metadatas = if metadatas.is_empty() {
            vec![Metadata::new(); docs.len()]
        } else if metadatas.len() == docs.len() {
            metadatas
        } else {
            return Err(StoreError::MetadataLength {
                docs: docs.len(),
                metadatas: metadatas.len(),
            });
        };

        let embeddings = self.embed(docs.to_vec()).await?;
        if embeddings.len() != docs.len() {
            return Err(EmbedError::BatchSize {
                expected: docs.len(),
                actual: embeddings.len(),
            }
            .into());
        }

        let mut next_seq = self.next_seq.lock().await;
        let first = match *next_seq {
            Some(seq) => seq,
            None => self.index.count().await?,
        };

        let records: Vec<DocumentRecord> = docs
            .iter()
            .zip(embeddings)
            .zip(metadatas)
            .enumerate()
            .map(|(offset, ((text, embedding), metadata))| {
                DocumentRecord::new(first + offset as u64, text.clone(), embedding, metadata)
            })
            .collect();

        self.index.insert(&records).await?;
        *next_seq = Some(first + records.len() as u64);

        debug!(
            added = records.len(),
            total = first + records.len() as u64,
            "added documents"
        );

        Ok(records.into_iter().map(|record| record.id).collect())
    }

    /// Up to `top_k` records nearest to `query_embedding`, most similar first.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchMatch>, StoreError> {
        self.index.nearest(query_embedding, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CharacterNgramEmbedder, LocalIndex};

    fn open_store(
        dir: &std::path::Path,
    ) -> Result<DocumentStore<CharacterNgramEmbedder, LocalIndex>, StoreError> {
        Ok(DocumentStore::new(
            CharacterNgramEmbedder::default(),
            LocalIndex::open(dir, "my_collection")?,
        ))
    }

    #[tokio::test]
    async fn add_then_search_round_trips() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = open_store(dir.path())?;

        let ids = store
            .add(
                &["hello world".to_string()],
                vec![Metadata::new().with("k", "v")],
            )
            .await?;
        assert_eq!(ids, vec!["doc_0".to_string()]);

        let query = store.embed_query("hello world").await?;
        let hits = store.search(&query, 1).await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "hello world");
        assert_eq!(hits[0].metadata, Metadata::new().with("k", "v"));
        Ok(())
    }

    #[tokio::test]
    async fn top_k_is_bounded_by_collection_size() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = open_store(dir.path())?;
        store
            .add(&["alpha".to_string(), "beta".to_string()], Vec::new())
            .await?;

        let query = store.embed_query("alpha").await?;
        let hits = store.search(&query, 5).await?;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "alpha");
        assert!(hits.iter().all(|hit| hit.metadata.is_empty()));
        Ok(())
    }

    #[tokio::test]
    async fn ids_continue_from_persisted_count() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        {
            let store = open_store(dir.path())?;
            store
                .add(&["one".to_string(), "two".to_string()], Vec::new())
                .await?;
        }

        let store = open_store(dir.path())?;
        let ids = store.add(&["three".to_string()], Vec::new()).await?;
        assert_eq!(ids, vec!["doc_2".to_string()]);
        assert_eq!(store.count().await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_metadata_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = open_store(dir.path())?;

        let result = store
            .add(
                &["a".to_string(), "b".to_string()],
                vec![Metadata::new()],
            )
            .await;
        assert!(matches!(
            result,
            Err(StoreError::MetadataLength {
                docs: 2,
                metadatas: 1
            })
        ));
        assert_eq!(store.count().await?, 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_get_distinct_ids() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(open_store(dir.path())?);

        let mut handles = Vec::new();
        for writer in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .add(&[format!("writer {writer}")], Vec::new())
                    .await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.extend(handle.await??);
        }
        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), 8);
        assert_eq!(store.count().await?, 8);
        Ok(())
    }
}
