use crate::traits::VectorIndex;
use crate::{DocumentRecord, SearchMatch, StoreError};
use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::fs;
use std::path::{Path, PathBuf};

/// JSON-encoded [`DocumentRecord`] keyed by its sequence number.
const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
const DIMENSION_KEY: &str = "dimension";

/// On-disk collection in a single redb file under the persist directory.
///
/// Search is an exhaustive scan ranked by cosine distance.
pub struct LocalIndex {
    db: Database,
    path: PathBuf,
}

impl LocalIndex {
    /// Opens `<persist_dir>/<collection>.redb`, creating the directory and the
    /// database if they are missing.
    pub fn open(persist_dir: &Path, collection: &str) -> Result<Self, StoreError> {
        fs::create_dir_all(persist_dir)?;
        let path = persist_dir.join(format!("{collection}.redb"));
        let db = Database::create(&path)?;

        let txn = db.begin_write()?;
        txn.open_table(RECORDS)?;
        txn.open_table(META)?;
        txn.commit()?;

        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Embedding length pinned by the first insert, if any.
    pub fn dimension(&self) -> Result<Option<usize>, StoreError> {
        let txn = self.db.begin_read()?;
        let meta = txn.open_table(META)?;
        let pinned = meta.get(DIMENSION_KEY)?.map(|guard| guard.value() as usize);
        Ok(pinned)
    }
}

impl std::fmt::Debug for LocalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIndex")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VectorIndex for LocalIndex {
    async fn count(&self) -> Result<u64, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        Ok(table.len()?)
    }

    async fn insert(&self, records: &[DocumentRecord]) -> Result<(), StoreError> {
        let Some(first) = records.first() else {
            return Ok(());
        };

        let txn = self.db.begin_write()?;
        {
            let mut meta = txn.open_table(META)?;
            let pinned = meta.get(DIMENSION_KEY)?.map(|guard| guard.value() as usize);
            let expected = pinned.unwrap_or(first.embedding.len());

            if let Some(record) = records
                .iter()
                .find(|record| record.embedding.len() != expected)
            {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: record.embedding.len(),
                });
            }
            if pinned.is_none() {
                meta.insert(DIMENSION_KEY, expected as u64)?;
            }

            let mut table = txn.open_table(RECORDS)?;
            for record in records {
                let bytes = serde_json::to_vec(record)?;
                table.insert(record.seq, bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    async fn nearest(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchMatch>, StoreError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let txn = self.db.begin_read()?;
        let meta = txn.open_table(META)?;
        if let Some(expected) = meta.get(DIMENSION_KEY)?.map(|guard| guard.value() as usize) {
            if expected != query_vector.len() {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
        }

        let table = txn.open_table(RECORDS)?;
        let mut scored = Vec::new();
        for entry in table.iter()? {
            let (seq, bytes) = entry?;
            let record: DocumentRecord = serde_json::from_slice(bytes.value())?;
            let distance = cosine_distance(query_vector, &record.embedding);
            scored.push((distance, seq.value(), record));
        }

        scored.sort_by(|left, right| left.0.total_cmp(&right.0).then(left.1.cmp(&right.1)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(distance, _, record)| SearchMatch {
                text: record.text,
                metadata: record.metadata,
                distance,
            })
            .collect())
    }
}

/// `1 - cos(a, b)`; a zero vector is treated as orthogonal to everything.
pub fn cosine_distance(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 1.0;
    }

    1.0 - dot / (left_norm * right_norm)
}
