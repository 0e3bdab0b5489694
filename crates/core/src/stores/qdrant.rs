use crate::traits::VectorIndex;
use crate::{DocumentRecord, Metadata, SearchMatch, StoreError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use url::Url;

const BACKEND: &str = "qdrant";

/// Remote collection on a Qdrant server, ranked by cosine distance.
pub struct QdrantIndex {
    endpoint: Url,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantIndex {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Result<Self, StoreError> {
        let mut endpoint = Url::parse(endpoint)?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            endpoint,
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        })
    }

    fn collection_url(&self, suffix: &str) -> Result<Url, StoreError> {
        Ok(self
            .endpoint
            .join(&format!("collections/{}{}", self.collection, suffix))?)
    }

    /// Creates the collection with cosine distance unless it already exists.
    /// An existing collection must have been created for `vector_size`.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        let response = self.client.get(self.collection_url("")?).send().await?;
        if response.status().is_success() {
            let parsed: Value = response.json().await?;
            return check_vector_size(&parsed, self.vector_size);
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response.status()));
        }

        let response = self
            .client
            .put(self.collection_url("")?)
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn count(&self) -> Result<u64, StoreError> {
        let response = self
            .client
            .post(self.collection_url("/points/count")?)
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .ok_or_else(|| malformed("count response is missing result.count"))
    }

    async fn insert(&self, records: &[DocumentRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .iter()
            .map(|record| to_point(record, self.vector_size))
            .collect::<Result<Vec<_>, StoreError>>()?;

        let response = self
            .client
            .put(self.collection_url("/points?wait=true")?)
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        Ok(())
    }

    async fn nearest(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchMatch>, StoreError> {
        if query_vector.len() != self.vector_size {
            return Err(StoreError::DimensionMismatch {
                expected: self.vector_size,
                actual: query_vector.len(),
            });
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.collection_url("/points/search")?)
            .json(&json!({
                "vector": query_vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        parse_search_hits(&parsed)
    }
}

fn backend_error(status: StatusCode) -> StoreError {
    malformed(status.to_string())
}

fn malformed(details: impl Into<String>) -> StoreError {
    StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: details.into(),
    }
}

fn check_vector_size(collection: &Value, expected: usize) -> Result<(), StoreError> {
    let actual = collection
        .pointer("/result/config/params/vectors/size")
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed("collection info is missing a single vector size"))?;

    let actual = usize::try_from(actual)
        .map_err(|_| malformed(format!("collection vector size {actual} is out of range")))?;
    if actual != expected {
        return Err(StoreError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

fn to_point(record: &DocumentRecord, vector_size: usize) -> Result<Value, StoreError> {
    if record.embedding.len() != vector_size {
        return Err(StoreError::DimensionMismatch {
            expected: vector_size,
            actual: record.embedding.len(),
        });
    }

    Ok(json!({
        "id": record.seq,
        "vector": record.embedding,
        "payload": {
            "id": record.id,
            "text": record.text,
            "metadata": record.metadata,
        },
    }))
}

fn parse_search_hits(parsed: &Value) -> Result<Vec<SearchMatch>, StoreError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("search response is missing result"))?;

    let mut result = Vec::with_capacity(hits.len());
    for hit in hits {
        let text = hit
            .pointer("/payload/text")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("search hit is missing payload.text"))?
            .to_string();
        let metadata = match hit.pointer("/payload/metadata") {
            Some(value) => serde_json::from_value::<Metadata>(value.clone())?,
            None => Metadata::new(),
        };
        let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);

        result.push(SearchMatch {
            text,
            metadata,
            distance: 1.0 - score as f32,
        });
    }

    Ok(result)
}
