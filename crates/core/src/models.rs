use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_CHUNK_SIZE: usize = 300;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_PDF_FOLDER: &str = "./.pdfs";
pub const DEFAULT_PERSIST_DIR: &str = "./chroma_db";
pub const DEFAULT_COLLECTION: &str = "my_collection";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Flat key/value metadata attached to a stored record.
///
/// Serialises as a plain JSON object so the `/query` response carries the
/// same shape that was written at ingestion time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(MetadataValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    fn get_u32(&self, key: &str) -> Option<u32> {
        match self.0.get(key) {
            Some(MetadataValue::Int(value)) => u32::try_from(*value).ok(),
            _ => None,
        }
    }

    /// Parses the ingestion origin back out of the metadata, if it has one.
    pub fn origin(&self) -> Option<ChunkOrigin> {
        let source_file = self.get_str("source_file")?.to_string();
        let folder = self.get_str("folder")?.to_string();
        let page_number = self.get_u32("page_number")?;

        match self.get_str("type")? {
            PAGE_TEXT => Some(ChunkOrigin::PageText {
                source_file,
                folder,
                page_number,
            }),
            PAGE_TABLE => Some(ChunkOrigin::PageTable {
                source_file,
                folder,
                page_number,
                table_index: self.get_u32("table_index")?,
            }),
            _ => None,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: Into<String>,
    V: Into<MetadataValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

const PAGE_TEXT: &str = "page_text";
const PAGE_TABLE: &str = "page_table";

/// Where an ingested chunk came from inside a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOrigin {
    PageText {
        source_file: String,
        folder: String,
        page_number: u32,
    },
    PageTable {
        source_file: String,
        folder: String,
        page_number: u32,
        table_index: u32,
    },
}

impl ChunkOrigin {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PageText { .. } => PAGE_TEXT,
            Self::PageTable { .. } => PAGE_TABLE,
        }
    }

    pub fn page_number(&self) -> u32 {
        match self {
            Self::PageText { page_number, .. } | Self::PageTable { page_number, .. } => {
                *page_number
            }
        }
    }
}

impl From<ChunkOrigin> for Metadata {
    fn from(origin: ChunkOrigin) -> Self {
        let kind = origin.kind();
        match origin {
            ChunkOrigin::PageText {
                source_file,
                folder,
                page_number,
            } => Metadata::new()
                .with("source_file", source_file)
                .with("folder", folder)
                .with("page_number", page_number)
                .with("type", kind),
            ChunkOrigin::PageTable {
                source_file,
                folder,
                page_number,
                table_index,
            } => Metadata::new()
                .with("source_file", source_file)
                .with("folder", folder)
                .with("page_number", page_number)
                .with("table_index", table_index)
                .with("type", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Position in the collection; `id` is `doc_<seq>`.
    pub seq: u64,
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

impl DocumentRecord {
    pub fn new(seq: u64, text: String, embedding: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            seq,
            id: format!("doc_{seq}"),
            text,
            embedding,
            metadata,
        }
    }
}

/// One retrieved chunk, in the order the index ranked it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub text: String,
    pub metadata: Metadata,
    #[serde(skip)]
    pub distance: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Cells joined by commas, missing cells as empty strings, rows by newlines.
    pub fn to_csv(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.as_deref().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub number: u32,
    pub text: String,
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, Copy)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_renders_nulls_as_empty_cells() {
        let table = Table {
            rows: vec![
                vec![Some("a".to_string()), None, Some("c".to_string())],
                vec![Some("1".to_string()), Some("2".to_string()), None],
            ],
        };
        assert_eq!(table.to_csv(), "a,,c\n1,2,");
    }

    #[test]
    fn origin_round_trips_through_metadata() {
        let origin = ChunkOrigin::PageTable {
            source_file: "manual.pdf".to_string(),
            folder: "./.pdfs/sub".to_string(),
            page_number: 4,
            table_index: 2,
        };
        let metadata = Metadata::from(origin.clone());

        assert_eq!(
            metadata.get("type"),
            Some(&MetadataValue::Str("page_table".to_string()))
        );
        assert_eq!(metadata.get("table_index"), Some(&MetadataValue::Int(2)));
        assert_eq!(metadata.origin(), Some(origin));
    }

    #[test]
    fn free_form_metadata_has_no_origin() {
        let metadata = Metadata::new().with("k", "v");
        assert_eq!(metadata.origin(), None);
    }

    #[test]
    fn metadata_serializes_as_flat_object() -> Result<(), serde_json::Error> {
        let metadata = Metadata::from(ChunkOrigin::PageText {
            source_file: "a.pdf".to_string(),
            folder: "docs".to_string(),
            page_number: 1,
        });
        let value = serde_json::to_value(&metadata)?;
        assert_eq!(
            value,
            serde_json::json!({
                "source_file": "a.pdf",
                "folder": "docs",
                "page_number": 1,
                "type": "page_text",
            })
        );

        let parsed: Metadata = serde_json::from_value(value)?;
        assert_eq!(parsed, metadata);
        Ok(())
    }
}
