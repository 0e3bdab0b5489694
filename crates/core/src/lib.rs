pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod query;
pub mod store;
pub mod stores;
pub mod traits;

#[cfg(test)]
mod fixtures;

pub use chunking::{chunk_words, ChunkingConfig};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, FastEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_EMBEDDING_MODEL,
};
pub use error::{EmbedError, IngestError, StoreError};
pub use extractor::{detect_tables, LopdfExtractor, PdfExtractor};
pub use ingest::{discover_pdf_files, ingest_folder, IngestOutcome, IngestionReport, SkippedPdf};
pub use models::{
    ChunkOrigin, DocumentRecord, IngestionOptions, Metadata, MetadataValue, PageContent,
    SearchMatch, Table, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_COLLECTION,
    DEFAULT_PDF_FOLDER, DEFAULT_PERSIST_DIR, DEFAULT_TOP_K,
};
pub use query::{QueryRequest, QueryResponse, QueryService};
pub use store::DocumentStore;
pub use stores::{LocalIndex, QdrantIndex};
pub use traits::VectorIndex;
