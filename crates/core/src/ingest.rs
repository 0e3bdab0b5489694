use crate::chunking::{chunk_words, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::extractor::PdfExtractor;
use crate::traits::VectorIndex;
use crate::{ChunkOrigin, DocumentStore, IngestError, Metadata, PageContent, StoreError};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[derive(Debug)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub files_processed: usize,
    pub records_added: usize,
    pub skipped_files: Vec<SkippedPdf>,
}

#[derive(Debug)]
pub enum IngestOutcome {
    /// The source folder does not exist; nothing was read or written.
    MissingFolder(PathBuf),
    Completed(IngestionReport),
}

impl IngestOutcome {
    pub fn records_added(&self) -> usize {
        match self {
            Self::MissingFolder(_) => 0,
            Self::Completed(report) => report.records_added,
        }
    }
}

/// Chunks from one page's text or one table, written in a single `add`.
struct ChunkBatch {
    chunks: Vec<String>,
    origin: ChunkOrigin,
}

/// Walks `folder` for PDFs and writes their page text and tables into `store`.
///
/// A PDF that cannot be read is logged and reported as skipped; nothing from
/// it is written. Embedder and store failures abort the run.
pub async fn ingest_folder<E, V, X>(
    folder: &Path,
    store: &DocumentStore<E, V>,
    extractor: &X,
    config: ChunkingConfig,
) -> Result<IngestOutcome, StoreError>
where
    E: Embedder + 'static,
    V: VectorIndex,
    X: PdfExtractor + ?Sized,
{
    if !folder.is_dir() {
        warn!(folder = %folder.display(), "folder does not exist, nothing to ingest");
        return Ok(IngestOutcome::MissingFolder(folder.to_path_buf()));
    }

    info!(
        folder = %folder.display(),
        chunk_size = config.size(),
        chunk_overlap = config.overlap(),
        "ingesting folder"
    );
    let mut report = IngestionReport::default();

    for path in discover_pdf_files(folder) {
        info!(path = %path.display(), "loading pdf");

        let batches = match plan_file(&path, extractor, config) {
            Ok(batches) => batches,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "could not process pdf, skipping");
                report.skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
                continue;
            }
        };

        for batch in batches {
            let metadata = Metadata::from(batch.origin);
            let metadatas = vec![metadata; batch.chunks.len()];
            let ids = store.add(&batch.chunks, metadatas).await?;
            report.records_added += ids.len();
        }
        report.files_processed += 1;
    }

    info!(
        folder = %folder.display(),
        files = report.files_processed,
        skipped = report.skipped_files.len(),
        records = report.records_added,
        "ingestion finished"
    );

    Ok(IngestOutcome::Completed(report))
}

/// Extracts the whole file up front so a parse failure leaves no partial writes.
fn plan_file<X>(
    path: &Path,
    extractor: &X,
    config: ChunkingConfig,
) -> Result<Vec<ChunkBatch>, IngestError>
where
    X: PdfExtractor + ?Sized,
{
    let source_file = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
        .to_string();
    let folder = path
        .parent()
        .map(|parent| parent.to_string_lossy().to_string())
        .unwrap_or_default();

    let pages = extractor.extract_pages(path)?;
    Ok(pages
        .into_iter()
        .flat_map(|page| page_batches(page, &source_file, &folder, config))
        .collect())
}

fn page_batches(
    page: PageContent,
    source_file: &str,
    folder: &str,
    config: ChunkingConfig,
) -> Vec<ChunkBatch> {
    let mut batches = Vec::new();

    if !page.text.trim().is_empty() {
        batches.push(ChunkBatch {
            chunks: chunk_words(&page.text, config),
            origin: ChunkOrigin::PageText {
                source_file: source_file.to_string(),
                folder: folder.to_string(),
                page_number: page.number,
            },
        });
    }

    for (index, table) in page.tables.iter().enumerate() {
        let chunks = chunk_words(&table.to_csv(), config);
        if chunks.is_empty() {
            continue;
        }
        batches.push(ChunkBatch {
            chunks,
            origin: ChunkOrigin::PageTable {
                source_file: source_file.to_string(),
                folder: folder.to_string(),
                page_number: page.number,
                table_index: index as u32 + 1,
            },
        });
    }

    batches
}
