use crate::error::IngestError;
use crate::models::IngestionOptions;

/// Word-window sizes for [`chunk_words`]. `size` must exceed `overlap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    pub fn new(size: usize, overlap: usize) -> Result<Self, IngestError> {
        if size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if overlap >= size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {overlap} must be smaller than chunk size {size}"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn stride(&self) -> usize {
        self.size - self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        let options = IngestionOptions::default();
        Self {
            size: options.chunk_size,
            overlap: options.chunk_overlap,
        }
    }
}

impl TryFrom<IngestionOptions> for ChunkingConfig {
    type Error = IngestError;

    fn try_from(value: IngestionOptions) -> Result<Self, Self::Error> {
        Self::new(value.chunk_size, value.chunk_overlap)
    }
}

/// Splits `text` on whitespace and emits overlapping windows of up to
/// `config.size()` words, each window starting `size - overlap` words after
/// the previous one. The window that reaches the last word is the final one.
pub fn chunk_words(text: &str, config: ChunkingConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + config.size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += config.stride();
    }

    chunks
}
