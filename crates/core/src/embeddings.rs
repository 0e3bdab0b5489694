use crate::error::EmbedError;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Text to fixed-length vector. Every vector an implementation returns has
/// `dimensions()` entries.
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    /// One vector per input, in input order.
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_many(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or(EmbedError::BatchSize {
                expected: 1,
                actual: 0,
            })
    }
}

impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        (**self).embed_many(texts)
    }
}

/// Sentence-transformer embeddings via `fastembed`.
///
/// The ONNX model is not touched until the first `embed_many` call; after that
/// the loaded session is cached in this handle for its whole lifetime.
pub struct FastEmbedder {
    model: Mutex<Option<TextEmbedding>>,
    cache_dir: Option<PathBuf>,
}

impl FastEmbedder {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            model: Mutex::new(None),
            cache_dir,
        }
    }

    fn load(&self) -> Result<TextEmbedding, EmbedError> {
        info!(model = DEFAULT_EMBEDDING_MODEL, "loading embedding model");

        let mut options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
        if let Some(dir) = &self.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }

        TextEmbedding::try_new(options).map_err(|error| EmbedError::ModelLoad {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            details: error.to_string(),
        })
    }
}

impl Default for FastEmbedder {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("model", &DEFAULT_EMBEDDING_MODEL)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl Embedder for FastEmbedder {
    fn dimensions(&self) -> usize {
        DEFAULT_EMBEDDING_DIMENSIONS
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut guard = self
            .model
            .lock()
            .map_err(|_| EmbedError::Inference("embedding model lock poisoned".to_string()))?;

        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        let Some(model) = guard.as_mut() else {
            return Err(EmbedError::Inference("embedding model missing".to_string()));
        };

        let vectors = model
            .embed(texts.to_vec(), None)
            .map_err(|error| EmbedError::Inference(error.to_string()))?;

        if vectors.len() != texts.len() {
            return Err(EmbedError::BatchSize {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        Ok(vectors)
    }
}

/// Hashes character trigrams into buckets and L2-normalises the result.
/// Needs no model files, so it stands in for the real model offline.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = format!(" {} ", text.to_lowercase());
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let mut hash = 1469598103934665603u64;
            for ch in window {
                let mut buffer = [0u8; 4];
                for byte in ch.encode_utf8(&mut buffer).bytes() {
                    hash ^= u64::from(byte);
                    hash = hash.wrapping_mul(1099511628211);
                }
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{CharacterNgramEmbedder, Embedder, FastEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed_one("Hydraulic pressure and flow").unwrap();
        let second = embedder.embed_one("Hydraulic pressure and flow").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed_one("abc").unwrap();
        assert_eq!(vector.len(), 32);
    }

    #[test]
    fn batch_shape_matches_input() {
        let embedder = CharacterNgramEmbedder::default();
        let texts = vec!["first text".to_string(), "second text".to_string()];
        let vectors = embedder.embed_many(&texts).unwrap();

        assert_eq!(vectors.len(), 2);
        assert!(vectors
            .iter()
            .all(|vector| vector.len() == DEFAULT_EMBEDDING_DIMENSIONS));
        assert_eq!(vectors[0], embedder.embed_one("first text").unwrap());
        assert_ne!(vectors[0], vectors[1]);
    }

    #[test]
    fn empty_batch_is_empty() {
        let embedder = CharacterNgramEmbedder::default();
        assert!(embedder.embed_many(&[]).unwrap().is_empty());
    }

    #[test]
    #[ignore = "downloads the all-MiniLM-L6-v2 model"]
    fn fastembed_produces_384_dimensions() {
        let embedder = FastEmbedder::default();
        let texts = vec!["hello world".to_string(), "vector search".to_string()];
        let vectors = embedder.embed_many(&texts).unwrap();

        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|vector| vector.len() == 384));

        let single = embedder.embed_one("hello world").unwrap();
        let drift = vectors[0]
            .iter()
            .zip(&single)
            .map(|(left, right)| (left - right).abs())
            .fold(0f32, f32::max);
        assert!(drift < 1e-4, "batched and single embeddings drifted by {drift}");
    }
}
