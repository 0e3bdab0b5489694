pub mod local;
pub mod qdrant;

pub use local::{cosine_distance, LocalIndex};
pub use qdrant::QdrantIndex;
