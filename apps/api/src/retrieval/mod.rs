pub mod embedder;
pub mod index;
pub mod retriever;

pub use embedder::{Embedder, EmbeddingError, EmbeddingProvider, OpenAiEmbedder};
pub use index::{build_index, VectorIndex};
pub use retriever::{retrieve, retrieve_many, Context, ContextChunk};
