pub mod embedding;
pub mod error;
pub mod gateway;
pub mod index;
pub mod memory_store;
pub mod qdrant;

pub use embedding::{
    DynEmbeddingService, EmbeddingService, GeminiEmbedding, MockEmbedding, API_KEY_HEADER,
};
pub use error::RetrievalError;
pub use gateway::{RetrievalGateway, SearchFilters};
pub use index::{SearchHit, VectorIndex};
pub use memory_store::InMemoryStore;
pub use qdrant::QdrantStore;
