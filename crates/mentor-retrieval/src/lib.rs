//! Mentor retrieval crate - embeddings, vector search and the retrieval gateway.
//!
//! Remote providers speak HTTP through `reqwest`; the local variants
//! (hash embeddings, in-memory cosine index) back development mode and tests.

pub mod embedding;
pub mod gateway;
pub mod index;

mod http;

pub use embedding::{EmbeddingProvider, HashEmbeddingProvider, HttpEmbeddingProvider};
pub use gateway::RetrievalGateway;
pub use index::{HttpVectorIndex, InMemoryVectorIndex, VectorIndex};
