//! Corpus - almacén de fragmentos e índice vectorial
//!
//! - SQLite: fragmentos de las sentencias de la última búsqueda
//! - JSONL: artefacto intermedio de cada scraping
//! - Chunker: corte duro de tamaño fijo (1000 caracteres)
//! - LanceDB: índice de similitud sobre los embeddings

mod chunker;
mod jsonl;
mod lance;
mod store;
mod vector;

// Re-exports
pub use chunker::{FixedChunker, MAX_CARACTERES};
pub use jsonl::{nombre_artefacto, read_jsonl, write_jsonl};
pub use lance::{LanceVectorStore, DEFAULT_INDEX_NAME};
pub use store::{get_data_dir, ChunkStore, Fragmento, NuevoFragmento, StoreStats};
pub use vector::{
    cosine_similarity, VectorEntry, VectorSearchResult, VectorStore, EMBEDDING_DIMENSION,
};
