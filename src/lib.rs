//! sentencias-rag - análisis de sentencias de la Corte Constitucional
//!
//! Pipeline RAG sobre la relatoría de la Corte Constitucional de Colombia:
//! scrapeo de sentencias, fragmentación, índice vectorial en LanceDB y
//! preguntas con análisis jurídico, incluida la entrada por voz. Incluye
//! además un predictor de fraude en transacciones como binario aparte.

pub mod chain;
pub mod chat;
pub mod cli;
pub mod corpus;
pub mod embedding;
pub mod fraud;
pub mod llm;
pub mod scraper;
pub mod voice;

// Re-exports
pub use chain::{ChainError, RetrievalChain};
pub use chat::ChatSession;
pub use corpus::{
    get_data_dir, ChunkStore, FixedChunker, Fragmento, LanceVectorStore, NuevoFragmento,
    StoreStats, VectorEntry, VectorSearchResult, VectorStore,
};
pub use embedding::{EmbeddingProvider, OpenAiEmbedding};
pub use fraud::{FraudPredictor, TipoTransaccion, Transaccion};
pub use llm::{ChatModel, GroqChat, Mensaje};
pub use scraper::{RelatoriaScraper, SeccionContenido, Sentencia};
pub use voice::{EstadoGrabacion, Grabadora, GroqTranscriber};
