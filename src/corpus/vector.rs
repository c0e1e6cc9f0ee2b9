//! Vector Store - trait de búsqueda vectorial y utilidades
//!
//! La implementación concreta usa LanceDB (ver `lance.rs`); el trait deja la
//! costura abierta para las pruebas del pipeline.

use anyhow::Result;
use async_trait::async_trait;

/// Dimensión del embedding (OpenAI text-embedding-ada-002)
pub const EMBEDDING_DIMENSION: i32 = 1536;

// ============================================================================
// Types
// ============================================================================

/// Entrada vectorial (para inserción)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// Identificador de la sentencia de origen
    pub sentencia: String,
    /// Posición del fragmento dentro de la sentencia (0-based)
    pub orden: i32,
    /// Texto del fragmento
    pub texto: String,
    /// Vector de embedding
    pub embedding: Vec<f32>,
}

/// Resultado de búsqueda vectorial
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub sentencia: String,
    pub orden: i32,
    pub texto: String,
    /// Similitud (0.0 ~ 1.0, mayor es mejor)
    pub similitud: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// Interfaz común del índice vectorial
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserta un lote de vectores
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// Búsqueda por similitud
    async fn search(&self, query_embedding: &[f32], limit: usize)
        -> Result<Vec<VectorSearchResult>>;

    /// Elimina todos los vectores del índice
    async fn clear(&self) -> Result<()>;

    /// Número de vectores indexados
    async fn count(&self) -> Result<usize>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Similitud coseno entre dos vectores (-1.0 ~ 1.0)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_mismatched_or_empty() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
