//! LanceDB Vector Store - índice de similitud del corpus
//!
//! Índice ANN (Approximate Nearest Neighbor) sobre los embeddings de los
//! fragmentos. El nombre de la tabla actúa como nombre externo del índice.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::vector::{VectorEntry, VectorSearchResult, VectorStore, EMBEDDING_DIMENSION};

/// Nombre por defecto del índice vectorial
pub const DEFAULT_INDEX_NAME: &str = "sentencias";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// Índice vectorial sobre LanceDB
pub struct LanceVectorStore {
    db: Connection,
    table_name: String,
}

impl LanceVectorStore {
    /// Abre el índice en el directorio `.lance` indicado
    ///
    /// # Arguments
    /// * `path` - ruta del directorio .lance
    /// * `index_name` - nombre externo del índice (tabla)
    pub async fn open(path: &Path, index_name: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("No se pudo crear el directorio de LanceDB")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Ruta con codificación inválida"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("No se pudo conectar a LanceDB")?;

        Ok(Self {
            db,
            table_name: index_name.to_string(),
        })
    }

    /// Nombre externo del índice
    pub fn index_name(&self) -> &str {
        &self.table_name
    }

    fn create_schema() -> Schema {
        Schema::new(vec![
            Field::new("sentencia", DataType::Utf8, false),
            Field::new("orden", DataType::Int32, false),
            Field::new("texto", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIMENSION,
                ),
                false,
            ),
        ])
    }

    fn entries_to_batch(entries: &[VectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("No se puede crear un lote vacío");
        }

        let sentencias: Vec<&str> = entries.iter().map(|e| e.sentencia.as_str()).collect();
        let ordenes: Vec<i32> = entries.iter().map(|e| e.orden).collect();
        let textos: Vec<&str> = entries.iter().map(|e| e.texto.as_str()).collect();

        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            EMBEDDING_DIMENSION,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("No se pudo construir el arreglo de embeddings")?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema()),
            vec![
                Arc::new(StringArray::from(sentencias)),
                Arc::new(Int32Array::from(ordenes)),
                Arc::new(StringArray::from(textos)),
                Arc::new(embeddings_list),
            ],
        )
        .context("No se pudo construir el RecordBatch")?;

        Ok(batch)
    }

    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.contains(&self.table_name))
            .unwrap_or(false)
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = Self::entries_to_batch(entries)?;
        let schema = batch.schema();

        if self.table_exists().await {
            let table = self
                .db
                .open_table(&self.table_name)
                .execute()
                .await
                .context("No se pudo abrir la tabla de vectores")?;

            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            table
                .add(batches)
                .execute()
                .await
                .context("No se pudieron agregar los vectores")?;
        } else {
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            self.db
                .create_table(&self.table_name, batches)
                .execute()
                .await
                .context("No se pudo crear la tabla de vectores")?;
        }

        Ok(entries.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorSearchResult>> {
        if !self.table_exists().await {
            return Ok(vec![]);
        }

        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("No se pudo abrir la tabla para buscar")?;

        let results = table
            .vector_search(query_embedding.to_vec())
            .context("No se pudo preparar la búsqueda vectorial")?
            .limit(limit)
            .execute()
            .await
            .context("No se pudo ejecutar la búsqueda vectorial")?;

        let mut search_results = Vec::new();

        use futures::TryStreamExt;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        for batch in batches {
            let sentencias = batch
                .column_by_name("sentencia")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Falta la columna sentencia"))?;

            let ordenes = batch
                .column_by_name("orden")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| anyhow::anyhow!("Falta la columna orden"))?;

            let textos = batch
                .column_by_name("texto")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Falta la columna texto"))?;

            // columna _distance (agregada por LanceDB)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Falta la columna _distance"))?;

            for i in 0..batch.num_rows() {
                let distance = distances.value(i);
                // distancia L2 -> similitud aproximada en (0, 1]
                let similitud = 1.0 / (1.0 + distance);

                search_results.push(VectorSearchResult {
                    sentencia: sentencias.value(i).to_string(),
                    orden: ordenes.value(i),
                    texto: textos.value(i).to_string(),
                    similitud,
                });
            }
        }

        Ok(search_results)
    }

    async fn clear(&self) -> Result<()> {
        if !self.table_exists().await {
            return Ok(());
        }

        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("No se pudo abrir la tabla para vaciarla")?;

        table
            .delete("true")
            .await
            .context("No se pudieron eliminar los vectores")?;

        tracing::info!("Cleared vector index '{}'", self.table_name);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("No se pudo abrir la tabla para contar")?;

        let count = table
            .count_rows(None)
            .await
            .context("No se pudieron contar los vectores")?;
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_entry(sentencia: &str, orden: i32) -> VectorEntry {
        VectorEntry {
            sentencia: sentencia.to_string(),
            orden,
            texto: format!("Fragmento {} de {}", orden, sentencia),
            embedding: vec![0.1; EMBEDDING_DIMENSION as usize],
        }
    }

    #[tokio::test]
    async fn test_lance_store_basic() {
        let temp_dir = TempDir::new().unwrap();
        let lance_path = temp_dir.path().join("test.lance");

        let store = LanceVectorStore::open(&lance_path, DEFAULT_INDEX_NAME)
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 0);

        let entries = vec![
            create_test_entry("2024/T-1-24", 0),
            create_test_entry("2024/T-1-24", 1),
        ];
        let inserted = store.insert_batch(&entries).await.unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lance_search_returns_results() {
        let temp_dir = TempDir::new().unwrap();
        let lance_path = temp_dir.path().join("search.lance");

        let store = LanceVectorStore::open(&lance_path, DEFAULT_INDEX_NAME)
            .await
            .unwrap();

        let entries = vec![
            create_test_entry("2024/T-1-24", 0),
            create_test_entry("2023/C-2-23", 0),
            create_test_entry("2022/SU-3-22", 0),
        ];
        store.insert_batch(&entries).await.unwrap();

        let query = vec![0.1; EMBEDDING_DIMENSION as usize];
        let results = store.search(&query, 2).await.unwrap();

        assert!(!results.is_empty());
        assert!(results.len() <= 2);
        for r in &results {
            assert!(r.similitud > 0.0);
        }
    }

    #[tokio::test]
    async fn test_lance_search_empty_index() {
        let temp_dir = TempDir::new().unwrap();
        let lance_path = temp_dir.path().join("empty.lance");

        let store = LanceVectorStore::open(&lance_path, DEFAULT_INDEX_NAME)
            .await
            .unwrap();

        let query = vec![0.0; EMBEDDING_DIMENSION as usize];
        assert!(store.search(&query, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lance_clear() {
        let temp_dir = TempDir::new().unwrap();
        let lance_path = temp_dir.path().join("clear.lance");

        let store = LanceVectorStore::open(&lance_path, DEFAULT_INDEX_NAME)
            .await
            .unwrap();

        store
            .insert_batch(&[create_test_entry("a", 0), create_test_entry("b", 0)])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        // clear sobre índice ya vacío no falla
        store.clear().await.unwrap();
    }
}
