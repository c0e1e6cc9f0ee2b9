//! Cadena de recuperación - retriever + prompt + LLM
//!
//! Compone el índice vectorial, la plantilla de análisis jurídico y el
//! modelo de chat en un único pipeline de pregunta a respuesta. La cadena
//! debe (re)construirse después de cada ingesta; nunca se invoca sobre un
//! corpus vacío.

use anyhow::{Context, Result};
use thiserror::Error;

use crate::corpus::{ChunkStore, VectorEntry, VectorStore};
use crate::embedding::EmbeddingProvider;
use crate::llm::{ChatModel, Mensaje};

/// Umbral de similitud del retriever
pub const UMBRAL_SIMILITUD: f32 = 0.1;

/// Fragmentos recuperados por pregunta
pub const LIMITE_RECUPERACION: usize = 4;

/// Plantilla fija de análisis jurídico
///
/// Instruye al modelo a resumir hechos, circunstancias de modo, tiempo y
/// lugar, partes en conflicto, daño o peligro sobre los derechos
/// fundamentales, consideraciones de la Corte y lo que finalmente resuelve.
const PLANTILLA: &str = "Quiero un análisis jurídico profesional sobre los derechos \
fundamentales amenazados o dañados que se debaten en la Corte Constitucional de Colombia. \
Es importante conocer los hechos de acuerdo a las circunstancias de modo, el tiempo con \
las fechas y hora, el lugar donde ocurrieron y las personas naturales o jurídicas que \
tienen conflicto entre ellas. También es importante conocer cuál fue el daño o peligro \
que afecta los derechos fundamentales dentro de las consideraciones tenidas en cuenta \
por la Corte Constitucional. Finalmente, requiero saber lo que resuelve la Corte \
Constitucional. Con base en las anteriores instrucciones, proporciona un resumen de:\n\
{context}\n\nQuestion: {question}\n";

// ============================================================================
// Errors
// ============================================================================

/// Precondiciones de la cadena
#[derive(Debug, Error)]
pub enum ChainError {
    /// El almacén de fragmentos está vacío
    #[error("No hay documentos en la base de datos. Por favor, realice una búsqueda primero.")]
    CorpusVacio,

    /// El cargador no devolvió documentos
    #[error("No se encontraron documentos en la base de datos.")]
    SinDocumentos,

    /// Hay fragmentos pero el índice vectorial no se ha construido
    #[error("El índice vectorial está vacío. Construya la cadena después de una búsqueda.")]
    IndiceVacio,
}

// ============================================================================
// RetrievalChain
// ============================================================================

/// Pipeline de pregunta a respuesta sobre el corpus de sentencias
pub struct RetrievalChain {
    vector: Box<dyn VectorStore>,
    embedder: Box<dyn EmbeddingProvider>,
    model: Box<dyn ChatModel>,
    umbral: f32,
    limite: usize,
}

impl std::fmt::Debug for RetrievalChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalChain")
            .field("umbral", &self.umbral)
            .field("limite", &self.limite)
            .finish_non_exhaustive()
    }
}

impl RetrievalChain {
    /// Construye la cadena a partir del corpus recién ingerido
    ///
    /// Carga todos los fragmentos del almacén, calcula sus embeddings y
    /// reconstruye el índice vectorial desde cero. Falla explícitamente si
    /// el almacén está vacío o no devuelve documentos, antes de tocar
    /// cualquier API.
    pub async fn build(
        store: &ChunkStore,
        vector: Box<dyn VectorStore>,
        embedder: Box<dyn EmbeddingProvider>,
        model: Box<dyn ChatModel>,
    ) -> Result<Self> {
        if store.count()? == 0 {
            return Err(ChainError::CorpusVacio.into());
        }

        let fragmentos = store.load_all()?;
        if fragmentos.is_empty() {
            return Err(ChainError::SinDocumentos.into());
        }

        // el índice se reconstruye tras cada ingesta
        vector.clear().await?;

        tracing::info!("Embedding {} chunks for the index", fragmentos.len());

        let textos: Vec<String> = fragmentos.iter().map(|f| f.texto.clone()).collect();
        let embeddings = embedder
            .embed_batch(&textos)
            .await
            .context("No se pudieron calcular los embeddings del corpus")?;

        let entries: Vec<VectorEntry> = fragmentos
            .iter()
            .zip(embeddings)
            .map(|(f, embedding)| VectorEntry {
                sentencia: f.sentencia.clone(),
                orden: f.orden,
                texto: f.texto.clone(),
                embedding,
            })
            .collect();

        vector
            .insert_batch(&entries)
            .await
            .context("No se pudieron indexar los embeddings")?;

        Ok(Self {
            vector,
            embedder,
            model,
            umbral: UMBRAL_SIMILITUD,
            limite: LIMITE_RECUPERACION,
        })
    }

    /// Adjunta la cadena a un índice ya construido (comandos de una pasada)
    ///
    /// Mismas precondiciones que `build`, más la exigencia de que el índice
    /// vectorial contenga vectores de una construcción anterior.
    pub async fn attach(
        store: &ChunkStore,
        vector: Box<dyn VectorStore>,
        embedder: Box<dyn EmbeddingProvider>,
        model: Box<dyn ChatModel>,
    ) -> Result<Self> {
        if store.count()? == 0 {
            return Err(ChainError::CorpusVacio.into());
        }

        if vector.count().await? == 0 {
            return Err(ChainError::IndiceVacio.into());
        }

        Ok(Self {
            vector,
            embedder,
            model,
            umbral: UMBRAL_SIMILITUD,
            limite: LIMITE_RECUPERACION,
        })
    }

    /// Responde una pregunta contra el corpus vigente
    ///
    /// Recupera los fragmentos más cercanos por encima del umbral de
    /// similitud, arma la plantilla y devuelve el texto plano del modelo.
    pub async fn invoke(&self, pregunta: &str) -> Result<String> {
        let query_embedding = self
            .embedder
            .embed(pregunta)
            .await
            .context("No se pudo calcular el embedding de la pregunta")?;

        let resultados = self
            .vector
            .search(&query_embedding, self.limite)
            .await
            .context("No se pudo ejecutar la búsqueda por similitud")?;

        let contexto: Vec<String> = resultados
            .into_iter()
            .filter(|r| r.similitud >= self.umbral)
            .map(|r| r.texto)
            .collect();

        tracing::debug!("Retrieved {} context chunks", contexto.len());

        let prompt = armar_prompt(&contexto.join("\n\n"), pregunta);

        self.model
            .complete(&[Mensaje::user(prompt)])
            .await
            .context("El modelo no pudo generar la respuesta")
    }
}

/// Sustituye contexto y pregunta en la plantilla fija
fn armar_prompt(contexto: &str, pregunta: &str) -> String {
    PLANTILLA
        .replace("{context}", contexto)
        .replace("{question}", pregunta)
}

// ============================================================================
// Tests
// ============================================================================
