//! Embeddings - vectorización de texto vía la API de OpenAI
//!
//! Convierte fragmentos y preguntas en vectores para la búsqueda por
//! similitud. Modelo: text-embedding-ada-002.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// Proveedor de embeddings
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embedding de un texto
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding por lotes (implementación por defecto: secuencial)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimensión del vector
    fn dimension(&self) -> usize;

    /// Nombre del proveedor
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding
// ============================================================================

/// Endpoint de embeddings de OpenAI
/// ref: https://platform.openai.com/docs/api-reference/embeddings
const OPENAI_EMBED_URL: &str = "https://api.openai.com/v1/embeddings";

/// Modelo de embedding
const EMBED_MODEL: &str = "text-embedding-ada-002";

/// Dimensión de text-embedding-ada-002
pub const DEFAULT_DIMENSION: usize = 1536;

/// Límite de tasa (tier gratuito conservador)
const RATE_LIMIT_RPM: u32 = 500;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// Retardo mínimo entre llamadas (previene ráfagas)
const MIN_DELAY_MS: u64 = 50;
/// Reintentos máximos ante HTTP 429
const MAX_RETRIES: u32 = 3;
/// Backoff inicial al reintentar (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;

/// Cliente de embeddings de OpenAI
#[derive(Debug)]
pub struct OpenAiEmbedding {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Limitador de tasa con retardo mínimo entre peticiones
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    /// Espera hasta que la siguiente petición esté permitida
    async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::debug!("Min delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window - now.duration_since(oldest);
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl OpenAiEmbedding {
    /// Crea el cliente con la clave indicada
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, OPENAI_EMBED_URL)
    }

    /// Crea el cliente contra otro endpoint (pruebas)
    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("No se pudo crear el cliente HTTP")?;

        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
            RATE_LIMIT_RPM,
            RATE_LIMIT_WINDOW,
        )));

        Ok(Self {
            api_key,
            client,
            base_url: base_url.to_string(),
            rate_limiter,
        })
    }

    /// Crea el cliente leyendo OPENAI_API_KEY del entorno
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?)
    }
}

/// Cuerpo de la petición de embeddings
/// ref: https://platform.openai.com/docs/api-reference/embeddings
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// Respuesta del endpoint de embeddings
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// Error de la API de OpenAI
#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(default, rename = "type")]
    kind: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // texto vacío: vector nulo, sin llamada
        if text.trim().is_empty() {
            return Ok(vec![0.0; DEFAULT_DIMENSION]);
        }

        let request = EmbedRequest {
            model: EMBED_MODEL,
            input: text,
        };

        let mut last_error: Option<anyhow::Error> = None;

        // bucle de reintentos (backoff exponencial ante 429)
        for attempt in 0..=MAX_RETRIES {
            {
                let mut limiter = self.rate_limiter.lock().await;
                limiter.acquire().await;
            }

            let response = match self
                .client
                .post(&self.base_url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("No se pudo enviar la petición: {}", e));
                    if attempt < MAX_RETRIES {
                        let backoff =
                            Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("No se pudo leer el cuerpo de la respuesta")?;

            if status.is_success() {
                let embed_response: EmbedResponse = serde_json::from_str(&body)
                    .context("No se pudo interpretar la respuesta de embeddings")?;
                let data = embed_response
                    .data
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Respuesta de embeddings sin datos"))?;
                return Ok(data.embedding);
            }

            if status.as_u16() == 429 {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(anyhow::anyhow!("Límite de tasa excedido (429)"));

                if attempt < MAX_RETRIES {
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                if let Ok(error) = serde_json::from_str::<OpenAiError>(&body) {
                    anyhow::bail!(
                        "Error de la API de OpenAI ({}): {}",
                        error.error.kind,
                        error.error.message
                    );
                }
                anyhow::bail!("Error de la API de OpenAI ({}): {}", status, body);
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("Embedding falló tras {} reintentos", MAX_RETRIES)
        }))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding batch {}/{}", i + 1, texts.len());
            results.push(self.embed(text).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        DEFAULT_DIMENSION
    }

    fn name(&self) -> &str {
        EMBED_MODEL
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// Lee la clave de la API desde OPENAI_API_KEY
pub fn get_api_key() -> Result<String> {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            return Ok(key);
        }
    }

    anyhow::bail!(
        "Clave no encontrada. Configure la variable de entorno OPENAI_API_KEY.\n\
         export OPENAI_API_KEY=su-clave"
    )
}

/// Indica si la clave de embeddings está configurada
pub fn has_api_key() -> bool {
    std::env::var("OPENAI_API_KEY")
        .map(|k| !k.is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_empty_text_returns_zero_vector() {
        let embedder = OpenAiEmbedding::new("clave-falsa".to_string()).unwrap();
        let vector = embedder.embed("   ").await.unwrap();
        assert_eq!(vector.len(), DEFAULT_DIMENSION);
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_embed_parses_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200).json_body(serde_json::json!({
                "data": [{"embedding": [0.25, -0.5, 1.0]}]
            }));
        });

        let embedder = OpenAiEmbedding::with_base_url(
            "clave-falsa".to_string(),
            &server.url("/v1/embeddings"),
        )
        .unwrap();

        let vector = embedder.embed("tutela").await.unwrap();
        assert_eq!(vector, vec![0.25, -0.5, 1.0]);
    }

    #[tokio::test]
    async fn test_embed_api_error_is_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(401).json_body(serde_json::json!({
                "error": {"message": "Incorrect API key", "type": "invalid_request_error"}
            }));
        });

        let embedder = OpenAiEmbedding::with_base_url(
            "clave-falsa".to_string(),
            &server.url("/v1/embeddings"),
        )
        .unwrap();

        let err = embedder.embed("tutela").await.unwrap_err();
        assert!(err.to_string().contains("Incorrect API key"));
    }

    #[test]
    fn test_dimension_and_name() {
        let embedder = OpenAiEmbedding::new("clave-falsa".to_string()).unwrap();
        assert_eq!(embedder.dimension(), 1536);
        assert_eq!(embedder.name(), "text-embedding-ada-002");
    }
}
