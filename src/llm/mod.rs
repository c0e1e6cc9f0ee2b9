//! LLM - cliente de chat-completions hospedado (Groq)
//!
//! Modelo de respuesta del pipeline: llama-3.1-70b-versatile, temperatura 0.
//! También implementa la detección de temas para las notas de voz.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Endpoint de chat-completions de Groq (compatible con OpenAI)
/// ref: https://console.groq.com/docs/api-reference
const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Modelo de chat
const CHAT_MODEL: &str = "llama-3.1-70b-versatile";

/// Temperatura fija del pipeline (respuestas deterministas)
const TEMPERATURE: f32 = 0.0;

/// Reintentos máximos ante HTTP 429
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;

// ============================================================================
// Types
// ============================================================================

/// Mensaje de chat (rol + contenido)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mensaje {
    pub role: String,
    pub content: String,
}

impl Mensaje {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

// ============================================================================
// ChatModel Trait
// ============================================================================

/// Modelo de chat hospedado
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Envía los mensajes y devuelve el texto de la completion
    async fn complete(&self, mensajes: &[Mensaje]) -> Result<String>;

    /// Nombre del modelo
    fn name(&self) -> &str;
}

// ============================================================================
// GroqChat
// ============================================================================

/// Cliente de chat de Groq
#[derive(Debug)]
pub struct GroqChat {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [Mensaje],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Mensaje,
}

impl GroqChat {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, GROQ_CHAT_URL)
    }

    /// Cliente contra otro endpoint (pruebas)
    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("No se pudo crear el cliente HTTP")?;

        Ok(Self {
            api_key,
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Crea el cliente leyendo GROQ_API_KEY del entorno
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?)
    }
}

#[async_trait]
impl ChatModel for GroqChat {
    async fn complete(&self, mensajes: &[Mensaje]) -> Result<String> {
        let request = ChatRequest {
            model: CHAT_MODEL,
            temperature: TEMPERATURE,
            messages: mensajes,
        };

        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
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
                            "Chat request failed, retrying in {:?} (attempt {}/{})",
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
                let chat_response: ChatResponse = serde_json::from_str(&body)
                    .context("No se pudo interpretar la respuesta del chat")?;
                let choice = chat_response
                    .choices
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Respuesta del chat sin opciones"))?;
                return Ok(choice.message.content);
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
                anyhow::bail!("Error de la API de Groq ({}): {}", status, body);
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Chat falló tras {} reintentos", MAX_RETRIES)))
    }

    fn name(&self) -> &str {
        CHAT_MODEL
    }
}

// ============================================================================
// Topic Detection
// ============================================================================

/// Detecta los temas principales de un texto transcrito
///
/// Pide al modelo un objeto JSON `{"topics": [...]}` y lo devuelve
/// formateado. Un JSON malformado del modelo es error.
pub async fn detectar_temas(model: &dyn ChatModel, texto: &str) -> Result<String> {
    let prompt = format!(
        "Please identify the main topic the user want to know about in the \
         following text. Respond in JSON format using this schema: \
         {{\"topics\": [\"topic1\", \"topic2\", ...]}} with no preamble or \
         additional text.\n\n**User Query:** {texto}"
    );

    let respuesta = model.complete(&[Mensaje::user(prompt)]).await?;

    let temas: serde_json::Value = serde_json::from_str(respuesta.trim())
        .context("El modelo no devolvió un JSON de temas válido")?;

    serde_json::to_string_pretty(&temas).context("No se pudo formatear el JSON de temas")
}

// ============================================================================
// API Key Management
// ============================================================================

/// Lee la clave de la API desde GROQ_API_KEY
pub fn get_api_key() -> Result<String> {
    if let Ok(key) = std::env::var("GROQ_API_KEY") {
        if !key.is_empty() {
            return Ok(key);
        }
    }

    anyhow::bail!(
        "Clave no encontrada. Configure la variable de entorno GROQ_API_KEY.\n\
         export GROQ_API_KEY=su-clave"
    )
}

/// Indica si la clave del chat está configurada
pub fn has_api_key() -> bool {
    std::env::var("GROQ_API_KEY")
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

    #[test]
    fn test_mensaje_constructors() {
        let u = Mensaje::user("hola");
        assert_eq!(u.role, "user");
        let a = Mensaje::assistant("respuesta");
        assert_eq!(a.role, "assistant");
    }

    #[tokio::test]
    async fn test_complete_parses_choice() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "La Corte concede."}}]
            }));
        });

        let chat = GroqChat::with_base_url("clave".to_string(), &server.url("/chat")).unwrap();
        let texto = chat
            .complete(&[Mensaje::user("¿qué resuelve la Corte?")])
            .await
            .unwrap();
        assert_eq!(texto, "La Corte concede.");
    }

    #[tokio::test]
    async fn test_complete_error_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(400).body("bad request");
        });

        let chat = GroqChat::with_base_url("clave".to_string(), &server.url("/chat")).unwrap();
        assert!(chat.complete(&[Mensaje::user("x")]).await.is_err());
    }

    #[tokio::test]
    async fn test_detectar_temas_formats_json() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {
                    "role": "assistant",
                    "content": "{\"topics\": [\"salud\", \"tutela\"]}"
                }}]
            }));
        });

        let chat = GroqChat::with_base_url("clave".to_string(), &server.url("/chat")).unwrap();
        let temas = detectar_temas(&chat, "quiero saber de tutelas de salud")
            .await
            .unwrap();
        assert!(temas.contains("salud"));
        assert!(temas.contains("tutela"));
    }

    #[tokio::test]
    async fn test_detectar_temas_invalid_json_is_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "no soy json"}}]
            }));
        });

        let chat = GroqChat::with_base_url("clave".to_string(), &server.url("/chat")).unwrap();
        assert!(detectar_temas(&chat, "texto").await.is_err());
    }
}
