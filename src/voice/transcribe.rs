//! Transcripción de audio vía Groq (Whisper)

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Endpoint de transcripción de Groq
pub const GROQ_TRANSCRIBE_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";

/// Modelo de transcripción
pub const TRANSCRIBE_MODEL: &str = "whisper-large-v3-turbo";

/// Indicación fija de contexto para el modelo
const TRANSCRIBE_PROMPT: &str = "Specify context or spelling";

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
}

/// Cliente de transcripción sobre la API de audio de Groq
pub struct GroqTranscriber {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl GroqTranscriber {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            base_url: GROQ_TRANSCRIBE_URL.to_string(),
        }
    }

    /// Cliente apuntado a otra URL (pruebas)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Cliente con la clave tomada de `GROQ_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key = crate::llm::get_api_key()?;
        Ok(Self::new(api_key))
    }

    /// Transcribe un WAV y devuelve el texto plano
    pub async fn transcribe(&self, ruta_wav: &Path) -> Result<String> {
        let bytes = tokio::fs::read(ruta_wav)
            .await
            .with_context(|| format!("No se pudo leer {}", ruta_wav.display()))?;

        let file_name = ruta_wav
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", TRANSCRIBE_MODEL)
            .text("temperature", "0")
            .text("response_format", "json")
            .text("prompt", TRANSCRIBE_PROMPT);

        tracing::debug!("sending audio for transcription");

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("No se pudo contactar el servicio de transcripción")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Error del servicio de transcripción ({status}): {body}");
        }

        let parsed: TranscribeResponse = response
            .json()
            .await
            .context("Respuesta de transcripción inválida")?;

        Ok(parsed.text)
    }
}
