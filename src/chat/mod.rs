//! Sesión de chat sobre el corpus de sentencias
//!
//! Mantiene el historial de la conversación y la cadena de recuperación
//! vigente. La sesión se pasa explícitamente por referencia a quien la use;
//! no hay estado global.

use anyhow::{bail, Result};

use crate::chain::RetrievalChain;
use crate::llm::Mensaje;

/// Error fijo cuando todavía no se ha ingerido ningún corpus
pub const SIN_CADENA: &str = "Por favor, primero realice una búsqueda de sentencias.";

/// Conversación en curso con su cadena opcional
pub struct ChatSession {
    historial: Vec<Mensaje>,
    chain: Option<RetrievalChain>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            historial: Vec::new(),
            chain: None,
        }
    }

    /// Instala la cadena construida tras una búsqueda
    ///
    /// Una búsqueda nueva invalida la conversación anterior, así que el
    /// historial se descarta junto con la cadena reemplazada.
    pub fn set_chain(&mut self, chain: RetrievalChain) {
        self.historial.clear();
        self.chain = Some(chain);
    }

    pub fn has_chain(&self) -> bool {
        self.chain.is_some()
    }

    pub fn historial(&self) -> &[Mensaje] {
        &self.historial
    }

    /// Descarta historial y cadena
    pub fn reset(&mut self) {
        self.historial.clear();
        self.chain = None;
    }

    /// Procesa una pregunta del usuario y devuelve la respuesta registrada
    ///
    /// La entrada vacía y la ausencia de cadena son errores de validación
    /// que no tocan el historial. Un fallo del pipeline sí queda
    /// registrado: no tumba la sesión, se anota como respuesta de error y
    /// la conversación sigue.
    pub async fn submit(&mut self, pregunta: &str) -> Result<String> {
        let pregunta = pregunta.trim();
        if pregunta.is_empty() {
            bail!("La pregunta no puede estar vacía.");
        }

        let Some(chain) = &self.chain else {
            bail!(SIN_CADENA);
        };

        self.historial.push(Mensaje::user(pregunta));

        let respuesta = match chain.invoke(pregunta).await {
            Ok(texto) => texto,
            Err(e) => {
                tracing::warn!("chain invocation failed: {e:#}");
                format!("Error al procesar la pregunta: {e}")
            }
        };

        self.historial.push(Mensaje::assistant(&respuesta));
        Ok(respuesta)
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
