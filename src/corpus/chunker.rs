//! Fragmentación de texto en trozos de tamaño fijo
//!
//! Divide un documento en fragmentos de a lo sumo N caracteres, con corte
//! duro (sin respetar frases ni palabras) y sin solapamiento. El resto de
//! cada corte pasa al siguiente fragmento, de modo que la concatenación de
//! los fragmentos reconstruye el texto original exactamente.

/// Tamaño máximo de fragmento por defecto (caracteres)
pub const MAX_CARACTERES: usize = 1000;

/// Fragmentador de tamaño fijo
#[derive(Debug, Clone)]
pub struct FixedChunker {
    max_chars: usize,
}

impl FixedChunker {
    /// Crea un fragmentador con el tamaño indicado
    pub fn new(max_chars: usize) -> Self {
        assert!(max_chars > 0, "max_chars must be positive");
        Self { max_chars }
    }

    /// Tamaño máximo configurado
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Divide el texto en fragmentos de a lo sumo `max_chars` caracteres
    ///
    /// El conteo es por caracteres (no bytes), por lo que el corte siempre
    /// cae en un límite UTF-8 válido.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return vec![];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut count = 0;

        for ch in text.chars() {
            current.push(ch);
            count += 1;
            if count == self.max_chars {
                chunks.push(std::mem::take(&mut current));
                count = 0;
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

impl Default for FixedChunker {
    fn default() -> Self {
        Self::new(MAX_CARACTERES)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = FixedChunker::default();
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = FixedChunker::default();
        let chunks = chunker.chunk("sentencia de tutela");
        assert_eq!(chunks, vec!["sentencia de tutela".to_string()]);
    }

    #[test]
    fn test_hard_cutoff_at_max() {
        let chunker = FixedChunker::new(4);
        let chunks = chunker.chunk("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_all_chunks_within_limit() {
        let chunker = FixedChunker::new(100);
        let text = "palabra ".repeat(500);
        for chunk in chunker.chunk(&text) {
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn test_concatenation_reconstructs_original() {
        let chunker = FixedChunker::new(7);
        let text = "La Corte Constitucional resuelve conceder el amparo solicitado.";
        let rebuilt: String = chunker.chunk(text).concat();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_multibyte_roundtrip() {
        let chunker = FixedChunker::new(3);
        let text = "acción de tutela — artículo 86 ñÑáéíóú";
        let chunks = chunker.chunk(text);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 3);
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_exact_multiple_of_max() {
        let chunker = FixedChunker::new(5);
        let chunks = chunker.chunk("aaaaabbbbb");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.concat(), "aaaaabbbbb");
    }
}
