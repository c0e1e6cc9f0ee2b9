//! Módulo CLI
//!
//! Definición e implementación de los comandos de sentencias-rag

use std::io::{self, BufRead, Write as IoWrite};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::chain::RetrievalChain;
use crate::chat::ChatSession;
use crate::corpus::{
    get_data_dir, nombre_artefacto, read_jsonl, write_jsonl, ChunkStore, FixedChunker,
    LanceVectorStore, NuevoFragmento, DEFAULT_INDEX_NAME,
};
use crate::embedding::OpenAiEmbedding;
use crate::llm::{detectar_temas, GroqChat};
use crate::scraper::RelatoriaScraper;
use crate::voice::{validar_transcripcion, Grabadora, GroqTranscriber};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "sentencias-rag")]
#[command(version, about = "Análisis de sentencias de la Corte Constitucional", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Buscar sentencias en la relatoría e ingerirlas al corpus
    Buscar {
        /// Término de búsqueda (ej. "tutela salud")
        termino: String,
    },

    /// Hacer una sola pregunta sobre el corpus ya ingerido
    Preguntar {
        /// Pregunta para el análisis jurídico
        pregunta: String,
    },

    /// Conversación interactiva sobre el corpus
    Chat {
        /// Término de búsqueda inicial (opcional)
        #[arg(short, long)]
        termino: Option<String>,
    },

    /// Grabar una consulta por voz y detectar sus temas
    Voz,

    /// Estado del sistema
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// Ejecuta el comando seleccionado
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Buscar { termino } => cmd_buscar(&termino).await,
        Commands::Preguntar { pregunta } => cmd_preguntar(&pregunta).await,
        Commands::Chat { termino } => cmd_chat(termino).await,
        Commands::Voz => cmd_voz().await,
        Commands::Status => cmd_status().await,
    }
}

// ============================================================================
// Component wiring
// ============================================================================

/// Verifica que ambas claves de API estén configuradas
fn verificar_claves() -> Result<()> {
    if !crate::embedding::has_api_key() {
        bail!(
            "La clave de OpenAI no está configurada.\n\n\
             Configuración:\n  \
             export OPENAI_API_KEY=su-clave"
        );
    }
    if !crate::llm::has_api_key() {
        bail!(
            "La clave de Groq no está configurada.\n\n\
             Configuración:\n  \
             export GROQ_API_KEY=su-clave"
        );
    }
    Ok(())
}

/// Abre el índice vectorial en el directorio de datos
async fn abrir_indice() -> Result<LanceVectorStore> {
    let ruta = get_data_dir().join("vectores.lance");
    LanceVectorStore::open(&ruta, DEFAULT_INDEX_NAME)
        .await
        .context("No se pudo abrir el índice vectorial")
}

/// Descarga, persiste e indexa las sentencias de un término de búsqueda
///
/// Una búsqueda nueva reemplaza el corpus completo: se limpian los
/// fragmentos anteriores, se escribe el artefacto JSONL y se reconstruye el
/// índice vectorial. Basta con que la relatoría devuelva una sentencia;
/// cero resultados es un error explícito.
async fn ingestar(termino: &str) -> Result<RetrievalChain> {
    verificar_claves()?;

    println!("[*] Buscando sentencias: \"{termino}\"");

    let scraper = RelatoriaScraper::new().context("No se pudo crear el scraper")?;
    let sentencias = scraper
        .buscar_sentencias(termino)
        .await
        .context("La búsqueda en la relatoría falló")?;

    if sentencias.is_empty() {
        bail!("No se encontraron sentencias para \"{termino}\".");
    }

    println!("[OK] Sentencias descargadas: {}", sentencias.len());
    for sentencia in &sentencias {
        println!(
            "     {} | {}",
            sentencia.sentencia,
            truncate_text(&sentencia.texto, 80)
        );
    }

    // artefacto JSONL: se escribe y se vuelve a leer para que el corpus
    // ingerido sea exactamente lo que quedó en disco
    let ruta_jsonl = get_data_dir().join(nombre_artefacto(termino));
    write_jsonl(&ruta_jsonl, &sentencias)?;
    let sentencias = read_jsonl(&ruta_jsonl)?;
    println!("[*] Artefacto guardado: {}", ruta_jsonl.display());

    let chunker = FixedChunker::default();
    let mut fragmentos = Vec::new();
    for sentencia in &sentencias {
        for (orden, texto) in chunker.chunk(&sentencia.texto).into_iter().enumerate() {
            fragmentos.push(NuevoFragmento {
                sentencia: sentencia.sentencia.clone(),
                texto,
                orden: orden as i32,
            });
        }
    }

    let store = ChunkStore::open_default().context("No se pudo abrir el almacén")?;
    store.clear()?;
    let insertados = store.insert_batch(&fragmentos)?;
    println!("[OK] Fragmentos almacenados: {insertados}");

    println!("[*] Generando embeddings y reconstruyendo el índice...");
    let chain = RetrievalChain::build(
        &store,
        Box::new(abrir_indice().await?),
        Box::new(OpenAiEmbedding::from_env()?),
        Box::new(GroqChat::from_env()?),
    )
    .await?;

    println!("[OK] Corpus listo para preguntas.");
    Ok(chain)
}

/// Adjunta una cadena al corpus e índice ya construidos
async fn adjuntar() -> Result<RetrievalChain> {
    verificar_claves()?;

    let store = ChunkStore::open_default().context("No se pudo abrir el almacén")?;
    RetrievalChain::attach(
        &store,
        Box::new(abrir_indice().await?),
        Box::new(OpenAiEmbedding::from_env()?),
        Box::new(GroqChat::from_env()?),
    )
    .await
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Comando de búsqueda e ingesta (buscar)
async fn cmd_buscar(termino: &str) -> Result<()> {
    ingestar(termino).await?;
    Ok(())
}

/// Pregunta de una sola pasada (preguntar)
async fn cmd_preguntar(pregunta: &str) -> Result<()> {
    let chain = adjuntar().await?;

    let mut session = ChatSession::new();
    session.set_chain(chain);

    println!("Usuario: {pregunta}");
    let respuesta = session.submit(pregunta).await?;
    println!("Asistente: {respuesta}");
    Ok(())
}

/// Conversación interactiva (chat)
///
/// Comandos dentro del bucle: `/buscar <término>` reingesta el corpus,
/// `/voz` dicta la pregunta por micrófono, `/salir` termina.
async fn cmd_chat(termino: Option<String>) -> Result<()> {
    let mut session = ChatSession::new();

    if let Some(ref termino) = termino {
        match ingestar(termino).await {
            Ok(chain) => session.set_chain(chain),
            Err(e) => println!("[!] {e}"),
        }
    } else if let Ok(chain) = adjuntar().await {
        println!("[*] Corpus anterior cargado.");
        session.set_chain(chain);
    }

    println!();
    println!("Escriba su pregunta, /buscar <término>, /voz o /salir.");

    let stdin = io::stdin();
    loop {
        print!("Usuario: ");
        io::stdout().flush()?;

        let mut linea = String::new();
        if stdin.lock().read_line(&mut linea)? == 0 {
            break;
        }
        let entrada = linea.trim();

        if entrada.is_empty() {
            continue;
        }

        if entrada == "/salir" {
            break;
        }

        if let Some(termino) = entrada.strip_prefix("/buscar ") {
            match ingestar(termino.trim()).await {
                Ok(chain) => session.set_chain(chain),
                Err(e) => println!("[!] {e}"),
            }
            continue;
        }

        let pregunta = if entrada == "/voz" {
            match dictar().await {
                Ok(texto) => {
                    println!("Usuario (voz): {texto}");
                    texto
                }
                Err(e) => {
                    println!("[!] {e}");
                    continue;
                }
            }
        } else {
            entrada.to_string()
        };

        match session.submit(&pregunta).await {
            Ok(respuesta) => println!("Asistente: {respuesta}"),
            Err(e) => println!("[!] {e}"),
        }
    }

    println!("Hasta pronto.");
    Ok(())
}

/// Consulta por voz (voz)
///
/// Graba, transcribe y muestra los temas jurídicos detectados en la
/// consulta dictada.
async fn cmd_voz() -> Result<()> {
    if !crate::llm::has_api_key() {
        bail!(
            "La clave de Groq no está configurada.\n\
             Configuración: export GROQ_API_KEY=su-clave"
        );
    }

    let texto = dictar().await?;
    println!("[OK] Transcripción: {texto}");

    println!("[*] Detectando temas jurídicos...");
    let modelo = GroqChat::from_env()?;
    let temas = detectar_temas(&modelo, &texto).await?;
    println!("{temas}");

    Ok(())
}

/// Graba del micrófono hasta Enter y devuelve la transcripción validada
///
/// El WAV temporal se elimina siempre, incluso cuando la transcripción
/// falla.
async fn dictar() -> Result<String> {
    let mut grabadora = Grabadora::temporal();
    grabadora.iniciar()?;

    println!("[*] Grabando... presione Enter para detener.");
    let mut descarte = String::new();
    io::stdin().lock().read_line(&mut descarte)?;

    let ruta_wav = grabadora.detener()?;

    let transcriber = GroqTranscriber::from_env()?;
    let resultado = transcriber.transcribe(&ruta_wav).await;
    grabadora.limpiar();

    validar_transcripcion(&resultado?)
}

/// Comando de estado (status)
async fn cmd_status() -> Result<()> {
    println!("sentencias-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let data_dir = get_data_dir();
    println!("[*] Directorio de datos: {}", data_dir.display());

    if crate::embedding::has_api_key() {
        println!("[OK] Clave de OpenAI: configurada");
    } else {
        println!("[!] Clave de OpenAI: sin configurar");
        println!("    Configuración: export OPENAI_API_KEY=su-clave");
    }

    if crate::llm::has_api_key() {
        println!("[OK] Clave de Groq: configurada");
    } else {
        println!("[!] Clave de Groq: sin configurar");
        println!("    Configuración: export GROQ_API_KEY=su-clave");
    }

    match ChunkStore::open_default() {
        Ok(store) => match store.stats() {
            Ok(stats) => {
                println!(
                    "[OK] Fragmentos almacenados: {} ({} sentencias)",
                    stats.fragmento_count, stats.sentencia_count
                );
                println!(
                    "     Texto total: {}",
                    format_bytes(stats.total_text_bytes)
                );
            }
            Err(e) => println!("[!] No se pudieron leer las estadísticas: {e}"),
        },
        Err(e) => println!("[!] No se pudo abrir el almacén: {e}"),
    }

    match abrir_indice().await {
        Ok(indice) => {
            use crate::corpus::VectorStore;
            match indice.count().await {
                Ok(n) => println!("[OK] Índice vectorial: {n} vectores"),
                Err(e) => tracing::debug!("vector count failed: {e}"),
            }
        }
        Err(e) => tracing::debug!("vector index unavailable: {e}"),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Recorta texto a un máximo de caracteres (seguro para UTF-8)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// Formatea un tamaño en bytes
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hola", 10), "hola");
        assert_eq!(truncate_text("hola mundo", 4), "hola...");
        assert_eq!(truncate_text("hola\nmundo", 20), "hola mundo");
    }

    #[test]
    fn test_truncate_unicode() {
        let texto = "análisis jurídico";
        assert_eq!(truncate_text(texto, 8), "análisis...");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }
}
