//! Scraper de relatorías - Corte Constitucional de Colombia
//!
//! Consulta el buscador público de la relatoría con un término libre, filtra
//! los enlaces de detalle y extrae el texto de la sección de contenido de
//! cada providencia. Los fallos por enlace se registran y se omiten; el
//! scraping continúa con los enlaces restantes.

use std::collections::HashSet;

use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// Buscador público de la relatoría
const BUSCADOR_URL: &str = "https://www.corteconstitucional.gov.co/relatoria/buscador_new/";

/// Rango de fechas fijo de la búsqueda
const FECHA_INICIO: &str = "1992-01-01";
const FECHA_FIN: &str = "2024-10-29";

/// Tope de providencias por búsqueda
const MAX_PROVIDENCIAS: u32 = 100;

/// Marcador de ruta de los enlaces de detalle
const MARCADOR_RELATORIA: &str = "relatoria";

/// Longitud mínima de un enlace de detalle (descarta enlaces de navegación)
const MIN_LONGITUD_ENLACE: usize = 49;

// ============================================================================
// Types
// ============================================================================

/// Documento scrapeado: una providencia de la Corte
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentencia {
    /// Identificador derivado del enlace (ej. `2024/T-123-24`)
    pub sentencia: String,
    /// Texto completo de la sección de contenido
    pub texto: String,
}

/// Resultado de buscar la sección de contenido en una página de detalle
///
/// La búsqueda intenta primero la clase `WordSection1` y luego `Section1`;
/// el resultado etiquetado reemplaza al antiguo control de flujo por
/// excepciones del que derivó este scraper.
#[derive(Debug, Clone, PartialEq)]
pub enum SeccionContenido {
    /// Encontrada bajo `div.WordSection1`
    Primaria(String),
    /// Encontrada bajo la clase alterna `div.Section1`
    Alterna(String),
    /// Ninguna de las dos clases está presente
    NoEncontrada,
}

impl SeccionContenido {
    /// Texto de la sección, si se encontró
    pub fn texto(self) -> Option<String> {
        match self {
            SeccionContenido::Primaria(t) | SeccionContenido::Alterna(t) => Some(t),
            SeccionContenido::NoEncontrada => None,
        }
    }
}

// ============================================================================
// RelatoriaScraper
// ============================================================================

/// Scraper del buscador de relatorías
pub struct RelatoriaScraper {
    client: reqwest::Client,
    base_url: String,
}

impl RelatoriaScraper {
    /// Crea el scraper contra el buscador real
    pub fn new() -> Result<Self> {
        Self::with_base_url(BUSCADOR_URL)
    }

    /// Crea el scraper contra otra URL base (pruebas)
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("sentencias-rag/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("No se pudo crear el cliente HTTP")?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Construye la URL de búsqueda con el rango de fechas y el tope fijos
    pub fn buscar_url(&self, termino: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).context("URL base inválida")?;

        url.query_pairs_mut()
            .append_pair("searchOption", "texto")
            .append_pair("fini", FECHA_INICIO)
            .append_pair("ffin", FECHA_FIN)
            .append_pair("buscar_por", termino)
            .append_pair("accion", "search")
            .append_pair("verform", "si")
            .append_pair("slop", "1")
            .append_pair("volver_a", "relatoria")
            .append_pair("qu", "625")
            .append_pair("maxprov", &MAX_PROVIDENCIAS.to_string())
            .append_pair("OrderbyOption", "des__score");

        Ok(url)
    }

    /// Busca sentencias y extrae el texto de cada providencia encontrada
    ///
    /// Un enlace que falla (petición o sección ausente) se registra y se
    /// omite. El resultado es el conjunto de documentos que sí se pudieron
    /// extraer, en el orden de los resultados del buscador.
    pub async fn buscar_sentencias(&self, termino: &str) -> Result<Vec<Sentencia>> {
        let url = self.buscar_url(termino)?;
        tracing::info!("Searching relatoria: {}", termino);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .context("No se pudo consultar el buscador")?;

        if !response.status().is_success() {
            anyhow::bail!("Error al acceder a la página: {}", response.status());
        }

        let html = response
            .text()
            .await
            .context("No se pudo leer la respuesta del buscador")?;

        let enlaces = extraer_enlaces(&html);
        tracing::info!("Found {} detail links", enlaces.len());

        let mut sentencias = Vec::new();

        for enlace in &enlaces {
            let cuerpo = match self.descargar_detalle(enlace).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::error!("Error al solicitar el enlace {}: {}", enlace, e);
                    continue;
                }
            };

            let documento = Html::parse_document(&cuerpo);
            match extraer_seccion(&documento) {
                SeccionContenido::Primaria(texto) => {
                    sentencias.push(Sentencia {
                        sentencia: identificador_desde_enlace(enlace),
                        texto,
                    });
                }
                SeccionContenido::Alterna(texto) => {
                    tracing::warn!("Using fallback section class for {}", enlace);
                    sentencias.push(Sentencia {
                        sentencia: identificador_desde_enlace(enlace),
                        texto,
                    });
                }
                SeccionContenido::NoEncontrada => {
                    tracing::error!("Error procesando el contenido del enlace {}", enlace);
                }
            }
        }

        Ok(sentencias)
    }

    async fn descargar_detalle(&self, enlace: &str) -> Result<String> {
        let response = self.client.get(enlace).send().await?;
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }
}

// ============================================================================
// Extraction Helpers
// ============================================================================

/// Extrae los enlaces de detalle de la página de resultados
///
/// Conserva solo los `a[href]` que contienen el marcador `relatoria` y
/// superan la longitud mínima, sin duplicados y en orden de aparición.
pub fn extraer_enlaces(html: &str) -> Vec<String> {
    let documento = Html::parse_document(html);

    let mut vistos = HashSet::new();
    let mut enlaces = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for elemento in documento.select(&selector) {
            if let Some(href) = elemento.value().attr("href") {
                if href.contains(MARCADOR_RELATORIA)
                    && href.len() > MIN_LONGITUD_ENLACE
                    && vistos.insert(href.to_string())
                {
                    enlaces.push(href.to_string());
                }
            }
        }
    }

    enlaces
}

/// Busca la sección de contenido de una página de detalle
///
/// Intenta `div.WordSection1` y, si no está, la clase alterna `div.Section1`.
pub fn extraer_seccion(documento: &Html) -> SeccionContenido {
    if let Some(texto) = texto_de_clase(documento, "div.WordSection1") {
        return SeccionContenido::Primaria(texto);
    }

    if let Some(texto) = texto_de_clase(documento, "div.Section1") {
        return SeccionContenido::Alterna(texto);
    }

    SeccionContenido::NoEncontrada
}

/// Texto de la primera coincidencia del selector, si existe y no está vacío
fn texto_de_clase(documento: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    let elemento = documento.select(&selector).next()?;
    let texto = texto_de_elemento(&elemento);
    if texto.is_empty() {
        None
    } else {
        Some(texto)
    }
}

/// Texto plano de un elemento, con el espacio en blanco normalizado
fn texto_de_elemento(elemento: &ElementRef) -> String {
    let mut texto = String::new();

    for nodo in elemento.text() {
        let recortado = nodo.trim();
        if !recortado.is_empty() {
            if !texto.is_empty() {
                texto.push(' ');
            }
            texto.push_str(recortado);
        }
    }

    if let Ok(re) = regex::Regex::new(r"\s+") {
        re.replace_all(&texto, " ").trim().to_string()
    } else {
        texto.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Deriva el identificador de la providencia desde su enlace
///
/// Toma lo que sigue al último `/relatoria/` y descarta la extensión `.htm`.
pub fn identificador_desde_enlace(enlace: &str) -> String {
    let cola = enlace
        .rsplit_once("/relatoria/")
        .map(|(_, cola)| cola)
        .unwrap_or(enlace);

    cola.split(".htm").next().unwrap_or(cola).to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_buscar_url_contains_fixed_params() {
        let scraper = RelatoriaScraper::new().unwrap();
        let url = scraper.buscar_url("tutela salud").unwrap();
        let query = url.query().unwrap();

        assert!(query.contains("buscar_por=tutela+salud"));
        assert!(query.contains("fini=1992-01-01"));
        assert!(query.contains("ffin=2024-10-29"));
        assert!(query.contains("maxprov=100"));
        assert!(query.contains("OrderbyOption=des__score"));
    }

    #[test]
    fn test_extraer_enlaces_filters_and_dedups() {
        let largo = "https://www.corteconstitucional.gov.co/relatoria/2024/T-123-24.htm";
        let corto = "https://host/relatoria/x.htm"; // contiene el marcador pero es corto
        let ajeno = "https://www.corteconstitucional.gov.co/servicios/alguna-pagina-larga.html";

        let html = format!(
            r#"<html><body>
                <a href="{largo}">uno</a>
                <a href="{corto}">dos</a>
                <a href="{ajeno}">tres</a>
                <a href="{largo}">repetido</a>
            </body></html>"#
        );

        let enlaces = extraer_enlaces(&html);
        assert_eq!(enlaces, vec![largo.to_string()]);
    }

    #[test]
    fn test_extraer_seccion_primaria() {
        let html = r#"<html><body>
            <div class="WordSection1"><p>Texto de la  providencia.</p></div>
            <div class="Section1"><p>No debería usarse.</p></div>
        </body></html>"#;
        let documento = Html::parse_document(html);

        match extraer_seccion(&documento) {
            SeccionContenido::Primaria(texto) => {
                assert_eq!(texto, "Texto de la providencia.");
            }
            otro => panic!("expected Primaria, got {:?}", otro),
        }
    }

    #[test]
    fn test_extraer_seccion_alterna() {
        let html = r#"<html><body>
            <div class="Section1"><p>Texto bajo la clase alterna.</p></div>
        </body></html>"#;
        let documento = Html::parse_document(html);

        match extraer_seccion(&documento) {
            SeccionContenido::Alterna(texto) => {
                assert!(texto.contains("clase alterna"));
            }
            otro => panic!("expected Alterna, got {:?}", otro),
        }
    }

    #[test]
    fn test_extraer_seccion_no_encontrada() {
        let html = "<html><body><div class='otra'>nada</div></body></html>";
        let documento = Html::parse_document(html);
        assert_eq!(extraer_seccion(&documento), SeccionContenido::NoEncontrada);
    }

    #[test]
    fn test_identificador_desde_enlace() {
        assert_eq!(
            identificador_desde_enlace(
                "https://www.corteconstitucional.gov.co/relatoria/2024/T-123-24.htm"
            ),
            "2024/T-123-24"
        );
        assert_eq!(
            identificador_desde_enlace("https://host/relatoria/autos/A-001-00.htm#inicio"),
            "autos/A-001-00"
        );
    }

    #[tokio::test]
    async fn test_buscar_sentencias_end_to_end() {
        let server = MockServer::start();

        // página de detalle con la sección primaria
        let detalle_path = "/relatoria/sentencias/2024/T-123-2024-tutela-salud.htm";
        let detalle_url = server.url(detalle_path);
        assert!(detalle_url.contains("relatoria") && detalle_url.len() > 49);

        server.mock(|when, then| {
            when.method(GET).path(detalle_path);
            then.status(200).body(
                r#"<html><body><div class="WordSection1">
                    La Corte Constitucional resuelve conceder la tutela de salud.
                </div></body></html>"#,
            );
        });

        // página de resultados con un enlace válido y uno descartable
        server.mock(|when, then| {
            when.method(GET).path("/buscador");
            then.status(200).body(format!(
                r#"<html><body>
                    <a href="{detalle_url}">T-123/24</a>
                    <a href="/relatoria/corto.htm">corto</a>
                </body></html>"#
            ));
        });

        let scraper = RelatoriaScraper::with_base_url(&server.url("/buscador")).unwrap();
        let sentencias = scraper.buscar_sentencias("tutela salud").await.unwrap();

        assert_eq!(sentencias.len(), 1);
        assert_eq!(
            sentencias[0].sentencia,
            "sentencias/2024/T-123-2024-tutela-salud"
        );
        assert!(sentencias[0].texto.contains("conceder la tutela"));
    }

    #[tokio::test]
    async fn test_buscar_sentencias_skips_failed_links() {
        let server = MockServer::start();

        let bueno = "/relatoria/sentencias/2023/C-045-2023-providencia-larga.htm";
        let roto = "/relatoria/sentencias/2023/C-046-2023-providencia-larga.htm";

        server.mock(|when, then| {
            when.method(GET).path(bueno);
            then.status(200)
                .body(r#"<div class="Section1">Contenido bajo clase alterna.</div>"#);
        });
        server.mock(|when, then| {
            when.method(GET).path(roto);
            then.status(500);
        });

        let bueno_url = server.url(bueno);
        let roto_url = server.url(roto);
        server.mock(|when, then| {
            when.method(GET).path("/buscador");
            then.status(200).body(format!(
                r#"<a href="{bueno_url}">a</a><a href="{roto_url}">b</a>"#
            ));
        });

        let scraper = RelatoriaScraper::with_base_url(&server.url("/buscador")).unwrap();
        let sentencias = scraper.buscar_sentencias("cualquiera").await.unwrap();

        // el enlace roto se omite, el scraping continúa
        assert_eq!(sentencias.len(), 1);
        assert!(sentencias[0].texto.contains("clase alterna"));
    }

    #[tokio::test]
    async fn test_buscar_sentencias_search_failure_is_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/buscador");
            then.status(503);
        });

        let scraper = RelatoriaScraper::with_base_url(&server.url("/buscador")).unwrap();
        assert!(scraper.buscar_sentencias("tutela").await.is_err());
    }
}
