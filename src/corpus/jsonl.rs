//! Artefacto intermedio JSON Lines
//!
//! El scraping exporta las sentencias a un archivo `.jsonl` (un registro por
//! línea, campos `sentencia` y `texto`) y la ingesta lo vuelve a leer antes
//! de fragmentar. El archivo queda como rastro auditable de cada búsqueda.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::scraper::Sentencia;

/// Nombre del artefacto para un término de búsqueda
///
/// `"tutela salud"` -> `sentencias_tutela_salud.jsonl`
pub fn nombre_artefacto(termino: &str) -> String {
    let slug: String = termino
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    format!("sentencias_{}.jsonl", slug)
}

/// Escribe las sentencias como JSON Lines
pub fn write_jsonl(path: &Path, sentencias: &[Sentencia]) -> Result<PathBuf> {
    let file = File::create(path)
        .with_context(|| format!("No se pudo crear el artefacto {:?}", path))?;
    let mut writer = BufWriter::new(file);

    for sentencia in sentencias {
        let line = serde_json::to_string(sentencia)
            .context("No se pudo serializar la sentencia")?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }

    writer.flush().context("No se pudo escribir el artefacto")?;
    tracing::info!("Wrote {} records to {:?}", sentencias.len(), path);

    Ok(path.to_path_buf())
}

/// Lee el artefacto de vuelta, un registro por línea
///
/// Las líneas vacías se ignoran; una línea malformada es error.
pub fn read_jsonl(path: &Path) -> Result<Vec<Sentencia>> {
    let file = File::open(path)
        .with_context(|| format!("No se pudo abrir el artefacto {:?}", path))?;
    let reader = BufReader::new(file);

    let mut sentencias = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.context("No se pudo leer el artefacto")?;
        if line.trim().is_empty() {
            continue;
        }
        let sentencia: Sentencia = serde_json::from_str(&line)
            .with_context(|| format!("Registro malformado en la línea {}", i + 1))?;
        sentencias.push(sentencia);
    }

    Ok(sentencias)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sentencia(id: &str, texto: &str) -> Sentencia {
        Sentencia {
            sentencia: id.to_string(),
            texto: texto.to_string(),
        }
    }

    #[test]
    fn test_nombre_artefacto() {
        assert_eq!(nombre_artefacto("tutela salud"), "sentencias_tutela_salud.jsonl");
        assert_eq!(nombre_artefacto("habeas"), "sentencias_habeas.jsonl");
        assert_eq!(nombre_artefacto("  tutela   salud "), "sentencias_tutela_salud.jsonl");
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sentencias_test.jsonl");

        let docs = vec![
            sentencia("2024/T-123-24", "Primera sentencia sobre salud."),
            sentencia("2023/C-045-23", "Segunda sentencia,\ncon salto de línea."),
        ];

        write_jsonl(&path, &docs).unwrap();
        let leidas = read_jsonl(&path).unwrap();

        assert_eq!(leidas.len(), 2);
        assert_eq!(leidas[0].sentencia, "2024/T-123-24");
        assert_eq!(leidas[1].texto, "Segunda sentencia,\ncon salto de línea.");
    }

    #[test]
    fn test_read_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blancos.jsonl");
        std::fs::write(
            &path,
            "{\"sentencia\":\"a\",\"texto\":\"x\"}\n\n{\"sentencia\":\"b\",\"texto\":\"y\"}\n",
        )
        .unwrap();

        let leidas = read_jsonl(&path).unwrap();
        assert_eq!(leidas.len(), 2);
    }

    #[test]
    fn test_read_malformed_line_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("malo.jsonl");
        std::fs::write(&path, "{no es json}\n").unwrap();
        assert!(read_jsonl(&path).is_err());
    }

    #[test]
    fn test_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vacio.jsonl");
        write_jsonl(&path, &[]).unwrap();
        assert!(read_jsonl(&path).unwrap().is_empty());
    }
}
