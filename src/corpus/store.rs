//! Almacén de fragmentos - rusqlite síncrono
//!
//! Guarda los fragmentos del corpus vigente (los de la última búsqueda).
//! Ubicación por defecto: ~/.sentencias-rag/corpus.db
//!
//! Disciplina de mutación: el comando de búsqueda limpia el almacén antes de
//! ingerir un nuevo término; nunca se mezclan corpus de búsquedas distintas.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;

// ============================================================================
// Data Directory
// ============================================================================

/// Directorio de datos (~/.sentencias-rag/ o $SENTENCIAS_DATA_DIR)
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SENTENCIAS_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sentencias-rag")
}

// ============================================================================
// Types
// ============================================================================

/// Fragmento almacenado
#[derive(Debug, Clone, PartialEq)]
pub struct Fragmento {
    pub id: i64,
    /// Identificador de la sentencia de origen (ej. `2024/T-123-24`)
    pub sentencia: String,
    /// Texto del fragmento (≤ tamaño máximo del fragmentador)
    pub texto: String,
    /// Posición del fragmento dentro de su sentencia (0-based)
    pub orden: i32,
}

/// Fragmento nuevo, aún sin id
#[derive(Debug, Clone)]
pub struct NuevoFragmento {
    pub sentencia: String,
    pub texto: String,
    pub orden: i32,
}

/// Estadísticas del almacén
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub fragmento_count: usize,
    pub sentencia_count: usize,
    pub total_text_bytes: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// ChunkStore
// ============================================================================

/// Almacén de fragmentos sobre SQLite
pub struct ChunkStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl ChunkStore {
    /// Abre el almacén (lo crea si no existe)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("No se pudo crear el directorio de la base de datos")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("No se pudo abrir la base de datos SQLite")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// Abre en la ubicación por defecto (~/.sentencias-rag/corpus.db)
    pub fn open_default() -> Result<Self> {
        let data_dir = get_data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir)
                .context("No se pudo crear el directorio de datos")?;
        }

        Self::open(&data_dir.join("corpus.db"))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS fragmentos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sentencia TEXT NOT NULL,
                texto TEXT NOT NULL,
                orden INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .context("No se pudo crear la tabla fragmentos")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_fragmentos_sentencia ON fragmentos(sentencia)",
            [],
        )
        .context("No se pudo crear el índice por sentencia")?;

        tracing::debug!("Chunk store initialized at {:?}", self.db_path);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// Inserta un lote de fragmentos en una sola transacción
    pub fn insert_batch(&self, fragmentos: &[NuevoFragmento]) -> Result<usize> {
        if fragmentos.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .context("No se pudo iniciar la transacción")?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO fragmentos (sentencia, texto, orden, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for fragmento in fragmentos {
                stmt.execute(params![
                    fragmento.sentencia,
                    fragmento.texto,
                    fragmento.orden,
                    now
                ])?;
            }
        }
        tx.commit().context("No se pudo confirmar la transacción")?;

        tracing::info!("Inserted {} chunks", fragmentos.len());
        Ok(fragmentos.len())
    }

    /// Vacía el almacén (delete-many sobre la colección completa)
    pub fn clear(&self) -> Result<usize> {
        let conn = self.lock()?;
        let rows = conn
            .execute("DELETE FROM fragmentos", [])
            .context("No se pudo vaciar el almacén")?;

        tracing::info!("Cleared chunk store ({} rows)", rows);
        Ok(rows)
    }

    /// Número de fragmentos almacenados
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM fragmentos", [], |row| row.get(0))
            .context("No se pudo contar los fragmentos")?;
        Ok(count as usize)
    }

    /// Carga todos los fragmentos en orden de inserción
    pub fn load_all(&self) -> Result<Vec<Fragmento>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, sentencia, texto, orden FROM fragmentos ORDER BY id",
        )?;

        let fragmentos = stmt
            .query_map([], |row| {
                Ok(Fragmento {
                    id: row.get(0)?,
                    sentencia: row.get(1)?,
                    texto: row.get(2)?,
                    orden: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("No se pudieron cargar los fragmentos")?;

        Ok(fragmentos)
    }

    /// Estadísticas del almacén
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;

        let fragmento_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM fragmentos", [], |row| row.get(0))
            .context("No se pudo contar los fragmentos")?;

        let sentencia_count: i64 = conn
            .query_row(
                "SELECT COUNT(DISTINCT sentencia) FROM fragmentos",
                [],
                |row| row.get(0),
            )
            .context("No se pudo contar las sentencias")?;

        let total_size: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(texto)), 0) FROM fragmentos",
                [],
                |row| row.get(0),
            )
            .context("No se pudo sumar el tamaño del texto")?;

        Ok(StoreStats {
            fragmento_count: fragmento_count as usize,
            sentencia_count: sentencia_count as usize,
            total_text_bytes: total_size as usize,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
