//! SQLite-backed blob store
//!
//! A single-table, name-keyed cache for database payloads. rusqlite calls are
//! blocking, so every operation opens its connection inside
//! `tokio::task::spawn_blocking`.

use super::{BlobStore, CachedBlob};
use crate::error::{GeoError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tokio::task;

/// Durable blob store over a local SQLite file
pub struct SqliteBlobStore {
    path: PathBuf,
}

impl SqliteBlobStore {
    /// Open the store, creating the file and schema when missing
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let schema_path = path.clone();
        run_blocking(move || {
            let conn = connect(&schema_path)?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS blobs (
                    name TEXT PRIMARY KEY,
                    content BLOB NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
                [],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await?;

        log::debug!("Opened blob store at {}", path.display());
        Ok(Self { path })
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn get(&self, name: &str) -> Result<Option<CachedBlob>> {
        let path = self.path.clone();
        let name = name.to_string();
        run_blocking(move || {
            let conn = connect(&path)?;
            let row = conn
                .query_row(
                    "SELECT content, updated_at FROM blobs WHERE name = ?1",
                    params![name],
                    |row| {
                        let content: Vec<u8> = row.get(0)?;
                        let updated_at: i64 = row.get(1)?;
                        Ok((content, updated_at))
                    },
                )
                .optional()
                .map_err(sql_err)?;

            Ok(row.map(|(content, updated_at)| CachedBlob {
                name,
                content,
                updated_at: DateTime::from_timestamp(updated_at, 0).unwrap_or_else(Utc::now),
            }))
        })
        .await
    }

    async fn create(&self, name: &str) -> Result<CachedBlob> {
        // Nothing is written until persist; the handle lives in memory only
        Ok(CachedBlob::new(name))
    }

    async fn persist(&self, blob: &CachedBlob) -> Result<()> {
        let path = self.path.clone();
        let name = blob.name.clone();
        let content = blob.content.clone();
        let updated_at = blob.updated_at.timestamp();
        run_blocking(move || {
            let conn = connect(&path)?;
            conn.execute(
                "INSERT INTO blobs (name, content, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                    content = excluded.content,
                    updated_at = excluded.updated_at",
                params![name, content, updated_at],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }
}

fn connect(path: &Path) -> Result<Connection> {
    Connection::open(path).map_err(sql_err)
}

fn sql_err(err: rusqlite::Error) -> GeoError {
    GeoError::store(err.to_string())
}

async fn run_blocking<T, F>(job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    task::spawn_blocking(job)
        .await
        .map_err(|e| GeoError::other(format!("blocking store task failed: {}", e)))?
}
