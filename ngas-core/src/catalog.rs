//! Catalog Gateway (C6): reads and writes `ngas_disks` / `ngas_files`.
//! §4.6. No multi-statement transaction is assumed; single-statement
//! updates only, matching the original's direct SQL `UPDATE`s.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;

/// The two catalog writes the Archive Coordinator issues per request
/// (§4.7 step 6). A trait seam so coordinator tests can run against an
/// in-process fake instead of a live Postgres connection.
#[async_trait]
pub trait CatalogSink: Send + Sync {
    async fn insert_file(&self, record: &FileRecord) -> Result<()>;
    async fn update_disk_stats(&self, disk_id: &str, delta_bytes: i64) -> Result<()>;
}

/// The checksum plug-in identifier recorded on every row the core writes
/// (§3, §6) — the core only ever computes CRC-32/zlib.
pub const CHECKSUM_PLUGIN_ID: &str = "ngamsGenCrc32";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Ok,
    Bad,
}

impl FileStatus {
    fn as_str(self) -> &'static str {
        match self {
            FileStatus::Ok => "OK",
            FileStatus::Bad => "BAD",
        }
    }
}

/// One row of `ngas_files` (§3, §6).
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub disk_id: String,
    pub file_id: String,
    pub file_version: i32,
    pub relative_filename: String,
    pub format: String,
    pub file_size: i64,
    pub uncompressed_size: i64,
    pub compression: String,
    pub ingestion_date: DateTime<Utc>,
    pub checksum: String,
    pub checksum_plugin_id: String,
    pub file_status: FileStatus,
    pub creation_date: DateTime<Utc>,
}

/// Thin gateway over the two catalog tables the archive core touches.
pub struct CatalogGateway {
    pool: PgPool,
}

impl CatalogGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogSink for CatalogGateway {
    /// Inserts one `ngas_files` row. On a `(disk_id, file_id, file_version)`
    /// conflict the policy is "replace" (§4.6): the core assumes DAPI's
    /// version is fresh and the caller is responsible for any semantic
    /// implications of overwriting an earlier archive of the same version.
    async fn insert_file(&self, record: &FileRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ngas_files (
                disk_id, file_id, file_version, filename, format, file_size,
                uncompressed_file_size, compression, ingestion_date,
                checksum, checksum_plugin, file_status, creation_date
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (disk_id, file_id, file_version) DO UPDATE SET
                filename = EXCLUDED.filename,
                format = EXCLUDED.format,
                file_size = EXCLUDED.file_size,
                uncompressed_file_size = EXCLUDED.uncompressed_file_size,
                compression = EXCLUDED.compression,
                ingestion_date = EXCLUDED.ingestion_date,
                checksum = EXCLUDED.checksum,
                checksum_plugin = EXCLUDED.checksum_plugin,
                file_status = EXCLUDED.file_status,
                creation_date = EXCLUDED.creation_date
            "#,
        )
        .bind(&record.disk_id)
        .bind(&record.file_id)
        .bind(record.file_version)
        .bind(&record.relative_filename)
        .bind(&record.format)
        .bind(record.file_size)
        .bind(record.uncompressed_size)
        .bind(&record.compression)
        .bind(record.ingestion_date)
        .bind(&record.checksum)
        .bind(&record.checksum_plugin_id)
        .bind(record.file_status.as_str())
        .bind(record.creation_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `UPDATE ngas_disks SET number_of_files = number_of_files + 1,
    /// bytes_stored = bytes_stored + :delta WHERE disk_id = :id` (§4.6).
    async fn update_disk_stats(&self, disk_id: &str, delta_bytes: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ngas_disks
            SET number_of_files = number_of_files + 1,
                bytes_stored = bytes_stored + $2
            WHERE disk_id = $1
            "#,
        )
        .bind(disk_id)
        .bind(delta_bytes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
