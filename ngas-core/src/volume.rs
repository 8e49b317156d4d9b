//! Volume Registry (C1): enumerates mounted disks and picks archive
//! targets. §4.1.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

/// A row of `ngas_disks` (§3, §6).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Volume {
    pub disk_id: String,
    pub slot_id: String,
    pub mount_point: String,
    pub bytes_stored: i64,
    pub number_of_files: i64,
    pub completed: bool,
    pub completion_date: Option<DateTime<Utc>>,
}

impl Volume {
    pub fn staging_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.mount_point).join("staging")
    }
}

/// Per-slot mutual exclusion: writes to the same volume are serialised,
/// writes to different volumes proceed in parallel (§5). One entry is
/// created lazily per slot the first time it is contended.
#[derive(Default)]
pub struct SlotLocks {
    locks: tokio::sync::Mutex<std::collections::HashMap<String, std::sync::Arc<Mutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_for(&self, slot_id: &str) -> std::sync::Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(slot_id.to_string())
            .or_insert_with(|| std::sync::Arc::new(Mutex::new(())))
            .clone()
    }
}

/// The Volume Registry gateway: a thin wrapper over the `ngas_disks` table.
pub struct VolumeRegistry {
    pool: PgPool,
    host_id: String,
}

impl VolumeRegistry {
    pub fn new(pool: PgPool, host_id: impl Into<String>) -> Self {
        Self {
            pool,
            host_id: host_id.into(),
        }
    }

    /// Fresh SQL query per request, so completion is observed promptly; no
    /// caching layer (§4.1). Candidates are shuffled and the first taken,
    /// distributing load across disks without stream/storage-set
    /// bookkeeping.
    pub async fn pick_target(&self) -> Result<Option<Volume>> {
        let mut candidates: Vec<Volume> = sqlx::query_as(
            r#"
            SELECT disk_id, slot_id, mount_point, bytes_stored, number_of_files,
                   completed, completion_date
            FROM ngas_disks
            WHERE completed = false AND host_id = $1
            "#,
        )
        .bind(&self.host_id)
        .fetch_all(&self.pool)
        .await?;

        if candidates.is_empty() {
            return Ok(None);
        }
        candidates.shuffle(&mut rand::thread_rng());
        Ok(candidates.into_iter().next())
    }

    pub async fn for_slot(&self, slot_id: &str) -> Result<Volume> {
        let volume: Volume = sqlx::query_as(
            r#"
            SELECT disk_id, slot_id, mount_point, bytes_stored, number_of_files,
                   completed, completion_date
            FROM ngas_disks
            WHERE slot_id = $1
            "#,
        )
        .bind(slot_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(volume)
    }

    /// Flips the completion flag once post-write free space drops below
    /// the configured threshold (§3 Volume Completion Threshold).
    pub async fn mark_completed(&self, disk_id: &str, timestamp: DateTime<Utc>) -> Result<()> {
        debug!(disk_id, "marking volume completed");
        sqlx::query(
            "UPDATE ngas_disks SET completed = true, completion_date = $2 WHERE disk_id = $1",
        )
        .bind(disk_id)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Generates the `unique-id` half of a staging filename: a wallclock
/// timestamp plus a process-local monotonic counter (§3).
pub fn gen_unique_id() -> String {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let now = Utc::now();
    format!("{}-{:06}-{}", now.format("%Y%m%dT%H%M%S%.3f"), n, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_ids_are_distinct() {
        let a = gen_unique_id();
        let b = gen_unique_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn slot_locks_are_reused_per_slot() {
        let locks = SlotLocks::new();
        let a = locks.lock_for("slot-1").await;
        let b = locks.lock_for("slot-1").await;
        assert!(std::sync::Arc::ptr_eq(&a, &b));
        let c = locks.lock_for("slot-2").await;
        assert!(!std::sync::Arc::ptr_eq(&a, &c));
    }
}
