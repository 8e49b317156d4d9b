//! Staging Writer (C2): streams an incoming byte sequence to a staging file,
//! folding in a running CRC-32/zlib, measuring throughput, enforcing the
//! idle deadline. §4.2.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{NgasError, Result};

/// Maximum length of a staging filename before it is middle-truncated with
/// a `__` marker (§6 Filesystem layout).
pub const MAX_FILENAME_LEN: usize = 255;

/// How long the receive loop waits for another successful read before it
/// gives up (§4.2 step 4). Fixed at 30s in production; configurable only so
/// tests don't have to burn 30 real seconds to exercise the idle path.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Sleep between retries on a zero-byte read within the idle window.
const RETRY_SLEEP: Duration = Duration::from_millis(50);

/// Threshold (bytes/block) past which a read or write is counted "slow"
/// (§4.2 step 5): `blockSize / (512 KiB/s)`.
const SLOW_THRESHOLD_BYTES_PER_SEC: f64 = 512.0 * 1024.0;

/// A generic "readable byte source" capability (§9 Design Notes): the
/// unification point for sockets, HTTP bodies, local files, and BBCP's
/// stdout, none of which the receive loop needs to tell apart.
#[async_trait]
pub trait ByteSource: Send {
    /// Reads up to `buf.len()` bytes, returning the number of bytes read.
    /// `0` means EOF (for known-length sources) or "no data right now" (for
    /// unbounded sources within the idle window).
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Attempts to raise the underlying socket's receive buffer, halving on
    /// `ENOBUFS` until the kernel accepts a size or gives up (§4.2 step 3).
    /// Most sources (files, HTTP bodies) have no such knob and no-op here.
    fn try_raise_recv_buffer(&mut self, _requested: usize) -> Option<usize> {
        None
    }
}

/// Outcome of a successful `receive()` call (§4.2 contract).
#[derive(Debug, Clone, Copy)]
pub struct ReceiveOutcome {
    pub elapsed: Duration,
    pub crc32: u32,
    pub bytes_written: u64,
    pub rate_bytes_per_sec: f64,
}

/// Tunables threaded through from the server configuration.
#[derive(Debug, Clone)]
pub struct StagingConfig {
    pub block_size: usize,
    pub recv_buf_size: Option<usize>,
    pub idle_timeout: Duration,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            block_size: 65536,
            recv_buf_size: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Streams `source` into `staging_path`, returning the elapsed time,
/// computed CRC-32/zlib, and achieved rate on success.
///
/// `declared_size`: `Some(n)` for push requests and pulls where the length
/// is known up front; `None` drives the same loop with a generous upper
/// bound (§4.2 Edge cases) and relies on the idle timeout to end it.
///
/// `expected_crc`: when present, checked against the computed CRC after the
/// file is closed; a mismatch yields `ChecksumMismatch` (§4.2 step 7).
///
/// `slot_lock` is held for the entire receive (§4.2 step 2), serialising
/// concurrent writes to the same volume.
pub async fn receive(
    mut source: Box<dyn ByteSource>,
    staging_path: &Path,
    cfg: &StagingConfig,
    file_uri: &str,
    declared_size: Option<u64>,
    expected_crc: Option<u32>,
    slot_lock: Arc<Mutex<()>>,
) -> Result<ReceiveOutcome> {
    if let Some(parent) = staging_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut out = File::create(staging_path).await?;

    let _guard = slot_lock.lock().await;

    if let Some(requested) = cfg.recv_buf_size {
        if let Some(accepted) = source.try_raise_recv_buffer(requested) {
            tracing::debug!(accepted, "raised source receive buffer");
        }
    }

    let result = receive_loop(&mut source, &mut out, cfg, declared_size).await;
    // Close explicitly so partial writes are flushed before we inspect the
    // outcome or the caller unlinks the file (§4.2 step 8).
    let _ = out.flush().await;
    drop(out);

    let outcome = result?;

    if let Some(expected) = expected_crc {
        if expected != outcome.crc32 {
            return Err(NgasError::ChecksumMismatch {
                file_uri: file_uri.to_string(),
                expected,
                computed: outcome.crc32,
            });
        }
    }

    Ok(outcome)
}

async fn receive_loop(
    source: &mut Box<dyn ByteSource>,
    out: &mut File,
    cfg: &StagingConfig,
    declared_size: Option<u64>,
) -> Result<ReceiveOutcome> {
    // §4.2 Edge cases: unknown-size pulls drive the loop with a generous
    // upper bound; the idle timeout is what actually ends them.
    const UNKNOWN_SIZE_BOUND: u64 = 100_000_000_000;
    let mut remaining = declared_size.unwrap_or(UNKNOWN_SIZE_BOUND);
    let size_known = declared_size.is_some();

    let mut buf = vec![0u8; cfg.block_size];
    let mut hasher = crc32fast::Hasher::new();

    let started = Instant::now();
    let mut last_activity = Instant::now();
    let mut total_written: u64 = 0;

    let slow_block_secs = cfg.block_size as f64 / SLOW_THRESHOLD_BYTES_PER_SEC;
    let mut slow_reads = 0u32;
    let mut slow_writes = 0u32;

    while remaining > 0 {
        if last_activity.elapsed() >= cfg.idle_timeout {
            break;
        }
        let want = (cfg.block_size as u64).min(remaining) as usize;

        let read_started = Instant::now();
        let n = source
            .read(&mut buf[..want])
            .await
            .map_err(|e| NgasError::SourceIo(e.to_string()))?;
        let read_elapsed = read_started.elapsed();
        if read_elapsed.as_secs_f64() >= slow_block_secs {
            slow_reads += 1;
        }

        if n == 0 {
            tokio::time::sleep(RETRY_SLEEP).await;
            continue;
        }

        hasher.update(&buf[..n]);

        let write_started = Instant::now();
        out.write_all(&buf[..n]).await?;
        let write_elapsed = write_started.elapsed();
        if write_elapsed.as_secs_f64() >= slow_block_secs {
            slow_writes += 1;
        }

        total_written += n as u64;
        remaining = remaining.saturating_sub(n as u64);
        last_activity = Instant::now();
    }

    let elapsed = started.elapsed();

    if slow_reads > 0 {
        warn!(
            slow_reads,
            "slow network reads during this transfer; consider checking the network"
        );
    }
    if slow_writes > 0 {
        warn!(
            slow_writes,
            "slow disk writes during this transfer; consider checking your disks"
        );
    }

    if size_known && remaining > 0 {
        return Err(NgasError::ShortRead {
            declared: declared_size.unwrap(),
            received: total_written,
        });
    }

    let rate = if elapsed.as_secs_f64() > 0.0 {
        total_written as f64 / elapsed.as_secs_f64()
    } else {
        total_written as f64
    };

    Ok(ReceiveOutcome {
        elapsed,
        crc32: hasher.finalize(),
        bytes_written: total_written,
        rate_bytes_per_sec: rate,
    })
}

/// Builds `<mount>/staging/<unique-id>___<base-name>[.<ext>]` (§3, §6),
/// truncating the middle of an overlong name to `MAX_FILENAME_LEN`
/// characters with a `__` marker.
pub fn staging_filename(mount_point: &Path, unique_id: &str, base_name: &str) -> PathBuf {
    let mut name = format!("{unique_id}___{base_name}");
    if name.len() > MAX_FILENAME_LEN {
        let keep_head = MAX_FILENAME_LEN / 2 - 1;
        let keep_tail = MAX_FILENAME_LEN - keep_head - 2;
        let head: String = name.chars().take(keep_head).collect();
        let tail: String = name
            .chars()
            .rev()
            .take(keep_tail)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        name = format!("{head}__{tail}");
    }
    mount_point.join("staging").join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecSource {
        data: Vec<u8>,
        pos: usize,
    }

    #[async_trait]
    impl ByteSource for VecSource {
        async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let remaining = &self.data[self.pos..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[tokio::test]
    async fn zero_byte_file_yields_crc_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staging").join("zero.dat");
        let source: Box<dyn ByteSource> = Box::new(VecSource {
            data: vec![],
            pos: 0,
        });
        let outcome = receive(
            source,
            &path,
            &StagingConfig::default(),
            "push://zero",
            Some(0),
            None,
            Arc::new(Mutex::new(())),
        )
        .await
        .unwrap();
        assert_eq!(outcome.crc32, 0);
        assert_eq!(outcome.bytes_written, 0);
        assert_eq!(tokio::fs::metadata(&path).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn crc_matches_known_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staging").join("hello.dat");
        let data = b"HELLOWORLD".to_vec();
        let len = data.len() as u64;
        let source: Box<dyn ByteSource> = Box::new(VecSource { data, pos: 0 });
        let outcome = receive(
            source,
            &path,
            &StagingConfig::default(),
            "push://hello",
            None,
            None,
            Arc::new(Mutex::new(())),
        )
        .await
        .unwrap();
        assert_eq!(outcome.crc32, 2535050025);
        assert_eq!(outcome.bytes_written, len);
    }

    #[tokio::test]
    async fn checksum_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staging").join("hello2.dat");
        let source: Box<dyn ByteSource> = Box::new(VecSource {
            data: b"HELLOWORLD".to_vec(),
            pos: 0,
        });
        let result = receive(
            source,
            &path,
            &StagingConfig::default(),
            "push://hello2",
            None,
            Some(1),
            Arc::new(Mutex::new(())),
        )
        .await;
        assert!(matches!(result, Err(NgasError::ChecksumMismatch { .. })));
    }

    #[tokio::test]
    async fn short_read_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staging").join("short.dat");
        let source: Box<dyn ByteSource> = Box::new(VecSource {
            data: b"only-ten-b".to_vec(),
            pos: 0,
        });
        let cfg = StagingConfig {
            idle_timeout: Duration::from_millis(80),
            ..StagingConfig::default()
        };
        let result = receive(
            source,
            &path,
            &cfg,
            "push://short",
            Some(1_000_000),
            None,
            Arc::new(Mutex::new(())),
        )
        .await;
        assert!(matches!(result, Err(NgasError::ShortRead { declared: 1_000_000, received: 10 })));
    }

    #[test]
    fn staging_filename_joins_mount_staging_dir() {
        let path = staging_filename(Path::new("/vol1"), "20240101-000001-abc", "data.fits");
        assert_eq!(
            path,
            Path::new("/vol1/staging/20240101-000001-abc___data.fits")
        );
    }

    #[test]
    fn staging_filename_truncates_overlong_names() {
        let long_base = "x".repeat(400);
        let path = staging_filename(Path::new("/vol1"), "uid", &long_base);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.len() <= MAX_FILENAME_LEN);
        assert!(name.contains("__"));
    }
}
