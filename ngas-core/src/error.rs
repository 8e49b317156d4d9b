use thiserror::Error;

/// The §7 error taxonomy. Each variant is surfaced by `ngas-server` as a
/// specific HTTP status; the core itself never maps these to wire codes.
#[derive(Error, Debug)]
pub enum NgasError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no disk volumes are available for ingesting any files")]
    NoVolumes,

    #[error("failed reading from source: {0}")]
    SourceIo(String),

    #[error("failed writing to staging area: {0}")]
    StagingIo(#[from] std::io::Error),

    #[error("short read: declared size {declared} bytes but only received {received} bytes")]
    ShortRead { declared: u64, received: u64 },

    #[error("checksum mismatch for {file_uri}: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        file_uri: String,
        expected: u32,
        computed: u32,
    },

    #[error("DAPI failure for mime type {mime}: {reason}")]
    DapiFailure { mime: String, reason: String },

    #[error("catalog failure: {0}")]
    CatalogFailure(#[from] sqlx::Error),

    #[error("MIME type could not be resolved for {0}")]
    UnknownMime(String),

    #[error("external process failed: {0}")]
    ExternalProcess(String),
}

pub type Result<T> = std::result::Result<T, NgasError>;
