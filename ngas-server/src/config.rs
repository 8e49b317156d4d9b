//! Layered configuration: a TOML file merged with `NGAS_*` environment
//! overrides, in that order of increasing precedence.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// The merged, fully-resolved configuration `main` hands to every other
/// module. Nothing downstream re-reads the environment or disk.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub staging: StagingSettings,
    pub volume: VolumeSettings,
    pub host_id: String,
    pub archiving_allowed: bool,
    pub caching_active: bool,
    pub mime_table: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct StagingSettings {
    pub block_size: usize,
    pub recv_buf_size: Option<usize>,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct VolumeSettings {
    pub free_space_disk_change_mb: u64,
}

/// The on-disk shape of the TOML config file; every field optional so a
/// partial file (or none at all) is valid and env vars can fill the rest.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: FileServerConfig,
    #[serde(default)]
    database: FileDatabaseConfig,
    #[serde(default)]
    staging: FileStagingConfig,
    #[serde(default)]
    volume: FileVolumeConfig,
    host_id: Option<String>,
    archiving_allowed: Option<bool>,
    caching_active: Option<bool>,
    #[serde(default)]
    mime_table: Vec<MimeEntry>,
}

#[derive(Debug, Deserialize)]
struct MimeEntry {
    extension: String,
    mime_type: String,
}

#[derive(Debug, Deserialize, Default)]
struct FileServerConfig {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct FileDatabaseConfig {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct FileStagingConfig {
    block_size: Option<usize>,
    recv_buf_size: Option<usize>,
    idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct FileVolumeConfig {
    free_space_disk_change_mb: Option<u64>,
}

/// Locations searched, in order, when no explicit `--config` path is given.
/// The first one that exists wins; none existing is not an error.
pub fn default_config_locations() -> Vec<PathBuf> {
    vec![
        PathBuf::from("ngas.toml"),
        PathBuf::from("/etc/ngas/ngas.toml"),
    ]
}

/// Overrides carried in from the CLI, each `Some` value taking precedence
/// over both the file and the environment.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
}

impl Config {
    /// Loads the file (if any), applies `NGAS_*` environment overrides, then
    /// the CLI overrides, and fills in defaults for anything still unset.
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let file = load_file_config(config_path)?;

        let host = overrides
            .host
            .or_else(|| std::env::var("NGAS_SERVER_HOST").ok())
            .or(file.server.host)
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = overrides
            .port
            .or_else(|| std::env::var("NGAS_SERVER_PORT").ok().and_then(|v| v.parse().ok()))
            .or(file.server.port)
            .unwrap_or(7777);

        let database_url = overrides
            .database_url
            .or_else(|| std::env::var("NGAS_DATABASE_URL").ok())
            .or(file.database.url)
            .ok_or_else(|| anyhow::anyhow!("no database URL configured (set NGAS_DATABASE_URL or [database].url)"))?;
        let max_connections = std::env::var("NGAS_DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.database.max_connections)
            .unwrap_or(10);

        let block_size = std::env::var("NGAS_STAGING_BLOCK_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.staging.block_size)
            .unwrap_or(65536);
        let recv_buf_size = std::env::var("NGAS_STAGING_RECV_BUF_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.staging.recv_buf_size);
        let idle_timeout_secs = std::env::var("NGAS_STAGING_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.staging.idle_timeout_secs)
            .unwrap_or(30);

        let free_space_disk_change_mb = std::env::var("NGAS_VOLUME_FREE_SPACE_DISK_CHANGE_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.volume.free_space_disk_change_mb)
            .unwrap_or(1024);

        let host_id = std::env::var("NGAS_HOST_ID")
            .ok()
            .or(file.host_id)
            .unwrap_or_else(|| {
                hostname_fallback()
            });
        let archiving_allowed = std::env::var("NGAS_ARCHIVING_ALLOWED")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.archiving_allowed)
            .unwrap_or(true);
        let caching_active = std::env::var("NGAS_CACHING_ACTIVE")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.caching_active)
            .unwrap_or(false);

        let mut mime_table: Vec<(String, String)> = file
            .mime_table
            .into_iter()
            .map(|entry| (entry.extension, entry.mime_type))
            .collect();
        if mime_table.is_empty() {
            mime_table = ngas_core::mime::MimeTable::defaults().into_entries();
        }

        Ok(Config {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            staging: StagingSettings {
                block_size,
                recv_buf_size,
                idle_timeout_secs,
            },
            volume: VolumeSettings {
                free_space_disk_change_mb,
            },
            host_id,
            archiving_allowed,
            caching_active,
            mime_table,
        })
    }
}

fn load_file_config(explicit_path: Option<&Path>) -> anyhow::Result<FileConfig> {
    let path = match explicit_path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_locations().into_iter().find(|p| p.exists()),
    };

    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
            toml::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))
        }
        None => Ok(FileConfig::default()),
    }
}

fn hostname_fallback() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "ngas-server".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_file_and_env_are_absent() {
        let file = FileConfig::default();
        assert!(file.server.host.is_none());
        assert!(file.mime_table.is_empty());
    }
}
