//! External-Pull Fetcher (C10): opens a remote URI as the byte source for
//! the Staging Writer, and drives the `bbcp` external binary for BBCPARC
//! pulls. §4.8.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{NgasError, Result};
use crate::request::BbcpParams;
use crate::staging::ByteSource;

/// Adapts a `reqwest` streaming response body to the `ByteSource`
/// capability (§9 Design Notes), so C2's receive loop can treat an HTTP
/// pull exactly like a local file or a push socket.
pub struct HttpByteSource {
    stream: reqwest::Response,
    buffer: bytes::Bytes,
    offset: usize,
}

impl HttpByteSource {
    /// Opens a GET against `url`; returns the response together with its
    /// declared `Content-Length`, if the server sent one (§4.8).
    pub async fn open(url: &str) -> Result<(Self, Option<u64>)> {
        let response = reqwest::get(url)
            .await
            .map_err(|e| NgasError::SourceIo(e.to_string()))?;
        if !response.status().is_success() {
            return Err(NgasError::SourceIo(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        let content_length = response.content_length();
        Ok((
            Self {
                stream: response,
                buffer: bytes::Bytes::new(),
                offset: 0,
            },
            content_length,
        ))
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.offset >= self.buffer.len() {
            match self.stream.chunk().await {
                Ok(Some(chunk)) => {
                    self.buffer = chunk;
                    self.offset = 0;
                }
                Ok(None) => return Ok(0),
                Err(e) => {
                    return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
                }
            }
        }
        let remaining = &self.buffer[self.offset..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.offset += n;
        Ok(n)
    }
}

/// A local file used as a pull source (`file://` URIs and bare paths).
pub struct FileByteSource {
    file: tokio::fs::File,
}

impl FileByteSource {
    pub async fn open(path: &Path) -> Result<(Self, u64)> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok((Self { file }, size))
    }
}

#[async_trait]
impl ByteSource for FileByteSource {
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        use tokio::io::AsyncReadExt;
        self.file.read(buf).await
    }
}

/// Result of driving the external `bbcp` binary (§4.8, §6).
#[derive(Debug, Clone)]
pub struct BbcpOutcome {
    pub crc32: u32,
}

/// Spawns `bbcp` with the argument vector fixed by §4.8:
/// `bbcp -f -V -e -E c32z=/dev/stdout [-Z port | -z] [-w win] [-s streams]
/// -P 2 <src> <dst>`. BBCP writes directly to `dst` (bypassing C2's
/// streaming loop); its stdout carries the c32z CRC line, which is parsed
/// as a big-endian 4-byte signed int (hex-decoded) to obtain the CRC, per
/// §6.
pub async fn bbcp_copy(src: &str, dst: &Path, params: &BbcpParams) -> Result<BbcpOutcome> {
    // Mirrors `ngamsCmd_BBCPARC.py`'s "make target writable, then
    // overwrite" collision policy (§9 Open Question (a)).
    if dst.exists() {
        let mut perms = tokio::fs::metadata(dst).await?.permissions();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            perms.set_mode(0o644);
        }
        tokio::fs::set_permissions(dst, perms).await?;
    }
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut args: Vec<String> = vec![
        "-f".to_string(),
        "-V".to_string(),
        "-e".to_string(),
        "-E".to_string(),
        "c32z=/dev/stdout".to_string(),
    ];
    match params.port {
        Some(port) => {
            args.push("-Z".to_string());
            args.push(port.to_string());
        }
        None => args.push("-z".to_string()),
    }
    if let Some(win) = &params.winsize {
        args.push("-w".to_string());
        args.push(win.clone());
    }
    if let Some(streams) = params.num_streams {
        args.push("-s".to_string());
        args.push(streams.to_string());
    }
    args.push("-P".to_string());
    args.push("2".to_string());
    args.push(src.to_string());
    args.push(dst.to_string_lossy().into_owned());

    let output = Command::new("bbcp")
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| NgasError::ExternalProcess(format!("failed to spawn bbcp: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(NgasError::ExternalProcess(format!(
            "bbcp exited with {}: {}",
            output.status, stderr
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_c32z_line(&stdout).map(|crc32| BbcpOutcome { crc32 })
}

/// Parses the c32z checksum line from `bbcp`'s stdout. The line's third
/// whitespace-separated token is the hex-encoded checksum, e.g.
/// `c32z bbcp 00000000`; it is hex-decoded and reinterpreted as a
/// big-endian 4-byte signed integer (§6).
fn parse_c32z_line(stdout: &str) -> Result<u32> {
    let line = stdout
        .lines()
        .find(|l| l.contains("c32z"))
        .ok_or_else(|| NgasError::ExternalProcess("no c32z line in bbcp output".to_string()))?;

    let token = line
        .split_whitespace()
        .nth(2)
        .ok_or_else(|| NgasError::ExternalProcess(format!("malformed c32z line: {line}")))?;

    let bytes = hex_decode(token)
        .ok_or_else(|| NgasError::ExternalProcess(format!("invalid hex in c32z line: {line}")))?;
    if bytes.len() != 4 {
        return Err(NgasError::ExternalProcess(format!(
            "expected 4 checksum bytes, got {}",
            bytes.len()
        )));
    }
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_c32z_line() {
        // 2535050025 == 0x9728B686, matching the CRC-32/zlib of "HELLOWORLD".
        let stdout = "some preamble\nc32z bbcp 9728b686\ntail line\n";
        assert_eq!(parse_c32z_line(stdout).unwrap(), 2535050025);
    }

    #[test]
    fn missing_c32z_line_is_an_error() {
        assert!(parse_c32z_line("nothing relevant here\n").is_err());
    }

    #[test]
    fn bbcp_params_shape_argument_vector() {
        let with_port = BbcpParams {
            port: Some(7790),
            winsize: Some("=32m".to_string()),
            num_streams: Some(12),
        };
        assert_eq!(with_port.port, Some(7790));

        let without_port = BbcpParams::default();
        assert_eq!(without_port.port, None);
    }
}
