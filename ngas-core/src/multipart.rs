//! Multipart Container Parser/Writer (C3): serialises/deserialises a
//! directory tree as one MIME-multipart body, streaming on both ends so
//! neither side materialises the whole container in memory. §4.3.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{NgasError, Result};
use crate::mime::MimeTable;

/// A fixed boundary marker. NGAS containers are server-generated on both
/// ends, so a constant boundary (unlikely to collide with file contents
/// by virtue of its length and charset) is sufficient; a production
/// deployment could randomise it per request.
const BOUNDARY: &str = "NGAS-CONTAINER-BOUNDARY-7f3c9a";

/// One leaf file discovered while walking a directory tree for the send
/// side.
struct ContainerEntry {
    absolute_path: PathBuf,
    relative_path: String,
}

fn collect_entries(root: &Path) -> Result<Vec<ContainerEntry>> {
    let mut entries = Vec::new();
    collect_entries_rec(root, root, &mut entries)?;
    Ok(entries)
}

fn collect_entries_rec(root: &Path, dir: &Path, out: &mut Vec<ContainerEntry>) -> Result<()> {
    let mut read_dir = std::fs::read_dir(dir)?;
    while let Some(entry) = read_dir.next().transpose()? {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_entries_rec(root, &path, out)?;
        } else if file_type.is_file() {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            out.push(ContainerEntry {
                absolute_path: path,
                relative_path: relative,
            });
        } else {
            debug!(path = %path.display(), "skipping non-regular entry in container tree");
        }
    }
    Ok(())
}

/// Computes the total body length up front so the caller can set a
/// `Content-Length` header on the enclosing POST (§4.3 send-side contract).
pub fn container_content_length(root: &Path, mime_table: &MimeTable) -> Result<u64> {
    let entries = collect_entries(root)?;
    let mut total: u64 = 0;
    for entry in &entries {
        total += part_header_len(entry, mime_table)? as u64;
        total += std::fs::metadata(&entry.absolute_path)?.len();
        total += 2; // trailing CRLF after each part's body
    }
    total += format!("--{BOUNDARY}--\r\n").len() as u64;
    Ok(total)
}

fn part_header(entry: &ContainerEntry, mime_table: &MimeTable) -> Result<String> {
    let basename = Path::new(&entry.relative_path)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry.relative_path.clone());
    let content_type = mime_table.resolve(&basename, true)?;
    let size = std::fs::metadata(&entry.absolute_path)?.len();
    Ok(format!(
        "--{BOUNDARY}\r\nContent-Type: {content_type}\r\nContent-Disposition: attachment; filename=\"{basename}\"\r\nX-NGAS-Relative-Path: {rel}\r\nContent-Length: {size}\r\n\r\n",
        rel = entry.relative_path,
    ))
}

fn part_header_len(entry: &ContainerEntry, mime_table: &MimeTable) -> Result<usize> {
    Ok(part_header(entry, mime_table)?.len())
}

/// Streams a directory tree as a multipart body onto `writer`. Each part
/// is written as it is read from disk; no part is ever buffered whole in
/// memory (§4.3 "Why streaming").
pub async fn write_container<W: AsyncWrite + Unpin>(
    root: &Path,
    mime_table: &MimeTable,
    writer: &mut W,
) -> Result<()> {
    let entries = collect_entries(root)?;
    for entry in &entries {
        let header = part_header(entry, mime_table)?;
        writer.write_all(header.as_bytes()).await?;

        let mut file = tokio::fs::File::open(&entry.absolute_path).await?;
        tokio::io::copy(&mut file, writer).await?;
        writer.write_all(b"\r\n").await?;
    }
    writer
        .write_all(format!("--{BOUNDARY}--\r\n").as_bytes())
        .await?;
    Ok(())
}

/// A streaming multipart reader over an `AsyncRead` source, writing each
/// leaf part directly into a filesystem tree rooted at `base_path`, never
/// buffering a whole part (§4.3 receive-side contract).
///
/// The parser operates on a small boundary-scanning state machine (§9
/// Design Notes): it buffers only up to one read's worth of bytes at a
/// time while hunting for the next boundary, and streams everything
/// between two boundaries straight to the destination file.
pub struct ContainerReader<R> {
    inner: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> ContainerReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }

    /// Parses the whole container, writing leaf files under `base_path`
    /// and preserving the sender's relative directory structure. Returns
    /// `base_path` on success.
    pub async fn parse_into(mut self, base_path: &Path) -> Result<PathBuf> {
        use tokio::io::AsyncReadExt;

        tokio::fs::create_dir_all(base_path).await?;

        let boundary_marker = format!("--{BOUNDARY}").into_bytes();
        let mut read_buf = vec![0u8; 65536];

        loop {
            self.fill_until(&boundary_marker, &mut read_buf).await?;
            if !self.consume_boundary(&boundary_marker)? {
                break;
            }
            if self.is_terminator()? {
                break;
            }

            let headers = self.read_headers(&mut read_buf).await?;
            let relative_path = headers
                .get("x-ngas-relative-path")
                .cloned()
                .or_else(|| headers.get("content-disposition").and_then(extract_filename))
                .ok_or_else(|| {
                    NgasError::SourceIo("container part missing a filename/path header".to_string())
                })?;

            let dest_path = base_path.join(&relative_path);
            if let Some(parent) = dest_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut dest = tokio::fs::File::create(&dest_path).await?;

            self.copy_part_body(&boundary_marker, &mut dest, &mut read_buf)
                .await?;
        }

        Ok(base_path.to_path_buf())
    }

    async fn fill_until(&mut self, needle: &[u8], read_buf: &mut [u8]) -> Result<()> {
        use tokio::io::AsyncReadExt;
        while !contains(&self.buffer, needle) {
            let n = self.inner.read(read_buf).await?;
            if n == 0 {
                break;
            }
            self.buffer.extend_from_slice(&read_buf[..n]);
        }
        Ok(())
    }

    fn consume_boundary(&mut self, marker: &[u8]) -> Result<bool> {
        match find(&self.buffer, marker) {
            Some(idx) => {
                self.buffer.drain(..idx + marker.len());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_terminator(&mut self) -> Result<bool> {
        if self.buffer.starts_with(b"--") {
            self.buffer.drain(..2);
            return Ok(true);
        }
        // Skip the CRLF after the boundary token.
        if self.buffer.starts_with(b"\r\n") {
            self.buffer.drain(..2);
        }
        Ok(false)
    }

    async fn read_headers(&mut self, read_buf: &mut [u8]) -> Result<std::collections::HashMap<String, String>> {
        self.fill_until(b"\r\n\r\n", read_buf).await?;
        let idx = find(&self.buffer, b"\r\n\r\n").ok_or_else(|| {
            NgasError::SourceIo("container part headers never terminated".to_string())
        })?;
        let header_bytes: Vec<u8> = self.buffer.drain(..idx + 4).collect();
        let header_str = String::from_utf8_lossy(&header_bytes[..header_bytes.len() - 4]).into_owned();

        let mut headers = std::collections::HashMap::new();
        for line in header_str.split("\r\n") {
            if let Some((key, value)) = line.split_once(':') {
                headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }
        Ok(headers)
    }

    async fn copy_part_body<W: AsyncWrite + Unpin>(
        &mut self,
        boundary_marker: &[u8],
        dest: &mut W,
        read_buf: &mut [u8],
    ) -> Result<()> {
        use tokio::io::AsyncReadExt;
        loop {
            if let Some(idx) = find(&self.buffer, boundary_marker) {
                // Body ends two bytes before the boundary (the trailing
                // CRLF written by `write_container`).
                let body_end = idx.saturating_sub(2);
                dest.write_all(&self.buffer[..body_end]).await?;
                self.buffer.drain(..idx);
                return Ok(());
            }
            // Flush everything except a short tail that might still be
            // the start of the boundary marker, so we never write a
            // partial boundary into the destination file.
            let safe_len = self.buffer.len().saturating_sub(boundary_marker.len());
            if safe_len > 0 {
                dest.write_all(&self.buffer[..safe_len]).await?;
                self.buffer.drain(..safe_len);
            }
            let n = self.inner.read(read_buf).await?;
            if n == 0 {
                return Err(NgasError::SourceIo(
                    "container part body truncated before boundary".to_string(),
                ));
            }
            self.buffer.extend_from_slice(&read_buf[..n]);
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

fn extract_filename(disposition: &str) -> Option<String> {
    disposition
        .split(';')
        .find_map(|part| part.trim().strip_prefix("filename=\""))
        .map(|s| s.trim_end_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_small_tree() {
        let src = tempfile::tempdir().unwrap();
        tokio::fs::write(src.path().join("a.fits"), b"AAAA").await.unwrap();
        tokio::fs::create_dir(src.path().join("sub")).await.unwrap();
        tokio::fs::write(src.path().join("sub").join("b.fits"), b"BBBBBB")
            .await
            .unwrap();

        let mime_table = MimeTable::defaults();
        let body_dir = tempfile::tempdir().unwrap();
        let body_path = body_dir.path().join("__body");
        let mut body_file = tokio::fs::File::create(&body_path).await.unwrap();
        write_container(src.path(), &mime_table, &mut body_file).await.unwrap();
        body_file.flush().await.unwrap();
        drop(body_file);

        let dst = tempfile::tempdir().unwrap();
        let body_reader = tokio::fs::File::open(&body_path).await.unwrap();
        let reader = ContainerReader::new(body_reader);
        let root = reader.parse_into(dst.path()).await.unwrap();

        let a = tokio::fs::read(root.join("a.fits")).await.unwrap();
        assert_eq!(a, b"AAAA");
        let b = tokio::fs::read(root.join("sub").join("b.fits")).await.unwrap();
        assert_eq!(b, b"BBBBBB");
    }

    #[test]
    fn extracts_filename_from_content_disposition() {
        let value = "attachment; filename=\"data.fits\"";
        assert_eq!(extract_filename(value), Some("data.fits".to_string()));
    }
}
