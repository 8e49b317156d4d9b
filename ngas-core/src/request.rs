//! The archive `Request` value (§3): everything the Archive Coordinator
//! needs to know about one incoming archive command.

use std::path::PathBuf;

use crate::volume::Volume;

/// BBCP transport parameters, present only for `BBCPARC` requests.
#[derive(Debug, Clone, Default)]
pub struct BbcpParams {
    pub port: Option<u16>,
    pub winsize: Option<String>,
    pub num_streams: Option<u32>,
}

/// One archive operation's worth of request state.
///
/// Lifetime: created when the HTTP command is dispatched, consumed by the
/// `ArchiveCoordinator` for the duration of that one operation.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    /// Opaque source locator: local path, `http://`, `ftp://`, `file://`, or
    /// `user@host:/path` for BBCP.
    pub file_uri: String,
    /// Declared MIME type, if the caller supplied one.
    pub mime_type: Option<String>,
    /// Declared content length; `None` means "unknown" (§3: sentinel -1).
    pub size: Option<u64>,
    /// Expected CRC-32 (decimal), if the caller supplied `X-NGAS-Checksum`.
    pub checksum: Option<u32>,
    pub no_replication: bool,
    pub bbcp: Option<BbcpParams>,
    /// `file_version=<n>` parsed out of the URI, if present. Wins over
    /// whatever DAPI returns (§4.5, Open Question (b)).
    pub file_version_override: Option<i32>,
    /// Forces volume selection for this one request rather than letting the
    /// Coordinator pick fresh. Used by the container archive handler so
    /// every part of one container body lands on the same volume (§8
    /// scenario 4), since each part is otherwise archived by an independent
    /// `archive_push` call.
    pub pinned_volume: Option<Volume>,
}

impl ArchiveRequest {
    /// Extracts `file_version=<n>` from the query-string-shaped `file_uri`,
    /// mirroring the original's `reqPropsObj.getFileUri().count("file_version")`
    /// check against the RETRIEVE-style URL.
    pub fn parse_file_version(uri: &str) -> Option<i32> {
        let idx = uri.find("file_version=")?;
        let rest = &uri[idx + "file_version=".len()..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    /// The base name used to derive the staging filename, taken either from
    /// an embedded `file_id=` query parameter or from the URI's path tail.
    pub fn base_name(&self) -> String {
        if let Some(idx) = self.file_uri.find("file_id=") {
            let rest = &self.file_uri[idx + "file_id=".len()..];
            let value: String = rest.chars().take_while(|c| *c != '&').collect();
            return PathBuf::from(value)
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "archived-file".to_string());
        }
        let path_part = self.file_uri.split(['?', '&']).next().unwrap_or("");
        PathBuf::from(path_part)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archived-file".to_string())
    }
}

/// Roots a pull request is never allowed to read from (§4.7 step 1,
/// restored verbatim from `ngamsCmd_BBCPARC.py`'s `invalid_paths` check).
pub const FORBIDDEN_PULL_ROOTS: &[&str] = &["/dev", "/var", "/usr", "/opt", "/etc"];

/// Returns true if a pull source URI is rooted at a forbidden system path.
/// The check is case-insensitive, matching the original Python's
/// `file_uri.lower().startswith(invalid_paths)`.
pub fn is_forbidden_pull_source(file_uri: &str) -> bool {
    let lower = file_uri.to_ascii_lowercase();
    FORBIDDEN_PULL_ROOTS.iter().any(|root| lower.starts_with(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_version_from_url() {
        let uri = "http://ngas03/RETRIEVE?file_version=3&file_id=X90/X1";
        assert_eq!(ArchiveRequest::parse_file_version(uri), Some(3));
    }

    #[test]
    fn missing_file_version_is_none() {
        assert_eq!(ArchiveRequest::parse_file_version("http://host/path"), None);
    }

    #[test]
    fn base_name_from_file_id_param() {
        let req = ArchiveRequest {
            file_uri: "http://host/QARCHIVE?file_id=X90/X962a4/X1.fits".to_string(),
            mime_type: None,
            size: None,
            checksum: None,
            no_replication: false,
            bbcp: None,
            file_version_override: None,
            pinned_volume: None,
        };
        assert_eq!(req.base_name(), "X1.fits");
    }

    #[test]
    fn base_name_from_plain_path() {
        let req = ArchiveRequest {
            file_uri: "/home/user/data.fits".to_string(),
            mime_type: None,
            size: None,
            checksum: None,
            no_replication: false,
            bbcp: None,
            file_version_override: None,
            pinned_volume: None,
        };
        assert_eq!(req.base_name(), "data.fits");
    }

    #[test]
    fn forbidden_roots_are_case_insensitive() {
        assert!(is_forbidden_pull_source("/DEV/sda"));
        assert!(is_forbidden_pull_source("/etc/passwd"));
        assert!(!is_forbidden_pull_source("/home/ngas/data.fits"));
    }
}
