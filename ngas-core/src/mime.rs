//! MIME Resolver (C4): maps a file URI's extension to a MIME type. §4.4.

use crate::error::{NgasError, Result};

/// Sentinel MIME type returned when nothing matches and the caller allows
/// `unknown` (§4.4).
pub const UNKNOWN_MIME: &str = "unknown/unknown";

/// The extension-to-MIME table. A `Vec` rather than a `HashMap` because
/// longest-suffix matching has to consider every entry anyway (an
/// extension table rarely has more than a few dozen rows).
#[derive(Debug, Clone)]
pub struct MimeTable {
    entries: Vec<(String, String)>,
}

impl MimeTable {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// A reasonable default table for the scientific-data file types NGAS
    /// commonly ingests, plus a few generic fallbacks.
    pub fn defaults() -> Self {
        Self::new(vec![
            (".fits".to_string(), "application/fits".to_string()),
            (".fits.gz".to_string(), "application/x-gfits".to_string()),
            (".hdf5".to_string(), "application/x-hdf5".to_string()),
            (".tar".to_string(), "application/x-tar".to_string()),
            (".tar.gz".to_string(), "application/x-tar-gz".to_string()),
            (".log".to_string(), "text/plain".to_string()),
            (".txt".to_string(), "text/plain".to_string()),
            (".dat".to_string(), "application/octet-stream".to_string()),
        ])
    }

    /// Resolves `filename` to a MIME type by longest matching `.ext` suffix
    /// (§4.4: "the match is the longest suffix ending at end-of-name that
    /// is `.ext`"). No filename mutation.
    pub fn resolve(&self, filename: &str, allow_unknown: bool) -> Result<String> {
        let lower = filename.to_ascii_lowercase();
        let best = self
            .entries
            .iter()
            .filter(|(ext, _)| lower.ends_with(ext.as_str()))
            .max_by_key(|(ext, _)| ext.len());

        match best {
            Some((_, mime)) => Ok(mime.clone()),
            None if allow_unknown => Ok(UNKNOWN_MIME.to_string()),
            None => Err(NgasError::UnknownMime(filename.to_string())),
        }
    }

    /// Returns the extension registered for a given MIME type, used to
    /// append an extension to a staging filename that otherwise lacks one
    /// (§4.7 step 3).
    pub fn extension_for(&self, mime_type: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, m)| m == mime_type)
            .map(|(ext, _)| ext.as_str())
    }

    /// Consumes the table, returning its raw `(extension, mime_type)` rows —
    /// used by the server's configuration loader to seed a default table.
    pub fn into_entries(self) -> Vec<(String, String)> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_longest_matching_suffix() {
        let table = MimeTable::defaults();
        assert_eq!(
            table.resolve("visibilities.fits.gz", true).unwrap(),
            "application/x-gfits"
        );
        assert_eq!(
            table.resolve("visibilities.fits", true).unwrap(),
            "application/fits"
        );
    }

    #[test]
    fn unknown_extension_fails_without_fallback() {
        let table = MimeTable::defaults();
        assert!(table.resolve("weird.xyz123", false).is_err());
    }

    #[test]
    fn unknown_extension_falls_back_to_sentinel() {
        let table = MimeTable::defaults();
        assert_eq!(table.resolve("weird.xyz123", true).unwrap(), UNKNOWN_MIME);
    }

    #[test]
    fn extension_lookup_round_trips() {
        let table = MimeTable::defaults();
        assert_eq!(table.extension_for("application/fits"), Some(".fits"));
    }
}
