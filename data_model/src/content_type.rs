use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::StorageError;

/// Returned for unknown or missing extensions.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Read-only mapping from file extension to MIME type, injected at
/// construction. Keys are normalized to a lowercase extension with a
/// leading `.`, so callers can supply `pdf`, `.pdf` or `.PDF`
/// interchangeably.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "HashMap<String, String>", into = "HashMap<String, String>")]
pub struct ContentTypeTable {
    entries: HashMap<String, String>,
}

impl ContentTypeTable {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(extension, mime)| {
                let extension = extension.trim().to_ascii_lowercase();
                let extension = if extension.starts_with('.') {
                    extension
                } else {
                    format!(".{}", extension)
                };
                (extension, mime)
            })
            .collect();
        Self { entries }
    }

    /// A table of well-known extensions, used when no mapping is configured.
    pub fn common() -> Self {
        Self::new(
            [
                (".bmp", "image/bmp"),
                (".css", "text/css"),
                (".csv", "text/csv"),
                (".doc", "application/msword"),
                (
                    ".docx",
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                ),
                (".gif", "image/gif"),
                (".html", "text/html"),
                (".jpeg", "image/jpeg"),
                (".jpg", "image/jpeg"),
                (".json", "application/json"),
                (".mp3", "audio/mpeg"),
                (".mp4", "video/mp4"),
                (".pdf", "application/pdf"),
                (".png", "image/png"),
                (".svg", "image/svg+xml"),
                (".txt", "text/plain"),
                (".xls", "application/vnd.ms-excel"),
                (
                    ".xlsx",
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                ),
                (".xml", "application/xml"),
                (".zip", "application/zip"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    /// Resolves the MIME type for a file name from its extension.
    ///
    /// The extension is everything after the last `.`, matched
    /// case-insensitively. Unknown and missing extensions resolve to
    /// [`FALLBACK_CONTENT_TYPE`].
    pub fn resolve(&self, file_name: &str) -> Result<&str, StorageError> {
        if file_name.trim().is_empty() {
            return Err(StorageError::invalid_argument(
                "file name must not be empty",
            ));
        }
        let extension = match file_name.rsplit_once('.') {
            Some((_, extension)) => format!(".{}", extension.to_ascii_lowercase()),
            None => return Ok(FALLBACK_CONTENT_TYPE),
        };
        Ok(self
            .entries
            .get(&extension)
            .map(String::as_str)
            .unwrap_or(FALLBACK_CONTENT_TYPE))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<HashMap<String, String>> for ContentTypeTable {
    fn from(entries: HashMap<String, String>) -> Self {
        Self::new(entries)
    }
}

impl From<ContentTypeTable> for HashMap<String, String> {
    fn from(table: ContentTypeTable) -> Self {
        table.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_table() -> ContentTypeTable {
        ContentTypeTable::new([(".pdf".to_string(), "application/pdf".to_string())])
    }

    #[test]
    fn test_known_extension() {
        assert_eq!(pdf_table().resolve("report.pdf").unwrap(), "application/pdf");
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        assert_eq!(pdf_table().resolve("report.PDF").unwrap(), "application/pdf");
    }

    #[test]
    fn test_unknown_extension_falls_back() {
        assert_eq!(pdf_table().resolve("report.tar").unwrap(), FALLBACK_CONTENT_TYPE);
    }

    #[test]
    fn test_missing_extension_falls_back() {
        assert_eq!(pdf_table().resolve("Makefile").unwrap(), FALLBACK_CONTENT_TYPE);
    }

    #[test]
    fn test_empty_file_name_is_rejected() {
        let err = pdf_table().resolve("  ").unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument { .. }));
    }

    #[test]
    fn test_table_keys_are_normalized() {
        let table = ContentTypeTable::new([("PNG".to_string(), "image/png".to_string())]);
        assert_eq!(table.resolve("cat.png").unwrap(), "image/png");
    }

    #[test]
    fn test_last_extension_wins() {
        let table = ContentTypeTable::common();
        assert_eq!(table.resolve("backup.tar.zip").unwrap(), "application/zip");
    }
}
