//! Document text extraction for resumes and job documents.
//!
//! Dispatch is by file extension. Per-file failures never escape: they are
//! turned into a placeholder string so one bad file cannot abort a batch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::errors::AppError;

mod pdf;
mod word;

use pdf::extract_pdf;
use word::{extract_doc, extract_docx};

/// Prefix of the placeholder recorded for files that failed to extract.
pub const EXTRACTION_ERROR_PREFIX: &str = "Error extracting text";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("PDF is encrypted and the empty password did not open it: {0}")]
    Encrypted(String),

    #[error("Word document error: {0}")]
    Word(String),

    #[error("Converter error: {0}")]
    Converter(String),
}

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Doc,
    Text,
}

impl DocumentKind {
    /// Case-insensitive extension lookup. `None` means "skip this file".
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            "doc" => Some(DocumentKind::Doc),
            "txt" => Some(DocumentKind::Text),
            _ => None,
        }
    }
}

/// Converts files on disk into plain text.
#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    doc_converter: String,
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self::new("antiword")
    }
}

impl DocumentExtractor {
    pub fn new(doc_converter: impl Into<String>) -> Self {
        Self {
            doc_converter: doc_converter.into(),
        }
    }

    /// Text of one file, or `None` if its extension is not supported.
    /// Extraction failures come back as `Some("Error extracting text: ...")`.
    pub fn extract_file(&self, path: &Path) -> Option<String> {
        let kind = DocumentKind::from_path(path)?;
        debug!("Processing {} as {kind:?}", path.display());

        let result = match kind {
            DocumentKind::Pdf => extract_pdf(path),
            DocumentKind::Docx => extract_docx(path),
            DocumentKind::Doc => extract_doc(path, &self.doc_converter),
            DocumentKind::Text => extract_txt(path),
        };

        Some(result.unwrap_or_else(|e| {
            error!("Error extracting text from {}: {e}", path.display());
            format!("{EXTRACTION_ERROR_PREFIX}: {e}")
        }))
    }

    /// Recursively extracts every supported file under `root`.
    ///
    /// Keys are paths relative to `root` with `/` separators. Fails with
    /// `AppError::NotFound` before reading anything if `root` is not an
    /// existing directory.
    pub fn scan_folder(&self, root: &Path) -> Result<BTreeMap<String, String>, AppError> {
        info!("Scanning folder: {}", root.display());
        if !root.is_dir() {
            error!("Folder not found or not a directory: {}", root.display());
            return Err(AppError::NotFound(root.to_path_buf()));
        }

        let mut files = Vec::new();
        collect_files(root, &mut files);
        files.sort();

        let mut texts = BTreeMap::new();
        for file in files {
            let Some(text) = self.extract_file(&file) else {
                debug!("Skipping unsupported file type: {}", file.display());
                continue;
            };
            texts.insert(relative_key(root, &file), text);
        }

        info!("Extraction complete: processed {} files", texts.len());
        Ok(texts)
    }

    /// `scan_folder` on the blocking pool. Parsing and the `.doc` converter
    /// must not stall the async executor.
    pub async fn scan_folder_blocking(
        &self,
        root: &Path,
    ) -> Result<BTreeMap<String, String>, AppError> {
        let extractor = self.clone();
        let root = root.to_path_buf();
        let shown = root.display().to_string();
        tokio::task::spawn_blocking(move || extractor.scan_folder(&root))
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!(
                    "spawn_blocking failed while scanning {shown}: {e}"
                ))
            })?
    }
}

fn extract_txt(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;
    // Invalid UTF-8 sequences are dropped.
    Ok(String::from_utf8_lossy(&bytes).replace(char::REPLACEMENT_CHARACTER, ""))
}

/// Depth-first walk. Unreadable subdirectories are logged and skipped;
/// directory symlinks are not followed.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read directory {}: {e}", dir.display());
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => collect_files(&path, out),
            Ok(_) if path.is_file() => out.push(path),
            Ok(_) => {}
            Err(e) => warn!("Cannot stat {}: {e}", path.display()),
        }
    }
}

fn relative_key(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_path(Path::new("a/B.PDF")), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_path(Path::new("cv.Docx")), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_path(Path::new("cv.doc")), Some(DocumentKind::Doc));
        assert_eq!(DocumentKind::from_path(Path::new("notes.txt")), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_path(Path::new("photo.xyz")), None);
        assert_eq!(DocumentKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_scan_includes_supported_and_skips_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "plain resume").unwrap();
        pdf::write_sample_pdf(&dir.path().join("resume.pdf"), "Project Manager");
        std::fs::write(dir.path().join("image.xyz"), b"\x00\x01").unwrap();

        let texts = DocumentExtractor::default().scan_folder(dir.path()).unwrap();

        assert_eq!(texts.len(), 2);
        assert_eq!(texts["notes.txt"], "plain resume");
        assert!(texts.contains_key("resume.pdf"));
        assert!(!texts.contains_key("image.xyz"));
    }

    #[test]
    fn test_corrupt_pdf_gets_placeholder_and_siblings_survive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.pdf"), b"not really a pdf at all").unwrap();
        std::fs::write(dir.path().join("ok.txt"), "still here").unwrap();

        let texts = DocumentExtractor::default().scan_folder(dir.path()).unwrap();

        assert_eq!(texts.len(), 2);
        assert!(texts["broken.pdf"].starts_with(EXTRACTION_ERROR_PREFIX));
        assert_eq!(texts["ok.txt"], "still here");
    }

    #[test]
    fn test_scan_recurses_with_relative_keys() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("contact-1");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("cv.txt"), "nested resume").unwrap();

        let texts = DocumentExtractor::default().scan_folder(dir.path()).unwrap();
        assert_eq!(texts["contact-1/cv.txt"], "nested resume");
    }

    #[test]
    fn test_scan_missing_folder_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = DocumentExtractor::default()
            .scan_folder(&dir.path().join("absent"))
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_scan_file_instead_of_folder_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            DocumentExtractor::default().scan_folder(&file),
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_blocking_scan_matches_sync_scan() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "first").unwrap();
        pdf::write_sample_pdf(&dir.path().join("b.pdf"), "Second");

        let extractor = DocumentExtractor::default();
        let texts = extractor.scan_folder_blocking(dir.path()).await.unwrap();

        assert_eq!(texts, extractor.scan_folder(dir.path()).unwrap());
        assert_eq!(texts["a.txt"], "first");
    }

    #[tokio::test]
    async fn test_blocking_scan_missing_folder_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = DocumentExtractor::default()
            .scan_folder_blocking(&dir.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_txt_drops_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, b"caf\xe9 manager").unwrap();
        assert_eq!(extract_txt(&path).unwrap(), "caf manager");
    }
}
