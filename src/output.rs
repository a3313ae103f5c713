//! Output types: the finished artifact and statistics about how it was made.

use crate::config::OutputFormat;
use crate::error::{DocumentError, Txt2DocError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

/// A rendered document stored in a temporary file.
///
/// The caller owns the file. Dropping the `Artifact` deletes it, on every
/// exit path including panic unwind; [`Artifact::persist`] moves it to a
/// permanent location instead. Either way the file is released exactly once.
pub struct Artifact {
    path: TempPath,
    format: OutputFormat,
    file_name: String,
    size_bytes: u64,
}

impl Artifact {
    pub(crate) fn new(path: TempPath, format: OutputFormat, file_name: String, size_bytes: u64) -> Self {
        Self {
            path,
            format,
            file_name,
            size_bytes,
        }
    }

    /// Location of the temporary file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Suggested file name when handing the document to a user, e.g.
    /// `output.pdf`. The temporary file itself carries a random suffix.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Read the whole document back into memory.
    pub fn read_bytes(&self) -> Result<Vec<u8>, Txt2DocError> {
        std::fs::read(&self.path).map_err(|source| Txt2DocError::OutputWriteFailed {
            path: self.path.to_path_buf(),
            source,
        })
    }

    /// Move the artifact to `dest`, creating parent directories as needed.
    ///
    /// Falls back to copy-then-delete when `dest` is on another filesystem.
    pub fn persist(self, dest: impl AsRef<Path>) -> Result<PathBuf, Txt2DocError> {
        let dest = dest.as_ref().to_path_buf();
        let write_failed = |source: std::io::Error| Txt2DocError::OutputWriteFailed {
            path: dest.clone(),
            source,
        };

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }

        match self.path.persist(&dest) {
            Ok(()) => {}
            Err(e) => {
                // `e.path` still owns the temp file and deletes it on drop.
                debug!("rename to {} failed ({}), copying", dest.display(), e.error);
                std::fs::copy(&e.path, &dest).map_err(write_failed)?;
            }
        }

        debug!("Persisted {} artifact to {}", self.format, dest.display());
        Ok(dest)
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("path", &self.path())
            .field("format", &self.format)
            .field("file_name", &self.file_name)
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

/// Result of converting one text.
#[derive(Debug)]
pub struct ConversionOutput {
    pub artifact: Artifact,
    pub stats: ConversionStats,
}

/// Statistics about a single conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub format: OutputFormat,
    /// Segments produced by segmentation, including empty ones.
    pub segments: usize,
    pub prose_blocks: usize,
    pub code_blocks: usize,
    /// Segments not rendered because their content was empty.
    pub skipped_empty: usize,
    /// Page count; PDF only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pages: Option<usize>,
    pub size_bytes: u64,
    /// Characters substituted under the replace encoding policy.
    pub replaced_chars: usize,
    pub duration_ms: u64,
}

/// Outcome of one (input, format) job in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// 0-indexed position in the batch input list.
    pub index: usize,
    /// The input as given (path or `-`).
    pub source: String,
    pub format: OutputFormat,
    /// Where the document was written, on success.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<PathBuf>,
    pub result: Result<ConversionStats, DocumentError>,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn artifact_in(dir: &Path, body: &[u8]) -> Artifact {
        let mut file = tempfile::Builder::new()
            .prefix("output")
            .suffix(".pdf")
            .tempfile_in(dir)
            .unwrap();
        file.write_all(body).unwrap();
        Artifact::new(
            file.into_temp_path(),
            OutputFormat::Pdf,
            "output.pdf".into(),
            body.len() as u64,
        )
    }

    #[test]
    fn drop_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path(), b"%PDF-1.5");
        let path = artifact.path().to_path_buf();
        assert!(path.exists());
        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn persist_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path(), b"body");
        let temp = artifact.path().to_path_buf();
        let dest = dir.path().join("nested/out.pdf");
        let written = artifact.persist(&dest).unwrap();
        assert_eq!(written, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"body");
        assert!(!temp.exists());
    }

    #[test]
    fn read_bytes_and_accessors() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path(), b"abc");
        assert_eq!(artifact.read_bytes().unwrap(), b"abc");
        assert_eq!(artifact.size_bytes(), 3);
        assert_eq!(artifact.file_name(), "output.pdf");
        assert_eq!(artifact.format(), OutputFormat::Pdf);
    }

    #[test]
    fn stats_json_omits_pages_for_docx() {
        let stats = ConversionStats {
            format: OutputFormat::Docx,
            segments: 3,
            prose_blocks: 2,
            code_blocks: 1,
            skipped_empty: 0,
            pages: None,
            size_bytes: 1200,
            replaced_chars: 0,
            duration_ms: 4,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains(r#""format":"docx""#), "got: {json}");
        assert!(!json.contains("pages"), "got: {json}");
        let back: ConversionStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
