//! Input resolution: read the user-supplied text from a file or stdin.
//!
//! The core entry points take `&str`; this stage exists for callers that
//! start from a path (the CLI, [`crate::convert::convert_file`],
//! [`crate::batch::convert_batch`]). I/O failures are mapped onto the
//! specific [`Txt2DocError`] variants so the CLI can print actionable
//! messages instead of a raw `io::Error`.
//!
//! [`normalise_text`] applies the cleanup rules that are safe for any text
//! (BOM, line endings, invisible characters). It is applied to file input
//! only; [`crate::pipeline::segment::segment`] never normalises.

use crate::error::Txt2DocError;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source name that selects standard input.
pub const STDIN: &str = "-";

/// Check if the source string selects standard input.
pub fn is_stdin(source: &str) -> bool {
    source == STDIN
}

/// Human-readable name for a source, used in logs and batch results.
pub fn display_name(source: &str) -> String {
    if is_stdin(source) {
        return "<stdin>".to_string();
    }
    Path::new(source)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string())
}

/// Read the text behind `source`: a file path, or `-` for stdin.
///
/// The returned text is normalised with [`normalise_text`].
pub fn read_input(source: &str) -> Result<String, Txt2DocError> {
    let raw = if is_stdin(source) {
        read_stdin()?
    } else {
        read_file(Path::new(source))?
    };
    debug!("Read {} bytes from {}", raw.len(), display_name(source));
    Ok(normalise_text(&raw))
}

fn read_stdin() -> Result<String, Txt2DocError> {
    let path = PathBuf::from("<stdin>");
    let mut bytes = Vec::new();
    std::io::stdin()
        .read_to_end(&mut bytes)
        .map_err(|source| Txt2DocError::InputReadFailed {
            path: path.clone(),
            source,
        })?;
    String::from_utf8(bytes).map_err(|_| Txt2DocError::InputNotUtf8 { path })
}

fn read_file(path: &Path) -> Result<String, Txt2DocError> {
    if path.is_dir() {
        return Err(Txt2DocError::InputReadFailed {
            path: path.to_path_buf(),
            source: std::io::Error::new(ErrorKind::InvalidInput, "is a directory"),
        });
    }

    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Txt2DocError::InputNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => Txt2DocError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Txt2DocError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    String::from_utf8(bytes).map_err(|_| Txt2DocError::InputNotUtf8 {
        path: path.to_path_buf(),
    })
}

/// Clean up text that came from outside the process.
///
/// Rules (applied in order):
/// 1. Strip a leading byte-order mark
/// 2. Normalise line endings (CRLF and lone CR → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, joiners)
///
/// Fences and all visible characters pass through untouched.
pub fn normalise_text(input: &str) -> String {
    let s = input.strip_prefix('\u{FEFF}').unwrap_or(input);
    let s = normalise_line_endings(s);
    remove_invisible_chars(&s)
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
