//! Conversion entry points: text in, finished document out.
//!
//! Every entry point runs the same three steps: segment once, render once
//! with the selected format, then hand the bytes over. They differ only in
//! where the bytes end up:
//!
//! | function             | result                                   |
//! |----------------------|------------------------------------------|
//! | [`convert_sync`]     | temporary [`Artifact`] (blocking)         |
//! | [`convert`]          | same, off the async runtime               |
//! | [`convert_file`]     | same, reading the text from a path/stdin  |
//! | [`convert_to_bytes`] | in-memory bytes, no file at all           |
//! | [`convert_to_file`]  | caller-chosen path, written atomically    |
//!
//! Rendering is CPU-bound and blocking, so the async variants move it onto
//! tokio's blocking pool with `spawn_blocking`.

use crate::config::{ConversionConfig, OutputFormat};
use crate::error::Txt2DocError;
use crate::output::{Artifact, ConversionOutput, ConversionStats};
use crate::pipeline::input;
use crate::pipeline::render::{renderer_for, RenderedDocument};
use crate::pipeline::segment::{segment_with, SegmentOptions};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Convert `text` into a temporary document artifact.
///
/// This is the blocking core every other entry point builds on.
///
/// # Errors
/// - [`Txt2DocError::Render`] when the renderer rejects the content
///   (strict encoding policy) or cannot serialise the document
/// - [`Txt2DocError::ArtifactWriteFailed`] when the temporary file cannot be
///   created or written
///
/// # Example
/// ```rust
/// use edgequake_txt2doc::{convert_sync, ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::default();
/// let output = convert_sync("Intro ```let x = 1;```", OutputFormat::Pdf, &config).unwrap();
/// assert_eq!(output.stats.code_blocks, 1);
/// assert_eq!(output.artifact.file_name(), "output.pdf");
/// ```
pub fn convert_sync(
    text: &str,
    format: OutputFormat,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Txt2DocError> {
    let start = Instant::now();
    let (document, segments) = render_text(text, format, config)?;

    let artifact = write_artifact(&document.bytes, format, config)?;
    let stats = stats_for(format, segments, &document, start);
    info!(
        "Converted {} segments to {} ({} bytes, {}ms)",
        stats.segments, format, stats.size_bytes, stats.duration_ms
    );

    Ok(ConversionOutput { artifact, stats })
}

/// Async variant of [`convert_sync`].
///
/// The work runs on tokio's blocking pool so the calling task's executor
/// thread is never stalled by rendering.
pub async fn convert(
    text: impl Into<String>,
    format: OutputFormat,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Txt2DocError> {
    let text = text.into();
    let config = config.clone();
    tokio::task::spawn_blocking(move || convert_sync(&text, format, &config))
        .await
        .map_err(|e| Txt2DocError::Internal(format!("conversion task failed: {e}")))?
}

/// Read text from `source` (a path, or `-` for stdin) and convert it.
///
/// The text is normalised with [`input::normalise_text`] first. When the
/// configured stem is the default, the input's own stem is used for the
/// artifact file name (`notes.txt` → `notes.pdf`).
pub async fn convert_file(
    source: &str,
    format: OutputFormat,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Txt2DocError> {
    let source = source.to_string();
    let config = config_for_source(&source, config);
    tokio::task::spawn_blocking(move || {
        let text = input::read_input(&source)?;
        convert_sync(&text, format, &config)
    })
    .await
    .map_err(|e| Txt2DocError::Internal(format!("conversion task failed: {e}")))?
}

/// Render `text` straight into memory without touching the filesystem.
pub fn convert_to_bytes(
    text: &str,
    format: OutputFormat,
    config: &ConversionConfig,
) -> Result<(Vec<u8>, ConversionStats), Txt2DocError> {
    let start = Instant::now();
    let (document, segments) = render_text(text, format, config)?;
    let stats = stats_for(format, segments, &document, start);
    Ok((document.bytes, stats))
}

/// Convert `text` and write the document to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    text: impl Into<String>,
    format: OutputFormat,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Txt2DocError> {
    let text = text.into();
    let path = output_path.as_ref();
    let task_config = config.clone();
    let (bytes, stats) =
        tokio::task::spawn_blocking(move || convert_to_bytes(&text, format, &task_config))
            .await
            .map_err(|e| Txt2DocError::Internal(format!("conversion task failed: {e}")))??;

    write_atomic(path, &bytes, format).await?;
    Ok(stats)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Segment and render. Returns the document and the raw segment count.
fn render_text(
    text: &str,
    format: OutputFormat,
    config: &ConversionConfig,
) -> Result<(RenderedDocument, usize), Txt2DocError> {
    let options = SegmentOptions {
        strip_info_string: config.strip_info_string,
    };
    let segments = segment_with(text, &options);
    debug!(
        "Segmented {} chars into {} segments",
        text.chars().count(),
        segments.len()
    );

    let document = renderer_for(format, &config.render_options()).render(&segments)?;
    Ok((document, segments.len()))
}

fn stats_for(
    format: OutputFormat,
    segments: usize,
    document: &RenderedDocument,
    start: Instant,
) -> ConversionStats {
    ConversionStats {
        format,
        segments,
        prose_blocks: document.blocks.prose,
        code_blocks: document.blocks.code,
        skipped_empty: document.blocks.skipped_empty,
        pages: document.pages,
        size_bytes: document.bytes.len() as u64,
        replaced_chars: document.replaced_chars,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Store `bytes` in a fresh temporary file owned by the returned artifact.
fn write_artifact(
    bytes: &[u8],
    format: OutputFormat,
    config: &ConversionConfig,
) -> Result<Artifact, Txt2DocError> {
    let prefix = format!("{}-", config.file_stem);
    let suffix = format!(".{}", format.extension());
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(&suffix);
    // Same mode as a plain `fs::write`: 0666 masked by the umask.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }

    let created = match config.temp_dir {
        Some(ref dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    };
    let mut file = created.map_err(|source| Txt2DocError::ArtifactWriteFailed { source })?;
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|source| Txt2DocError::ArtifactWriteFailed { source })?;

    debug!("Wrote {} artifact to {}", format, file.path().display());
    Ok(Artifact::new(
        file.into_temp_path(),
        format,
        config.file_name_for(format),
        bytes.len() as u64,
    ))
}

async fn write_atomic(path: &Path, bytes: &[u8], format: OutputFormat) -> Result<(), Txt2DocError> {
    let write_failed = |source: std::io::Error| Txt2DocError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_failed)?;
    }

    let tmp_path = path.with_extension(format!("{}.tmp", format.extension()));
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(write_failed)?;

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    Ok(())
}

/// Use the input's stem for artifact names unless the caller chose one.
pub(crate) fn config_for_source(source: &str, config: &ConversionConfig) -> ConversionConfig {
    let mut config = config.clone();
    if config.file_stem == ConversionConfig::default().file_stem && !input::is_stdin(source) {
        if let Some(stem) = Path::new(source).file_stem().and_then(|s| s.to_str()) {
            if !stem.is_empty() {
                config.file_stem = stem.to_string();
            }
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncodingPolicy;

    #[test]
    fn convert_sync_counts_blocks() {
        let out = convert_sync(
            "before ```print(1)``` after",
            OutputFormat::Docx,
            &ConversionConfig::default(),
        )
        .unwrap();
        assert_eq!(out.stats.segments, 3);
        assert_eq!(out.stats.prose_blocks, 2);
        assert_eq!(out.stats.code_blocks, 1);
        assert_eq!(out.stats.pages, None);
        assert!(out.artifact.path().exists());
        assert_eq!(out.artifact.size_bytes(), out.stats.size_bytes);
    }

    #[test]
    fn artifact_lands_in_configured_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .temp_dir(dir.path())
            .file_stem("report")
            .build()
            .unwrap();
        let out = convert_sync("hello", OutputFormat::Pdf, &config).unwrap();
        assert!(out.artifact.path().starts_with(dir.path()));
        assert_eq!(out.artifact.file_name(), "report.pdf");
        let name = out.artifact.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("report-") && name.ends_with(".pdf"), "got: {name}");
    }

    #[cfg(unix)]
    #[test]
    fn persisted_artifact_has_regular_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        std::fs::write(&plain, b"x").unwrap();
        let expected = std::fs::metadata(&plain).unwrap().permissions().mode() & 0o777;

        let config = ConversionConfig::builder().temp_dir(dir.path()).build().unwrap();
        let out = convert_sync("hello", OutputFormat::Docx, &config).unwrap();
        let written = out.artifact.persist(dir.path().join("hello.docx")).unwrap();
        let mode = std::fs::metadata(&written).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, expected, "got {mode:o}, want {expected:o}");
    }

    #[test]
    fn strict_policy_surfaces_render_error() {
        let config = ConversionConfig::builder()
            .encoding_policy(EncodingPolicy::Strict)
            .build()
            .unwrap();
        let err = convert_sync("emoji 😀", OutputFormat::Pdf, &config).unwrap_err();
        assert!(matches!(err, Txt2DocError::Render(_)));
    }

    #[test]
    fn missing_temp_dir_is_artifact_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConversionConfig::builder().temp_dir(dir.path()).build().unwrap();
        config.temp_dir = Some(dir.path().join("gone"));
        let err = convert_sync("x", OutputFormat::Docx, &config).unwrap_err();
        assert!(matches!(err, Txt2DocError::ArtifactWriteFailed { .. }));
    }

    #[test]
    fn convert_to_bytes_matches_artifact() {
        let config = ConversionConfig::default();
        let (bytes, stats) = convert_to_bytes("a ```b```", OutputFormat::Pdf, &config).unwrap();
        let out = convert_sync("a ```b```", OutputFormat::Pdf, &config).unwrap();
        assert_eq!(bytes, out.artifact.read_bytes().unwrap());
        assert_eq!(stats.size_bytes, bytes.len() as u64);
        assert_eq!(stats.pages, Some(1));
    }

    #[tokio::test]
    async fn convert_runs_off_the_runtime() {
        let out = convert("text", OutputFormat::Docx, &ConversionConfig::default())
            .await
            .unwrap();
        assert_eq!(out.stats.prose_blocks, 1);
    }

    #[tokio::test]
    async fn convert_to_file_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/doc.pdf");
        let stats = convert_to_file("body", OutputFormat::Pdf, &path, &ConversionConfig::default())
            .await
            .unwrap();
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written.len() as u64, stats.size_bytes);
        assert!(written.starts_with(b"%PDF-1.5"));
        assert!(!path.with_extension("pdf.tmp").exists());
    }

    #[tokio::test]
    async fn convert_file_uses_input_stem() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        std::fs::write(&src, "\u{FEFF}hello\r\n```x```").unwrap();
        let out = convert_file(src.to_str().unwrap(), OutputFormat::Docx, &ConversionConfig::default())
            .await
            .unwrap();
        assert_eq!(out.artifact.file_name(), "notes.docx");
        assert_eq!(out.stats.code_blocks, 1);
    }

    #[tokio::test]
    async fn convert_file_missing_input() {
        let err = convert_file("/no/such/input.txt", OutputFormat::Pdf, &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Txt2DocError::InputNotFound { .. }));
    }

    #[test]
    fn explicit_stem_wins_over_input_stem() {
        let config = ConversionConfig::builder().file_stem("custom").build().unwrap();
        assert_eq!(config_for_source("notes.txt", &config).file_stem, "custom");
        let default = ConversionConfig::default();
        assert_eq!(config_for_source("dir/notes.txt", &default).file_stem, "notes");
        assert_eq!(config_for_source("-", &default).file_stem, "output");
    }
}
