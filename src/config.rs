//! Configuration types for text-to-document conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Page geometry, fonts and block styles
//! are fixed by the renderers and deliberately absent from this struct; what
//! remains are the knobs that change *how* an artifact is produced, not what
//! it looks like.

use crate::error::Txt2DocError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for a text-to-document conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_txt2doc::{ConversionConfig, EncodingPolicy, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .format(OutputFormat::Pdf)
///     .encoding_policy(EncodingPolicy::Strict)
///     .file_stem("notes")
///     .build()
///     .unwrap();
/// assert_eq!(config.file_name(), "notes.pdf");
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Output format used when the caller does not pass one explicitly.
    /// Default: [`OutputFormat::Docx`].
    pub format: OutputFormat,

    /// What to do with characters the target format cannot carry.
    /// Default: [`EncodingPolicy::Replace`].
    pub encoding_policy: EncodingPolicy,

    /// Move a leading info string (`` ```python ``) out of code content and
    /// into [`crate::pipeline::segment::Segment::language`]. Default: false.
    pub strip_info_string: bool,

    /// File-name stem of produced artifacts. Default: `"output"`.
    pub file_stem: String,

    /// Directory where artifacts are created. `None` uses the system
    /// temporary directory.
    pub temp_dir: Option<PathBuf>,

    /// Maximum number of documents rendered at once by
    /// [`crate::batch::convert_batch`]. Default: 4.
    ///
    /// Rendering is CPU-bound, so values beyond the number of cores buy
    /// nothing.
    pub concurrency: usize,

    /// Title written into DOCX core properties and the PDF `Info` dictionary.
    pub document_title: Option<String>,

    /// Optional per-document progress events for batch conversion.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            encoding_policy: EncodingPolicy::default(),
            strip_info_string: false,
            file_stem: "output".to_string(),
            temp_dir: None,
            concurrency: 4,
            document_title: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("format", &self.format)
            .field("encoding_policy", &self.encoding_policy)
            .field("strip_info_string", &self.strip_info_string)
            .field("file_stem", &self.file_stem)
            .field("temp_dir", &self.temp_dir)
            .field("concurrency", &self.concurrency)
            .field("document_title", &self.document_title)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Artifact file name for the configured format, e.g. `output.docx`.
    pub fn file_name(&self) -> String {
        self.file_name_for(self.format)
    }

    /// Artifact file name for an explicit format.
    pub fn file_name_for(&self, format: OutputFormat) -> String {
        format!("{}.{}", self.file_stem, format.extension())
    }

    /// Options forwarded to the renderers.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            encoding_policy: self.encoding_policy,
            title: self.document_title.clone(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn encoding_policy(mut self, policy: EncodingPolicy) -> Self {
        self.config.encoding_policy = policy;
        self
    }

    pub fn strip_info_string(mut self, v: bool) -> Self {
        self.config.strip_info_string = v;
        self
    }

    pub fn file_stem(mut self, stem: impl Into<String>) -> Self {
        self.config.file_stem = stem.into();
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.config.document_title = Some(title.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ConversionConfig, Txt2DocError> {
        self.config.file_stem = self.config.file_stem.trim().to_string();
        let c = &self.config;
        let stem = c.file_stem.as_str();
        if stem.is_empty() {
            return Err(Txt2DocError::InvalidConfig(
                "File stem must not be empty".into(),
            ));
        }
        if stem.contains(['/', '\\']) || stem == "." || stem == ".." {
            return Err(Txt2DocError::InvalidConfig(format!(
                "File stem must be a plain name, got '{}'",
                c.file_stem
            )));
        }
        if c.concurrency == 0 {
            return Err(Txt2DocError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if let Some(ref dir) = c.temp_dir {
            if !dir.is_dir() {
                return Err(Txt2DocError::InvalidConfig(format!(
                    "Temp directory '{}' does not exist",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The two structured document kinds the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Office Open XML word-processing package (`.docx`). (default)
    #[default]
    Docx,
    /// Portable Document Format (`.pdf`).
    Pdf,
}

impl OutputFormat {
    /// Both formats, in menu order.
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Docx, OutputFormat::Pdf];

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Pdf => "pdf",
        }
    }

    /// MIME type to declare when transmitting the artifact.
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            OutputFormat::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Docx => "DOCX",
            OutputFormat::Pdf => "PDF",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = Txt2DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docx" | "word" => Ok(OutputFormat::Docx),
            "pdf" => Ok(OutputFormat::Pdf),
            other => Err(Txt2DocError::InvalidConfig(format!(
                "Unknown output format '{other}' (expected docx or pdf)"
            ))),
        }
    }
}

/// Handling of characters a target format cannot represent.
///
/// PDF output uses the base-14 fonts with WinAnsiEncoding, so anything
/// outside Windows-1252 (CJK, emoji, most symbols) has no glyph. DOCX can
/// carry any Unicode scalar except the control characters XML 1.0 forbids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingPolicy {
    /// Fail with [`crate::error::RenderError::Unencodable`].
    Strict,
    /// Substitute `?` (PDF) or drop the character (DOCX) and log a warning. (default)
    #[default]
    Replace,
}

/// The subset of configuration a [`crate::pipeline::render::Renderer`] sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub encoding_policy: EncodingPolicy,
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_output_file_names() {
        let c = ConversionConfig::default();
        assert_eq!(c.file_name(), "output.docx");
        assert_eq!(c.file_name_for(OutputFormat::Pdf), "output.pdf");
        assert_eq!(c.encoding_policy, EncodingPolicy::Replace);
        assert!(!c.strip_info_string);
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = ConversionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_rejects_empty_stem() {
        let err = ConversionConfig::builder().file_stem("  ").build().unwrap_err();
        assert!(matches!(err, Txt2DocError::InvalidConfig(_)));
    }

    #[test]
    fn builder_trims_stem() {
        let c = ConversionConfig::builder().file_stem(" notes ").build().unwrap();
        assert_eq!(c.file_stem, "notes");
        assert_eq!(c.file_name_for(OutputFormat::Pdf), "notes.pdf");
    }

    #[test]
    fn builder_rejects_stem_with_separator() {
        let err = ConversionConfig::builder()
            .file_stem("../escape")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("plain name"), "got: {err}");
    }

    #[test]
    fn builder_rejects_missing_temp_dir() {
        let err = ConversionConfig::builder()
            .temp_dir("/definitely/not/a/real/dir")
            .build()
            .unwrap_err();
        assert!(matches!(err, Txt2DocError::InvalidConfig(_)));
    }

    #[test]
    fn builder_accepts_existing_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let c = ConversionConfig::builder()
            .temp_dir(dir.path())
            .build()
            .unwrap();
        assert_eq!(c.temp_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn output_format_parsing() {
        assert_eq!("pdf".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert_eq!(" DOCX ".parse::<OutputFormat>().unwrap(), OutputFormat::Docx);
        assert!("odt".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_accessors() {
        assert_eq!(OutputFormat::Pdf.extension(), "pdf");
        assert_eq!(OutputFormat::Pdf.mime_type(), "application/pdf");
        assert!(OutputFormat::Docx.mime_type().contains("wordprocessingml"));
        assert_eq!(OutputFormat::Docx.to_string(), "DOCX");
    }

    #[test]
    fn render_options_carry_policy_and_title() {
        let c = ConversionConfig::builder()
            .encoding_policy(EncodingPolicy::Strict)
            .document_title("Notes")
            .build()
            .unwrap();
        let opts = c.render_options();
        assert_eq!(opts.encoding_policy, EncodingPolicy::Strict);
        assert_eq!(opts.title.as_deref(), Some("Notes"));
    }

    #[test]
    fn debug_hides_callback() {
        let c = ConversionConfig::builder()
            .progress_callback(std::sync::Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("<dyn ConversionProgressCallback>"));
    }
}
