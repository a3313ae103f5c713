//! Error types for the edgequake-txt2doc library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`RenderError`] — a renderer could not turn the segment sequence into
//!   document bytes (unencodable content, writer failure). Returned by
//!   [`crate::pipeline::render::Renderer::render`].
//!
//! * [`Txt2DocError`] — **Fatal**: the conversion cannot produce an
//!   artifact at all (render failure, temp storage failure, unreadable
//!   input, bad configuration). Returned as `Err(Txt2DocError)` from the
//!   top-level `convert*` functions. Wraps [`RenderError`].
//!
//! * [`DocumentError`] — **Non-fatal**: one input of a batch failed while
//!   the others are fine. Stored inside [`crate::output::BatchItem`] so
//!   callers can inspect partial success rather than losing the whole batch
//!   to one bad document.
//!
//! Segmentation has no error type: it is total over all string inputs.

use crate::config::OutputFormat;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while building a document from segments.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A character cannot be represented in the target format and the
    /// encoding policy is [`crate::config::EncodingPolicy::Strict`].
    #[error(
        "{format} cannot encode character {ch:?} (U+{:04X}) in segment {segment}\n\
Use the replace encoding policy to substitute unsupported characters.",
        code_point(.ch)
    )]
    Unencodable {
        format: OutputFormat,
        ch: char,
        segment: usize,
    },

    /// Writing a WordprocessingML part failed.
    #[error("Failed to serialise DOCX part '{part}': {detail}")]
    Xml { part: &'static str, detail: String },

    /// Packaging the DOCX zip container failed.
    #[error("Failed to package DOCX archive: {0}")]
    Zip(String),

    /// Encoding a PDF content stream or saving the document failed.
    #[error("Failed to build PDF: {0}")]
    Pdf(String),
}

impl From<zip::result::ZipError> for RenderError {
    fn from(e: zip::result::ZipError) -> Self {
        RenderError::Zip(e.to_string())
    }
}

impl From<lopdf::Error> for RenderError {
    fn from(e: lopdf::Error) -> Self {
        RenderError::Pdf(e.to_string())
    }
}

fn code_point(ch: &char) -> u32 {
    u32::from(*ch)
}

/// All fatal errors returned by the edgequake-txt2doc library.
///
/// Per-document batch failures use [`DocumentError`] and are stored in
/// [`crate::output::BatchItem`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Txt2DocError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Reserved for fence validation. The current segmenter is total and
    /// never produces it.
    #[error("Malformed input: {detail}")]
    MalformedInput { detail: String },

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file was read but its bytes are not UTF-8 text.
    #[error("Input '{path}' is not valid UTF-8 text")]
    InputNotUtf8 { path: PathBuf },

    /// Any other I/O failure while reading the input.
    #[error("Failed to read input '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The renderer could not encode the content or serialise the document.
    #[error(transparent)]
    Render(#[from] RenderError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The temporary artifact could not be created or written.
    #[error("Failed to finalise document artifact: {source}")]
    ArtifactWriteFailed {
        #[source]
        source: std::io::Error,
    },

    /// Could not create, write or move the requested output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Session errors ────────────────────────────────────────────────────
    /// A format was requested before any text was submitted (or it expired).
    #[error("No text submitted for requester {requester}.\nPlease send text first.")]
    NothingSubmitted { requester: i64 },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document of a batch.
///
/// The overall batch continues; other documents are unaffected.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("Document {index} ('{name}'): {detail}")]
pub struct DocumentError {
    /// 0-indexed position of the document in the batch.
    pub index: usize,
    /// Display name of the input (file name or `<stdin>`).
    pub name: String,
    /// Human-readable description of the underlying [`Txt2DocError`].
    pub detail: String,
}
