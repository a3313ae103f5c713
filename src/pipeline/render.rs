//! The renderer capability: segments in, finished document bytes out.
//!
//! Both output formats implement one trait, [`Renderer`]. Segmentation is
//! done once by the caller; a renderer only decides how each block looks.
//!
//! Every implementation must:
//! * walk the segments once, in order, emitting one block per non-empty
//!   segment;
//! * produce a complete, valid document even for an empty sequence;
//! * be deterministic: identical segments give identical bytes;
//! * hold no state between calls, so one instance can serve many threads.

use crate::config::{OutputFormat, RenderOptions};
use crate::error::RenderError;
use crate::pipeline::docx::DocxRenderer;
use crate::pipeline::pdf::PdfRenderer;
use crate::pipeline::segment::Segment;
use serde::{Deserialize, Serialize};

/// A format-specific document builder.
pub trait Renderer: Send + Sync {
    /// The format this renderer produces.
    fn format(&self) -> OutputFormat;

    /// Build the whole document from `segments`.
    fn render(&self, segments: &[Segment]) -> Result<RenderedDocument, RenderError>;
}

/// Bytes of a finished document plus what went into it.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub blocks: BlockCounts,
    /// Page count for paginated formats.
    pub pages: Option<usize>,
    /// Characters substituted under [`crate::config::EncodingPolicy::Replace`].
    pub replaced_chars: usize,
}

/// How many blocks of each kind a document received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCounts {
    pub prose: usize,
    pub code: usize,
    /// Segments suppressed because their content was empty.
    pub skipped_empty: usize,
}

impl BlockCounts {
    pub fn rendered(&self) -> usize {
        self.prose + self.code
    }
}

/// Pick the renderer for `format`.
pub fn renderer_for(format: OutputFormat, options: &RenderOptions) -> Box<dyn Renderer> {
    match format {
        OutputFormat::Docx => Box::new(DocxRenderer::new(options.clone())),
        OutputFormat::Pdf => Box::new(PdfRenderer::new(options.clone())),
    }
}

/// Render `segments` to `format` with default options.
pub fn render(segments: &[Segment], format: OutputFormat) -> Result<RenderedDocument, RenderError> {
    renderer_for(format, &RenderOptions::default()).render(segments)
}
