//! # edgequake-txt2doc
//!
//! Turn free-form text with fenced code blocks into a DOCX or PDF document.
//!
//! Text is split on ```` ``` ```` fences into an ordered sequence of prose
//! and code segments. Each segment becomes one block in the output: prose
//! in the body font, code in a monospace font on a shaded background.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text
//!  │
//!  ├─ 1. Input    read file / stdin, normalise line endings (optional)
//!  ├─ 2. Segment  fences → [Prose, Code, Prose, …]   (total, never fails)
//!  ├─ 3. Render   one Renderer per format: DOCX (OOXML zip) | PDF (lopdf)
//!  └─ 4. Output   temp-file Artifact, deleted on drop unless persisted
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_txt2doc::{convert, ConversionConfig, OutputFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let text = "Run this:\n```cargo build --release```\nthen ship it.";
//!     let output = convert(text, OutputFormat::Pdf, &config).await?;
//!     output.artifact.persist("build.pdf")?;
//!     eprintln!("{} pages, {} bytes", output.stats.pages.unwrap_or(0), output.stats.size_bytes);
//!     Ok(())
//! }
//! ```
//!
//! Segmentation alone needs no configuration:
//!
//! ```rust
//! use edgequake_txt2doc::{segment, Segment};
//!
//! assert_eq!(
//!     segment("before ```print(1)``` after"),
//!     vec![Segment::prose("before"), Segment::code("print(1)"), Segment::prose("after")]
//! );
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `txt2doc` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-txt2doc = { version = "0.1", default-features = false }
//! ```
//!
//! ## Output Formats
//!
//! | Format | Prose                  | Code                                      | Page              |
//! |--------|------------------------|-------------------------------------------|-------------------|
//! | DOCX   | Normal style           | Courier New 10 pt, `F2F2F2` shading        | Letter, 1 in margins |
//! | PDF    | Helvetica 10/12 pt     | Courier 9/12 pt, whitesmoke background    | A4, 72 pt margins |
//!
//! PDF output uses the base-14 fonts, which only cover Windows-1252. See
//! [`EncodingPolicy`] for what happens to other characters.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::convert_batch;
pub use config::{
    ConversionConfig, ConversionConfigBuilder, EncodingPolicy, OutputFormat, RenderOptions,
};
pub use convert::{convert, convert_file, convert_sync, convert_to_bytes, convert_to_file};
pub use error::{DocumentError, RenderError, Txt2DocError};
pub use output::{Artifact, BatchItem, ConversionOutput, ConversionStats};
pub use pipeline::render::{render, renderer_for, BlockCounts, RenderedDocument, Renderer};
pub use pipeline::segment::{segment, segment_with, Segment, SegmentKind, SegmentOptions};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::SessionStore;
