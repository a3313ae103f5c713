//! Pipeline stages for text-to-document conversion.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and a new output format only touches the render
//! layer.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ segment ──▶ render ──┬──▶ docx   (OOXML package)
//! (path/-)  (fences)   (trait)   └──▶ pdf    (base-14 PDF)
//! ```
//!
//! 1. [`input`]    — read a path or stdin and normalise the text
//! 2. [`segment`]  — split text into ordered prose/code segments; total,
//!    never fails
//! 3. [`render`]   — the `Renderer` trait and format dispatch
//! 4. [`docx`] / [`pdf`] — one renderer per format
//!
//! [`encoding`] and [`fonts`] hold the character-repertoire rules and font
//! metrics the renderers share.

pub mod docx;
pub mod encoding;
pub mod fonts;
pub mod input;
pub mod pdf;
pub mod render;
pub mod segment;
