//! Segmentation: split raw text into ordered prose and code segments.
//!
//! A code span is anything enclosed by a pair of triple-backtick fences.
//! Fences do not nest; each opening fence pairs with the *nearest* closing
//! fence, across line breaks. Everything outside a span is prose.
//!
//! ```text
//! "intro ```let x = 1;``` outro"
//!        └──── Code ─────┘
//!  Prose("intro")  Code("let x = 1;")  Prose("outro")
//! ```
//!
//! An opening fence without a partner is literal prose: it stays in the
//! trailing prose segment together with everything after it.
//!
//! Segmentation is total. Every `&str` yields a sequence; there is no error
//! path.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The delimiter that opens and closes a code span.
pub const FENCE: &str = "```";

static RE_FENCED_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());

/// Info strings are a single token such as `python`, `c++`, `objective-c`.
static RE_INFO_STRING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_+#.\-]*$").unwrap());

/// What a segment holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Prose,
    Code,
}

/// One typed, ordered chunk of the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Trimmed text of the chunk, fences excluded.
    pub content: String,
    /// Info string removed from a code span when
    /// [`SegmentOptions::strip_info_string`] is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Segment {
    pub fn prose(content: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Prose,
            content: content.into(),
            language: None,
        }
    }

    pub fn code(content: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Code,
            content: content.into(),
            language: None,
        }
    }

    /// Empty segments are kept in the sequence but never rendered.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Knobs for [`segment_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentOptions {
    /// Treat a lone token on the first line of a code span as its info
    /// string rather than as code.
    pub strip_info_string: bool,
}

/// Split `text` into prose and code segments in left-to-right order.
///
/// Prose gaps that are empty after trimming are not emitted, so adjacent
/// fences produce consecutive `Code` segments and `""` produces `[]`.
/// Empty code spans are emitted; renderers skip them.
pub fn segment(text: &str) -> Vec<Segment> {
    segment_with(text, &SegmentOptions::default())
}

/// [`segment`] with explicit options.
pub fn segment_with(text: &str, options: &SegmentOptions) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for span in RE_FENCED_SPAN.find_iter(text) {
        push_prose(&mut segments, &text[cursor..span.start()]);
        let inner = &text[span.start() + FENCE.len()..span.end() - FENCE.len()];
        segments.push(code_segment(inner, options));
        cursor = span.end();
    }
    push_prose(&mut segments, &text[cursor..]);

    segments
}

fn push_prose(segments: &mut Vec<Segment>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        segments.push(Segment::prose(trimmed));
    }
}

fn code_segment(inner: &str, options: &SegmentOptions) -> Segment {
    if options.strip_info_string {
        if let Some((first, rest)) = inner.split_once('\n') {
            let tag = first.trim();
            if RE_INFO_STRING.is_match(tag) {
                return Segment {
                    kind: SegmentKind::Code,
                    content: rest.trim().to_string(),
                    language: Some(tag.to_string()),
                };
            }
        }
    }
    Segment::code(inner.trim())
}
