//! PDF rendering: segments → a PDF 1.5 file with base-14 fonts.
//!
//! Rendering happens in two passes:
//!
//! 1. **Layout** ([`layout`]) — a pure pass that encodes text to
//!    WinAnsiEncoding, wraps it to the frame, and assigns every line and
//!    background fill to a page position. Nothing here touches lopdf, so
//!    pagination is easy to test.
//! 2. **Emission** — each laid-out page becomes one content stream; fonts
//!    and the page tree are shared objects written once.
//!
//! ## Block styles
//!
//! | block | font          | leading | extras                                            |
//! |-------|---------------|---------|---------------------------------------------------|
//! | prose | Helvetica 10  | 12      | whitespace runs collapse, words wrap              |
//! | code  | Courier 9     | 12      | 10 pt indent, 5 pt padding, whitesmoke background, spaces kept, long lines hard-wrap |
//!
//! Every block is followed by a 12 pt gap. Explicit line breaks in the
//! input always start a new output line. A code block that crosses a page
//! boundary gets its background drawn once per page fragment.
//!
//! Text is written as literal strings; lopdf escapes `(`, `)` and `\` on
//! serialisation, so no markup can leak from user content into the
//! content stream.

use crate::config::{OutputFormat, RenderOptions};
use crate::error::RenderError;
use crate::pipeline::encoding::{winansi_byte, CharGuard, PDF_REPLACEMENT};
use crate::pipeline::fonts::BaseFont;
use crate::pipeline::render::{BlockCounts, RenderedDocument, Renderer};
use crate::pipeline::segment::{Segment, SegmentKind};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, warn};

// ── Page geometry (A4, points) ───────────────────────────────────────────

pub const PAGE_WIDTH: f32 = 595.2756;
pub const PAGE_HEIGHT: f32 = 841.8898;
pub const MARGIN: f32 = 72.0;
const FRAME_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const FRAME_TOP: f32 = PAGE_HEIGHT - MARGIN;
const FRAME_BOTTOM: f32 = MARGIN;

// ── Block styles ─────────────────────────────────────────────────────────

const PROSE_FONT: BaseFont = BaseFont::Helvetica;
const PROSE_SIZE: f32 = 10.0;
const PROSE_LEADING: f32 = 12.0;

const CODE_FONT: BaseFont = BaseFont::Courier;
const CODE_SIZE: f32 = 9.0;
const CODE_LEADING: f32 = 12.0;
const CODE_INDENT: f32 = 10.0;
const CODE_PADDING: f32 = 5.0;
/// ReportLab's `whitesmoke`, #F5F5F5.
pub const CODE_BACKGROUND_GRAY: f32 = 0.9608;
const CODE_TAB_WIDTH: usize = 4;

const BLOCK_GAP: f32 = 12.0;

const PRODUCER: &str = "edgequake-txt2doc";

/// Renders segments as a paginated PDF.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    options: RenderOptions,
}

impl PdfRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl Renderer for PdfRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Pdf
    }

    fn render(&self, segments: &[Segment]) -> Result<RenderedDocument, RenderError> {
        let mut guard = CharGuard::new(OutputFormat::Pdf, self.options.encoding_policy);
        let layout = layout(segments, &mut guard)?;

        if guard.replaced() > 0 {
            warn!(
                "Substituted {} character(s) outside WinAnsiEncoding in PDF output",
                guard.replaced()
            );
        }

        let bytes = write_document(&layout, self.options.title.as_deref())?;
        debug!(
            "PDF: {} page(s), {} prose / {} code blocks, {} bytes",
            layout.pages.len(),
            layout.blocks.prose,
            layout.blocks.code,
            bytes.len()
        );

        Ok(RenderedDocument {
            bytes,
            blocks: layout.blocks,
            pages: Some(layout.pages.len()),
            replaced_chars: guard.replaced(),
        })
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// A finished page layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub pages: Vec<PageLayout>,
    pub blocks: BlockCounts,
}

/// Everything drawn on one page. Fills are painted before text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub fills: Vec<Fill>,
    pub lines: Vec<TextLine>,
}

/// A solid gray rectangle; `y` is the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub gray: f32,
}

/// One line of WinAnsi-encoded text at a baseline position.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub font: BaseFont,
    pub size: f32,
    pub x: f32,
    pub y: f32,
    pub text: Vec<u8>,
}

/// Place every non-empty segment onto A4 pages.
///
/// Always yields at least one page, so an empty sequence still makes a
/// valid, openable document.
pub fn layout(segments: &[Segment], guard: &mut CharGuard) -> Result<Layout, RenderError> {
    let mut cursor = Cursor::new();
    let mut blocks = BlockCounts::default();

    for (index, segment) in segments.iter().enumerate() {
        match segment.kind {
            SegmentKind::Prose => {
                let lines = prose_lines(&segment.content, index, guard)?;
                if lines.iter().all(|l| l.is_empty()) {
                    blocks.skipped_empty += 1;
                    continue;
                }
                cursor.place_prose(lines);
                blocks.prose += 1;
            }
            SegmentKind::Code => {
                let lines = code_lines(&segment.content, index, guard)?;
                if lines.iter().all(|l| l.iter().all(|b| *b == b' ')) {
                    blocks.skipped_empty += 1;
                    continue;
                }
                cursor.place_code(lines);
                blocks.code += 1;
            }
        }
        cursor.gap(BLOCK_GAP);
    }

    Ok(Layout {
        pages: cursor.finish(),
        blocks,
    })
}

/// Vertical flow state: the page being filled and the top of free space.
struct Cursor {
    done: Vec<PageLayout>,
    page: PageLayout,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            done: Vec::new(),
            page: PageLayout::default(),
            y: FRAME_TOP,
        }
    }

    fn fits(&self, height: f32) -> bool {
        self.y - height >= FRAME_BOTTOM - 0.01
    }

    fn new_page(&mut self) {
        let full = std::mem::take(&mut self.page);
        self.done.push(full);
        self.y = FRAME_TOP;
        debug!("PDF page break → page {}", self.done.len() + 1);
    }

    /// A gap at the top of a fresh page is dropped.
    fn gap(&mut self, height: f32) {
        if self.y < FRAME_TOP {
            self.y -= height;
        }
    }

    fn line(&mut self, font: BaseFont, size: f32, leading: f32, x: f32, text: Vec<u8>) {
        let baseline = self.y - size;
        self.page.lines.push(TextLine {
            font,
            size,
            x,
            y: baseline,
            text,
        });
        self.y -= leading;
    }

    fn place_prose(&mut self, lines: Vec<Vec<u8>>) {
        for text in lines {
            if !self.fits(PROSE_LEADING) {
                self.new_page();
            }
            self.line(PROSE_FONT, PROSE_SIZE, PROSE_LEADING, MARGIN, text);
        }
    }

    fn place_code(&mut self, lines: Vec<Vec<u8>>) {
        if !self.fits(CODE_PADDING + CODE_LEADING) {
            self.new_page();
        }
        let mut fragment_top = self.y;
        self.y -= CODE_PADDING;

        for text in lines {
            if !self.fits(CODE_LEADING) {
                self.close_fragment(fragment_top);
                self.new_page();
                fragment_top = self.y;
            }
            self.line(CODE_FONT, CODE_SIZE, CODE_LEADING, MARGIN + CODE_INDENT, text);
        }

        self.y = (self.y - CODE_PADDING).max(FRAME_BOTTOM - CODE_PADDING);
        self.close_fragment(fragment_top);
    }

    /// Paint the code background from `top` down to the cursor. Fills are
    /// inserted first so text is never hidden behind them.
    fn close_fragment(&mut self, top: f32) {
        let bottom = self.y;
        if top <= bottom {
            return;
        }
        self.page.fills.push(Fill {
            x: MARGIN + CODE_INDENT - CODE_PADDING,
            y: bottom,
            width: FRAME_WIDTH - CODE_INDENT + 2.0 * CODE_PADDING,
            height: top - bottom,
            gray: CODE_BACKGROUND_GRAY,
        });
    }

    fn finish(mut self) -> Vec<PageLayout> {
        self.done.push(self.page);
        self.done
    }
}

/// Encode prose and wrap it. Each input line (explicit break) starts a new
/// output line; whitespace inside a line collapses to single spaces.
fn prose_lines(
    content: &str,
    segment: usize,
    guard: &mut CharGuard,
) -> Result<Vec<Vec<u8>>, RenderError> {
    let mut out = Vec::new();
    for raw in content.split('\n') {
        let encoded = encode(raw, segment, guard, TabStyle::Space)?;
        let words: Vec<&[u8]> = encoded
            .split(|b| *b == b' ')
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            out.push(Vec::new());
        } else {
            out.extend(wrap_words(&words, PROSE_FONT, PROSE_SIZE, FRAME_WIDTH));
        }
    }
    Ok(out)
}

/// Encode code, keeping every space, and hard-wrap at the frame edge.
fn code_lines(
    content: &str,
    segment: usize,
    guard: &mut CharGuard,
) -> Result<Vec<Vec<u8>>, RenderError> {
    let advance = CODE_FONT.text_width(b" ", CODE_SIZE);
    let max_chars = (((FRAME_WIDTH - CODE_INDENT) / advance).floor() as usize).max(1);

    let mut out = Vec::new();
    for raw in content.split('\n') {
        let encoded = encode(raw, segment, guard, TabStyle::Expand)?;
        if encoded.is_empty() {
            out.push(Vec::new());
            continue;
        }
        out.extend(encoded.chunks(max_chars).map(<[u8]>::to_vec));
    }
    Ok(out)
}

#[derive(Clone, Copy)]
enum TabStyle {
    /// Tabs are plain whitespace.
    Space,
    /// Tabs advance to the next multiple of [`CODE_TAB_WIDTH`] columns.
    Expand,
}

fn encode(
    line: &str,
    segment: usize,
    guard: &mut CharGuard,
    tabs: TabStyle,
) -> Result<Vec<u8>, RenderError> {
    let mut out = Vec::with_capacity(line.len());
    for ch in line.chars() {
        match ch {
            '\r' => {}
            '\t' => match tabs {
                TabStyle::Space => out.push(b' '),
                TabStyle::Expand => {
                    let pad = CODE_TAB_WIDTH - out.len() % CODE_TAB_WIDTH;
                    out.extend(std::iter::repeat_n(b' ', pad));
                }
            },
            _ => match winansi_byte(ch) {
                Some(b) => out.push(b),
                None => {
                    guard.reject(ch, segment)?;
                    out.push(PDF_REPLACEMENT);
                }
            },
        }
    }
    Ok(out)
}

/// Greedy word wrap. Words wider than the frame are split by character.
fn wrap_words(words: &[&[u8]], font: BaseFont, size: f32, width: f32) -> Vec<Vec<u8>> {
    let space = font.text_width(b" ", size);
    let mut lines = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut current_width = 0.0_f32;

    for word in words {
        let word_width = font.text_width(word, size);
        if current.is_empty() {
            if word_width <= width {
                current.extend_from_slice(word);
                current_width = word_width;
            } else {
                let mut pieces = split_word(word, font, size, width);
                if let Some(last) = pieces.pop() {
                    lines.extend(pieces);
                    current_width = font.text_width(&last, size);
                    current = last;
                }
            }
        } else if current_width + space + word_width <= width {
            current.push(b' ');
            current.extend_from_slice(word);
            current_width += space + word_width;
        } else {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
            let mut pieces = split_word(word, font, size, width);
            if let Some(last) = pieces.pop() {
                lines.extend(pieces);
                current_width = font.text_width(&last, size);
                current = last;
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn split_word(word: &[u8], font: BaseFont, size: f32, width: f32) -> Vec<Vec<u8>> {
    let mut pieces = Vec::new();
    let mut piece = Vec::new();
    let mut piece_width = 0.0_f32;
    for &b in word {
        let w = font.text_width(&[b], size);
        if !piece.is_empty() && piece_width + w > width {
            pieces.push(std::mem::take(&mut piece));
            piece_width = 0.0;
        }
        piece.push(b);
        piece_width += w;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

// ── Emission ─────────────────────────────────────────────────────────────

fn real(v: f32) -> Object {
    // Two decimals keep content streams compact and stable.
    Object::Real(((v * 100.0).round() / 100.0).into())
}

fn page_content(page: &PageLayout) -> Content {
    let mut operations = Vec::new();

    for fill in &page.fills {
        operations.push(Operation::new("q", vec![]));
        operations.push(Operation::new("g", vec![real(fill.gray)]));
        operations.push(Operation::new(
            "re",
            vec![real(fill.x), real(fill.y), real(fill.width), real(fill.height)],
        ));
        operations.push(Operation::new("f", vec![]));
        operations.push(Operation::new("Q", vec![]));
    }

    for line in &page.lines {
        if line.text.is_empty() {
            continue;
        }
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![
                Object::Name(line.font.resource_name().as_bytes().to_vec()),
                real(line.size),
            ],
        ));
        operations.push(Operation::new("Td", vec![real(line.x), real(line.y)]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(line.text.clone(), StringFormat::Literal)],
        ));
        operations.push(Operation::new("ET", vec![]));
    }

    Content { operations }
}

fn font_dictionary(font: BaseFont) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.postscript_name(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn write_document(layout: &Layout, title: Option<&str>) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();

    let prose_font_id = doc.add_object(font_dictionary(PROSE_FONT));
    let code_font_id = doc.add_object(font_dictionary(CODE_FONT));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            PROSE_FONT.resource_name() => prose_font_id,
            CODE_FONT.resource_name() => code_font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(layout.pages.len());
    for page in &layout.pages {
        let content = page_content(page).encode()?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), real(PAGE_WIDTH), real(PAGE_HEIGHT)],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
    };
    if let Some(title) = title {
        let mut encoded = Vec::with_capacity(title.len());
        for ch in title.chars() {
            encoded.push(winansi_byte(ch).unwrap_or(PDF_REPLACEMENT));
        }
        info.set("Title", Object::String(encoded, StringFormat::Literal));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| RenderError::Pdf(format!("save failed: {e}")))?;
    Ok(bytes)
}
