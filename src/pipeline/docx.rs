//! DOCX rendering: segments → an Office Open XML word-processing package.
//!
//! A `.docx` file is a zip archive of XML parts tied together by
//! relationship files. We write the smallest package Word, LibreOffice and
//! Pages all open without repair:
//!
//! ```text
//! [Content_Types].xml            part → MIME type map
//! _rels/.rels                    package → document, core/app properties
//! docProps/core.xml              title, creator (no timestamps)
//! docProps/app.xml               producing application
//! word/document.xml              the body: one <w:p> per block
//! word/styles.xml                Normal + CodeBlock paragraph styles
//! word/_rels/document.xml.rels   document → styles
//! ```
//!
//! Prose blocks are plain `Normal` paragraphs. Code blocks carry the
//! `CodeBlock` style *and* the same properties as direct formatting
//! (Courier New 10 pt, `F2F2F2` shading, 6 pt spacing after), so they look
//! right even in consumers that ignore style definitions. Line breaks
//! become `<w:br/>` and tabs `<w:tab/>` inside a single run.
//!
//! Zip entries use the fixed DOS epoch timestamp and no part contains a
//! date, so rendering is byte-for-byte reproducible.

use crate::config::{OutputFormat, RenderOptions};
use crate::error::RenderError;
use crate::pipeline::encoding::{is_xml_char, CharGuard};
use crate::pipeline::render::{BlockCounts, RenderedDocument, Renderer};
use crate::pipeline::segment::{Segment, SegmentKind};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CT: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_CORE_PROPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const REL_APP_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

const CODE_STYLE_ID: &str = "CodeBlock";
const CODE_FONT: &str = "Courier New";
/// Half-points: 10 pt.
const CODE_SIZE: &str = "20";
const CODE_SHADING: &str = "F2F2F2";
/// Twentieths of a point: 6 pt.
const CODE_SPACING_AFTER: &str = "120";

const BODY_FONT: &str = "Calibri";
/// Half-points: 11 pt.
const BODY_SIZE: &str = "22";

/// US Letter with one-inch margins, in twips.
const PAGE_WIDTH: &str = "12240";
const PAGE_HEIGHT: &str = "15840";
const PAGE_MARGIN: &str = "1440";

const APPLICATION: &str = "edgequake-txt2doc";

/// Renders segments as a WordprocessingML package.
#[derive(Debug, Clone, Default)]
pub struct DocxRenderer {
    options: RenderOptions,
}

impl DocxRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl Renderer for DocxRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Docx
    }

    fn render(&self, segments: &[Segment]) -> Result<RenderedDocument, RenderError> {
        let mut guard = CharGuard::new(OutputFormat::Docx, self.options.encoding_policy);

        let (document, blocks) = document_part(segments, &mut guard)?;
        let title: Option<String> = self
            .options
            .title
            .as_deref()
            .map(|t| t.chars().filter(|c| is_xml_char(*c)).collect());
        let core = core_part(title.as_deref())?;

        if guard.replaced() > 0 {
            warn!(
                "Dropped {} character(s) XML cannot carry from DOCX output",
                guard.replaced()
            );
        }

        let parts: [(&str, Vec<u8>); 7] = [
            ("[Content_Types].xml", content_types_part()?),
            ("_rels/.rels", package_rels_part()?),
            ("docProps/core.xml", core),
            ("docProps/app.xml", app_part()?),
            ("word/document.xml", document),
            ("word/styles.xml", styles_part()?),
            ("word/_rels/document.xml.rels", document_rels_part()?),
        ];
        let bytes = package(&parts)?;

        debug!(
            "DOCX package: {} prose / {} code blocks, {} bytes",
            blocks.prose,
            blocks.code,
            bytes.len()
        );

        Ok(RenderedDocument {
            bytes,
            blocks,
            pages: None,
            replaced_chars: guard.replaced(),
        })
    }
}

// ── Packaging ────────────────────────────────────────────────────────────

fn package(parts: &[(&str, Vec<u8>)]) -> Result<Vec<u8>, RenderError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in parts {
        zip.start_file(*name, options)?;
        zip.write_all(data)
            .map_err(|e| RenderError::Zip(format!("{name}: {e}")))?;
    }
    Ok(zip.finish()?.into_inner())
}

// ── XML part writer ──────────────────────────────────────────────────────

/// Thin wrapper that tags every writer error with the part being written.
struct Part {
    xml: Writer<Vec<u8>>,
    name: &'static str,
}

impl Part {
    fn new(name: &'static str) -> Result<Self, RenderError> {
        let mut part = Self {
            xml: Writer::new(Vec::new()),
            name,
        };
        part.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(part)
    }

    fn emit(&mut self, event: Event<'_>) -> Result<(), RenderError> {
        self.xml.write_event(event).map_err(|e| RenderError::Xml {
            part: self.name,
            detail: e.to_string(),
        })
    }

    fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), RenderError> {
        let start = BytesStart::new(tag).with_attributes(attrs.iter().copied());
        self.emit(Event::Start(start))
    }

    fn close(&mut self, tag: &str) -> Result<(), RenderError> {
        self.emit(Event::End(BytesEnd::new(tag)))
    }

    fn leaf(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), RenderError> {
        let start = BytesStart::new(tag).with_attributes(attrs.iter().copied());
        self.emit(Event::Empty(start))
    }

    fn text(&mut self, text: &str) -> Result<(), RenderError> {
        self.emit(Event::Text(BytesText::new(text)))
    }

    /// `<tag>text</tag>`
    fn element(&mut self, tag: &str, text: &str) -> Result<(), RenderError> {
        self.open(tag, &[])?;
        self.text(text)?;
        self.close(tag)
    }

    fn finish(self) -> Vec<u8> {
        self.xml.into_inner()
    }
}

// ── word/document.xml ────────────────────────────────────────────────────

fn document_part(
    segments: &[Segment],
    guard: &mut CharGuard,
) -> Result<(Vec<u8>, BlockCounts), RenderError> {
    let mut part = Part::new("word/document.xml")?;
    let mut blocks = BlockCounts::default();

    part.open("w:document", &[("xmlns:w", NS_W)])?;
    part.open("w:body", &[])?;

    for (index, segment) in segments.iter().enumerate() {
        let text = xml_safe(&segment.content, index, guard)?;
        if text.trim().is_empty() {
            blocks.skipped_empty += 1;
            continue;
        }
        match segment.kind {
            SegmentKind::Prose => {
                prose_paragraph(&mut part, &text)?;
                blocks.prose += 1;
            }
            SegmentKind::Code => {
                code_paragraph(&mut part, &text)?;
                blocks.code += 1;
            }
        }
    }

    section_properties(&mut part)?;
    part.close("w:body")?;
    part.close("w:document")?;

    Ok((part.finish(), blocks))
}

fn prose_paragraph(part: &mut Part, text: &str) -> Result<(), RenderError> {
    part.open("w:p", &[])?;
    part.open("w:r", &[])?;
    run_content(part, text)?;
    part.close("w:r")?;
    part.close("w:p")
}

fn code_paragraph(part: &mut Part, text: &str) -> Result<(), RenderError> {
    part.open("w:p", &[])?;
    code_paragraph_properties(part)?;
    part.open("w:r", &[])?;
    code_run_properties(part)?;
    run_content(part, text)?;
    part.close("w:r")?;
    part.close("w:p")
}

/// `<w:pPr>` children must follow schema order: pStyle, shd, spacing.
fn code_paragraph_properties(part: &mut Part) -> Result<(), RenderError> {
    part.open("w:pPr", &[])?;
    part.leaf("w:pStyle", &[("w:val", CODE_STYLE_ID)])?;
    part.leaf(
        "w:shd",
        &[("w:val", "clear"), ("w:color", "auto"), ("w:fill", CODE_SHADING)],
    )?;
    part.leaf("w:spacing", &[("w:after", CODE_SPACING_AFTER)])?;
    part.close("w:pPr")
}

fn code_run_properties(part: &mut Part) -> Result<(), RenderError> {
    part.open("w:rPr", &[])?;
    part.leaf(
        "w:rFonts",
        &[
            ("w:ascii", CODE_FONT),
            ("w:hAnsi", CODE_FONT),
            ("w:cs", CODE_FONT),
        ],
    )?;
    part.leaf("w:sz", &[("w:val", CODE_SIZE)])?;
    part.leaf("w:szCs", &[("w:val", CODE_SIZE)])?;
    part.close("w:rPr")
}

/// Emit run content: text pieces separated by `<w:br/>` per line break and
/// `<w:tab/>` per tab. Spaces are kept with `xml:space="preserve"`.
fn run_content(part: &mut Part, text: &str) -> Result<(), RenderError> {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            part.leaf("w:br", &[])?;
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        for (j, piece) in line.split('\t').enumerate() {
            if j > 0 {
                part.leaf("w:tab", &[])?;
            }
            if !piece.is_empty() {
                part.open("w:t", &[("xml:space", "preserve")])?;
                part.text(piece)?;
                part.close("w:t")?;
            }
        }
    }
    Ok(())
}

fn section_properties(part: &mut Part) -> Result<(), RenderError> {
    part.open("w:sectPr", &[])?;
    part.leaf("w:pgSz", &[("w:w", PAGE_WIDTH), ("w:h", PAGE_HEIGHT)])?;
    part.leaf(
        "w:pgMar",
        &[
            ("w:top", PAGE_MARGIN),
            ("w:right", PAGE_MARGIN),
            ("w:bottom", PAGE_MARGIN),
            ("w:left", PAGE_MARGIN),
            ("w:header", "720"),
            ("w:footer", "720"),
            ("w:gutter", "0"),
        ],
    )?;
    part.close("w:sectPr")
}

/// Drop (or reject) characters XML 1.0 cannot carry.
fn xml_safe(text: &str, segment: usize, guard: &mut CharGuard) -> Result<String, RenderError> {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if is_xml_char(ch) {
            out.push(ch);
        } else {
            guard.reject(ch, segment)?;
        }
    }
    Ok(out)
}

// ── word/styles.xml ──────────────────────────────────────────────────────

fn styles_part() -> Result<Vec<u8>, RenderError> {
    let mut part = Part::new("word/styles.xml")?;
    part.open("w:styles", &[("xmlns:w", NS_W)])?;

    part.open("w:docDefaults", &[])?;
    part.open("w:rPrDefault", &[])?;
    part.open("w:rPr", &[])?;
    part.leaf(
        "w:rFonts",
        &[
            ("w:ascii", BODY_FONT),
            ("w:hAnsi", BODY_FONT),
            ("w:cs", BODY_FONT),
        ],
    )?;
    part.leaf("w:sz", &[("w:val", BODY_SIZE)])?;
    part.leaf("w:szCs", &[("w:val", BODY_SIZE)])?;
    part.close("w:rPr")?;
    part.close("w:rPrDefault")?;
    part.open("w:pPrDefault", &[])?;
    part.open("w:pPr", &[])?;
    part.leaf(
        "w:spacing",
        &[("w:after", "160"), ("w:line", "259"), ("w:lineRule", "auto")],
    )?;
    part.close("w:pPr")?;
    part.close("w:pPrDefault")?;
    part.close("w:docDefaults")?;

    part.open(
        "w:style",
        &[("w:type", "paragraph"), ("w:default", "1"), ("w:styleId", "Normal")],
    )?;
    part.leaf("w:name", &[("w:val", "Normal")])?;
    part.leaf("w:qFormat", &[])?;
    part.close("w:style")?;

    part.open(
        "w:style",
        &[("w:type", "paragraph"), ("w:customStyle", "1"), ("w:styleId", CODE_STYLE_ID)],
    )?;
    part.leaf("w:name", &[("w:val", "Code Block")])?;
    part.leaf("w:basedOn", &[("w:val", "Normal")])?;
    part.leaf("w:qFormat", &[])?;
    code_paragraph_style(&mut part)?;
    code_run_properties(&mut part)?;
    part.close("w:style")?;

    part.close("w:styles")?;
    Ok(part.finish())
}

fn code_paragraph_style(part: &mut Part) -> Result<(), RenderError> {
    part.open("w:pPr", &[])?;
    part.leaf(
        "w:shd",
        &[("w:val", "clear"), ("w:color", "auto"), ("w:fill", CODE_SHADING)],
    )?;
    part.leaf(
        "w:spacing",
        &[("w:after", CODE_SPACING_AFTER), ("w:line", "240"), ("w:lineRule", "auto")],
    )?;
    part.close("w:pPr")
}

// ── Package plumbing parts ───────────────────────────────────────────────

fn content_types_part() -> Result<Vec<u8>, RenderError> {
    let mut part = Part::new("[Content_Types].xml")?;
    part.open("Types", &[("xmlns", NS_CT)])?;
    part.leaf(
        "Default",
        &[
            ("Extension", "rels"),
            ("ContentType", "application/vnd.openxmlformats-package.relationships+xml"),
        ],
    )?;
    part.leaf(
        "Default",
        &[("Extension", "xml"), ("ContentType", "application/xml")],
    )?;
    for (name, content_type) in [
        (
            "/word/document.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
        ),
        (
            "/word/styles.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml",
        ),
        (
            "/docProps/core.xml",
            "application/vnd.openxmlformats-package.core-properties+xml",
        ),
        (
            "/docProps/app.xml",
            "application/vnd.openxmlformats-officedocument.extended-properties+xml",
        ),
    ] {
        part.leaf(
            "Override",
            &[("PartName", name), ("ContentType", content_type)],
        )?;
    }
    part.close("Types")?;
    Ok(part.finish())
}

fn relationships(
    name: &'static str,
    rels: &[(&str, &str, &str)],
) -> Result<Vec<u8>, RenderError> {
    let mut part = Part::new(name)?;
    part.open("Relationships", &[("xmlns", NS_REL)])?;
    for (id, kind, target) in rels {
        part.leaf(
            "Relationship",
            &[("Id", id), ("Type", kind), ("Target", target)],
        )?;
    }
    part.close("Relationships")?;
    Ok(part.finish())
}

fn package_rels_part() -> Result<Vec<u8>, RenderError> {
    relationships(
        "_rels/.rels",
        &[
            ("rId1", REL_OFFICE_DOCUMENT, "word/document.xml"),
            ("rId2", REL_CORE_PROPS, "docProps/core.xml"),
            ("rId3", REL_APP_PROPS, "docProps/app.xml"),
        ],
    )
}

fn document_rels_part() -> Result<Vec<u8>, RenderError> {
    relationships(
        "word/_rels/document.xml.rels",
        &[("rId1", REL_STYLES, "styles.xml")],
    )
}

fn core_part(title: Option<&str>) -> Result<Vec<u8>, RenderError> {
    let mut part = Part::new("docProps/core.xml")?;
    part.open(
        "cp:coreProperties",
        &[
            (
                "xmlns:cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
            ),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ],
    )?;
    if let Some(title) = title {
        part.element("dc:title", title)?;
    }
    part.element("dc:creator", APPLICATION)?;
    part.close("cp:coreProperties")?;
    Ok(part.finish())
}

fn app_part() -> Result<Vec<u8>, RenderError> {
    let mut part = Part::new("docProps/app.xml")?;
    part.open(
        "Properties",
        &[(
            "xmlns",
            "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties",
        )],
    )?;
    part.element("Application", APPLICATION)?;
    part.close("Properties")?;
    Ok(part.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncodingPolicy;
    use crate::pipeline::segment::segment;
    use std::io::Read;
    use zip::ZipArchive;

    fn render(segments: &[Segment]) -> RenderedDocument {
        DocxRenderer::default().render(segments).unwrap()
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    fn paragraph_count(document_xml: &str) -> usize {
        document_xml.matches("<w:p>").count()
    }

    #[test]
    fn package_contains_required_parts() {
        let doc = render(&segment("hello"));
        let mut archive = ZipArchive::new(Cursor::new(doc.bytes)).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        for required in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/styles.xml",
            "word/_rels/document.xml.rels",
            "docProps/core.xml",
            "docProps/app.xml",
        ] {
            assert!(names.iter().any(|n| n == required), "missing {required}");
        }
        assert!(archive.by_name("word/document.xml").is_ok());
    }

    #[test]
    fn empty_document_has_only_section_properties() {
        let doc = render(&[]);
        let xml = read_part(&doc.bytes, "word/document.xml");
        assert_eq!(paragraph_count(&xml), 0);
        assert!(xml.contains("<w:sectPr>"));
        assert!(xml.contains(r#"w:w="12240""#));
        assert_eq!(doc.blocks.rendered(), 0);
    }

    #[test]
    fn prose_and_code_blocks_in_order() {
        let doc = render(&segment("before ```print(1)``` after"));
        let xml = read_part(&doc.bytes, "word/document.xml");
        let before = xml.find(">before<").unwrap();
        let code = xml.find(">print(1)<").unwrap();
        let after = xml.find(">after<").unwrap();
        assert!(before < code && code < after);
        assert_eq!(doc.blocks.prose, 2);
        assert_eq!(doc.blocks.code, 1);
    }

    #[test]
    fn code_blocks_are_monospace_and_shaded() {
        let doc = render(&segment("```x = 1```"));
        let xml = read_part(&doc.bytes, "word/document.xml");
        assert!(xml.contains(r#"<w:pStyle w:val="CodeBlock"/>"#));
        assert!(xml.contains(r#"w:fill="F2F2F2""#));
        assert!(xml.contains(r#"w:ascii="Courier New""#));
        assert!(xml.contains(r#"<w:sz w:val="20"/>"#));
        assert!(xml.contains(r#"<w:spacing w:after="120"/>"#));

        let styles = read_part(&doc.bytes, "word/styles.xml");
        assert!(styles.contains(r#"w:styleId="CodeBlock""#));
        assert!(styles.contains("Courier New"));
    }

    #[test]
    fn prose_has_no_code_styling() {
        let doc = render(&segment("just words"));
        let xml = read_part(&doc.bytes, "word/document.xml");
        assert!(!xml.contains("CodeBlock"));
        assert!(!xml.contains("w:shd"));
        assert!(!xml.contains("Courier"));
    }

    #[test]
    fn line_breaks_and_tabs_become_markup() {
        let doc = render(&[Segment::code("if x:\n\treturn 1")]);
        let xml = read_part(&doc.bytes, "word/document.xml");
        assert!(xml.contains("<w:br/>"));
        assert!(xml.contains("<w:tab/>"));
        assert!(xml.contains(r#"<w:t xml:space="preserve">if x:</w:t>"#));
        assert!(xml.contains(r#"<w:t xml:space="preserve">return 1</w:t>"#));
    }

    #[test]
    fn markup_characters_are_escaped() {
        let doc = render(&[Segment::prose("a < b && c > d")]);
        let xml = read_part(&doc.bytes, "word/document.xml");
        assert!(xml.contains("a &lt; b &amp;&amp; c &gt; d"));
    }

    #[test]
    fn empty_segments_emit_no_paragraph() {
        let doc = render(&[Segment::code(""), Segment::prose("x"), Segment::code("")]);
        let xml = read_part(&doc.bytes, "word/document.xml");
        assert_eq!(paragraph_count(&xml), 1);
        assert_eq!(doc.blocks.skipped_empty, 2);
    }

    #[test]
    fn control_characters_dropped_under_replace() {
        let doc = render(&[Segment::prose("bell\u{7}here")]);
        let xml = read_part(&doc.bytes, "word/document.xml");
        assert!(xml.contains(">bellhere<"));
        assert_eq!(doc.replaced_chars, 1);
    }

    #[test]
    fn control_characters_fail_under_strict() {
        let renderer = DocxRenderer::new(RenderOptions {
            encoding_policy: EncodingPolicy::Strict,
            title: None,
        });
        let err = renderer
            .render(&[Segment::prose("ok"), Segment::code("nul\u{0}")])
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Unencodable { segment: 1, ch: '\u{0}', .. }
        ));
    }

    #[test]
    fn unicode_survives_untouched() {
        let doc = render(&[Segment::prose("日本語 😀")]);
        let xml = read_part(&doc.bytes, "word/document.xml");
        assert!(xml.contains("日本語 😀"));
        assert_eq!(doc.replaced_chars, 0);
    }

    #[test]
    fn title_lands_in_core_properties() {
        let renderer = DocxRenderer::new(RenderOptions {
            encoding_policy: EncodingPolicy::Replace,
            title: Some("Meeting notes".into()),
        });
        let doc = renderer.render(&[]).unwrap();
        let core = read_part(&doc.bytes, "docProps/core.xml");
        assert!(core.contains("<dc:title>Meeting notes</dc:title>"));
        assert!(!core.contains("dcterms:created"));
    }

    #[test]
    fn rendering_twice_is_byte_identical() {
        let segs = segment("a ```b\n  c``` d");
        assert_eq!(render(&segs).bytes, render(&segs).bytes);
    }
}
