//! Write translated blocks back onto the original PDF pages.
//!
//! # Coordinate System
//!
//! Block boxes use mupdf's **top-left origin** (y grows downward) relative
//! to the visible page box. PDF content streams use a **bottom-left origin**.
//! For a page box `[llx, lly, urx, ury]`:
//! ```text
//! pdf_x = llx + x
//! pdf_y = ury - y
//! ```
//!
//! # Strategy
//!
//! 1. Cover every translated block's box with a rectangle in the cover color
//! 2. Draw the translation inside the box with a standard Helvetica face,
//!    shrinking the font until the wrapped text fits
//!
//! The standard 14 fonts only cover WinAnsi, so characters outside it are
//! drawn as `?`.

use std::fmt::Write as _;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::text::BoundingBox;
use crate::error::{Error, Result};
use crate::model::{TranslatedBlock, TranslatedDocument, TranslatedPage};
use crate::schema::Alignment;

// =============================================================================
// Layout Constants
// =============================================================================

/// Font size used when the model reported none
const DEFAULT_FONT_SIZE: f32 = 11.0;

/// Line height as a multiple of font size
const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Shrink step while fitting text into a box
const FONT_SIZE_STEP: f32 = 0.5;

/// Padding around cover rectangles (in points)
const COVER_PADDING: f32 = 1.0;

/// Depth limit when walking the page tree for inherited attributes
const MAX_TREE_DEPTH: usize = 16;

/// Font resource names: regular, bold, italic, bold italic
const FONT_NAMES: [&str; 4] = ["FLT0", "FLT1", "FLT2", "FLT3"];
const FONT_FACES: [&str; 4] = [
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
];

// =============================================================================
// Public Types
// =============================================================================

/// RGB color with components in 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl TextColor {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub const fn white() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    pub const fn dark_red() -> Self {
        Self::new(0.8, 0.0, 0.0)
    }

    pub const fn blue() -> Self {
        Self::new(0.0, 0.0, 0.8)
    }

    pub const fn dark_green() -> Self {
        Self::new(0.0, 0.5, 0.0)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace(['_', '-'], "").as_str() {
            "black" => Some(Self::black()),
            "white" => Some(Self::white()),
            "darkred" => Some(Self::dark_red()),
            "blue" => Some(Self::blue()),
            "darkgreen" => Some(Self::dark_green()),
            _ => None,
        }
    }
}

impl Default for TextColor {
    fn default() -> Self {
        Self::black()
    }
}

/// Options for PDF reconstruction
#[derive(Debug, Clone)]
pub struct ReconstructOptions {
    /// Color for blocks whose style carries none
    pub text_color: TextColor,
    /// When set, overrides every block's own color
    pub force_color: bool,
    pub cover_color: TextColor,
    /// Smallest font size the fitter may shrink to
    pub min_font_size: f32,
    /// Drop pages that have no translation from the output
    pub only_translated_pages: bool,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            text_color: TextColor::black(),
            force_color: false,
            cover_color: TextColor::white(),
            min_font_size: 5.0,
            only_translated_pages: false,
        }
    }
}

// =============================================================================
// Text Measurement & Layout
// =============================================================================

/// Approximate Helvetica advance width in em units
fn char_width_em(c: char, bold: bool) -> f32 {
    let base = match c {
        'i' | 'j' | 'l' | '\'' | '|' | '.' | ',' | ':' | ';' | '!' => 0.25,
        ' ' | 'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '-' | '/' => 0.32,
        'm' | 'w' | 'M' | 'W' | '@' | '%' => 0.85,
        c if c.is_uppercase() => 0.68,
        c if c.is_ascii_digit() => 0.556,
        _ => 0.53,
    };
    if bold { base * 1.07 } else { base }
}

/// Rendered width of `text` in points
pub fn text_width(text: &str, font_size: f32, bold: bool) -> f32 {
    text.chars().map(|c| char_width_em(c, bold)).sum::<f32>() * font_size
}

/// Greedy word wrap to `max_width` points; words wider than a line are split
pub fn wrap_text(text: &str, max_width: f32, font_size: f32, bold: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if text_width(&candidate, font_size, bold) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        // Hard-break words that cannot fit on a line of their own
        for c in word.chars() {
            current.push(c);
            if text_width(&current, font_size, bold) > max_width && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Fitted text for one block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockLayout {
    pub font_size: f32,
    pub line_height: f32,
    pub lines: Vec<String>,
    /// Text still taller than the box at the minimum font size
    pub overflow: bool,
}

/// Shrink from `preferred` until the wrapped text fits `width` x `height`
pub fn fit_text(
    text: &str,
    width: f32,
    height: f32,
    preferred: f32,
    min_size: f32,
    bold: bool,
) -> BlockLayout {
    let width = width.max(1.0);
    let mut size = preferred.max(min_size);

    loop {
        let lines = wrap_text(text, width, size, bold);
        let line_height = size * LINE_HEIGHT_FACTOR;
        #[allow(clippy::cast_precision_loss)]
        let needed = lines.len() as f32 * line_height;
        // The last line needs only the glyph height
        let needed = needed - (line_height - size);

        if needed <= height || size <= min_size {
            return BlockLayout {
                font_size: size,
                line_height,
                lines,
                overflow: needed > height,
            };
        }
        size = (size - FONT_SIZE_STEP).max(min_size);
    }
}

// =============================================================================
// WinAnsi Encoding
// =============================================================================

/// Map a char to its WinAnsiEncoding byte
fn winansi_byte(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => u8::try_from(code).ok(),
        _ => Some(match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            '\t' | '\n' | '\r' => b' ',
            _ => return None,
        }),
    }
}

/// Encode text as a hex string for `Tj`, replacing unsupported chars with `?`
pub fn encode_winansi_hex(text: &str) -> String {
    text.chars().fold(String::with_capacity(text.len() * 2), |mut acc, c| {
        let _ = write!(acc, "{:02X}", winansi_byte(c).unwrap_or(b'?'));
        acc
    })
}

// =============================================================================
// Content Stream
// =============================================================================

const fn font_index(bold: bool, italic: bool) -> usize {
    match (bold, italic) {
        (false, false) => 0,
        (true, false) => 1,
        (false, true) => 2,
        (true, true) => 3,
    }
}

/// Build the content stream drawing every block of a page
fn page_content(page: &TranslatedPage, page_box: [f32; 4], options: &ReconstructOptions) -> String {
    let [llx, _, _, ury] = page_box;
    let blocks: Vec<(&TranslatedBlock, BoundingBox)> = page
        .blocks
        .iter()
        .filter_map(|b| match b.bbox {
            Some(bbox) => Some((b, BoundingBox::from_array(bbox))),
            None => {
                debug!("Page {}: block {} has no bbox, not drawn", page.page_num, b.id);
                None
            }
        })
        .filter(|(b, _)| b.translated_text != b.source_text)
        .collect();

    let mut content = String::new();
    if blocks.is_empty() {
        return content;
    }

    content.push_str("q\n");

    // PHASE 1: cover the original text
    let cover = options.cover_color;
    let _ = writeln!(content, "{} {} {} rg", cover.r, cover.g, cover.b);
    for (_, bbox) in &blocks {
        let _ = writeln!(
            content,
            "{:.2} {:.2} {:.2} {:.2} re f",
            llx + bbox.x0 - COVER_PADDING,
            ury - bbox.y1 - COVER_PADDING,
            bbox.width() + 2.0 * COVER_PADDING,
            bbox.height() + 2.0 * COVER_PADDING
        );
    }

    // PHASE 2: draw translations; reset render mode since OCR layers use 3 (invisible)
    content.push_str("0 Tr\n");
    for (block, bbox) in &blocks {
        let style = &block.style;
        let color = if options.force_color {
            options.text_color
        } else {
            style
                .rgb()
                .map_or(options.text_color, |(r, g, b)| TextColor::new(r, g, b))
        };

        let layout = fit_text(
            &block.translated_text,
            bbox.width(),
            bbox.height(),
            style.font_size.unwrap_or(DEFAULT_FONT_SIZE),
            options.min_font_size,
            style.bold,
        );
        if layout.overflow {
            debug!(
                "Page {}: block {} overflows its box at {}pt",
                page.page_num, block.id, layout.font_size
            );
        }

        let font = FONT_NAMES[font_index(style.bold, style.italic)];
        let _ = writeln!(content, "{} {} {} rg", color.r, color.g, color.b);
        let _ = writeln!(content, "{} {} {} RG", color.r, color.g, color.b);
        content.push_str("BT\n");
        let _ = writeln!(content, "/{font} {:.2} Tf", layout.font_size);

        let last = layout.lines.len().saturating_sub(1);
        let mut underlines = Vec::new();
        for (i, line) in layout.lines.iter().enumerate() {
            let line_width = text_width(line, layout.font_size, style.bold);
            let slack = (bbox.width() - line_width).max(0.0);
            let x_offset = match style.alignment {
                Alignment::Center => slack / 2.0,
                Alignment::Right => slack,
                Alignment::Left | Alignment::Justify => 0.0,
            };

            let spaces = line.chars().filter(|c| *c == ' ').count();
            let word_spacing = if style.alignment == Alignment::Justify && i < last && spaces > 0 {
                #[allow(clippy::cast_precision_loss)]
                let per_space = slack / spaces as f32;
                per_space
            } else {
                0.0
            };

            let x = llx + bbox.x0 + x_offset;
            #[allow(clippy::cast_precision_loss)]
            let y = ury - bbox.y0 - layout.font_size - (i as f32 * layout.line_height);

            let _ = writeln!(content, "{word_spacing:.3} Tw");
            let _ = writeln!(content, "1 0 0 1 {x:.2} {y:.2} Tm");
            let _ = writeln!(content, "<{}> Tj", encode_winansi_hex(line));

            if style.underline {
                underlines.push((x, y, line_width + word_spacing * spaces as f32));
            }
        }
        content.push_str("ET\n");

        for (x, y, width) in underlines {
            let offset = layout.font_size * 0.12;
            let _ = writeln!(
                content,
                "{:.2} w {x:.2} {:.2} m {:.2} {:.2} l S",
                layout.font_size * 0.06,
                y - offset,
                x + width,
                y - offset
            );
        }
    }

    content.push_str("Q\n");
    content
}

// =============================================================================
// PDF Object Plumbing
// =============================================================================

/// Read a 4-number rectangle entry, walking up the page tree when inherited
fn inherited_rect(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
    let mut current = doc.get_object(page_id).ok()?;

    for _ in 0..MAX_TREE_DEPTH {
        let Object::Dictionary(dict) = current else {
            return None;
        };

        if let Ok(obj) = dict.get(key) {
            let obj = match obj {
                Object::Reference(id) => doc.get_object(*id).ok()?,
                other => other,
            };
            if let Object::Array(arr) = obj {
                let values: Vec<f32> = arr
                    .iter()
                    .filter_map(|o| match o {
                        #[allow(clippy::cast_precision_loss)]
                        Object::Integer(i) => Some(*i as f32),
                        Object::Real(r) => Some(*r),
                        _ => None,
                    })
                    .collect();
                if let [a, b, c, d] = values[..] {
                    return Some([a.min(c), b.min(d), a.max(c), b.max(d)]);
                }
            }
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = doc.get_object(*parent).ok()?,
            _ => return None,
        }
    }
    None
}

/// Visible page box: CropBox, else MediaBox, else US Letter
fn page_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    inherited_rect(doc, page_id, b"CropBox")
        .or_else(|| inherited_rect(doc, page_id, b"MediaBox"))
        .unwrap_or([0.0, 0.0, 612.0, 792.0])
}

fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d.clone()),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Dictionary(d)) => Some(d.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Effective Resources of a page (own or inherited), as an owned dictionary
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = doc.get_object(page_id).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let Some(Object::Dictionary(dict)) = current else {
            break;
        };
        if let Some(res) = dict.get(b"Resources").ok().and_then(|o| resolve_dict(doc, o)) {
            return res;
        }
        current = match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => doc.get_object(*parent).ok(),
            _ => None,
        };
    }
    Dictionary::new()
}

/// Add the four Helvetica faces to the document once
fn add_fonts(doc: &mut Document) -> [ObjectId; 4] {
    FONT_FACES.map(|face| {
        doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(face.as_bytes().to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ]))
    })
}

/// Register the fonts in a page's Resources (written back inline)
fn attach_fonts(doc: &mut Document, page_id: ObjectId, fonts: &[ObjectId; 4]) -> Result<()> {
    let mut resources = page_resources(doc, page_id);
    let mut font_dict = resources
        .get(b"Font")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
        .unwrap_or_default();

    for (name, id) in FONT_NAMES.iter().zip(fonts) {
        font_dict.set(*name, Object::Reference(*id));
    }
    resources.set("Font", Object::Dictionary(font_dict));

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;
    if let Object::Dictionary(dict) = page {
        dict.set("Resources", Object::Dictionary(resources));
    }
    Ok(())
}

/// Append a content stream after the page's existing content
fn append_content(doc: &mut Document, page_id: ObjectId, content: &str) -> Result<()> {
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.as_bytes().to_vec()));

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

    if let Object::Dictionary(dict) = page {
        let contents = match dict.get(b"Contents").ok().cloned() {
            Some(Object::Reference(existing)) => Object::Array(vec![
                Object::Reference(existing),
                Object::Reference(content_id),
            ]),
            Some(Object::Array(mut arr)) => {
                arr.push(Object::Reference(content_id));
                Object::Array(arr)
            }
            _ => Object::Reference(content_id),
        };
        dict.set("Contents", contents);
    }
    Ok(())
}

// =============================================================================
// Entry Point
// =============================================================================

/// Draw the translations of `translated` onto a copy of `pdf_bytes`.
///
/// Pages missing from `translated` are left as they are (or dropped with
/// `only_translated_pages`).
pub fn overlay_pdf(
    pdf_bytes: &[u8],
    translated: &TranslatedDocument,
    options: &ReconstructOptions,
) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(pdf_bytes)
        .map_err(|e| Error::Lopdf(format!("Failed to load PDF: {e}")))?;

    let pages = doc.get_pages();
    let total = pages.len();
    let fonts = add_fonts(&mut doc);

    for page in &translated.pages {
        let number = u32::try_from(page.page_num + 1).map_err(|_| Error::PdfInvalidPage {
            page: page.page_num,
            total,
        })?;
        let &page_id = pages.get(&number).ok_or(Error::PdfInvalidPage {
            page: page.page_num,
            total,
        })?;

        let content = page_content(page, page_box(&doc, page_id), options);
        if content.is_empty() {
            continue;
        }
        attach_fonts(&mut doc, page_id, &fonts)?;
        append_content(&mut doc, page_id, &content)?;
    }

    if options.only_translated_pages {
        let unwanted: Vec<u32> = pages
            .keys()
            .copied()
            .filter(|n| translated.page(*n as usize - 1).is_none())
            .collect();
        if unwanted.len() == total {
            return Err(Error::PdfReconstruct("no translated pages to keep".to_string()));
        }
        if !unwanted.is_empty() {
            doc.delete_pages(&unwanted);
            doc.prune_objects();
        }
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| Error::PdfReconstruct(format!("Failed to save PDF: {e}")))?;
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schema::TextStyle;

    #[test]
    fn test_winansi_encoding() {
        assert_eq!(encode_winansi_hex("Az"), "417A");
        assert_eq!(encode_winansi_hex("é"), "E9");
        assert_eq!(encode_winansi_hex("€–\u{201C}"), "809693");
        assert_eq!(encode_winansi_hex("日"), "3F");
    }

    #[test]
    fn test_wrap_text_respects_width() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 60.0, 10.0, false);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, 10.0, false) <= 60.0 || !line.contains(' '));
        }
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn test_wrap_text_splits_long_word() {
        let lines = wrap_text("Donaudampfschifffahrtsgesellschaft", 40.0, 10.0, false);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), "Donaudampfschifffahrtsgesellschaft");
    }

    #[test]
    fn test_wrap_text_empty() {
        assert_eq!(wrap_text("", 100.0, 10.0, false), vec![String::new()]);
    }

    #[test]
    fn test_fit_text_shrinks() {
        let text = "a fairly long translated sentence that needs more room than the original";
        let layout = fit_text(text, 200.0, 14.0, 12.0, 5.0, false);
        assert!(layout.font_size < 12.0);
        assert!(layout.font_size >= 5.0);
    }

    #[test]
    fn test_fit_text_keeps_size_when_it_fits() {
        let layout = fit_text("Hi", 200.0, 20.0, 12.0, 5.0, false);
        assert!((layout.font_size - 12.0).abs() < f32::EPSILON);
        assert_eq!(layout.lines, vec!["Hi".to_string()]);
        assert!(!layout.overflow);
    }

    #[test]
    fn test_fit_text_reports_overflow() {
        let layout = fit_text(&"word ".repeat(200), 50.0, 10.0, 12.0, 5.0, false);
        assert!(layout.overflow);
        assert!((layout.font_size - 5.0).abs() < f32::EPSILON);
    }

    fn block(text: &str, translated: &str, bbox: Option<[f32; 4]>) -> TranslatedBlock {
        TranslatedBlock {
            id: "b0".to_string(),
            kind: crate::schema::BlockKind::Paragraph,
            level: None,
            style: TextStyle {
                bold: true,
                underline: true,
                color: Some("#ff0000".to_string()),
                ..TextStyle::default()
            },
            bbox,
            reading_order: 0,
            source_text: text.to_string(),
            translated_text: translated.to_string(),
        }
    }

    fn page(blocks: Vec<TranslatedBlock>) -> TranslatedPage {
        TranslatedPage {
            page_num: 0,
            page_width: 612.0,
            page_height: 792.0,
            detected_language: "fr".to_string(),
            language_confidence: 1.0,
            blocks,
            quality: None,
            attempts: 1,
            passed: true,
            skipped_reason: None,
            from_cache: false,
        }
    }

    #[test]
    fn test_page_content_draws_translated_blocks() {
        let p = page(vec![block("Bonjour", "Hello", Some([72.0, 72.0, 300.0, 90.0]))]);
        let content = page_content(&p, [0.0, 0.0, 612.0, 792.0], &ReconstructOptions::default());

        assert!(content.contains("re f"));
        assert!(content.contains("/FLT1 "), "bold face expected: {content}");
        assert!(content.contains("1 0 0 rg"), "block color expected: {content}");
        assert!(content.contains(&format!("<{}> Tj", encode_winansi_hex("Hello"))));
        assert!(content.contains(" l S"), "underline expected");
    }

    #[test]
    fn test_page_content_skips_unchanged_and_boxless_blocks() {
        let p = page(vec![
            block("Same", "Same", Some([72.0, 72.0, 300.0, 90.0])),
            block("Bonjour", "Hello", None),
        ]);
        assert!(page_content(&p, [0.0, 0.0, 612.0, 792.0], &ReconstructOptions::default()).is_empty());
    }

    #[test]
    fn test_force_color_overrides_style() {
        let p = page(vec![block("Bonjour", "Hello", Some([72.0, 72.0, 300.0, 90.0]))]);
        let options = ReconstructOptions {
            text_color: TextColor::blue(),
            force_color: true,
            ..Default::default()
        };
        let content = page_content(&p, [0.0, 0.0, 612.0, 792.0], &options);
        assert!(content.contains("0 0 0.8 rg"));
        assert!(!content.contains("1 0 0 rg"));
    }

    #[test]
    fn test_text_color_from_name() {
        assert_eq!(TextColor::from_name("Dark-Red"), Some(TextColor::dark_red()));
        assert_eq!(TextColor::from_name("chartreuse"), None);
    }
}
