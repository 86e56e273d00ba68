use mupdf::TextPageOptions;

use super::document::PdfDocument;
use crate::error::{Error, Result};

/// Bounding box in PDF points, origin at the top-left corner (mupdf convention)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub const fn from_array([x0, y0, x1, y1]: [f32; 4]) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub const fn as_array(self) -> [f32; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }

    /// Smallest box containing both
    pub fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Box around a mupdf quad (4 points defining a quadrilateral)
    pub fn from_quad(quad: &mupdf::Quad) -> Self {
        Self {
            x0: quad.ul.x.min(quad.ur.x).min(quad.ll.x).min(quad.lr.x),
            y0: quad.ul.y.min(quad.ur.y).min(quad.ll.y).min(quad.lr.y),
            x1: quad.ul.x.max(quad.ur.x).max(quad.ll.x).max(quad.lr.x),
            y1: quad.ul.y.max(quad.ur.y).max(quad.ll.y).max(quad.lr.y),
        }
    }
}

/// One line of the PDF text layer
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub bbox: BoundingBox,
    /// Estimated from glyph heights
    pub font_size: f32,
    /// Index of the mupdf block (paragraph) the line belongs to
    pub block: usize,
}

/// Text layer extraction. The lines are hints for the model; scanned pages
/// simply yield nothing.
pub struct TextExtractor<'a> {
    pub doc: &'a PdfDocument,
}

impl<'a> TextExtractor<'a> {
    pub const fn new(doc: &'a PdfDocument) -> Self {
        Self { doc }
    }

    fn text_page(&self, page_num: usize) -> Result<(mupdf::Document, mupdf::Page, mupdf::TextPage)> {
        let (doc, page) = self.doc.load_page(page_num)?;
        let text_page = page
            .to_text_page(TextPageOptions::empty())
            .map_err(|e| Error::PdfTextExtraction {
                page: page_num,
                reason: format!("Failed to get text page: {e}"),
            })?;
        Ok((doc, page, text_page))
    }

    /// Non-empty text lines with position and size, in mupdf block order
    pub fn extract_page_lines(&self, page_num: usize) -> Result<Vec<TextLine>> {
        let (_doc, _page, text_page) = self.text_page(page_num)?;
        let mut lines = Vec::new();

        for (block_index, block) in text_page.blocks().enumerate() {
            for line in block.lines() {
                let mut text = String::new();
                let mut bbox: Option<BoundingBox> = None;

                for text_char in line.chars() {
                    if let Some(c) = text_char.char() {
                        text.push(c);
                    }
                    let char_bbox = BoundingBox::from_quad(&text_char.quad());
                    bbox = Some(bbox.map_or(char_bbox, |b| b.union(char_bbox)));
                }

                let trimmed = text.trim();
                if trimmed.is_empty() {
                    continue;
                }

                if let Some(bbox) = bbox {
                    // Quad height runs slightly under the nominal font size
                    let font_size = (bbox.height() * 1.18).clamp(4.0, 72.0);
                    lines.push(TextLine {
                        text: trimmed.to_string(),
                        bbox,
                        font_size,
                        block: block_index,
                    });
                }
            }
        }

        Ok(lines)
    }

    /// Plain text of a page, one text line per output line
    pub fn page_text(&self, page_num: usize) -> Result<String> {
        let (_doc, _page, text_page) = self.text_page(page_num)?;

        let mut all_text = String::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                for text_char in line.chars() {
                    if let Some(c) = text_char.char() {
                        all_text.push(c);
                    }
                }
                all_text.push('\n');
            }
        }

        Ok(all_text)
    }
}

/// Render text-layer lines as compact hint rows for the extraction prompt:
/// `[x0,y0,x1,y1] size=N | text`.
pub fn format_line_hints(lines: &[TextLine], max_chars: usize) -> String {
    let mut out = String::new();
    let mut previous_block = None;

    for line in lines {
        if previous_block.is_some() && previous_block != Some(line.block) {
            out.push('\n');
        }
        previous_block = Some(line.block);

        let row = format!(
            "[{:.0},{:.0},{:.0},{:.0}] size={:.1} | {}\n",
            line.bbox.x0, line.bbox.y0, line.bbox.x1, line.bbox.y1, line.font_size, line.text
        );
        if out.len() + row.len() > max_chars {
            out.push_str("[... text layer truncated ...]\n");
            break;
        }
        out.push_str(&row);
    }

    out
}
