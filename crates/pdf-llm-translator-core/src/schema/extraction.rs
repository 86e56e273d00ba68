use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;

use super::{StructuredOutput, ValidationIssue, nullable};

/// Points of slack allowed when checking that a box lies on the page
const BBOX_TOLERANCE: f32 = 1.0;
/// Largest plausible font size in points
const MAX_FONT_SIZE: f32 = 200.0;

/// Structural role of a block on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Title,
    #[serde(alias = "section_header", alias = "header")]
    Heading,
    #[serde(alias = "text", alias = "para")]
    Paragraph,
    #[serde(alias = "list", alias = "bullet")]
    ListItem,
    Table,
    Caption,
    Footnote,
    PageHeader,
    #[serde(alias = "footer")]
    PageFooter,
    #[serde(alias = "equation", alias = "math")]
    Formula,
    Code,
    Quote,
    #[serde(other)]
    Other,
}

impl BlockKind {
    pub const ALL: [Self; 13] = [
        Self::Title,
        Self::Heading,
        Self::Paragraph,
        Self::ListItem,
        Self::Table,
        Self::Caption,
        Self::Footnote,
        Self::PageHeader,
        Self::PageFooter,
        Self::Formula,
        Self::Code,
        Self::Quote,
        Self::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::ListItem => "list_item",
            Self::Table => "table",
            Self::Caption => "caption",
            Self::Footnote => "footnote",
            Self::PageHeader => "page_header",
            Self::PageFooter => "page_footer",
            Self::Formula => "formula",
            Self::Code => "code",
            Self::Quote => "quote",
            Self::Other => "other",
        }
    }

    /// Content that should pass through translation unchanged
    pub const fn is_verbatim(self) -> bool {
        matches!(self, Self::Formula | Self::Code)
    }

    /// Running page furniture rather than body content
    pub const fn is_furniture(self) -> bool {
        matches!(self, Self::PageHeader | Self::PageFooter)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[serde(alias = "centre", alias = "centered")]
    Center,
    Right,
    #[serde(alias = "justified")]
    Justify,
    #[default]
    #[serde(other)]
    Left,
}

/// Formatting carried through translation for later reconstruction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    /// Font size in points
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub alignment: Alignment,
    /// `#rrggbb`
    #[serde(default)]
    pub color: Option<String>,
}

impl TextStyle {
    /// Parse `color` into RGB components in 0.0-1.0
    pub fn rgb(&self) -> Option<(f32, f32, f32)> {
        let hex = self.color.as_deref()?.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| {
            u8::from_str_radix(hex.get(i..i + 2)?, 16)
                .ok()
                .map(|v| f32::from(v) / 255.0)
        };
        Some((channel(0)?, channel(2)?, channel(4)?))
    }
}

/// One block of page content as understood by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedBlock {
    #[serde(default)]
    pub id: String,
    pub kind: BlockKind,
    pub text: String,
    #[serde(default)]
    pub reading_order: u32,
    /// Heading depth (1-6) or list nesting depth
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub style: TextStyle,
    /// `[x0, y0, x1, y1]` in PDF points, origin at the top-left corner
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
}

/// Response of the extraction call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageExtraction {
    pub detected_language: String,
    #[serde(default)]
    pub language_confidence: f64,
    pub blocks: Vec<ExtractedBlock>,
}

/// Page facts used to validate an extraction
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext {
    pub page_width: f32,
    pub page_height: f32,
}

/// Canonical casing for language codes: `ZH_cn` -> `zh-CN`, `EN` -> `en`.
pub fn normalize_language_code(code: &str) -> String {
    let code = code.trim().replace('_', "-");
    let mut parts = code.split('-');
    let primary = parts.next().unwrap_or_default().to_ascii_lowercase();
    let rest: Vec<String> = parts
        .map(|p| {
            if p.len() == 2 {
                p.to_ascii_uppercase()
            } else {
                p.to_string()
            }
        })
        .collect();

    if rest.is_empty() {
        primary
    } else {
        format!("{primary}-{}", rest.join("-"))
    }
}

fn normalize_color(color: &str) -> Option<String> {
    let hex = color.trim().trim_start_matches('#').to_ascii_lowercase();
    (hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())).then(|| format!("#{hex}"))
}

impl StructuredOutput for PageExtraction {
    const NAME: &'static str = "page_extraction";
    type Context = ExtractionContext;

    fn schema() -> Value {
        let kinds: Vec<&str> = BlockKind::ALL.iter().map(|k| k.as_str()).collect();

        json!({
            "type": "object",
            "properties": {
                "detected_language": {
                    "type": "string",
                    "description": "ISO 639-1 code of the dominant language, with region when relevant (e.g. fr, zh-CN)"
                },
                "language_confidence": {
                    "type": "number",
                    "description": "Confidence in detected_language, 0.0 to 1.0"
                },
                "blocks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "description": "Unique block id, e.g. b0, b1" },
                            "kind": { "type": "string", "enum": kinds },
                            "text": { "type": "string", "description": "Exact text of the block, lines joined, hyphenation removed" },
                            "reading_order": { "type": "integer", "description": "0-based position in natural reading order" },
                            "level": {
                                "type": ["integer", "null"],
                                "description": "Heading level 1-6 or list nesting depth; null otherwise"
                            },
                            "style": {
                                "type": "object",
                                "properties": {
                                    "bold": { "type": "boolean" },
                                    "italic": { "type": "boolean" },
                                    "underline": { "type": "boolean" },
                                    "font_size": nullable("number"),
                                    "alignment": { "type": "string", "enum": ["left", "center", "right", "justify"] },
                                    "color": {
                                        "type": ["string", "null"],
                                        "description": "Text color as #rrggbb, null for black"
                                    }
                                },
                                "required": ["bold", "italic", "underline", "font_size", "alignment", "color"],
                                "additionalProperties": false
                            },
                            "bbox": {
                                "type": ["array", "null"],
                                "items": { "type": "number" },
                                "description": "[x0, y0, x1, y1] in PDF points with the origin at the top-left corner"
                            }
                        },
                        "required": ["id", "kind", "text", "reading_order", "level", "style", "bbox"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["detected_language", "language_confidence", "blocks"],
            "additionalProperties": false
        })
    }

    fn normalize(&mut self, _ctx: &Self::Context) {
        self.detected_language = normalize_language_code(&self.detected_language);
        self.language_confidence = if self.language_confidence.is_finite() {
            self.language_confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        for block in &mut self.blocks {
            block.id = block.id.trim().to_string();
            block.text = block.text.trim().to_string();
            block.style.color = block.style.color.as_deref().and_then(normalize_color);
        }
        self.blocks.retain(|b| !b.text.is_empty());

        // Stable: ties keep the model's emission order
        self.blocks.sort_by_key(|b| b.reading_order);

        let taken: HashSet<String> = self.blocks.iter().map(|b| b.id.clone()).collect();
        let mut seen = HashSet::new();
        let mut next_id = 0usize;
        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.reading_order = u32::try_from(i).unwrap_or(u32::MAX);
            if block.id.is_empty() || !seen.insert(block.id.clone()) {
                let fresh = loop {
                    let candidate = format!("b{next_id}");
                    next_id += 1;
                    if !taken.contains(&candidate) && !seen.contains(&candidate) {
                        break candidate;
                    }
                };
                seen.insert(fresh.clone());
                block.id = fresh;
            }
        }
    }

    fn validate(&self, ctx: &Self::Context) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.detected_language.is_empty() {
            issues.push(ValidationIssue::new("detected_language", "must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.language_confidence) {
            issues.push(ValidationIssue::new(
                "language_confidence",
                format!("{} is outside 0.0-1.0", self.language_confidence),
            ));
        }

        let mut ids = HashSet::new();
        for (i, block) in self.blocks.iter().enumerate() {
            let path = |field: &str| format!("blocks[{i}].{field}");

            if block.id.is_empty() {
                issues.push(ValidationIssue::new(path("id"), "must not be empty"));
            } else if !ids.insert(block.id.as_str()) {
                issues.push(ValidationIssue::new(path("id"), format!("duplicate id '{}'", block.id)));
            }

            if block.text.is_empty() {
                issues.push(ValidationIssue::new(path("text"), "must not be empty"));
            }

            if matches!(block.kind, BlockKind::Heading | BlockKind::Title)
                && let Some(level) = block.level
                && !(1..=6).contains(&level)
            {
                issues.push(ValidationIssue::new(
                    path("level"),
                    format!("heading level {level} is outside 1-6"),
                ));
            }

            if let Some(size) = block.style.font_size
                && !(size > 0.0 && size <= MAX_FONT_SIZE)
            {
                issues.push(ValidationIssue::new(
                    path("style.font_size"),
                    format!("{size} is not a plausible font size"),
                ));
            }

            if let Some([x0, y0, x1, y1]) = block.bbox {
                if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) || x0 >= x1 || y0 >= y1 {
                    issues.push(ValidationIssue::new(
                        path("bbox"),
                        format!("[{x0}, {y0}, {x1}, {y1}] is not a box with x0 < x1 and y0 < y1"),
                    ));
                } else if ctx.page_width > 0.0
                    && ctx.page_height > 0.0
                    && (x0 < -BBOX_TOLERANCE
                        || y0 < -BBOX_TOLERANCE
                        || x1 > ctx.page_width + BBOX_TOLERANCE
                        || y1 > ctx.page_height + BBOX_TOLERANCE)
                {
                    issues.push(ValidationIssue::new(
                        path("bbox"),
                        format!(
                            "[{x0}, {y0}, {x1}, {y1}] lies outside the {}x{} page",
                            ctx.page_width, ctx.page_height
                        ),
                    ));
                }
            }
        }

        issues
    }
}

impl PageExtraction {
    /// Ids of all blocks in reading order
    pub fn block_ids(&self) -> Vec<String> {
        self.blocks.iter().map(|b| b.id.clone()).collect()
    }

    pub fn block(&self, id: &str) -> Option<&ExtractedBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }
}
