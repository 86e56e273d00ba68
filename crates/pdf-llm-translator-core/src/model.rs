//! Translated document model: the pipeline's output and the input for
//! reconstruction.

use serde::{Deserialize, Serialize};

use crate::config::Lang;
use crate::pdf::DocumentMetadata;
use crate::schema::{BlockKind, ExtractedBlock, QualityAssessment, TextStyle};

/// A block with its source text, translation, and formatting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedBlock {
    pub id: String,
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    pub style: TextStyle,
    /// `[x0, y0, x1, y1]` in points, origin top-left
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f32; 4]>,
    pub reading_order: u32,
    pub source_text: String,
    pub translated_text: String,
}

impl TranslatedBlock {
    /// Block whose text passes through unchanged
    pub fn untranslated(block: &ExtractedBlock) -> Self {
        Self::with_translation(block, block.text.clone())
    }

    pub fn with_translation(block: &ExtractedBlock, translated_text: String) -> Self {
        Self {
            id: block.id.clone(),
            kind: block.kind,
            level: block.level,
            style: block.style.clone(),
            bbox: block.bbox,
            reading_order: block.reading_order,
            source_text: block.text.clone(),
            translated_text,
        }
    }
}

/// Result of running the pipeline on one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedPage {
    /// 0-based
    pub page_num: usize,
    pub page_width: f32,
    pub page_height: f32,
    pub detected_language: String,
    pub language_confidence: f64,
    pub blocks: Vec<TranslatedBlock>,
    /// Assessment of the kept translation; absent when nothing was translated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityAssessment>,
    /// Translation attempts made (0 when translation was skipped)
    pub attempts: u32,
    /// Whether the kept translation met the quality threshold
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
    /// Served from the page cache; not persisted
    #[serde(skip)]
    pub from_cache: bool,
}

impl TranslatedPage {
    pub fn score(&self) -> Option<f64> {
        self.quality.as_ref().map(|q| q.score)
    }
}

/// A translated document, serialisable as the reconstruction input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedDocument {
    /// Unique id of this translation run
    pub id: uuid::Uuid,
    /// MD5 of the source PDF
    pub source_id: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    pub source_lang: Lang,
    pub target_lang: Lang,
    pub model: String,
    pub pages: Vec<TranslatedPage>,
}

impl TranslatedDocument {
    pub fn page(&self, page_num: usize) -> Option<&TranslatedPage> {
        self.pages.iter().find(|p| p.page_num == page_num)
    }

    /// Pages whose translation stayed below the quality threshold
    pub fn failed_pages(&self) -> impl Iterator<Item = &TranslatedPage> {
        self.pages.iter().filter(|p| !p.passed)
    }

    /// Mean score over scored pages
    pub fn average_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self.pages.iter().filter_map(TranslatedPage::score).collect();
        if scores.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}
