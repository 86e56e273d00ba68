//! Prompt construction for the three model calls.

use serde_json::json;

use crate::config::{Lang, language_name};
use crate::llm::ChatMessage;
use crate::schema::{BlockKind, ExtractedBlock, PageTranslation, QualityAssessment};

const EXTRACTION_SYSTEM: &str = "You are a document layout analyst. You read one PDF page and \
return its content as structured blocks in natural reading order. Copy text exactly as printed: \
do not translate, summarise, correct, or invent text. Join lines that belong to the same \
paragraph and remove end-of-line hyphenation. Give every block a bounding box in PDF points with \
the origin at the top-left corner of the page, and report its visible style.";

const TRANSLATION_SYSTEM: &str = "You are a professional translator. You translate document \
blocks faithfully and fluently, keeping meaning, tone, terminology, numbers, and inline \
formatting markers. You never merge, split, drop, or add blocks, and you return exactly one \
translation per block id.";

const QUALITY_SYSTEM: &str = "You are a strict translation reviewer. You compare each source \
block with its translation and judge accuracy, completeness, terminology, and fluency. You report \
concrete problems with the block they occur in and give an overall score between 0.0 and 1.0.";

/// Everything the extraction prompt describes about a page
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    pub page_num: usize,
    pub page_width: f32,
    pub page_height: f32,
    /// Formatted text-layer lines, empty when the page has no text layer
    pub text_hints: &'a str,
    /// Rendered page as a `data:` URL
    pub image: Option<&'a str>,
    pub source_lang: &'a Lang,
}

pub fn extraction_messages(input: &ExtractionInput<'_>) -> Vec<ChatMessage> {
    let kinds = BlockKind::ALL.map(BlockKind::as_str).join(", ");

    let mut prompt = format!(
        "Page {} measures {:.0} x {:.0} points.\n\
         Block kinds: {kinds}.\n\
         Use `level` for heading depth (1-6) and list nesting, null otherwise. \
         Report the detected language as an ISO 639-1 code with a confidence from 0.0 to 1.0.\n",
        input.page_num + 1,
        input.page_width,
        input.page_height,
    );

    if !input.source_lang.is_auto() {
        prompt.push_str(&format!(
            "The document is expected to be in {}.\n",
            language_name(input.source_lang)
        ));
    }

    if input.text_hints.trim().is_empty() {
        prompt.push_str("\nThe page has no text layer; read the text from the image.\n");
    } else {
        prompt.push_str(
            "\nText layer lines as `[x0,y0,x1,y1] size=font size | text`, blank line between \
             layout groups. Prefer these spellings and coordinates over the image where they agree:\n\n",
        );
        prompt.push_str(input.text_hints);
    }

    let user = ChatMessage::user(prompt);
    let user = match input.image {
        Some(url) => user.with_image(url),
        None => user,
    };

    vec![ChatMessage::system(EXTRACTION_SYSTEM), user]
}

/// Blocks the model is asked to translate, as a JSON array
fn blocks_json(blocks: &[&ExtractedBlock]) -> String {
    let items: Vec<_> = blocks
        .iter()
        .map(|b| json!({ "id": b.id, "kind": b.kind.as_str(), "text": b.text }))
        .collect();
    serde_json::to_string_pretty(&items).unwrap_or_default()
}

/// Previous attempt and the reviewer's verdict, fed into a retry
#[derive(Debug, Clone, Copy)]
pub struct RetryFeedback<'a> {
    pub previous: &'a PageTranslation,
    pub assessment: &'a QualityAssessment,
}

pub fn translation_messages(
    blocks: &[&ExtractedBlock],
    source_lang: &Lang,
    target_lang: &Lang,
    feedback: Option<RetryFeedback<'_>>,
) -> Vec<ChatMessage> {
    let source = if source_lang.is_auto() {
        "the source language".to_string()
    } else {
        language_name(source_lang)
    };

    let mut prompt = format!(
        "Translate every block from {source} into {}.\n\
         - Return one entry per id, using the same ids.\n\
         - Blocks of kind `formula` or `code` are copied unchanged.\n\
         - Keep proper names, URLs, numbers, and units as they are.\n\n\
         Blocks:\n{}\n",
        language_name(target_lang),
        blocks_json(blocks),
    );

    if let Some(feedback) = feedback {
        let previous = serde_json::to_string_pretty(&feedback.previous).unwrap_or_default();
        prompt.push_str(&format!(
            "\nA previous translation scored {:.2} and was rejected:\n{previous}\n\n\
             Reviewer feedback:\n{}\n\n\
             Produce a corrected translation of every block that fixes these problems.\n",
            feedback.assessment.score,
            feedback.assessment.feedback(),
        ));
    }

    vec![ChatMessage::system(TRANSLATION_SYSTEM), ChatMessage::user(prompt)]
}

pub fn quality_messages(
    blocks: &[&ExtractedBlock],
    translation: &PageTranslation,
    source_lang: &Lang,
    target_lang: &Lang,
) -> Vec<ChatMessage> {
    let pairs: Vec<_> = blocks
        .iter()
        .map(|b| {
            json!({
                "id": b.id,
                "kind": b.kind.as_str(),
                "source": b.text,
                "translation": translation.text_for(&b.id).unwrap_or_default(),
            })
        })
        .collect();

    let source = if source_lang.is_auto() {
        "the detected source language".to_string()
    } else {
        language_name(source_lang)
    };

    let prompt = format!(
        "Review this translation from {source} into {}.\n\
         Score 1.0 for a faithful, fluent translation; below 0.5 when meaning is lost, content is \
         missing, or text is left in the wrong language. Severities: critical (meaning changed or \
         missing), major (mistranslation, wrong terminology), minor (style or punctuation). \
         Set block_id to the affected block, or null for page-wide issues.\n\n\
         Pairs:\n{}\n",
        language_name(target_lang),
        serde_json::to_string_pretty(&pairs).unwrap_or_default(),
    );

    vec![ChatMessage::system(QUALITY_SYSTEM), ChatMessage::user(prompt)]
}
