use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;

use super::{StructuredOutput, ValidationIssue};

/// Translated text for one source block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTranslation {
    pub id: String,
    pub text: String,
}

/// Response of the translation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTranslation {
    pub translations: Vec<BlockTranslation>,
}

/// Source block ids a translation must cover, in reading order
#[derive(Debug, Clone, Default)]
pub struct TranslationContext {
    pub source_ids: Vec<String>,
}

impl TranslationContext {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source_ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// Strip one pair of quotes the model wrapped around the whole text.
fn strip_wrapping_quotes(text: &str) -> &str {
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\u{ab}', '\u{bb}')] {
        if let Some(inner) = text.strip_prefix(open).and_then(|t| t.strip_suffix(close))
            && !inner.contains(open)
            && !inner.contains(close)
        {
            return inner.trim();
        }
    }
    text
}

impl StructuredOutput for PageTranslation {
    const NAME: &'static str = "page_translation";
    type Context = TranslationContext;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "translations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "description": "Id of the source block" },
                            "text": { "type": "string", "description": "Translated text of the block" }
                        },
                        "required": ["id", "text"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["translations"],
            "additionalProperties": false
        })
    }

    fn normalize(&mut self, ctx: &Self::Context) {
        let mut seen = HashSet::new();
        self.translations.retain_mut(|t| {
            t.id = t.id.trim().to_string();
            t.text = strip_wrapping_quotes(t.text.trim()).to_string();
            seen.insert(t.id.clone())
        });

        // Follow source order; unknown ids sink to the end for validation to report
        let position = |id: &str| {
            ctx.source_ids
                .iter()
                .position(|s| s == id)
                .unwrap_or(usize::MAX)
        };
        self.translations.sort_by_key(|t| position(&t.id));
    }

    fn validate(&self, ctx: &Self::Context) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let expected: HashSet<&str> = ctx.source_ids.iter().map(String::as_str).collect();
        let got: HashSet<&str> = self.translations.iter().map(|t| t.id.as_str()).collect();

        for id in &ctx.source_ids {
            if !got.contains(id.as_str()) {
                issues.push(ValidationIssue::new(
                    "translations",
                    format!("missing translation for block '{id}'"),
                ));
            }
        }

        for (i, t) in self.translations.iter().enumerate() {
            if !expected.contains(t.id.as_str()) {
                issues.push(ValidationIssue::new(
                    format!("translations[{i}].id"),
                    format!("'{}' is not a source block id", t.id),
                ));
            } else if t.text.is_empty() {
                issues.push(ValidationIssue::new(
                    format!("translations[{i}].text"),
                    format!("translation for block '{}' is empty", t.id),
                ));
            }
        }

        issues
    }
}

impl PageTranslation {
    pub fn text_for(&self, id: &str) -> Option<&str> {
        self.translations
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.text.as_str())
    }
}
