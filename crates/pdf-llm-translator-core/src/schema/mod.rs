//! Response contracts between the pipeline and the model.
//!
//! Every model call asks for JSON matching one of the contracts below. A
//! contract carries three things:
//! - the JSON Schema sent as `response_format` (strict mode: every property
//!   required, no additional properties, optionals expressed as nullable)
//! - deterministic normalization of harmless defects (whitespace, ordering,
//!   duplicate ids, out-of-range scalars that have an obvious reading)
//! - semantic validation that a JSON Schema cannot express (ids that must
//!   match the source page, coordinates inside the page, ...)
//!
//! Whatever survives normalization but still fails validation is reported
//! back to the model by [`crate::structured`] so it can repair its answer.

mod extraction;
mod json;
mod quality;
mod translation;

pub use extraction::{
    Alignment, BlockKind, ExtractedBlock, ExtractionContext, PageExtraction, TextStyle,
    normalize_language_code,
};
pub use json::{extract_json, parse_response, remove_trailing_commas};
pub use quality::{QualityAssessment, QualityContext, QualityIssue, Severity};
pub use translation::{BlockTranslation, PageTranslation, TranslationContext};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::llm::ResponseSchema;

/// A problem found in a structured response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Location inside the response (e.g. `blocks[3].bbox`)
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// A typed model response with its schema, repair and validation rules
pub trait StructuredOutput: DeserializeOwned + Serialize + Send + Sized {
    /// Schema name sent to the API
    const NAME: &'static str;

    /// Facts about the request needed to validate the answer
    type Context: Sync;

    /// JSON Schema describing the expected response
    fn schema() -> serde_json::Value;

    /// Fix defects that have exactly one sensible repair
    fn normalize(&mut self, ctx: &Self::Context);

    /// Report everything that is still wrong
    fn validate(&self, ctx: &Self::Context) -> Vec<ValidationIssue>;

    /// Schema wrapped for a [`crate::llm::ChatRequest`]
    fn response_schema() -> ResponseSchema {
        ResponseSchema {
            name: Self::NAME,
            schema: Self::schema(),
        }
    }
}

/// JSON Schema fragment for a nullable value of the given primitive type
pub(crate) fn nullable(kind: &str) -> serde_json::Value {
    serde_json::json!({ "type": [kind, "null"] })
}
