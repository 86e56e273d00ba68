//! PDF LLM Translator Core Library
//!
//! Translates PDF documents by delegating page understanding to an
//! OpenAI-compatible model endpoint:
//! - Page text layer and rendering (mupdf) as model input
//! - Schema-constrained extraction, translation, and quality scoring calls
//!   with a validation/repair loop
//! - A per-page pipeline that retries low-scoring translations with feedback
//! - Caching of page results (memory and disk)
//! - Export as JSON, Markdown, or a PDF with the translation drawn in place

pub mod cache;
pub mod config;
pub mod error;
pub mod llm;
pub mod model;
pub mod output;
pub mod pdf;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod structured;
pub mod util;

pub use cache::{PageCache, PageKey};
pub use config::{
    AppConfig, CacheConfig, DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG, ImageFormat, Lang, LlmConfig,
    PipelineConfig, language_name,
};
pub use error::{Error, Result};
pub use llm::{ChatMessage, ChatRequest, ClientInfo, LlmClient, OpenAiClient, create_client};
pub use model::{TranslatedBlock, TranslatedDocument, TranslatedPage};
pub use output::{to_json, to_markdown};
pub use pdf::{PdfDocument, ReconstructOptions, TextColor, overlay_pdf};
pub use pipeline::{PdfTranslator, ProgressCallback};
pub use schema::{
    BlockKind, ExtractedBlock, PageExtraction, PageTranslation, QualityAssessment, StructuredOutput,
    TextStyle,
};
pub use structured::{Structured, request_structured};
pub use util::clear_page_cache;
