use thiserror::Error;

/// Unified error type for pdf-llm-translator-core
///
/// Covers every failure the pipeline can surface:
/// - PDF operations (opening, text layer, rendering, reconstruction)
/// - Model transport (HTTP requests, rate limiting, malformed envelopes)
/// - Structured responses that never satisfied their contract
/// - Cache and configuration handling
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Failed to extract the text layer of a PDF page
    #[error("failed to extract text from page {page}: {reason}")]
    PdfTextExtraction { page: usize, reason: String },

    /// Failed to render a PDF page
    #[error("failed to render page {page}: {reason}")]
    PdfRender { page: usize, reason: String },

    /// Failed to write translated text back into a PDF
    #[error("failed to reconstruct PDF: {0}")]
    PdfReconstruct(String),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    // ==========================================================================
    // Model Errors
    // ==========================================================================
    /// Model API request failed
    #[error("model API request failed: {0}")]
    LlmRequest(String),

    /// The model API answered with an unusable envelope
    #[error("invalid model API response: {0}")]
    LlmInvalidResponse(String),

    /// Rate limited by the model API
    #[error("model API rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    LlmRateLimited { retry_after: Option<u64> },

    /// Model request timed out
    #[error("model API request timed out")]
    LlmTimeout,

    /// Maximum retry attempts exceeded
    #[error("model API request failed after maximum retries")]
    LlmMaxRetriesExceeded,

    /// HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    LlmClientInit(String),

    // ==========================================================================
    // Structured Response Errors
    // ==========================================================================
    /// A structured response kept failing validation after every repair attempt
    #[error("{contract} response failed validation after {attempts} attempts: {}", issues.join("; "))]
    SchemaValidation {
        contract: &'static str,
        attempts: u32,
        issues: Vec<String>,
    },

    // ==========================================================================
    // Cache Errors
    // ==========================================================================
    /// Failed to initialize the cache
    #[error("failed to initialize cache: {0}")]
    CacheInit(String),

    /// Failed to write to cache
    #[error("failed to write to cache: {0}")]
    CacheWrite(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // Runtime Errors
    // ==========================================================================
    /// A blocking PDF task panicked or was cancelled
    #[error("background task failed: {0}")]
    TaskJoin(String),

    // ==========================================================================
    // I/O and Serialization Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error outside of model responses
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
