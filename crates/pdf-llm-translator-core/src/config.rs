use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Language codes following ISO 639-1 with regional variants.
///
/// `"auto"` asks the model to detect the language itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(pub String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn auto() -> Self {
        Self::new(AUTO_LANG)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_auto(&self) -> bool {
        self.0.eq_ignore_ascii_case(AUTO_LANG)
    }

    /// Primary subtag, lowercased ("zh-CN" -> "zh").
    pub fn primary(&self) -> String {
        self.0
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Whether two codes name the same language, ignoring region and case.
    pub fn same_language(&self, other: &Self) -> bool {
        !self.is_auto() && !other.is_auto() && self.primary() == other.primary()
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Code meaning "detect the source language".
pub const AUTO_LANG: &str = "auto";
/// Default source language code
pub const DEFAULT_SOURCE_LANG: &str = AUTO_LANG;
/// Default target language code
pub const DEFAULT_TARGET_LANG: &str = "en";

fn default_source_lang() -> Lang {
    Lang::new(DEFAULT_SOURCE_LANG)
}

fn default_target_lang() -> Lang {
    Lang::new(DEFAULT_TARGET_LANG)
}

/// Model endpoint configuration for OpenAI-compatible APIs.
///
/// Works with llama.cpp, Ollama, vLLM, OpenAI, and anything else that speaks
/// `/chat/completions` with `response_format` support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl LlmConfig {
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            ..Default::default()
        }
    }
}

fn default_api_base() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_model() -> String {
    "default_model".to_string()
}

const fn default_retry_count() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_timeout_secs() -> u64 {
    120
}

const fn default_temperature() -> f32 {
    0.2
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_model(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Image encoding used when sending rendered pages to vision models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Webp,
}

impl ImageFormat {
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

/// Pipeline tuning: quality gate, retry budgets, and page input options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum quality score (0.0-1.0) a translation must reach
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,

    /// Translation attempts per page, counting the first one
    #[serde(default = "default_max_translation_attempts")]
    pub max_translation_attempts: u32,

    /// Re-prompts allowed when a structured response fails validation
    #[serde(default = "default_max_repair_attempts")]
    pub max_repair_attempts: u32,

    /// Attach a rendered page image to the extraction prompt
    #[serde(default = "default_true")]
    pub send_page_image: bool,

    /// Attach the PDF text layer to the extraction prompt
    #[serde(default = "default_true")]
    pub include_text_layer: bool,

    #[serde(default)]
    pub image_format: ImageFormat,

    /// Page rasterisation scale (1.0 = 72 DPI)
    #[serde(default = "default_render_scale")]
    pub render_scale: f32,

    /// Pages processed concurrently by `translate_document`
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

const fn default_quality_threshold() -> f64 {
    0.75
}

const fn default_max_translation_attempts() -> u32 {
    2
}

const fn default_max_repair_attempts() -> u32 {
    2
}

const fn default_render_scale() -> f32 {
    1.5
}

const fn default_concurrency() -> usize {
    2
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            max_translation_attempts: default_max_translation_attempts(),
            max_repair_attempts: default_max_repair_attempts(),
            send_page_image: true,
            include_text_layer: true,
            image_format: ImageFormat::default(),
            render_scale: default_render_scale(),
            concurrency: default_concurrency(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable memory cache
    #[serde(default = "default_true")]
    pub memory_enabled: bool,

    /// Memory cache budget in megabytes
    #[serde(default = "default_memory_max_mb")]
    pub memory_max_mb: u64,

    /// Memory cache TTL in seconds (0 = no expiry)
    #[serde(default)]
    pub memory_ttl_seconds: u64,

    /// Enable disk cache
    #[serde(default = "default_true")]
    pub disk_enabled: bool,

    /// Disk cache directory (defaults to $XDG_CACHE_HOME/pdf-llm-translator)
    #[serde(default)]
    pub disk_path: Option<PathBuf>,
}

const fn default_true() -> bool {
    true
}

const fn default_memory_max_mb() -> u64 {
    64
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            memory_max_mb: default_memory_max_mb(),
            memory_ttl_seconds: 0,
            disk_enabled: true,
            disk_path: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source language ("auto" to let the model detect it)
    #[serde(default = "default_source_lang")]
    pub source_lang: Lang,

    /// Target language
    #[serde(default = "default_target_lang")]
    pub target_lang: Lang,

    /// Model endpoint configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))
    }

    /// Load from default locations (~/.config/pdf-llm-translator/config.toml, ./config.toml)
    pub fn load() -> Self {
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join(crate::util::APP_DIR).join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        fn invalid(field: &str, reason: impl Into<String>) -> Error {
            Error::ConfigInvalid {
                field: field.to_string(),
                reason: reason.into(),
            }
        }

        let threshold = self.pipeline.quality_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(invalid(
                "pipeline.quality_threshold",
                format!("{threshold} is outside 0.0-1.0"),
            ));
        }
        if self.pipeline.max_translation_attempts == 0 {
            return Err(invalid("pipeline.max_translation_attempts", "must be at least 1"));
        }
        if self.pipeline.concurrency == 0 {
            return Err(invalid("pipeline.concurrency", "must be at least 1"));
        }
        if self.pipeline.render_scale <= 0.0 || !self.pipeline.render_scale.is_finite() {
            return Err(invalid("pipeline.render_scale", "must be a positive number"));
        }
        if self.target_lang.as_str().trim().is_empty() {
            return Err(invalid("target_lang", "must not be empty"));
        }
        if self.target_lang.is_auto() {
            return Err(invalid("target_lang", "target language cannot be 'auto'"));
        }
        if self.source_lang.as_str().trim().is_empty() {
            return Err(invalid("source_lang", "must not be empty (use 'auto' to detect)"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(invalid("llm.model", "must not be empty"));
        }
        if self.llm.retry_count == 0 {
            return Err(invalid("llm.retry_count", "must be at least 1"));
        }
        Ok(())
    }
}

/// Name for a language code as written, ignoring case
fn known_language_name(code: &str) -> Option<&'static str> {
    let name = match code.to_ascii_lowercase().replace('_', "-").as_str() {
        "en" => "English",
        "zh" | "zh-cn" | "zh-hans" | "zh-sg" => "Simplified Chinese",
        "zh-tw" | "zh-hant" | "zh-hk" => "Traditional Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "pt-br" => "Brazilian Portuguese",
        "nl" => "Dutch",
        "pl" => "Polish",
        "ru" => "Russian",
        "uk" => "Ukrainian",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "tr" => "Turkish",
        _ => return None,
    };
    Some(name)
}

/// Convert a language code to a human-readable name for prompts.
///
/// Regional variants without a name of their own fall back to their primary
/// subtag ("en-GB" -> English). Unknown codes are passed through; models
/// understand most ISO codes.
pub fn language_name(lang: &Lang) -> String {
    known_language_name(lang.as_str())
        .or_else(|| known_language_name(&lang.primary()))
        .map_or_else(
            || format!("the language with code '{}'", lang.as_str()),
            str::to_string,
        )
}
