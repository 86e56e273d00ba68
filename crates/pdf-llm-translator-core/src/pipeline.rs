//! Page pipeline: extract, gate on language, translate, score, retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info, warn};

use crate::cache::{PageCache, PageKey, PageKeyParts};
use crate::config::{AppConfig, Lang};
use crate::error::{Error, Result};
use crate::llm::{ClientInfo, LlmClient, create_client};
use crate::model::{TranslatedBlock, TranslatedDocument, TranslatedPage};
use crate::pdf::{PageRenderer, PageSize, PdfDocument, TextExtractor, format_line_hints};
use crate::prompts::{self, ExtractionInput, RetryFeedback};
use crate::schema::{
    ExtractedBlock, ExtractionContext, PageExtraction, PageTranslation, QualityAssessment,
    QualityContext, TranslationContext,
};
use crate::structured::request_structured;

/// Upper bound on text-layer hint size sent with the extraction prompt
const MAX_HINT_CHARS: usize = 24_000;

pub const SKIP_EMPTY_PAGE: &str = "no text content";
pub const SKIP_TARGET_LANGUAGE: &str = "already in target language";
pub const SKIP_NOTHING_TRANSLATABLE: &str = "only formulas or code";

/// Called with `(pages_done, pages_total)` after each page
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// One translation attempt and its assessment
#[derive(Clone)]
struct Attempt {
    translation: PageTranslation,
    assessment: QualityAssessment,
}

/// Model inputs read from the PDF for one page
struct PageInputs {
    size: PageSize,
    hints: String,
    image: Option<String>,
}

/// Run mupdf work on the blocking pool so in-flight model requests keep moving
async fn on_blocking_pool<T, F>(doc: &PdfDocument, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&PdfDocument) -> Result<T> + Send + 'static,
{
    let doc = doc.clone();
    tokio::task::spawn_blocking(move || work(&doc))
        .await
        .map_err(|e| Error::TaskJoin(e.to_string()))?
}

/// High-level translator that runs the model pipeline over PDF pages
pub struct PdfTranslator {
    client: Arc<dyn LlmClient>,
    cache: PageCache,
    config: AppConfig,
}

impl PdfTranslator {
    /// Create a translator with an OpenAI-compatible client and a fresh cache
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = create_client(&config.llm)?;
        let cache = PageCache::new(&config.cache)?;
        Ok(Self {
            client,
            cache,
            config,
        })
    }

    /// Create with an existing cache
    pub fn with_cache(config: AppConfig, cache: PageCache) -> Result<Self> {
        let client = create_client(&config.llm)?;
        Ok(Self {
            client,
            cache,
            config,
        })
    }

    /// Create with a custom model client
    pub fn with_client(client: Arc<dyn LlmClient>, config: AppConfig) -> Result<Self> {
        let cache = PageCache::new(&config.cache)?;
        Ok(Self {
            client,
            cache,
            config,
        })
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn client_info(&self) -> ClientInfo {
        self.client.info()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Translate one page (0-based), using the cache when possible
    pub async fn translate_page(&self, doc: &PdfDocument, page_num: usize) -> Result<TranslatedPage> {
        self.translate_page_force(doc, page_num, false).await
    }

    /// Translate one page, bypassing the cache lookup when `force` is set
    pub async fn translate_page_force(
        &self,
        doc: &PdfDocument,
        page_num: usize,
        force: bool,
    ) -> Result<TranslatedPage> {
        doc.page_index(page_num)?;

        let page_text =
            on_blocking_pool(doc, move |doc| TextExtractor::new(doc).page_text(page_num)).await?;
        let model = self.client.info().model;
        let key = PageKey::new(PageKeyParts {
            doc_id: doc.source_id(),
            page_num,
            page_text: &page_text,
            model: &model,
            source_lang: &self.config.source_lang,
            target_lang: &self.config.target_lang,
            quality_threshold: self.config.pipeline.quality_threshold,
        });

        if !force && let Some(cached) = self.cache.get(&key).await {
            debug!("Cache hit for page {page_num}");
            return Ok(cached);
        }

        info!(
            "Translating page {} with {} ({}){}",
            page_num,
            self.client.name(),
            model,
            if force { " (forced)" } else { "" }
        );

        let page = self.run_pipeline(doc, page_num).await?;
        // Failing pages get another chance on the next run
        if page.passed {
            self.cache.insert(&key, &page).await;
        } else {
            debug!("Page {page_num}: below threshold, not cached");
        }
        Ok(page)
    }

    async fn run_pipeline(&self, doc: &PdfDocument, page_num: usize) -> Result<TranslatedPage> {
        let inputs = self.page_inputs(doc, page_num).await?;
        let size = inputs.size;
        let extraction = self.extract(page_num, inputs).await?;

        let mut page = TranslatedPage {
            page_num,
            page_width: size.width,
            page_height: size.height,
            detected_language: extraction.detected_language.clone(),
            language_confidence: extraction.language_confidence,
            blocks: extraction.blocks.iter().map(TranslatedBlock::untranslated).collect(),
            quality: None,
            attempts: 0,
            passed: true,
            skipped_reason: None,
            from_cache: false,
        };

        if extraction.blocks.is_empty() {
            info!("Page {page_num}: no text content");
            page.quality = Some(QualityAssessment::perfect("Page has no text"));
            page.skipped_reason = Some(SKIP_EMPTY_PAGE.to_string());
            return Ok(page);
        }

        let detected = Lang::new(extraction.detected_language.as_str());
        if detected.same_language(&self.config.target_lang) {
            info!(
                "Page {page_num}: detected {} matches target {}, not translating",
                detected, self.config.target_lang
            );
            page.skipped_reason = Some(SKIP_TARGET_LANGUAGE.to_string());
            return Ok(page);
        }

        let translatable: Vec<&ExtractedBlock> = extraction
            .blocks
            .iter()
            .filter(|b| !b.kind.is_verbatim())
            .collect();
        if translatable.is_empty() {
            page.quality = Some(QualityAssessment::perfect("Nothing to translate"));
            page.skipped_reason = Some(SKIP_NOTHING_TRANSLATABLE.to_string());
            return Ok(page);
        }

        // A configured source language wins over detection for prompt wording
        let source = if self.config.source_lang.is_auto() && !detected.as_str().is_empty() {
            detected
        } else {
            self.config.source_lang.clone()
        };

        let (best, attempts) = self.translate_with_retry(page_num, &translatable, &source).await?;

        page.blocks = extraction
            .blocks
            .iter()
            .map(|block| match best.translation.text_for(&block.id) {
                Some(text) if !block.kind.is_verbatim() => {
                    TranslatedBlock::with_translation(block, text.to_string())
                }
                _ => TranslatedBlock::untranslated(block),
            })
            .collect();
        page.attempts = attempts;
        page.passed = best.assessment.score >= self.config.pipeline.quality_threshold;
        page.quality = Some(best.assessment);

        if page.passed {
            info!("Page {page_num}: done after {attempts} attempt(s)");
        } else {
            warn!(
                "Page {}: best score {:.2} below threshold {:.2} after {} attempt(s)",
                page_num,
                page.score().unwrap_or_default(),
                self.config.pipeline.quality_threshold,
                attempts
            );
        }

        Ok(page)
    }

    /// Page size, text-layer hints, and (for vision models) the rendered page
    async fn page_inputs(&self, doc: &PdfDocument, page_num: usize) -> Result<PageInputs> {
        let include_text_layer = self.config.pipeline.include_text_layer;
        let render = (self.config.pipeline.send_page_image && self.client.info().supports_images)
            .then_some((self.config.pipeline.render_scale, self.config.pipeline.image_format));

        on_blocking_pool(doc, move |doc| {
            let size = doc.page_size(page_num)?;
            let hints = if include_text_layer {
                let lines = TextExtractor::new(doc).extract_page_lines(page_num)?;
                format_line_hints(&lines, MAX_HINT_CHARS)
            } else {
                String::new()
            };
            let image = render
                .map(|(scale, format)| PageRenderer::new(doc, scale).render_data_url(page_num, format))
                .transpose()?;
            Ok(PageInputs { size, hints, image })
        })
        .await
    }

    async fn extract(&self, page_num: usize, inputs: PageInputs) -> Result<PageExtraction> {
        let pipeline = &self.config.pipeline;
        let PageInputs { size, hints, image } = inputs;
        let (page_width, page_height) = (size.width, size.height);

        if hints.is_empty() && image.is_none() {
            warn!("Page {page_num}: no text layer and no page image; the model sees nothing");
        }

        let messages = prompts::extraction_messages(&ExtractionInput {
            page_num,
            page_width,
            page_height,
            text_hints: &hints,
            image: image.as_deref(),
            source_lang: &self.config.source_lang,
        });

        info!("Page {page_num}: extracting");
        let extraction = request_structured::<PageExtraction>(
            self.client.as_ref(),
            messages,
            &ExtractionContext {
                page_width,
                page_height,
            },
            pipeline.max_repair_attempts,
        )
        .await?;

        debug!(
            "Page {}: {} blocks, language {} ({:.2})",
            page_num,
            extraction.value.blocks.len(),
            extraction.value.detected_language,
            extraction.value.language_confidence
        );
        Ok(extraction.value)
    }

    /// Translate and score until the threshold is met or attempts run out.
    ///
    /// Returns the best attempt (ties go to the later one) and the number of
    /// attempts made.
    async fn translate_with_retry(
        &self,
        page_num: usize,
        blocks: &[&ExtractedBlock],
        source: &Lang,
    ) -> Result<(Attempt, u32)> {
        let threshold = self.config.pipeline.quality_threshold;
        let max_attempts = self.config.pipeline.max_translation_attempts.max(1);

        let mut made = 1;
        let mut last = self.attempt(page_num, blocks, source, made, None).await?;
        let mut best = last.clone();

        while last.assessment.score < threshold && made < max_attempts {
            warn!(
                "Page {page_num}: score {:.2} below threshold {threshold:.2}, retrying with feedback",
                last.assessment.score
            );
            made += 1;
            let feedback = RetryFeedback {
                previous: &last.translation,
                assessment: &last.assessment,
            };
            last = self.attempt(page_num, blocks, source, made, Some(feedback)).await?;

            if last.assessment.score >= best.assessment.score {
                best = last.clone();
            }
        }

        Ok((best, made))
    }

    /// One translate-then-score round
    async fn attempt(
        &self,
        page_num: usize,
        blocks: &[&ExtractedBlock],
        source: &Lang,
        attempt: u32,
        feedback: Option<RetryFeedback<'_>>,
    ) -> Result<Attempt> {
        let target = &self.config.target_lang;
        let max_repairs = self.config.pipeline.max_repair_attempts;
        let ids: Vec<&str> = blocks.iter().map(|b| b.id.as_str()).collect();

        info!("Page {page_num}: translating (attempt {attempt})");
        let translation = request_structured::<PageTranslation>(
            self.client.as_ref(),
            prompts::translation_messages(blocks, source, target, feedback),
            &TranslationContext::new(ids.iter().copied()),
            max_repairs,
        )
        .await?
        .value;

        info!("Page {page_num}: scoring attempt {attempt}");
        let assessment = request_structured::<QualityAssessment>(
            self.client.as_ref(),
            prompts::quality_messages(blocks, &translation, source, target),
            &QualityContext::new(ids.iter().copied()),
            max_repairs,
        )
        .await?
        .value;

        debug!(
            "Page {page_num}: attempt {attempt} scored {:.2} ({} issues)",
            assessment.score,
            assessment.issues.len()
        );

        Ok(Attempt {
            translation,
            assessment,
        })
    }

    /// Translate `pages` (0-based; empty = all pages) with bounded concurrency.
    ///
    /// Pages come back in the order requested. The first failing page fails
    /// the whole document.
    pub async fn translate_document(
        &self,
        doc: &PdfDocument,
        pages: &[usize],
        progress: Option<ProgressCallback>,
    ) -> Result<TranslatedDocument> {
        let pages: Vec<usize> = if pages.is_empty() {
            (0..doc.page_count()).collect()
        } else {
            pages.to_vec()
        };
        for &page in &pages {
            doc.page_index(page)?;
        }

        let total = pages.len();
        let done = AtomicUsize::new(0);
        let concurrency = self.config.pipeline.concurrency.max(1);
        info!("Translating {total} page(s), {concurrency} at a time");

        let translated: Vec<TranslatedPage> = stream::iter(pages)
            .map(|page_num| {
                let done = &done;
                let progress = progress.as_ref();
                async move {
                    let page = self.translate_page(doc, page_num).await?;
                    let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = progress {
                        callback(finished, total);
                    }
                    Ok::<_, crate::Error>(page)
                }
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        Ok(TranslatedDocument {
            id: uuid::Uuid::new_v4(),
            source_id: doc.source_id().to_string(),
            metadata: doc.metadata().clone(),
            source_lang: self.config.source_lang.clone(),
            target_lang: self.config.target_lang.clone(),
            model: self.client.info().model,
            pages: translated,
        })
    }
}
