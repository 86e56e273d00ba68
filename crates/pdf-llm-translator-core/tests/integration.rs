//! Integration tests for pdf-llm-translator-core
//!
//! These tests drive the full page pipeline against a scripted model:
//! - PDF loading and text layer access
//! - Extraction, translation, scoring, and the retry loop
//! - Validation failures and repair
//! - Cache hits and forced re-translation
//! - Export to Markdown and PDF reconstruction

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use pdf_llm_translator_core::config::CacheConfig;
use pdf_llm_translator_core::pipeline::{
    SKIP_EMPTY_PAGE, SKIP_NOTHING_TRANSLATABLE, SKIP_TARGET_LANGUAGE,
};
use pdf_llm_translator_core::{
    AppConfig, ChatRequest, ClientInfo, Error, LlmClient, PdfDocument, PdfTranslator,
    ReconstructOptions, Result, overlay_pdf, to_markdown,
};

// =============================================================================
// Scripted Model Client
// =============================================================================

/// Answers each request according to the schema it asks for.
///
/// Replies queued for a schema are used first; once the queue is empty the
/// schema's default reply is returned.
struct ScriptedClient {
    queued: Mutex<HashMap<&'static str, VecDeque<String>>>,
    defaults: HashMap<&'static str, String>,
    requests: Mutex<Vec<ChatRequest>>,
    supports_images: bool,
}

impl ScriptedClient {
    fn new() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert("page_extraction", extraction_reply("fr"));
        defaults.insert("page_translation", translation_reply("Hello world", "First paragraph."));
        defaults.insert("quality_assessment", quality_reply(0.9));

        Self {
            queued: Mutex::new(HashMap::new()),
            defaults,
            requests: Mutex::new(Vec::new()),
            supports_images: false,
        }
    }

    fn with_default(mut self, schema: &'static str, reply: impl Into<String>) -> Self {
        self.defaults.insert(schema, reply.into());
        self
    }

    fn queue(self, schema: &'static str, replies: &[String]) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(schema)
            .or_default()
            .extend(replies.iter().cloned());
        self
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn calls_for(&self, schema: &str) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.response_schema.as_ref().is_some_and(|s| s.name == schema))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    fn info(&self) -> ClientInfo {
        ClientInfo {
            name: "scripted",
            model: "scripted-model".to_string(),
            supports_images: self.supports_images,
        }
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let schema = request
            .response_schema
            .as_ref()
            .map(|s| s.name)
            .ok_or_else(|| Error::LlmInvalidResponse("request without schema".to_string()))?;

        if let Some(reply) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(schema)
            .and_then(VecDeque::pop_front)
        {
            return Ok(reply);
        }
        self.defaults
            .get(schema)
            .cloned()
            .ok_or_else(|| Error::LlmInvalidResponse(format!("no reply for {schema}")))
    }
}

fn extraction_reply(language: &str) -> String {
    serde_json::json!({
        "detected_language": language,
        "language_confidence": 0.97,
        "blocks": [
            {
                "id": "b0", "kind": "title", "text": "Bonjour le monde", "reading_order": 0,
                "level": 1,
                "style": { "bold": true, "italic": false, "underline": false, "font_size": 24.0,
                           "alignment": "left", "color": null },
                "bbox": [100.0, 68.0, 420.0, 96.0]
            },
            {
                "id": "b1", "kind": "paragraph", "text": "Premier paragraphe.", "reading_order": 1,
                "level": null,
                "style": { "bold": false, "italic": false, "underline": false, "font_size": 12.0,
                           "alignment": "left", "color": "#333333" },
                "bbox": [100.0, 120.0, 500.0, 140.0]
            },
            {
                "id": "b2", "kind": "formula", "text": "E = mc^2", "reading_order": 2,
                "level": null,
                "style": { "bold": false, "italic": true, "underline": false, "font_size": null,
                           "alignment": "center", "color": null },
                "bbox": null
            }
        ]
    })
    .to_string()
}

fn translation_reply(title: &str, paragraph: &str) -> String {
    serde_json::json!({
        "translations": [
            { "id": "b0", "text": title },
            { "id": "b1", "text": paragraph }
        ]
    })
    .to_string()
}

fn quality_reply(score: f64) -> String {
    serde_json::json!({
        "score": score,
        "issues": if score < 0.75 {
            serde_json::json!([{ "block_id": "b1", "severity": "major", "description": "awkward wording" }])
        } else {
            serde_json::json!([])
        },
        "summary": format!("scored {score}")
    })
    .to_string()
}

// =============================================================================
// Test Fixtures
// =============================================================================

/// Build a PDF with one Helvetica line per page
fn create_test_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let page_tree_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter([(
        "Font",
        Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
    )]));

    let mut kids = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(page_tree_id)),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Reference(resources_id)),
            (
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
            ),
        ]));
        kids.push(Object::Reference(page_id));
    }

    let count = i64::try_from(kids.len()).unwrap();
    doc.objects.insert(
        page_tree_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ])),
    );

    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(page_tree_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut output = Vec::new();
    doc.save_to(&mut output).unwrap();
    output
}

fn load_test_pdf() -> PdfDocument {
    PdfDocument::from_bytes(create_test_pdf(&["Bonjour le monde", "Seconde page"]))
        .expect("Failed to load test PDF")
}

/// Memory-only cache, default pipeline settings
fn test_config() -> AppConfig {
    AppConfig {
        cache: CacheConfig {
            memory_enabled: true,
            disk_enabled: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn translator(client: &Arc<ScriptedClient>, config: AppConfig) -> PdfTranslator {
    PdfTranslator::with_client(Arc::clone(client) as Arc<dyn LlmClient>, config).unwrap()
}

// =============================================================================
// PDF Access
// =============================================================================

#[test]
fn test_pdf_loads_with_text_layer() {
    let doc = load_test_pdf();
    assert_eq!(doc.page_count(), 2);
    assert_eq!(doc.source_id().len(), 32);

    let extractor = pdf_llm_translator_core::pdf::TextExtractor::new(&doc);
    assert!(extractor.page_text(0).unwrap().contains("Bonjour le monde"));

    let lines = extractor.extract_page_lines(1).unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].text, "Seconde page");
    assert!(lines[0].bbox.x0 >= 99.0 && lines[0].bbox.y0 > 60.0 && lines[0].bbox.y1 < 110.0);
}

#[test]
fn test_page_size_and_bounds() {
    let doc = load_test_pdf();
    let size = doc.page_size(0).unwrap();
    assert!((size.width - 612.0).abs() < 0.5);
    assert!((size.height - 792.0).abs() < 0.5);
    assert!(matches!(doc.page_size(2), Err(Error::PdfInvalidPage { page: 2, total: 2 })));
}

#[test]
fn test_render_page_as_png_data_url() {
    let doc = load_test_pdf();
    let renderer = pdf_llm_translator_core::pdf::PageRenderer::new(&doc, 0.5);
    let image = renderer.render_page(0).unwrap();
    assert_eq!(image.width(), 306);

    let url = renderer
        .render_data_url(0, pdf_llm_translator_core::ImageFormat::Png)
        .unwrap();
    assert!(url.starts_with("data:image/png;base64,"));
}

// =============================================================================
// Pipeline
// =============================================================================

#[tokio::test]
async fn test_page_translated_on_first_attempt() {
    let client = Arc::new(ScriptedClient::new());
    let translator = translator(&client, test_config());
    let doc = load_test_pdf();

    let page = translator.translate_page(&doc, 0).await.unwrap();

    assert_eq!(client.calls(), 3, "extract, translate, score");
    assert_eq!(page.attempts, 1);
    assert!(page.passed);
    assert!(!page.from_cache);
    assert_eq!(page.detected_language, "fr");
    assert!((page.score().unwrap() - 0.9).abs() < 1e-9);

    assert_eq!(page.blocks.len(), 3);
    assert_eq!(page.blocks[0].translated_text, "Hello world");
    assert_eq!(page.blocks[0].source_text, "Bonjour le monde");
    assert!(page.blocks[0].style.bold);
    assert_eq!(page.blocks[1].translated_text, "First paragraph.");
    // Formulas pass through untouched
    assert_eq!(page.blocks[2].translated_text, "E = mc^2");

    // The formula is never sent for translation
    let translate = &client.calls_for("page_translation")[0];
    assert!(!translate.messages[1].text().contains("E = mc^2"));
}

#[tokio::test]
async fn test_extraction_prompt_carries_text_layer() {
    let client = Arc::new(ScriptedClient::new());
    let translator = translator(&client, test_config());
    translator.translate_page(&load_test_pdf(), 0).await.unwrap();

    let extract = &client.calls_for("page_extraction")[0];
    let prompt = extract.messages[1].text();
    assert!(prompt.contains("| Bonjour le monde"), "hints missing: {prompt}");
    assert!(!extract.messages[1].has_image(), "client does not take images");
}

#[tokio::test]
async fn test_page_image_sent_to_vision_client() {
    let mut client = ScriptedClient::new();
    client.supports_images = true;
    let client = Arc::new(client);
    let mut config = test_config();
    config.pipeline.render_scale = 0.5;
    let translator = translator(&client, config);

    translator.translate_page(&load_test_pdf(), 0).await.unwrap();

    assert!(client.calls_for("page_extraction")[0].messages[1].has_image());
}

#[tokio::test]
async fn test_low_score_triggers_retry_with_feedback() {
    let client = Arc::new(
        ScriptedClient::new()
            .queue(
                "page_translation",
                &[
                    translation_reply("Hello moon", "Paragraph first."),
                    translation_reply("Hello world", "First paragraph."),
                ],
            )
            .queue("quality_assessment", &[quality_reply(0.4), quality_reply(0.85)]),
    );
    let translator = translator(&client, test_config());

    let page = translator.translate_page(&load_test_pdf(), 0).await.unwrap();

    assert_eq!(client.calls(), 5);
    assert_eq!(page.attempts, 2);
    assert!(page.passed);
    assert_eq!(page.blocks[0].translated_text, "Hello world");

    let retry = &client.calls_for("page_translation")[1];
    let prompt = retry.messages[1].text();
    assert!(prompt.contains("Hello moon"), "previous attempt missing");
    assert!(prompt.contains("awkward wording"), "feedback missing");
}

#[tokio::test]
async fn test_best_attempt_kept_when_all_fail() {
    let client = Arc::new(
        ScriptedClient::new()
            .queue(
                "page_translation",
                &[
                    translation_reply("Better", "Better."),
                    translation_reply("Worse", "Worse."),
                ],
            )
            .queue("quality_assessment", &[quality_reply(0.6), quality_reply(0.3)]),
    );
    let translator = translator(&client, test_config());

    let page = translator.translate_page(&load_test_pdf(), 0).await.unwrap();

    assert_eq!(page.attempts, 2);
    assert!(!page.passed);
    assert!((page.score().unwrap() - 0.6).abs() < 1e-9);
    assert_eq!(page.blocks[0].translated_text, "Better");
}

#[tokio::test]
async fn test_score_tie_keeps_later_attempt() {
    let client = Arc::new(
        ScriptedClient::new()
            .queue(
                "page_translation",
                &[
                    translation_reply("First", "First."),
                    translation_reply("Second", "Second."),
                ],
            )
            .queue("quality_assessment", &[quality_reply(0.5), quality_reply(0.5)]),
    );
    let translator = translator(&client, test_config());

    let page = translator.translate_page(&load_test_pdf(), 0).await.unwrap();
    assert_eq!(page.blocks[0].translated_text, "Second");
}

#[tokio::test]
async fn test_single_attempt_configured() {
    let client = Arc::new(ScriptedClient::new().with_default("quality_assessment", quality_reply(0.2)));
    let mut config = test_config();
    config.pipeline.max_translation_attempts = 1;
    let translator = translator(&client, config);

    let page = translator.translate_page(&load_test_pdf(), 0).await.unwrap();
    assert_eq!(client.calls(), 3);
    assert_eq!(page.attempts, 1);
    assert!(!page.passed);
}

#[tokio::test]
async fn test_page_in_target_language_is_not_translated() {
    let client = Arc::new(ScriptedClient::new().with_default("page_extraction", extraction_reply("EN-us")));
    let translator = translator(&client, test_config());

    let page = translator.translate_page(&load_test_pdf(), 0).await.unwrap();

    assert_eq!(client.calls(), 1);
    assert_eq!(page.detected_language, "en-US");
    assert_eq!(page.skipped_reason.as_deref(), Some(SKIP_TARGET_LANGUAGE));
    assert_eq!(page.attempts, 0);
    assert!(page.quality.is_none());
    assert!(page.blocks.iter().all(|b| b.translated_text == b.source_text));
}

#[tokio::test]
async fn test_empty_page_short_circuits() {
    let client = Arc::new(ScriptedClient::new().with_default(
        "page_extraction",
        r#"{"detected_language": "und", "language_confidence": 0.0, "blocks": []}"#,
    ));
    let translator = translator(&client, test_config());
    let doc = PdfDocument::from_bytes(create_test_pdf(&[""])).unwrap();

    let page = translator.translate_page(&doc, 0).await.unwrap();

    assert_eq!(client.calls(), 1);
    assert!(page.blocks.is_empty());
    assert_eq!(page.skipped_reason.as_deref(), Some(SKIP_EMPTY_PAGE));
    assert!((page.score().unwrap() - 1.0).abs() < f64::EPSILON);
    assert!(page.passed);
}

#[tokio::test]
async fn test_page_of_formulas_and_code_is_not_translated() {
    let client = Arc::new(ScriptedClient::new().with_default(
        "page_extraction",
        serde_json::json!({
            "detected_language": "fr",
            "language_confidence": 0.8,
            "blocks": [
                { "id": "b0", "kind": "formula", "text": "a^2 + b^2 = c^2", "reading_order": 0 },
                { "id": "b1", "kind": "code", "text": "fn main() {}", "reading_order": 1 }
            ]
        })
        .to_string(),
    ));
    let translator = translator(&client, test_config());

    let page = translator.translate_page(&load_test_pdf(), 0).await.unwrap();

    assert_eq!(client.calls(), 1);
    assert_eq!(page.skipped_reason.as_deref(), Some(SKIP_NOTHING_TRANSLATABLE));
    assert!((page.score().unwrap() - 1.0).abs() < f64::EPSILON);
    assert!(page.passed);
    assert_eq!(page.attempts, 0);
    assert!(page.blocks.iter().all(|b| b.translated_text == b.source_text));
}

#[tokio::test]
async fn test_configured_source_language_names_prompts() {
    let client = Arc::new(ScriptedClient::new());
    let mut config = test_config();
    config.source_lang = "de".into();
    let translator = translator(&client, config);

    let page = translator.translate_page(&load_test_pdf(), 0).await.unwrap();
    assert_eq!(page.detected_language, "fr");

    let translate = client.calls_for("page_translation")[0].messages[1].text();
    assert!(translate.contains("from German into English"), "{translate}");
    let review = client.calls_for("quality_assessment")[0].messages[1].text();
    assert!(review.contains("from German into English"), "{review}");
}

#[tokio::test]
async fn test_detected_language_names_prompts_when_auto() {
    let client = Arc::new(ScriptedClient::new());
    let translator = translator(&client, test_config());

    translator.translate_page(&load_test_pdf(), 0).await.unwrap();

    let translate = client.calls_for("page_translation")[0].messages[1].text();
    assert!(translate.contains("from French into English"), "{translate}");
}

#[tokio::test]
async fn test_invalid_extraction_is_repaired() {
    let client = Arc::new(ScriptedClient::new().queue(
        "page_extraction",
        &["Sure! Here is the page: {\"detected_language\": \"fr\", \"blocks\": [".to_string()],
    ));
    let translator = translator(&client, test_config());

    let page = translator.translate_page(&load_test_pdf(), 0).await.unwrap();

    let extractions = client.calls_for("page_extraction");
    assert_eq!(extractions.len(), 2);
    // The repair turn echoes the bad reply and lists the problems
    let repair = &extractions[1];
    assert_eq!(repair.messages.len(), 4);
    assert_eq!(repair.temperature, Some(0.0));
    assert_eq!(page.blocks.len(), 3);
}

#[tokio::test]
async fn test_translation_missing_block_is_repaired() {
    let partial = serde_json::json!({ "translations": [{ "id": "b0", "text": "Hello world" }] }).to_string();
    let client = Arc::new(ScriptedClient::new().queue("page_translation", &[partial]));
    let translator = translator(&client, test_config());

    let page = translator.translate_page(&load_test_pdf(), 0).await.unwrap();

    let translations = client.calls_for("page_translation");
    assert_eq!(translations.len(), 2);
    assert!(translations[1].messages.last().unwrap().text().contains("b1"));
    assert_eq!(page.blocks[1].translated_text, "First paragraph.");
}

#[tokio::test]
async fn test_unrepairable_reply_fails_with_schema_error() {
    let client = Arc::new(ScriptedClient::new().with_default("page_extraction", "not json at all"));
    let translator = translator(&client, test_config());

    let err = translator.translate_page(&load_test_pdf(), 0).await.unwrap_err();

    match err {
        Error::SchemaValidation { contract, attempts, issues } => {
            assert_eq!(contract, "page_extraction");
            assert_eq!(attempts, 3);
            assert!(!issues.is_empty());
        }
        other => panic!("expected SchemaValidation, got {other:?}"),
    }
    assert_eq!(client.calls(), 3, "one call plus two repairs");
}

#[tokio::test]
async fn test_invalid_page_number() {
    let client = Arc::new(ScriptedClient::new());
    let translator = translator(&client, test_config());

    let result = translator.translate_page(&load_test_pdf(), 7).await;
    assert!(matches!(result, Err(Error::PdfInvalidPage { page: 7, total: 2 })));
    assert_eq!(client.calls(), 0);
}

// =============================================================================
// Cache
// =============================================================================

#[tokio::test]
async fn test_second_request_served_from_cache() {
    let client = Arc::new(ScriptedClient::new());
    let translator = translator(&client, test_config());
    let doc = load_test_pdf();

    let first = translator.translate_page(&doc, 0).await.unwrap();
    let second = translator.translate_page(&doc, 0).await.unwrap();

    assert_eq!(client.calls(), 3);
    assert!(second.from_cache);
    assert_eq!(second.blocks, first.blocks);

    let forced = translator.translate_page_force(&doc, 0, true).await.unwrap();
    assert!(!forced.from_cache);
    assert_eq!(client.calls(), 6);
}

#[tokio::test]
async fn test_page_below_threshold_is_not_cached() {
    let client = Arc::new(ScriptedClient::new().with_default("quality_assessment", quality_reply(0.3)));
    let translator = translator(&client, test_config());
    let doc = load_test_pdf();

    let first = translator.translate_page(&doc, 0).await.unwrap();
    assert!(!first.passed);
    assert_eq!(client.calls(), 5, "extract plus two translate/score rounds");

    let second = translator.translate_page(&doc, 0).await.unwrap();
    assert!(!second.from_cache);
    assert_eq!(second.attempts, 2);
    assert_eq!(client.calls(), 10);
}

#[tokio::test]
async fn test_disk_cache_shared_across_translators() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.cache = CacheConfig {
        memory_enabled: false,
        disk_enabled: true,
        disk_path: Some(dir.path().join("pages")),
        ..Default::default()
    };
    let client = Arc::new(ScriptedClient::new());
    let doc = load_test_pdf();

    {
        let translator = translator(&client, config.clone());
        translator.translate_page(&doc, 1).await.unwrap();
    }

    let page = translator(&client, config).translate_page(&doc, 1).await.unwrap();
    assert!(page.from_cache);
    assert_eq!(client.calls(), 3);
}

#[tokio::test]
async fn test_clear_cache_forces_new_calls() {
    let client = Arc::new(ScriptedClient::new());
    let translator = translator(&client, test_config());
    let doc = load_test_pdf();

    translator.translate_page(&doc, 0).await.unwrap();
    translator.clear_cache();
    let page = translator.translate_page(&doc, 0).await.unwrap();

    assert!(!page.from_cache);
    assert_eq!(client.calls(), 6);
}

// =============================================================================
// Documents & Export
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_document_renders_pages_concurrently_for_vision_client() {
    let mut client = ScriptedClient::new();
    client.supports_images = true;
    let client = Arc::new(client);
    let mut config = test_config();
    config.pipeline.concurrency = 2;
    config.pipeline.render_scale = 0.5;
    let translator = translator(&client, config);
    let doc = load_test_pdf();

    let translated = translator.translate_document(&doc, &[], None).await.unwrap();

    assert_eq!(translated.pages.len(), 2);
    let extractions = client.calls_for("page_extraction");
    assert_eq!(extractions.len(), 2);
    assert!(extractions.iter().all(|r| r.messages[1].has_image()));
    // The caller's handle stays usable after the blocking work
    assert_eq!(doc.page_count(), 2);
}

#[tokio::test]
async fn test_document_pages_in_order_with_progress() {
    let client = Arc::new(ScriptedClient::new());
    let mut config = test_config();
    config.pipeline.concurrency = 2;
    let translator = translator(&client, config);
    let doc = load_test_pdf();

    let progress_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&progress_calls);
    let translated = translator
        .translate_document(
            &doc,
            &[],
            Some(Box::new(move |done, total| {
                assert!(done <= total);
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .await
        .unwrap();

    assert_eq!(progress_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        translated.pages.iter().map(|p| p.page_num).collect::<Vec<_>>(),
        vec![0, 1]
    );
    assert_eq!(translated.source_id, doc.source_id());
    assert_eq!(translated.model, "scripted-model");
    assert_eq!(translated.failed_pages().count(), 0);
}

#[tokio::test]
async fn test_document_subset_and_failure() {
    let client = Arc::new(ScriptedClient::new());
    let translator = translator(&client, test_config());
    let doc = load_test_pdf();

    let translated = translator.translate_document(&doc, &[1], None).await.unwrap();
    assert_eq!(translated.pages.len(), 1);
    assert_eq!(translated.pages[0].page_num, 1);

    let err = translator.translate_document(&doc, &[0, 5], None).await.unwrap_err();
    assert!(matches!(err, Error::PdfInvalidPage { page: 5, .. }));
}

#[tokio::test]
async fn test_markdown_export() {
    let client = Arc::new(ScriptedClient::new());
    let translator = translator(&client, test_config());
    let translated = translator
        .translate_document(&load_test_pdf(), &[0], None)
        .await
        .unwrap();

    let md = to_markdown(&translated);
    assert!(md.starts_with("# Hello world\n\nFirst paragraph.\n\n$$\nE = mc^2\n$$"), "{md}");
}

#[tokio::test]
async fn test_pdf_reconstruction_draws_translation() {
    let client = Arc::new(ScriptedClient::new());
    let translator = translator(&client, test_config());
    let doc = load_test_pdf();
    let translated = translator.translate_document(&doc, &[0], None).await.unwrap();

    let bytes = overlay_pdf(doc.bytes(), &translated, &ReconstructOptions::default()).unwrap();

    let rebuilt = PdfDocument::from_bytes(bytes).unwrap();
    assert_eq!(rebuilt.page_count(), 2);
    let extractor = pdf_llm_translator_core::pdf::TextExtractor::new(&rebuilt);
    let text = extractor.page_text(0).unwrap();
    assert!(text.contains("Hello world"), "translated text missing: {text}");
    assert!(text.contains("First paragraph."));
    // Untranslated page is left alone
    assert!(extractor.page_text(1).unwrap().contains("Seconde page"));
}

#[tokio::test]
async fn test_pdf_reconstruction_keeps_only_translated_pages() {
    let client = Arc::new(ScriptedClient::new());
    let translator = translator(&client, test_config());
    let doc = load_test_pdf();
    let translated = translator.translate_document(&doc, &[1], None).await.unwrap();

    let options = ReconstructOptions {
        only_translated_pages: true,
        ..Default::default()
    };
    let rebuilt = PdfDocument::from_bytes(overlay_pdf(doc.bytes(), &translated, &options).unwrap()).unwrap();
    assert_eq!(rebuilt.page_count(), 1);
}
