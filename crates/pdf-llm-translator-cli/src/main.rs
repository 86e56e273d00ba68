//! PDF LLM Translator CLI - translate PDF documents through a language model.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_llm_translator_core::{
    AppConfig, Lang, PdfDocument, PdfTranslator, ReconstructOptions, TextColor, TranslatedDocument,
    clear_page_cache, overlay_pdf, to_json, to_markdown,
};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Structured translation, readable back by other tools
    Json,
    Markdown,
    /// Original PDF with the translation drawn over the source text
    Pdf,
}

impl OutputFormat {
    const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
            Self::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOption {
    Black,
    DarkRed,
    Blue,
    DarkGreen,
}

impl From<ColorOption> for TextColor {
    fn from(opt: ColorOption) -> Self {
        match opt {
            ColorOption::Black => Self::black(),
            ColorOption::DarkRed => Self::dark_red(),
            ColorOption::Blue => Self::blue(),
            ColorOption::DarkGreen => Self::dark_green(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pdf-llm-translate")]
#[command(author, version, about = "Translate PDF documents with a language model", long_about = None)]
struct Args {
    /// Input PDF file
    #[arg(required_unless_present = "clear_cache")]
    input: Option<PathBuf>,

    /// Output file (default: <input>-<target>.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source language code, or "auto" to detect
    #[arg(short = 's', long)]
    source: Option<String>,

    /// Target language code
    #[arg(short = 't', long)]
    target: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Translate only specific pages (e.g., "1-5" or "1,3,5")
    #[arg(long)]
    pages: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Minimum quality score (0.0-1.0) before a page is retranslated
    #[arg(long)]
    threshold: Option<f64>,

    /// Translation attempts per page, counting the first
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Do not send rendered page images to the model
    #[arg(long)]
    no_image: bool,

    /// Pages processed at the same time
    #[arg(long)]
    concurrency: Option<usize>,

    /// Text color for PDF output (default: each block's own color)
    #[arg(long, value_enum)]
    color: Option<ColorOption>,

    /// PDF output keeps only the translated pages
    #[arg(long)]
    only_translated: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable caching
    #[arg(long)]
    no_cache: bool,

    /// Clear the page cache before running (exits if no input is given)
    #[arg(long)]
    clear_cache: bool,
}

/// Parse a 1-based page list like "1-3,5" into sorted 0-based indices.
/// Pages outside the document are dropped.
fn parse_page_range(pages: &str, total: usize) -> Result<Vec<usize>> {
    let mut result = Vec::new();

    for part in pages.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start.trim().parse().context("Invalid page range start")?;
            let end: usize = end.trim().parse().context("Invalid page range end")?;
            result.extend((start..=end).filter(|&p| p > 0 && p <= total).map(|p| p - 1));
        } else {
            let page: usize = part.parse().context("Invalid page number")?;
            if page > 0 && page <= total {
                result.push(page - 1);
            }
        }
    }

    result.sort_unstable();
    result.dedup();
    Ok(result)
}

fn default_output_path(input: &Path, target: &Lang, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}-{target}.{}", format.extension()))
}

/// Apply command-line overrides on top of the loaded config
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(source) = &args.source {
        config.source_lang = Lang::new(source);
    }
    if let Some(target) = &args.target {
        config.target_lang = Lang::new(target);
    }
    if let Some(api_base) = &args.api_base {
        config.llm.api_base.clone_from(api_base);
    }
    if args.api_key.is_some() {
        config.llm.api_key.clone_from(&args.api_key);
    }
    if let Some(model) = &args.model {
        config.llm.model.clone_from(model);
    }
    if let Some(threshold) = args.threshold {
        config.pipeline.quality_threshold = threshold;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.pipeline.max_translation_attempts = max_attempts;
    }
    if let Some(concurrency) = args.concurrency {
        config.pipeline.concurrency = concurrency;
    }
    if args.no_image {
        config.pipeline.send_page_image = false;
    }
    if args.no_cache {
        config.cache.memory_enabled = false;
        config.cache.disk_enabled = false;
    }
}

fn render_output(args: &Args, doc: &PdfDocument, translated: &TranslatedDocument) -> Result<Vec<u8>> {
    Ok(match args.format {
        OutputFormat::Json => to_json(translated)
            .context("Failed to serialize translation")?
            .into_bytes(),
        OutputFormat::Markdown => to_markdown(translated).into_bytes(),
        OutputFormat::Pdf => {
            let options = ReconstructOptions {
                text_color: args.color.map_or_else(TextColor::black, Into::into),
                force_color: args.color.is_some(),
                only_translated_pages: args.only_translated,
                ..Default::default()
            };
            overlay_pdf(doc.bytes(), translated, &options).context("Failed to rebuild PDF")?
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing args so env-backed flags see it
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };
    apply_overrides(&mut config, &args);

    if args.clear_cache {
        let removed = clear_page_cache(config.cache.disk_path.clone()).context("Failed to clear cache")?;
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Cleared {removed} cached page(s)");
        }
    }

    let Some(input) = args.input.clone() else {
        return Ok(());
    };

    config.validate().context("Invalid configuration")?;

    info!("Loading PDF: {}", input.display());
    let doc = PdfDocument::from_file(&input)
        .with_context(|| format!("Failed to load PDF: {}", input.display()))?;

    let total_pages = doc.page_count();
    info!("Document has {} pages", total_pages);

    let pages = if let Some(ref page_spec) = args.pages {
        parse_page_range(page_spec, total_pages)?
    } else {
        (0..total_pages).collect()
    };

    if pages.is_empty() {
        anyhow::bail!("No valid pages to translate");
    }

    let translator = PdfTranslator::new(config.clone()).context("Failed to initialize translator")?;

    let pb = ProgressBar::new(pages.len() as u64);
    // Template is hardcoded and valid
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(format!("{} -> {}", config.source_lang, config.target_lang));

    let progress_bar = pb.clone();
    let translated = translator
        .translate_document(
            &doc,
            &pages,
            Some(Box::new(move |done, _total| progress_bar.set_position(done as u64))),
        )
        .await
        .context("Translation failed")?;

    pb.finish_with_message("Translation complete");

    for page in &translated.pages {
        if page.from_cache {
            pb.println(format!("Page {} (cached)", page.page_num + 1));
        }
        if let Some(reason) = &page.skipped_reason {
            pb.println(format!("Page {} skipped: {reason}", page.page_num + 1));
        }
    }
    for page in translated.failed_pages() {
        pb.println(format!(
            "Warning: page {} scored {:.2}, below threshold {:.2} after {} attempt(s)",
            page.page_num + 1,
            page.score().unwrap_or_default(),
            config.pipeline.quality_threshold,
            page.attempts
        ));
    }

    let output_bytes = render_output(&args, &doc, &translated)?;
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&input, &config.target_lang, args.format));

    std::fs::write(&output_path, output_bytes)
        .with_context(|| format!("Failed to write output: {}", output_path.display()))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        if let Some(score) = translated.average_score() {
            println!("Average quality score: {score:.2}");
        }
        println!("Translation saved to: {}", output_path.display());
    }

    Ok(())
}
