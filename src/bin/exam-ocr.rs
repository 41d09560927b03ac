//! CLI binary for exam-ocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `TranscriptionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use exam_ocr::{
    segment_document, transcribe, transcribe_to_file, PageSelection, PageSeparator,
    ProgressCallback, SegmenterConfig, TranscriptionConfig, TranscriptionProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over pages, plus a log line per
/// finished page. Pages complete out of order when concurrency > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Segment count per page, printed with the completion line.
    segment_counts: Mutex<HashMap<usize, usize>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rasterising…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            segment_counts: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
    }

    /// Remove and return the elapsed milliseconds for a page.
    fn take_elapsed_ms(&self, page_num: usize) -> u128 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl TranscriptionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize, segment_count: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        if let Ok(mut m) = self.segment_counts.lock() {
            m.insert(page_num, segment_count);
        }
        self.bar
            .set_message(format!("page {page_num}: 0/{segment_count} segments"));
    }

    fn on_segment_complete(&self, page_num: usize, segment: usize, segment_count: usize) {
        self.bar
            .set_message(format!("page {page_num}: {segment}/{segment_count} segments"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let elapsed_ms = self.take_elapsed_ms(page_num);
        let segments = self
            .segment_counts
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<12}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{segments:>2} segments")),
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed_ms = self.take_elapsed_ms(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages transcribed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages transcribed  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Transcribe an exam to stdout
  exam-ocr exam.pdf

  # Transcribe to a file
  exam-ocr exam.pdf -o exam.txt

  # A single scanned page
  exam-ocr page_03.png

  # Taller bands for sparse handwriting, keep the band images
  exam-ocr --target-height 800 --save-segments segments/ exam.pdf

  # Only segment (no API key needed), report cuts as JSON
  exam-ocr --segments-only --json exam.pdf

  # Specific pages with a specific model
  exam-ocr --pages 2-4 --provider openai --model gpt-4o exam.pdf

OUTPUT FORMAT:
  Each transcribed page is written as
      --- Page N ---
      <segment 1 text>
      <segment 2 text>
      ...
  followed by a blank line. Use --separator to change the heading.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Override log filter (e.g. exam_ocr=debug)
"#;

/// Transcribe scanned exam papers with Vision LLMs, band by band.
#[derive(Parser, Debug)]
#[command(
    name = "exam-ocr",
    version,
    about = "Transcribe scanned exam papers with Vision LLMs, band by band",
    long_about = "Cut each page of a scanned exam (PDF, PNG or JPEG) into horizontal bands at \
low-ink rows, transcribe every band with a Vision Language Model, and stitch the text back \
together under per-page headings.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file or page image (png, jpg, jpeg).
    input: String,

    /// Write the transcript to this file instead of stdout.
    #[arg(short, long, env = "EXAM_OCR_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (default: gpt-4o).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Rendering DPI for PDF pages (72–400).
    #[arg(long, env = "EXAM_OCR_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Number of pages transcribed concurrently.
    #[arg(short, long, env = "EXAM_OCR_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "EXAM_OCR_PAGES", default_value = "all")]
    pages: String,

    /// Preferred band height in rows.
    #[arg(long, env = "EXAM_OCR_TARGET_HEIGHT", default_value_t = 400)]
    target_height: u32,

    /// Minimum band height in rows (except for the final band).
    #[arg(long, env = "EXAM_OCR_MIN_HEIGHT", default_value_t = 200)]
    min_height: u32,

    /// Cost weight for deviating from the target height.
    #[arg(long, default_value_t = 1.0)]
    height_weight: f64,

    /// Cost weight for cutting through ink (squared smoothed std-dev).
    #[arg(long, default_value_t = 5.0)]
    std_weight: f64,

    /// Write every band to DIR/segments_p{N}/segment_{n}.png.
    #[arg(long, value_name = "DIR", env = "EXAM_OCR_SAVE_SEGMENTS")]
    save_segments: Option<PathBuf>,

    /// Segment only: report the cuts, make no model calls.
    #[arg(long)]
    segments_only: bool,

    /// Page heading: header, blank, or a custom string ({page} is replaced).
    #[arg(long, env = "EXAM_OCR_SEPARATOR", default_value = "header")]
    separator: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "EXAM_OCR_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom OCR prompt.
    #[arg(long, env = "EXAM_OCR_PROMPT")]
    prompt: Option<PathBuf>,

    /// Max LLM output tokens per band.
    #[arg(long, env = "EXAM_OCR_MAX_TOKENS", default_value_t = 1500)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "EXAM_OCR_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per band on LLM failure.
    #[arg(long, env = "EXAM_OCR_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-band LLM call timeout in seconds.
    #[arg(long, env = "EXAM_OCR_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Output structured JSON instead of plain text.
    #[arg(long, env = "EXAM_OCR_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "EXAM_OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EXAM_OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EXAM_OCR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would interleave with the bar; the bar carries the same news.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.segments_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn TranscriptionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Segment-only mode ────────────────────────────────────────────────
    if cli.segments_only {
        let pages = segment_document(&cli.input, &config)
            .await
            .context("Segmentation failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&pages).context("Failed to serialise segments")?
            );
        } else {
            for page in &pages {
                println!(
                    "Page {:>3}  {}x{}  {} segments",
                    page.page_num,
                    page.width,
                    page.height,
                    page.segments.len()
                );
                for (i, s) in page.segments.iter().enumerate() {
                    println!("  {:>2}: rows {:>5}..{:<5} ({} rows)", i + 1, s.start, s.end, s.height());
                }
            }
        }
        return Ok(());
    }

    // ── Run transcription ────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = transcribe_to_file(&cli.input, output_path, &config)
            .await
            .context("Transcription failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {}/{} pages  {} segments  {}ms  →  {}",
                if stats.failed_pages == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                stats.processed_pages,
                stats.total_pages,
                stats.total_segments,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.total_input_tokens.to_string()),
                dim(&stats.total_output_tokens.to_string()),
            );
        }
    } else {
        let output = transcribe(&cli.input, &config)
            .await
            .context("Transcription failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.text.as_bytes())
                .context("Failed to write to stdout")?;
        }

        if !cli.quiet && !show_progress && !cli.json {
            eprintln!(
                "Transcribed {}/{} pages ({} segments) in {}ms",
                output.stats.processed_pages,
                output.stats.total_pages,
                output.stats.total_segments,
                output.stats.total_duration_ms
            );
            if output.stats.failed_pages > 0 {
                eprintln!("  {} pages failed", output.stats.failed_pages);
            }
        } else if !cli.quiet && !cli.json {
            eprintln!(
                "   {} tokens in  /  {} tokens out  ·  {}ms total",
                dim(&output.stats.total_input_tokens.to_string()),
                dim(&output.stats.total_output_tokens.to_string()),
                output.stats.total_duration_ms,
            );
        }
    }

    Ok(())
}

/// Map CLI args to `TranscriptionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<TranscriptionConfig> {
    let prompt = if let Some(ref path) = cli.prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let segmenter = SegmenterConfig {
        target_height: cli.target_height,
        min_height: cli.min_height,
        height_weight: cli.height_weight,
        std_weight: cli.std_weight,
    };

    let mut builder = TranscriptionConfig::builder()
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .pages(parse_pages(&cli.pages)?)
        .page_separator(parse_separator(&cli.separator))
        .segmenter(segmenter)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(prompt) = prompt {
        builder = builder.prompt(prompt);
    }
    if let Some(ref dir) = cli.save_segments {
        builder = builder.segments_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "header" => PageSeparator::Header,
        "blank" | "none" => PageSeparator::Blank,
        _ => PageSeparator::Custom(s.to_string()),
    }
}
