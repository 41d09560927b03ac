//! Eager (full-document) transcription entry points.
//!
//! Every page goes through the same steps: segment into bands, optionally
//! write the bands to disk, transcribe band by band, clean each band's text,
//! and join the bands with `"\n"`. Pages are independent, so they fan out
//! with `buffer_unordered(concurrency)` and are sorted back into page order
//! before assembly. Bands of one page stay sequential to keep their order
//! and bound the number of in-flight calls.

use crate::config::{PageSeparator, TranscriptionConfig};
use crate::error::{ExamOcrError, PageError, TranscribeError};
use crate::output::{PageResult, PageSegments, SegmentResult, TranscriptionOutput, TranscriptionStats};
use crate::pipeline::input::{self, InputKind};
use crate::pipeline::llm::{Transcriber, Transcription, VisionTranscriber};
use crate::pipeline::render::{self, RenderedDocument};
use crate::pipeline::{persist, postprocess};
use crate::prompts::resolve_prompt;
use crate::segmenter::{self, Band};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Default model when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Transcribe a PDF or page image to text.
///
/// # Returns
/// `Ok(TranscriptionOutput)` on success, even if some pages failed
/// (check `output.stats.failed_pages`).
///
/// # Errors
/// Returns `Err(ExamOcrError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - Provider not configured
/// - All pages failed
pub async fn transcribe(
    input_str: impl AsRef<str>,
    config: &TranscriptionConfig,
) -> Result<TranscriptionOutput, ExamOcrError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting transcription: {}", input_str);
    config.segmenter.validate()?;

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let input = input::resolve_input(input_str)?;

    // ── Step 2: Get/create provider ──────────────────────────────────────
    let provider = resolve_provider(config)?;
    let transcriber = VisionTranscriber::from_config(provider, config);

    // ── Step 3: Rasterise ────────────────────────────────────────────────
    let render_start = Instant::now();
    let document = rasterise(&input, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!(
        "Rasterised {} of {} pages in {}ms",
        document.pages.len(),
        document.total_pages,
        render_duration_ms
    );

    // ── Step 4: Segment + transcribe ─────────────────────────────────────
    let mut output = transcribe_pages(&transcriber, document.pages, config).await?;
    output.stats.render_duration_ms = render_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Transcription complete: {}/{} pages, {} segments, {}ms total",
        output.stats.processed_pages,
        output.stats.total_pages,
        output.stats.total_segments,
        output.stats.total_duration_ms
    );

    Ok(output)
}

/// Transcribe already-rasterised pages with any [`Transcriber`].
///
/// `pages` holds `(page_index_0based, image)` pairs; their order does not
/// matter. This is the entry point for callers that bring their own
/// rasteriser or their own transcription backend.
pub async fn transcribe_pages<T: Transcriber>(
    transcriber: &T,
    pages: Vec<(usize, DynamicImage)>,
    config: &TranscriptionConfig,
) -> Result<TranscriptionOutput, ExamOcrError> {
    let start = Instant::now();
    let total_pages = pages.len();
    let prompt = resolve_prompt(config.prompt.as_deref());

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total_pages);
    }

    let mut results: Vec<PageResult> = stream::iter(pages.into_iter().map(|(idx, image)| {
        process_page(transcriber, idx + 1, image, total_pages, prompt, config)
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;

    results.sort_by_key(|p| p.page_num);

    let processed = results.iter().filter(|p| p.error.is_none()).count();
    let failed = results.len() - processed;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total_pages, processed);
    }

    if processed == 0 && !results.is_empty() {
        let first_error = results
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());

        return Err(ExamOcrError::AllPagesFailed {
            total: results.len(),
            retries: config.max_retries,
            first_error,
        });
    }

    let text = assemble_document(&results, &config.page_separator);
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let stats = TranscriptionStats {
        total_pages,
        processed_pages: processed,
        failed_pages: failed,
        total_segments: results.iter().map(|p| p.segments.len()).sum(),
        total_input_tokens: results.iter().map(PageResult::input_tokens).sum(),
        total_output_tokens: results.iter().map(PageResult::output_tokens).sum(),
        total_duration_ms: elapsed_ms,
        render_duration_ms: 0,
        transcribe_duration_ms: elapsed_ms,
    };

    Ok(TranscriptionOutput {
        text,
        pages: results,
        stats,
    })
}

/// Transcribe and write the text directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn transcribe_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &TranscriptionConfig,
) -> Result<TranscriptionStats, ExamOcrError> {
    let output = transcribe(input_str, config).await?;
    write_atomic(output_path.as_ref(), &output.text).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`transcribe`].
///
/// Creates a temporary tokio runtime internally.
pub fn transcribe_sync(
    input_str: impl AsRef<str>,
    config: &TranscriptionConfig,
) -> Result<TranscriptionOutput, ExamOcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExamOcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(transcribe(input_str, config))
}

/// Rasterise and segment without calling any model.
///
/// Does not require a provider or API key. Bands are written when
/// `config.segments_dir` is set.
pub async fn segment_document(
    input_str: impl AsRef<str>,
    config: &TranscriptionConfig,
) -> Result<Vec<PageSegments>, ExamOcrError> {
    config.segmenter.validate()?;
    let input = input::resolve_input(input_str.as_ref())?;
    let document = rasterise(&input, config).await?;

    let segmenter_config = config.segmenter;
    let segments_dir = config.segments_dir.clone();

    tokio::task::spawn_blocking(move || {
        document
            .pages
            .into_iter()
            .map(|(idx, image)| {
                let page_num = idx + 1;
                let bands = segmenter::segment_bands(&image, &segmenter_config);
                let saved_paths = match segments_dir {
                    Some(ref dir) => persist::save_bands(dir, page_num, &bands)?,
                    None => Vec::new(),
                };
                Ok(PageSegments {
                    page_num,
                    width: image.width(),
                    height: image.height(),
                    segments: bands.iter().map(|b| b.segment).collect(),
                    saved_paths,
                })
            })
            .collect::<Result<Vec<_>, ExamOcrError>>()
    })
    .await
    .map_err(|e| ExamOcrError::Internal(format!("Segmentation task panicked: {}", e)))?
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn rasterise(
    input: &InputKind,
    config: &TranscriptionConfig,
) -> Result<RenderedDocument, ExamOcrError> {
    match input {
        InputKind::Pdf(path) => render::render_pages(path, config).await,
        InputKind::Image(path) => render::load_image(path).await,
    }
}

/// Segment one page and transcribe its bands in order.
///
/// Always returns a `PageResult`; a failing band marks the whole page failed
/// so half-transcribed pages never reach the assembled text.
async fn process_page<T: Transcriber>(
    transcriber: &T,
    page_num: usize,
    image: DynamicImage,
    total_pages: usize,
    prompt: &str,
    config: &TranscriptionConfig,
) -> PageResult {
    let start = Instant::now();

    let (bands, saved_paths) = match prepare_bands(page_num, image, config).await {
        Ok(prepared) => prepared,
        Err(e) => return fail_page(page_num, total_pages, Vec::new(), start, e, config),
    };
    let segment_count = bands.len();
    debug!("Page {}: {} segments", page_num, segment_count);

    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page_num, total_pages, segment_count);
    }

    let mut segments = Vec::with_capacity(segment_count);
    for (i, (band, saved_path)) in bands.iter().zip(saved_paths).enumerate() {
        let segment_num = i + 1;
        match transcribe_band(transcriber, band, prompt, page_num, segment_num, config).await {
            Ok((transcription, retries)) => {
                segments.push(SegmentResult {
                    index: segment_num,
                    segment: band.segment,
                    text: postprocess::clean_transcript(&transcription.text),
                    input_tokens: transcription.input_tokens,
                    output_tokens: transcription.output_tokens,
                    retries,
                    saved_path,
                });
                if let Some(ref cb) = config.progress_callback {
                    cb.on_segment_complete(page_num, segment_num, segment_count);
                }
            }
            Err(e) => return fail_page(page_num, total_pages, segments, start, e, config),
        }
    }

    let text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if let Some(ref cb) = config.progress_callback {
        cb.on_page_complete(page_num, total_pages, text.len());
    }

    PageResult {
        page_num,
        text,
        segments,
        duration_ms: start.elapsed().as_millis() as u64,
        error: None,
    }
}

/// Segment the page and, when configured, write its bands. CPU-bound and
/// blocking, so it runs on the blocking pool.
async fn prepare_bands(
    page_num: usize,
    image: DynamicImage,
    config: &TranscriptionConfig,
) -> Result<(Vec<Band>, Vec<Option<PathBuf>>), PageError> {
    let segmenter_config = config.segmenter;
    let segments_dir = config.segments_dir.clone();

    let (bands, saved) = tokio::task::spawn_blocking(move || {
        let bands = segmenter::segment_bands(&image, &segmenter_config);
        let saved = segments_dir.map(|dir| persist::save_bands(&dir, page_num, &bands));
        (bands, saved)
    })
    .await
    .map_err(|e| PageError::SegmentationFailed {
        page: page_num,
        detail: e.to_string(),
    })?;

    let saved_paths = match saved {
        Some(Ok(paths)) => paths.into_iter().map(Some).collect(),
        Some(Err(e)) => {
            // Debug output only; the transcription itself is unaffected.
            warn!("Page {}: {}", page_num, e);
            vec![None; bands.len()]
        }
        None => vec![None; bands.len()],
    };

    Ok((bands, saved_paths))
}

/// Transcribe one band with timeout and exponential-backoff retries.
///
/// Returns the transcription and the number of retries it took. Encoding
/// failures are deterministic and not retried.
async fn transcribe_band<T: Transcriber>(
    transcriber: &T,
    band: &Band,
    prompt: &str,
    page_num: usize,
    segment_num: usize,
    config: &TranscriptionConfig,
) -> Result<(Transcription, u32), PageError> {
    let timeout_secs = config.api_timeout_secs.max(1);
    let timeout = Duration::from_secs(timeout_secs);
    let mut last_err: Option<PageError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "Page {} segment {}: retry {}/{} after {}ms",
                page_num, segment_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match tokio::time::timeout(timeout, transcriber.transcribe(&band.image, prompt)).await {
            Ok(Ok(transcription)) => return Ok((transcription, attempt)),
            Ok(Err(e @ TranscribeError::Encoding(_))) => {
                return Err(PageError::TranscriptionFailed {
                    page: page_num,
                    segment: segment_num,
                    retries: attempt,
                    detail: e.to_string(),
                });
            }
            Ok(Err(e)) => {
                warn!(
                    "Page {} segment {}: attempt {} failed: {}",
                    page_num,
                    segment_num,
                    attempt + 1,
                    e
                );
                last_err = Some(PageError::TranscriptionFailed {
                    page: page_num,
                    segment: segment_num,
                    retries: attempt,
                    detail: e.to_string(),
                });
            }
            Err(_) => {
                warn!(
                    "Page {} segment {}: attempt {} timed out after {}s",
                    page_num,
                    segment_num,
                    attempt + 1,
                    timeout_secs
                );
                last_err = Some(PageError::Timeout {
                    page: page_num,
                    segment: segment_num,
                    secs: timeout_secs,
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| PageError::TranscriptionFailed {
        page: page_num,
        segment: segment_num,
        retries: config.max_retries,
        detail: "Unknown error".to_string(),
    }))
}

fn fail_page(
    page_num: usize,
    total_pages: usize,
    segments: Vec<SegmentResult>,
    start: Instant,
    error: PageError,
    config: &TranscriptionConfig,
) -> PageResult {
    warn!("{}", error);
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_error(page_num, total_pages, &error.to_string());
    }
    PageResult {
        page_num,
        text: String::new(),
        segments,
        duration_ms: start.elapsed().as_millis() as u64,
        error: Some(error),
    }
}

/// Assemble successful pages: separator heading, page text, blank line.
fn assemble_document(pages: &[PageResult], separator: &PageSeparator) -> String {
    let mut out = String::new();
    for page in pages.iter().filter(|p| p.error.is_none()) {
        out.push_str(&separator.render(page.page_num));
        out.push_str(&page.text);
        out.push_str("\n\n");
    }
    out
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), ExamOcrError> {
    let write_err = |e: std::io::Error| ExamOcrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ExamOcrError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExamOcrError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the provider, from most-specific to least-specific:
///
/// 1. `config.provider` — used as-is
/// 2. `config.provider_name` + `config.model`
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. `ProviderFactory::from_env` auto-detection
fn resolve_provider(config: &TranscriptionConfig) -> Result<Arc<dyn LLMProvider>, ExamOcrError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExamOcrError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
