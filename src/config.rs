//! Configuration types for segmented page transcription.
//!
//! Two structs split the knobs along the seam between the pure core and the
//! I/O around it:
//!
//! * [`SegmenterConfig`] — everything the cut search needs. `Copy`, tiny,
//!   and usable on its own without any provider or runtime.
//! * [`TranscriptionConfig`] — rendering, model, retry, and output knobs for
//!   the full pipeline, built via [`TranscriptionConfigBuilder`]. It embeds a
//!   `SegmenterConfig`.

use crate::error::ExamOcrError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

// ── Segmenter ────────────────────────────────────────────────────────────

/// Tuning for the row-variance segmenter.
///
/// The defaults reproduce the cut points the transcription prompts were tuned
/// against; change the weights only together with a re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Desired band height in rows. Default: 400.
    ///
    /// Pick it from the downstream model's effective resolution: bands much
    /// taller than the model's tile size get downscaled before it reads them.
    pub target_height: u32,

    /// Smallest acceptable band height in rows, except for the last band.
    /// Default: 200. Must not exceed `target_height`.
    pub min_height: u32,

    /// Weight of the linear height-deviation term. Default: 1.0.
    pub height_weight: f64,

    /// Weight of the squared row-dispersion term. Default: 5.0.
    pub std_weight: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            target_height: 400,
            min_height: 200,
            height_weight: 1.0,
            std_weight: 5.0,
        }
    }
}

impl SegmenterConfig {
    /// Default weights with the given heights.
    pub fn with_heights(target_height: u32, min_height: u32) -> Self {
        Self {
            target_height,
            min_height,
            ..Self::default()
        }
    }

    /// Preset with 800-row bands, for models that read tall strips well.
    pub fn tall() -> Self {
        Self::with_heights(800, 200)
    }

    /// Check the invariants the cut search relies on.
    pub fn validate(&self) -> Result<(), ExamOcrError> {
        if self.target_height == 0 {
            return Err(ExamOcrError::InvalidConfig(
                "target height must be ≥ 1".into(),
            ));
        }
        if self.min_height == 0 {
            return Err(ExamOcrError::InvalidConfig(
                "minimum height must be ≥ 1".into(),
            ));
        }
        if self.min_height > self.target_height {
            return Err(ExamOcrError::InvalidConfig(format!(
                "minimum height ({}) must not exceed target height ({})",
                self.min_height, self.target_height
            )));
        }
        for (name, w) in [
            ("height weight", self.height_weight),
            ("std weight", self.std_weight),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(ExamOcrError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {w}"
                )));
            }
        }
        Ok(())
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// Configuration for transcribing a document band by band.
///
/// Built via [`TranscriptionConfig::builder()`] or using
/// [`TranscriptionConfig::default()`].
///
/// # Example
/// ```rust
/// use exam_ocr::{SegmenterConfig, TranscriptionConfig};
///
/// let config = TranscriptionConfig::builder()
///     .dpi(150)
///     .concurrency(4)
///     .model("gpt-4o")
///     .segmenter(SegmenterConfig::tall())
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct TranscriptionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4000.
    ///
    /// A cap independent of DPI so an oversized page cannot exhaust memory.
    pub max_rendered_pixels: u32,

    /// Number of pages processed concurrently. Default: 4.
    ///
    /// Segments of one page are always transcribed one after another, so
    /// the number of in-flight model calls never exceeds this value.
    pub concurrency: usize,

    /// Model identifier, e.g. "gpt-4o". If None, "gpt-4o" is used.
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per segment. Default: 1500.
    pub max_tokens: usize,

    /// Retry attempts per segment on a failed model call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-segment model call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom transcription prompt. If None, uses [`crate::prompts::DEFAULT_OCR_PROMPT`].
    pub prompt: Option<String>,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Page separator in the assembled text. Default: [`PageSeparator::Header`].
    pub page_separator: PageSeparator,

    /// When set, every band is written to `segments_p{page}/segment_{n}.png`
    /// under this directory.
    pub segments_dir: Option<PathBuf>,

    /// Cut-search tuning.
    pub segmenter: SegmenterConfig,

    /// Per-page / per-segment progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 4000,
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 1500,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            password: None,
            prompt: None,
            pages: PageSelection::default(),
            page_separator: PageSeparator::default(),
            segments_dir: None,
            segmenter: SegmenterConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pages", &self.pages)
            .field("page_separator", &self.page_separator)
            .field("segments_dir", &self.segments_dir)
            .field("segmenter", &self.segmenter)
            .finish()
    }
}

impl TranscriptionConfig {
    /// Create a new builder for `TranscriptionConfig`.
    pub fn builder() -> TranscriptionConfigBuilder {
        TranscriptionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`TranscriptionConfig`].
#[derive(Debug)]
pub struct TranscriptionConfigBuilder {
    config: TranscriptionConfig,
}

impl TranscriptionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn segments_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.segments_dir = Some(dir.into());
        self
    }

    pub fn segmenter(mut self, segmenter: SegmenterConfig) -> Self {
        self.config.segmenter = segmenter;
        self
    }

    pub fn target_height(mut self, rows: u32) -> Self {
        self.config.segmenter.target_height = rows;
        self
    }

    pub fn min_height(mut self, rows: u32) -> Self {
        self.config.segmenter.min_height = rows;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranscriptionConfig, ExamOcrError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ExamOcrError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(ExamOcrError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        c.segmenter.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to transcribe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// How pages are marked in the assembled text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// `--- Page N ---` heading line before each page. (default)
    #[default]
    Header,
    /// No marker; pages are only separated by a blank line.
    Blank,
    /// Custom heading; `{page}` is replaced by the page number.
    Custom(String),
}

impl PageSeparator {
    /// Heading emitted before the page's text (1-indexed page number).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::Header => format!("--- Page {} ---\n", page_num),
            PageSeparator::Blank => String::new(),
            PageSeparator::Custom(s) => format!("{}\n", s.replace("{page}", &page_num.to_string())),
        }
    }
}
