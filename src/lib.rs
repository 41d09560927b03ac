//! # exam-ocr
//!
//! Transcribe scanned exam papers with a Vision Language Model, one
//! horizontal band at a time.
//!
//! ## Why bands?
//!
//! A full exam page sent as one image loses detail: the provider downsamples
//! it, and small handwriting or dense formulae come back wrong. Instead each
//! page is cut into bands of roughly `target_height` rows, and the cuts are
//! placed on rows where little is written (low horizontal pixel variance) so
//! no line of text is split. Each band is transcribed on its own and the
//! results are stitched back in reading order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / PNG / JPEG
//!  │
//!  ├─ 1. Input    resolve local file, sniff PDF magic
//!  ├─ 2. Render   rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Segment  row std-dev → smoothing → greedy cut search → bands
//!  ├─ 4. Persist  optional segments_p{N}/segment_{n}.png for inspection
//!  ├─ 5. VLM      one OCR call per band, pages fanned out concurrently
//!  ├─ 6. Clean    strip fences and invisible characters per band
//!  └─ 7. Output   "--- Page N ---" headings + per-page stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exam_ocr::{transcribe, TranscriptionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = TranscriptionConfig::default();
//!     let output = transcribe("exam.pdf", &config).await?;
//!     println!("{}", output.text);
//!     eprintln!("{} segments over {} pages",
//!         output.stats.total_segments,
//!         output.stats.processed_pages);
//!     Ok(())
//! }
//! ```
//!
//! The segmenter is usable on its own and needs no provider:
//!
//! ```rust
//! use exam_ocr::{segment, SegmenterConfig};
//! use image::{DynamicImage, GrayImage, Luma};
//!
//! let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 1000, Luma([255])));
//! let segments = segment(&page, &SegmenterConfig::default());
//! assert_eq!(segments.first().map(|s| s.start), Some(0));
//! assert_eq!(segments.last().map(|s| s.end), Some(1000));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `exam-ocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! exam-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod segmenter;
pub mod transcribe;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    PageSelection, PageSeparator, SegmenterConfig, TranscriptionConfig, TranscriptionConfigBuilder,
};
pub use error::{ExamOcrError, PageError, TranscribeError};
pub use output::{PageResult, PageSegments, SegmentResult, TranscriptionOutput, TranscriptionStats};
pub use pipeline::llm::{Transcriber, Transcription, VisionTranscriber};
pub use progress::{NoopProgressCallback, ProgressCallback, TranscriptionProgressCallback};
pub use segmenter::{segment, segment_bands, slice_bands, Band, Segment};
pub use transcribe::{
    segment_document, transcribe, transcribe_pages, transcribe_sync, transcribe_to_file,
};
