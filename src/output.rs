//! Result types returned by the transcription entry points.
//!
//! Everything here is `Serialize` so the CLI can emit the whole run as JSON.

use crate::error::PageError;
use crate::segmenter::Segment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Full result of a transcription run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionOutput {
    /// Assembled document text, pages in order, each preceded by its separator.
    pub text: String,
    /// Per-page results sorted by page number, failed pages included.
    pub pages: Vec<PageResult>,
    pub stats: TranscriptionStats,
}

/// Outcome for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Segment transcriptions joined with `"\n"`. Empty when `error` is set.
    pub text: String,
    pub segments: Vec<SegmentResult>,
    pub duration_ms: u64,
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn input_tokens(&self) -> u64 {
        self.segments.iter().map(|s| s.input_tokens as u64).sum()
    }

    pub fn output_tokens(&self) -> u64 {
        self.segments.iter().map(|s| s.output_tokens as u64).sum()
    }
}

/// Outcome for one band of a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentResult {
    /// 1-indexed position within the page.
    pub index: usize,
    pub segment: Segment,
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
    /// Where the band was written, when a segments directory is configured.
    pub saved_path: Option<PathBuf>,
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionStats {
    /// Pages handed to the pipeline (after page selection).
    pub total_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    pub total_segments: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub transcribe_duration_ms: u64,
}

/// Segmentation-only result for one page (no model calls).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSegments {
    pub page_num: usize,
    pub width: u32,
    pub height: u32,
    pub segments: Vec<Segment>,
    pub saved_paths: Vec<PathBuf>,
}
