//! Progress-callback trait for per-page and per-segment events.
//!
//! Inject an [`Arc<dyn TranscriptionProgressCallback>`] via
//! [`crate::config::TranscriptionConfigBuilder::progress_callback`]. The CLI
//! uses it to drive its progress bar; library callers can forward events to a
//! channel, a log, or a database row.
//!
//! # Example
//!
//! ```rust
//! use exam_ocr::{TranscriptionConfig, TranscriptionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SegmentCounter(AtomicUsize);
//!
//! impl TranscriptionProgressCallback for SegmentCounter {
//!     fn on_segment_complete(&self, _page: usize, _segment: usize, _of: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = TranscriptionConfig::builder()
//!     .progress_callback(Arc::new(SegmentCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it works through pages and their bands.
///
/// Pages run concurrently, so page-level methods may be called from several
/// tasks at once; segment events of a single page arrive in order. All
/// methods default to no-ops.
pub trait TranscriptionProgressCallback: Send + Sync {
    /// Called once, after rasterisation, with the number of selected pages.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a page has been segmented and its first band is about to be sent.
    fn on_page_start(&self, page_num: usize, total_pages: usize, segment_count: usize) {
        let _ = (page_num, total_pages, segment_count);
    }

    /// Called after each band is transcribed (1-indexed `segment`).
    fn on_segment_complete(&self, page_num: usize, segment: usize, segment_count: usize) {
        let _ = (page_num, segment, segment_count);
    }

    /// Called when every band of a page is transcribed.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page fails.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after all pages have been attempted.
    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation.
pub struct NoopProgressCallback;

impl TranscriptionProgressCallback for NoopProgressCallback {}

/// Alias matching the type stored in [`crate::config::TranscriptionConfig`].
pub type ProgressCallback = Arc<dyn TranscriptionProgressCallback>;
