//! Segmentation properties and the segment → transcribe → assemble path,
//! exercised through the public API only. No pdfium, no network.

use exam_ocr::{
    segment, segment_bands, segment_document, transcribe_pages, PageSeparator, SegmenterConfig,
    Transcriber, Transcription, TranscribeError, TranscriptionConfig,
    TranscriptionProgressCallback,
};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Page fixtures ────────────────────────────────────────────────────────────

fn blank(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255])))
}

/// Ink rows where `(y + 25) % 60 < 30`, so row 400 falls inside a line.
fn is_ink_row(y: u32) -> bool {
    (y + 25) % 60 < 30
}

fn lined_exam(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
        if is_ink_row(y) && x % 3 == 0 {
            Luma([0])
        } else {
            Luma([255])
        }
    }))
}

/// Deterministic speckle so rows have uneven, nonzero dispersion.
fn noisy(width: u32, height: u32, seed: u32) -> DynamicImage {
    let mut state = seed;
    DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |_, _| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        Luma([(state >> 24) as u8])
    }))
}

fn assert_partition(segments: &[exam_ocr::Segment], height: u32, config: &SegmenterConfig) {
    if height == 0 {
        assert!(segments.is_empty());
        return;
    }
    assert_eq!(segments[0].start, 0);
    assert_eq!(segments[segments.len() - 1].end, height);
    for pair in segments.windows(2) {
        assert_eq!(pair[0].end, pair[1].start, "gap or overlap: {pair:?}");
    }
    for s in &segments[..segments.len() - 1] {
        assert!(s.height() >= config.min_height.max(1), "{s:?} below min");
        assert!(s.height() < 2 * config.target_height, "{s:?} above window");
    }
    for s in segments {
        assert!(s.start < s.end, "empty segment {s:?}");
    }
}

// ── Structural properties ────────────────────────────────────────────────────

#[test]
fn segments_partition_every_page_height() {
    let configs = [
        SegmenterConfig::default(),
        SegmenterConfig::tall(),
        SegmenterConfig::with_heights(100, 0),
    ];
    for config in &configs {
        for height in [0, 1, 199, 200, 400, 401, 799, 1000, 2339] {
            for image in [blank(32, height), noisy(32, height, height + 7)] {
                let segments = segment(&image, config);
                assert_partition(&segments, height, config);
            }
        }
    }
}

#[test]
fn short_pages_are_a_single_segment() {
    let segments = segment(&noisy(40, 400, 1), &SegmenterConfig::default());
    assert_eq!(segments.len(), 1);
    assert_eq!((segments[0].start, segments[0].end), (0, 400));
}

#[test]
fn segmentation_is_deterministic() {
    let img = noisy(64, 3000, 42);
    let config = SegmenterConfig::default();
    assert_eq!(segment(&img, &config), segment(&img, &config));
}

#[test]
fn tall_blank_page_splits_at_target() {
    let segments = segment(&blank(10, 5000), &SegmenterConfig::default());
    assert_eq!(segments.len(), 13);
    assert!(segments[..12].iter().all(|s| s.height() == 400));
    assert_eq!(segments[12].height(), 200);
}

// ── Cut placement ────────────────────────────────────────────────────────────

#[test]
fn cuts_avoid_text_lines() {
    let img = lined_exam(90, 2000);
    let config = SegmenterConfig::default();
    let segments = segment(&img, &config);
    assert_partition(&segments, 2000, &config);

    // A flat-height cut at 400 would land inside a line; the nearest quiet
    // row above it is 392.
    assert_eq!(segments[0].end, 392);

    for s in &segments[..segments.len() - 1] {
        assert!(!is_ink_row(s.end), "cut at {} splits a line", s.end);
        assert!(s.height().abs_diff(config.target_height) < 60, "{s:?}");
    }
}

#[test]
fn without_dispersion_term_cuts_at_target() {
    let img = lined_exam(90, 1200);
    let light = SegmenterConfig {
        std_weight: 0.0,
        ..SegmenterConfig::default()
    };
    assert_eq!(segment(&img, &light)[0].end, 400);
    assert_eq!(segment(&img, &SegmenterConfig::default())[0].end, 392);
}

// ── Bands ────────────────────────────────────────────────────────────────────

#[test]
fn bands_keep_width_and_channels() {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(33, 950, |x, y| {
        Rgba([(x * 7) as u8, (y % 256) as u8, 9, 200])
    }));
    let bands = segment_bands(&img, &SegmenterConfig::default());
    assert!(bands.len() >= 2);

    let mut rows = 0;
    for band in &bands {
        assert_eq!(band.image.width(), 33);
        assert_eq!(band.image.height(), band.segment.height());
        assert!(matches!(band.image, DynamicImage::ImageRgba8(_)));
        let expected = img.crop_imm(0, band.segment.start, 33, band.segment.height());
        assert_eq!(band.image.as_bytes(), expected.as_bytes());
        rows += band.image.height();
    }
    assert_eq!(rows, 950);
}

// ── Segment-only entry point on an image file ────────────────────────────────

#[tokio::test]
async fn segment_document_reads_and_persists_png() {
    let dir = tempfile::tempdir().unwrap();
    let page_path = dir.path().join("page.png");
    lined_exam(120, 900).save(&page_path).unwrap();

    let seg_dir = dir.path().join("segs");
    let config = TranscriptionConfig::builder()
        .segments_dir(&seg_dir)
        .build()
        .unwrap();

    let pages = segment_document(page_path.to_str().unwrap(), &config)
        .await
        .unwrap();

    assert_eq!(pages.len(), 1);
    let page = &pages[0];
    assert_eq!((page.page_num, page.width, page.height), (1, 120, 900));
    assert_eq!(page.saved_paths.len(), page.segments.len());
    for (i, path) in page.saved_paths.iter().enumerate() {
        assert_eq!(*path, seg_dir.join(format!("segments_p1/segment_{}.png", i + 1)));
        let saved = image::open(path).unwrap();
        assert_eq!(saved.height(), page.segments[i].height());
    }
}

#[tokio::test]
async fn segment_document_rejects_missing_file() {
    let config = TranscriptionConfig::default();
    let err = segment_document("/no/such/exam.png", &config).await.unwrap_err();
    assert!(matches!(err, exam_ocr::ExamOcrError::FileNotFound { .. }), "{err}");
}

// ── Transcription with a stand-in model ──────────────────────────────────────

/// Reports each band's height, so assembly order is visible in the text.
struct Rows;

impl Transcriber for Rows {
    async fn transcribe(
        &self,
        band: &DynamicImage,
        _prompt: &str,
    ) -> Result<Transcription, TranscribeError> {
        Ok(Transcription {
            text: format!("{} rows\n", band.height()),
            input_tokens: 100,
            output_tokens: 3,
        })
    }
}

/// Fails every band of 7-pixel-wide pages.
struct FailsNarrowPages;

impl Transcriber for FailsNarrowPages {
    async fn transcribe(
        &self,
        band: &DynamicImage,
        _prompt: &str,
    ) -> Result<Transcription, TranscribeError> {
        if band.width() == 7 {
            Err(TranscribeError::Unavailable("rate limited".into()))
        } else {
            Ok(Transcription::text("fine"))
        }
    }
}

#[derive(Default)]
struct Counter {
    segments: AtomicUsize,
    pages: AtomicUsize,
    errors: AtomicUsize,
}

impl TranscriptionProgressCallback for Counter {
    fn on_segment_complete(&self, _page: usize, _segment: usize, _of: usize) {
        self.segments.fetch_add(1, Ordering::SeqCst);
    }
    fn on_page_complete(&self, _page: usize, _total: usize, _len: usize) {
        self.pages.fetch_add(1, Ordering::SeqCst);
    }
    fn on_page_error(&self, _page: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn pages_are_assembled_with_headings() {
    let counter = Arc::new(Counter::default());
    let config = TranscriptionConfig::builder()
        .progress_callback(counter.clone())
        .build()
        .unwrap();

    let pages = vec![(1, blank(20, 500)), (0, blank(20, 300))];
    let out = transcribe_pages(&Rows, pages, &config).await.unwrap();

    assert_eq!(
        out.text,
        "--- Page 1 ---\n300 rows\n\n--- Page 2 ---\n400 rows\n100 rows\n\n"
    );
    assert_eq!(out.stats.total_pages, 2);
    assert_eq!(out.stats.total_segments, 3);
    assert_eq!(out.stats.total_input_tokens, 300);
    assert_eq!(counter.segments.load(Ordering::SeqCst), 3);
    assert_eq!(counter.pages.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn custom_separator_is_used() {
    let config = TranscriptionConfig::builder()
        .page_separator(PageSeparator::Custom("## Seite {page}".into()))
        .build()
        .unwrap();
    let out = transcribe_pages(&Rows, vec![(2, blank(5, 50))], &config)
        .await
        .unwrap();
    assert_eq!(out.text, "## Seite 3\n50 rows\n\n");
}

#[tokio::test]
async fn one_failing_page_does_not_sink_the_run() {
    let counter = Arc::new(Counter::default());
    let config = TranscriptionConfig::builder()
        .max_retries(1)
        .retry_backoff_ms(0)
        .progress_callback(counter.clone())
        .build()
        .unwrap();

    let pages = vec![(0, blank(20, 300)), (1, blank(7, 300))];
    let out = transcribe_pages(&FailsNarrowPages, pages, &config).await.unwrap();

    assert_eq!(out.stats.processed_pages, 1);
    assert_eq!(out.stats.failed_pages, 1);
    assert!(out.pages[1].error.is_some());
    assert_eq!(out.text, "--- Page 1 ---\nfine\n\n");
    assert_eq!(counter.errors.load(Ordering::SeqCst), 1);
}
