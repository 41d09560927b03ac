//! Error types for the exam-ocr library.
//!
//! The segmenter itself cannot fail. Everything around it can, in three
//! distinct ways:
//!
//! * [`ExamOcrError`] — **Fatal**: the run cannot proceed at all (bad input
//!   file, wrong password, provider not configured). Returned as
//!   `Err(ExamOcrError)` from the top-level `transcribe*` functions.
//!
//! * [`PageError`] — **Non-fatal**: one page could not be transcribed (a
//!   segment kept failing or timing out) but the other pages are fine. Stored
//!   inside [`crate::output::PageResult`].
//!
//! * [`TranscribeError`] — what a [`crate::Transcriber`] reports for a single
//!   band. Retries are decided on it; after the last attempt it is folded into
//!   a [`PageError`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the exam-ocr library.
#[derive(Debug, Error)]
pub enum ExamOcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file is neither a PDF nor a supported image.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Image input could not be decoded.
    #[error("Failed to load image '{path}': {detail}")]
    ImageLoadFailed { path: PathBuf, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Transcription errors ──────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every page failed; output would be empty.
    #[error("All {total} pages failed after {retries} retries per segment.\nFirst error: {first_error}")]
    AllPagesFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write a band image to the segments directory.
    #[error("Failed to write segment image '{path}': {detail}")]
    SegmentWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform and either:\n\
  • place it next to the binary, or\n\
  • set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Segment indices are 1-based, matching the persisted file names.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// A segment's transcription failed after all retries.
    #[error("Page {page}, segment {segment}: transcription failed after {retries} retries: {detail}")]
    TranscriptionFailed {
        page: usize,
        segment: usize,
        retries: u32,
        detail: String,
    },

    /// The blocking segmentation task did not complete. Band-write failures
    /// are only logged and never surface here.
    #[error("Page {page}: segmentation failed: {detail}")]
    SegmentationFailed { page: usize, detail: String },

    /// A segment's transcription timed out on the last attempt.
    #[error("Page {page}, segment {segment}: transcription timed out after {secs}s")]
    Timeout {
        page: usize,
        segment: usize,
        secs: u64,
    },
}

/// Failure of one band transcription call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscribeError {
    /// The provider could not be reached or returned an API error.
    #[error("transcription unavailable: {0}")]
    Unavailable(String),

    /// The provider answered, but not with usable text (for the built-in
    /// backend: empty content with a non-stop finish reason).
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The band could not be encoded for upload.
    #[error("band encoding failed: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_pages_failed_display() {
        let e = ExamOcrError::AllPagesFailed {
            total: 3,
            retries: 2,
            first_error: "boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 3 pages"), "got: {msg}");
        assert!(msg.contains("boom"));
    }

    #[test]
    fn page_error_names_the_segment() {
        let e = PageError::TranscriptionFailed {
            page: 2,
            segment: 3,
            retries: 1,
            detail: "503".into(),
        };
        assert!(e.to_string().contains("Page 2, segment 3"));
    }

    #[test]
    fn timeout_display() {
        let e = PageError::Timeout {
            page: 1,
            segment: 4,
            secs: 60,
        };
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn transcribe_error_kinds_are_distinguishable() {
        let a = TranscribeError::Unavailable("down".into());
        let b = TranscribeError::MalformedResponse("no choices".into());
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("transcription unavailable"));
        assert!(b.to_string().starts_with("malformed response"));
    }
}
