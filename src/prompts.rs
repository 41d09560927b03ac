//! Prompts sent alongside each band.
//!
//! Callers can override the default via
//! [`crate::config::TranscriptionConfig::prompt`].

/// Default instruction for transcribing one band of an exam page.
///
/// Kept short on purpose: a band is a strip of a page, and long
/// layout-oriented instructions make models describe the strip instead of
/// transcribing it.
pub const DEFAULT_OCR_PROMPT: &str = "Do OCR on this image. OUTPUT NOTHING ELSE. \
Use Unicode math symbols if applicable. If no text, return empty string.";

/// Resolve the prompt for a run: the override when set and non-blank,
/// otherwise [`DEFAULT_OCR_PROMPT`].
pub fn resolve_prompt(custom: Option<&str>) -> &str {
    match custom {
        Some(p) if !p.trim().is_empty() => p,
        _ => DEFAULT_OCR_PROMPT,
    }
}
