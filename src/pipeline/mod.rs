//! Pipeline stages around the segmenter.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ segmenter ──▶ persist? ──▶ encode ──▶ llm ──▶ postprocess
//! (path)    (pdfium)   (cuts+bands)  (debug png)  (base64)   (VLM)   (cleanup)
//! ```
//!
//! 1. [`input`]  — validate the path; PDF or single image
//! 2. [`render`] — rasterise selected pages in `spawn_blocking`
//! 3. [`crate::segmenter`] — cut each page into bands
//! 4. [`persist`] — optionally write bands to `segments_p{N}/segment_{n}.png`
//! 5. [`encode`] — PNG + base64 for the multimodal request body
//! 6. [`llm`]    — the [`llm::Transcriber`] seam and its VLM implementation
//! 7. [`postprocess`] — strip fences and invisible characters per band

pub mod encode;
pub mod input;
pub mod llm;
pub mod persist;
pub mod postprocess;
pub mod render;
