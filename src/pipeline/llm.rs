//! Transcription seam and its vision-model implementation.
//!
//! The orchestrator only ever talks to a [`Transcriber`]: one band plus one
//! prompt in, text out. [`VisionTranscriber`] is the production
//! implementation over any `edgequake-llm` provider; tests plug in their own.
//! Retries and timeouts live in the orchestrator, not here, so every
//! implementation gets the same policy.

use crate::config::TranscriptionConfig;
use crate::error::TranscribeError;
use crate::pipeline::encode::encode_band;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use image::DynamicImage;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Text produced for one band.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcription {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl Transcription {
    /// A transcription with no token accounting.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Anything that can turn a band image and a prompt into text.
pub trait Transcriber: Send + Sync {
    fn transcribe(
        &self,
        band: &DynamicImage,
        prompt: &str,
    ) -> impl Future<Output = Result<Transcription, TranscribeError>> + Send;
}

/// [`Transcriber`] backed by a vision-capable LLM provider.
///
/// Each band is sent as a single user turn: the prompt text with the band
/// attached as a base64 PNG.
#[derive(Clone)]
pub struct VisionTranscriber {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl VisionTranscriber {
    pub fn new(provider: Arc<dyn LLMProvider>, options: CompletionOptions) -> Self {
        Self { provider, options }
    }

    /// Build with sampling options taken from the run configuration.
    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &TranscriptionConfig) -> Self {
        Self::new(provider, build_options(config))
    }
}

impl Transcriber for VisionTranscriber {
    async fn transcribe(
        &self,
        band: &DynamicImage,
        prompt: &str,
    ) -> Result<Transcription, TranscribeError> {
        let image = encode_band(band).map_err(|e| TranscribeError::Encoding(e.to_string()))?;
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image])];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| TranscribeError::Unavailable(e.to_string()))?;

        check_response(&response.content, response.finish_reason.as_deref())?;

        debug!(
            "Band {}x{}: {} input tokens, {} output tokens",
            band.width(),
            band.height(),
            response.prompt_tokens,
            response.completion_tokens
        );

        Ok(Transcription {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// An empty answer is a blank band only if the model stopped on its own.
/// Empty content cut off by a length limit or a content filter is rejected.
fn check_response(content: &str, finish_reason: Option<&str>) -> Result<(), TranscribeError> {
    match finish_reason {
        Some(reason) if content.trim().is_empty() && !is_natural_stop(reason) => Err(
            TranscribeError::MalformedResponse(format!("empty content, finish_reason={reason}")),
        ),
        _ => Ok(()),
    }
}

fn is_natural_stop(reason: &str) -> bool {
    matches!(
        reason.to_ascii_lowercase().as_str(),
        "stop" | "end_turn" | "stop_sequence"
    )
}

/// Build `CompletionOptions` from the run config.
fn build_options(config: &TranscriptionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
