//! Language model inference: the persona responder.
//!
//! The responder is an opaque text-to-text collaborator behind
//! [`Responder`]. The default implementation loads a GGUF model once at
//! startup via `mistralrs` and answers one prompt per call — the demo keeps
//! no conversation history between requests.

use crate::config::LlmConfig;
use crate::error::{Result, VoiceError};
use async_trait::async_trait;
use mistralrs::{
    GgufModelBuilder, MemoryGpuConfig, Model, PagedAttentionMetaBuilder, RequestBuilder,
    TextMessageRole, TextMessages,
};
use std::sync::Arc;
use tracing::info;

/// Context window reserved for the local model.
const CONTEXT_SIZE_TOKENS: usize = 4_096;

/// Replies shorter than this are considered degenerate and replaced by the
/// configured fallback.
const MIN_REPLY_CHARS: usize = 5;

/// Maps a user prompt to a persona-styled continuation.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Generate a reply to `text`.
    ///
    /// # Errors
    ///
    /// Returns an LLM error if generation fails.
    async fn reply(&self, text: &str) -> Result<String>;
}

/// Responder backed by a local GGUF model loaded through `mistralrs`.
pub struct LocalResponder {
    model: Arc<Model>,
    config: LlmConfig,
}

impl LocalResponder {
    /// Load the model described by `config`.
    ///
    /// This is the slow, once-per-process step; the returned responder is
    /// shared across all requests.
    ///
    /// # Errors
    ///
    /// Returns an LLM error if model loading fails.
    pub async fn new(config: &LlmConfig) -> Result<Self> {
        info!(
            model = config.model_id,
            file = config.gguf_file,
            "loading language model"
        );

        let mut builder =
            GgufModelBuilder::new(&config.model_id, vec![&config.gguf_file]).with_logging();
        if !config.tokenizer_id.is_empty() {
            builder = builder.with_tok_model_id(&config.tokenizer_id);
        }

        let model = builder
            .with_paged_attn(|| {
                PagedAttentionMetaBuilder::default()
                    .with_gpu_memory(MemoryGpuConfig::ContextSize(CONTEXT_SIZE_TOKENS))
                    .build()
            })
            .map_err(|e| VoiceError::Llm(format!("paged attention config failed: {e}")))?
            .build()
            .await
            .map_err(|e| VoiceError::Llm(format!("model load failed: {e}")))?;

        info!("language model loaded");

        Ok(Self {
            model: Arc::new(model),
            config: config.clone(),
        })
    }
}

#[async_trait]
impl Responder for LocalResponder {
    async fn reply(&self, text: &str) -> Result<String> {
        let mut messages = TextMessages::new().enable_thinking(false);
        if !self.config.system_prompt.is_empty() {
            messages = messages.add_message(TextMessageRole::System, &self.config.system_prompt);
        }
        messages = messages.add_message(TextMessageRole::User, text);

        let request = RequestBuilder::from(messages)
            .set_sampler_temperature(self.config.temperature)
            .set_sampler_topp(self.config.top_p)
            .set_sampler_max_len(self.config.max_tokens);

        let response = self
            .model
            .send_chat_request(request)
            .await
            .map_err(|e| VoiceError::Llm(format!("generation failed: {e}")))?;

        let raw = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or("");

        Ok(clean_reply(raw, text, &self.config.fallback_reply))
    }
}

/// Post-process a raw model continuation into a usable reply.
///
/// Base causal models tend to echo the prompt before continuing; the echo
/// is stripped. Degenerate (near-empty) replies become the configured
/// persona fallback so the caller always has something to speak.
pub fn clean_reply(raw: &str, prompt: &str, fallback: &str) -> String {
    let mut reply = raw.trim();
    if !prompt.is_empty() {
        if let Some(idx) = reply.find(prompt) {
            reply = reply[idx + prompt.len()..].trim_start_matches([':', '-', '\n', ' ']);
        }
    }
    let reply = reply.trim();
    if reply.chars().count() < MIN_REPLY_CHARS {
        fallback.to_owned()
    } else {
        reply.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: &str = "Always dream big.";

    #[test]
    fn strips_echoed_prompt() {
        let raw = "What is courage? Courage is acting despite fear.";
        let cleaned = clean_reply(raw, "What is courage?", FALLBACK);
        assert_eq!(cleaned, "Courage is acting despite fear.");
    }

    #[test]
    fn keeps_reply_without_echo() {
        let raw = "Courage is acting despite fear.";
        let cleaned = clean_reply(raw, "What is courage?", FALLBACK);
        assert_eq!(cleaned, raw);
    }

    #[test]
    fn short_reply_falls_back() {
        assert_eq!(clean_reply("ok", "prompt", FALLBACK), FALLBACK);
        assert_eq!(clean_reply("", "prompt", FALLBACK), FALLBACK);
    }

    #[test]
    fn echo_only_reply_falls_back() {
        let cleaned = clean_reply("What is courage?", "What is courage?", FALLBACK);
        assert_eq!(cleaned, FALLBACK);
    }
}
