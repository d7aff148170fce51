//! LOCAL strategy: a vision-capable model reached through `edgequake-llm`.
//!
//! Typically an Ollama or LM Studio model running next to the pipeline.
//! The provider is resolved once per extraction, from most to least specific:
//!
//! 1. **Pre-built provider** (`config.local_provider`)
//! 2. **Named provider + model** (`config.local_provider_name`,
//!    `config.local_model`) via [`ProviderFactory::create_llm_provider`]
//!
//! When neither is set, or the factory fails, the strategy is unavailable and
//! the dispatcher moves on to BASIC.

use crate::config::ExtractionConfig;
use crate::document::{AnalysisResult, Strategy};
use crate::error::VisionError;
use crate::pipeline::encode::image_data;
use crate::pipeline::response::parse_response;
use crate::prompts::DIAGRAM_ANALYSIS_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Resolve the local vision provider, if one is configured and constructible.
pub fn resolve_local_provider(config: &ExtractionConfig) -> Option<Arc<dyn LLMProvider>> {
    if let Some(ref provider) = config.local_provider {
        return Some(Arc::clone(provider));
    }
    let name = config.local_provider_name.as_deref()?;
    match ProviderFactory::create_llm_provider(name, &config.local_model) {
        Ok(provider) => {
            info!("Local vision model: {} / {}", name, config.local_model);
            Some(provider)
        }
        Err(e) => {
            warn!("Local vision provider '{}' unavailable: {}", name, e);
            None
        }
    }
}

/// Ask the local model to analyse one figure.
pub async fn analyse_local(
    provider: &Arc<dyn LLMProvider>,
    figure_id: &str,
    image: &[u8],
    config: &ExtractionConfig,
) -> Result<AnalysisResult, VisionError> {
    let start = Instant::now();
    let messages = vec![ChatMessage::user_with_images(
        DIAGRAM_ANALYSIS_PROMPT,
        vec![image_data(image)],
    )];
    let options = build_options(config);

    let call = provider.chat(&messages, Some(&options));
    let response = tokio::time::timeout(Duration::from_secs(config.api_timeout_secs), call)
        .await
        .map_err(|_| VisionError::Timeout {
            secs: config.api_timeout_secs,
        })?
        .map_err(|e| VisionError::Provider(format!("{}", e)))?;

    debug!(
        "{}: local model {} input tokens, {} output tokens, {:?}",
        figure_id,
        response.prompt_tokens,
        response.completion_tokens,
        start.elapsed()
    );

    if response.content.trim().is_empty() {
        return Err(VisionError::MalformedResponse(
            "local model returned no content".into(),
        ));
    }
    Ok(parse_response(&response.content, Strategy::Local))
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
