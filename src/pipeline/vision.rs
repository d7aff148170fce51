//! EXTERNAL strategy: one chat-completions request to a remote vision service.
//!
//! ```text
//! POST {endpoint}/chat/completions
//! Authorization: Bearer <key>
//! { model, messages: [{ role: "user", content: [
//!     { type: "text", text: DIAGRAM_ANALYSIS_PROMPT },
//!     { type: "image_url", image_url: { url: "data:image/png;base64,…" } } ] }],
//!   max_tokens, temperature }
//! ```
//!
//! The call is made once. Timeouts, transport errors, non-2xx statuses and
//! unusable bodies come back as [`VisionError`]; the dispatcher decides what
//! happens next.

use crate::config::{ExtractionConfig, VisionServiceConfig};
use crate::document::{AnalysisResult, Strategy};
use crate::error::{ExtractError, VisionError};
use crate::pipeline::encode::data_uri;
use crate::pipeline::response::parse_response;
use crate::prompts::DIAGRAM_ANALYSIS_PROMPT;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Client for the configured vision service.
#[derive(Debug, Clone)]
pub struct VisionClient {
    client: Client,
    service: VisionServiceConfig,
    max_tokens: usize,
    temperature: f32,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl VisionClient {
    /// Build a client bounded by `config.api_timeout_secs`.
    pub fn new(service: VisionServiceConfig, config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| ExtractError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            service,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.api_timeout_secs,
        })
    }

    /// JSON body of the analysis request.
    pub fn request_body(&self, image: &[u8]) -> serde_json::Value {
        serde_json::json!({
            "model": self.service.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": DIAGRAM_ANALYSIS_PROMPT },
                        { "type": "image_url", "image_url": { "url": data_uri(image) } }
                    ]
                }
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature
        })
    }

    /// Send `image` for analysis and parse the reply.
    pub async fn analyse(&self, figure_id: &str, image: &[u8]) -> Result<AnalysisResult, VisionError> {
        if !self.service.is_complete() {
            return Err(VisionError::NotConfigured(
                "endpoint, API key and model are required".into(),
            ));
        }

        let start = Instant::now();
        let url = self.service.completions_url();
        debug!("{}: POST {} (model {})", figure_id, url, self.service.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.service.api_key))
            .json(&self.request_body(image))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("{}: vision service returned {}", figure_id, status);
            return Err(VisionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let completion: ChatCompletion = serde_json::from_slice(&raw)
            .map_err(|e| VisionError::MalformedResponse(e.to_string()))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| VisionError::MalformedResponse("no choices[0].message.content".into()))?;

        debug!(
            "{}: vision service answered {} chars in {:?}",
            figure_id,
            content.len(),
            start.elapsed()
        );
        Ok(parse_response(&content, Strategy::External))
    }

    fn transport_error(&self, e: reqwest::Error) -> VisionError {
        if e.is_timeout() {
            VisionError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            VisionError::Transport(e.to_string())
        }
    }
}
