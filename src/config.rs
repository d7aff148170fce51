//! Configuration types for table and figure extraction.
//!
//! Everything the pipeline needs (service endpoint, credentials, timeouts,
//! feature toggles, pluggable OCR and local model) lives in
//! [`ExtractionConfig`], built via [`ExtractionConfigBuilder`] and passed
//! explicitly to the `extract*` entry points. Nothing in the library reads
//! process-wide state; [`VisionServiceConfig::from_env`] exists for callers
//! that want the classic `DOCLING_VLM_*` variables, and must be called
//! explicitly.

use crate::error::ExtractError;
use crate::pipeline::dispatch::OcrEngine;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default model requested from the vision service.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4-vision-preview";

/// Endpoint, credentials and model of a chat-completions vision service.
#[derive(Clone, PartialEq, Eq)]
pub struct VisionServiceConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`. `/chat/completions` is appended.
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

impl VisionServiceConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Read `DOCLING_VLM_API_URL`, `DOCLING_VLM_API_KEY` and
    /// `DOCLING_VLM_MODEL` (default `gpt-4-vision-preview`).
    ///
    /// Returns `None` unless both URL and key are set and non-empty.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("DOCLING_VLM_API_URL").ok().filter(|s| !s.is_empty())?;
        let api_key = std::env::var("DOCLING_VLM_API_KEY").ok().filter(|s| !s.is_empty())?;
        let model = std::env::var("DOCLING_VLM_MODEL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string());
        Some(Self::new(endpoint, api_key, model))
    }

    /// True when endpoint, key and model are all present.
    pub fn is_complete(&self) -> bool {
        !self.endpoint.trim().is_empty()
            && !self.api_key.trim().is_empty()
            && !self.model.trim().is_empty()
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

impl fmt::Debug for VisionServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionServiceConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// How hard the pipeline tries to see a figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionMode {
    /// OCR and text heuristics only. (default)
    #[default]
    Standard,
    /// Permit vision models; typically paired with a local fallback model.
    Local,
    /// Permit the remote vision service.
    Advanced,
}

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_figtab::{ExtractionConfig, VisionMode, VisionServiceConfig};
///
/// let config = ExtractionConfig::builder()
///     .enable_remote_services(true)
///     .vision_mode(VisionMode::Advanced)
///     .vision_service(VisionServiceConfig::new(
///         "https://api.openai.com/v1",
///         "sk-test",
///         "gpt-4.1-mini",
///     ))
///     .api_timeout_secs(60)
///     .build()
///     .unwrap();
/// assert!(config.external_permitted());
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Permit calls to the remote vision service. Default: false.
    pub enable_remote_services: bool,

    /// Vision mode. EXTERNAL needs a non-`Standard` mode. Default: `Standard`.
    pub vision_mode: VisionMode,

    /// Remote vision service. Default: None.
    pub vision_service: Option<VisionServiceConfig>,

    /// On EXTERNAL failure, continue with LOCAL then BASIC instead of
    /// emitting a failure record. Default: true.
    pub fallback_local: bool,

    /// Bound on one vision call, remote or local, in seconds. Default: 240.
    pub api_timeout_secs: u64,

    /// `max_tokens` of a vision request. Default: 1000.
    pub max_tokens: usize,

    /// `temperature` of a vision request. Default: 0.1.
    pub temperature: f32,

    /// Pre-constructed local vision provider. Takes precedence over `local_provider_name`.
    pub local_provider: Option<Arc<dyn LLMProvider>>,

    /// Local provider created through `ProviderFactory` (e.g. "ollama", "lmstudio").
    pub local_provider_name: Option<String>,

    /// Model used with `local_provider_name`. Default: "llava".
    pub local_model: String,

    /// OCR engine for the BASIC strategy. Default: None.
    pub ocr: Option<Arc<dyn OcrEngine>>,

    /// Synthesize Mermaid for convertible figures. Default: true.
    pub generate_mermaid: bool,

    /// Minimum analysis confidence before synthesizing Mermaid. Default: 0.8.
    pub min_analysis_confidence: f64,

    /// Minimum convertibility confidence before synthesizing Mermaid. Default: 0.8.
    pub min_classification_confidence: f64,

    /// Lines captured above and below a markdown image placeholder. Default: 3.
    pub context_window_lines: usize,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enable_remote_services: false,
            vision_mode: VisionMode::default(),
            vision_service: None,
            fallback_local: true,
            api_timeout_secs: 240,
            max_tokens: 1000,
            temperature: 0.1,
            local_provider: None,
            local_provider_name: None,
            local_model: "llava".to_string(),
            ocr: None,
            generate_mermaid: true,
            min_analysis_confidence: 0.8,
            min_classification_confidence: 0.8,
            context_window_lines: 3,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("enable_remote_services", &self.enable_remote_services)
            .field("vision_mode", &self.vision_mode)
            .field("vision_service", &self.vision_service)
            .field("fallback_local", &self.fallback_local)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field(
                "local_provider",
                &self.local_provider.as_ref().map(|_| "<dyn LLMProvider>"),
            )
            .field("local_provider_name", &self.local_provider_name)
            .field("local_model", &self.local_model)
            .field("ocr", &self.ocr.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("generate_mermaid", &self.generate_mermaid)
            .field("min_analysis_confidence", &self.min_analysis_confidence)
            .field(
                "min_classification_confidence",
                &self.min_classification_confidence,
            )
            .field("context_window_lines", &self.context_window_lines)
            .finish()
    }
}

impl ExtractionConfig {
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// EXTERNAL is attempted only with remote services enabled and a non-standard mode.
    pub fn external_permitted(&self) -> bool {
        self.enable_remote_services && self.vision_mode != VisionMode::Standard
    }

    pub fn has_local_model(&self) -> bool {
        self.local_provider.is_some() || self.local_provider_name.is_some()
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn enable_remote_services(mut self, v: bool) -> Self {
        self.config.enable_remote_services = v;
        self
    }

    pub fn vision_mode(mut self, mode: VisionMode) -> Self {
        self.config.vision_mode = mode;
        self
    }

    pub fn vision_service(mut self, service: VisionServiceConfig) -> Self {
        self.config.vision_service = Some(service);
        self
    }

    pub fn fallback_local(mut self, v: bool) -> Self {
        self.config.fallback_local = v;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn local_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.local_provider = Some(provider);
        self
    }

    pub fn local_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.local_provider_name = Some(name.into());
        self
    }

    pub fn local_model(mut self, model: impl Into<String>) -> Self {
        self.config.local_model = model.into();
        self
    }

    pub fn ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr = Some(engine);
        self
    }

    pub fn generate_mermaid(mut self, v: bool) -> Self {
        self.config.generate_mermaid = v;
        self
    }

    pub fn min_analysis_confidence(mut self, c: f64) -> Self {
        self.config.min_analysis_confidence = c;
        self
    }

    pub fn min_classification_confidence(mut self, c: f64) -> Self {
        self.config.min_classification_confidence = c;
        self
    }

    pub fn context_window_lines(mut self, n: usize) -> Self {
        self.config.context_window_lines = n.min(50);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "API timeout must be ≥ 1s".into(),
            ));
        }
        for (name, value) in [
            ("min_analysis_confidence", c.min_analysis_confidence),
            ("min_classification_confidence", c.min_classification_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ExtractError::InvalidConfig(format!(
                    "{name} must be within 0.0–1.0, got {value}"
                )));
            }
        }
        if let Some(ref service) = c.vision_service {
            let endpoint = service.endpoint.trim();
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ExtractError::InvalidConfig(format!(
                    "vision service endpoint must be an http(s) URL, got '{endpoint}'"
                )));
            }
        }
        Ok(self.config)
    }
}
