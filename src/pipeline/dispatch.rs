//! Analysis dispatcher: an ordered plan of strategies per figure.
//!
//! ```text
//! raw bytes? ──no──▶ surrounding text? ──yes──▶ [CONTEXT]
//!     │                               └──no───▶ []            (figure skipped)
//!    yes
//!     ├─ remote permitted + service configured ─▶ [EXTERNAL, LOCAL, BASIC]
//!     │                                   (fallback_local = false: [EXTERNAL])
//!     ├─ remote permitted + local model only ───▶ [LOCAL, BASIC]
//!     └─ otherwise ─────────────────────────────▶ [BASIC]
//! ```
//!
//! A 2xx reply without usable content goes straight to BASIC, whatever
//! `fallback_local` says.
//!
//! Each strategy yields an [`Outcome`]. The first `Success` or `Failure` ends
//! the run; `Unavailable` moves on to the next strategy. Nothing is retried.
//! BASIC and CONTEXT never fail, so a figure with surrounding text always
//! ends in success.

use crate::config::ExtractionConfig;
use crate::document::{
    truncate_chars, AnalysisResult, DiagramType, Element, Figure, Strategy,
};
use crate::error::{ExtractError, VisionError};
use crate::pipeline::classify::KeywordRule;
use crate::pipeline::llm::{analyse_local, resolve_local_provider};
use crate::pipeline::structured::synthesize;
use crate::pipeline::vision::VisionClient;
use crate::prompts::format_number;
use edgequake_llm::LLMProvider;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ── OCR seam ─────────────────────────────────────────────────────────────

/// One recognised text span.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrText {
    pub text: String,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f32,
}

impl OcrText {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Optical character recognition over figure bytes.
///
/// Plug in Tesseract, PaddleOCR, a cloud OCR API, … The pipeline only sees
/// the recognised spans. Errors are reported as strings and recorded as a
/// low-confidence BASIC result.
pub trait OcrEngine: Send + Sync {
    fn recognise(&self, image: &[u8]) -> Result<Vec<OcrText>, String>;
}

/// Spans below this confidence are ignored.
const OCR_MIN_CONFIDENCE: f32 = 0.5;

const BASIC_TEXT_CONFIDENCE: f64 = 0.7;
const BASIC_DEFAULT_CONFIDENCE: f64 = 0.5;
const BASIC_ERROR_CONFIDENCE: f64 = 0.1;
const CONTEXT_CONFIDENCE: f64 = 0.8;

/// Type rules applied to OCR tokens; first hit wins.
const OCR_TYPE_RULES: &[KeywordRule<DiagramType>] = &[
    KeywordRule {
        keywords: &["database", "service", "api", "app"],
        category: DiagramType::Architecture,
        weight: 1,
    },
    KeywordRule {
        keywords: &["process", "flow", "step"],
        category: DiagramType::Flowchart,
        weight: 1,
    },
    KeywordRule {
        keywords: &["chart", "graph", "data"],
        category: DiagramType::Chart,
        weight: 1,
    },
];

/// Filler words dropped from surrounding-text labels.
const CONTEXT_STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "to", "in", "of", "on", "at", "by", "an", "is", "was", "are",
    "from", "as", "it", "this", "that", "example", "data", "table",
];

static RE_CONTEXT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").unwrap());
static RE_CONTEXT_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z][A-Za-z0-9]*\b").unwrap());

// ── Dispatcher ───────────────────────────────────────────────────────────

/// Result of running one strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Terminal: analysis produced.
    Success(AnalysisResult),
    /// Terminal: analysis failed and no fallback applies.
    Failure(AnalysisResult),
    /// Not terminal: move on to the next strategy.
    Unavailable(String),
}

/// Runs the strategy plan for each figure of one document.
pub struct Dispatcher<'a> {
    config: &'a ExtractionConfig,
    vision: Option<VisionClient>,
    local: Option<Arc<dyn LLMProvider>>,
}

impl<'a> Dispatcher<'a> {
    /// Prepare clients for the strategies `config` permits.
    pub fn new(config: &'a ExtractionConfig) -> Result<Self, ExtractError> {
        let vision = match (config.external_permitted(), &config.vision_service) {
            (true, Some(service)) if service.is_complete() => {
                Some(VisionClient::new(service.clone(), config)?)
            }
            (true, _) => {
                warn!("Remote vision permitted but no complete vision service configured");
                None
            }
            _ => None,
        };
        let local = if config.external_permitted()
            && config.fallback_local
            && config.has_local_model()
        {
            resolve_local_provider(config)
        } else {
            None
        };
        Ok(Self {
            config,
            vision,
            local,
        })
    }

    /// Ordered strategies for `figure`; empty when it cannot be analysed.
    pub fn plan(&self, figure: &Figure) -> Vec<Strategy> {
        if !figure.has_bytes() {
            return if figure.has_context() {
                vec![Strategy::Context]
            } else {
                Vec::new()
            };
        }
        match (&self.vision, &self.local) {
            (Some(_), _) if self.config.fallback_local => {
                vec![Strategy::External, Strategy::Local, Strategy::Basic]
            }
            (Some(_), _) => vec![Strategy::External],
            (None, Some(_)) => vec![Strategy::Local, Strategy::Basic],
            (None, None) => vec![Strategy::Basic],
        }
    }

    /// Analyse `figure`, returning the first terminal outcome's result.
    ///
    /// `None` only when the plan is empty (no bytes, no surrounding text).
    pub async fn analyse(&self, figure: &Figure, type_hint: DiagramType) -> Option<AnalysisResult> {
        let plan = self.plan(figure);
        let mut previous: Option<Strategy> = None;
        for strategy in plan {
            if let Some(from) = previous {
                debug!("{}: {} → {}", figure.id, from, strategy);
            } else {
                debug!("{}: starting with {}", figure.id, strategy);
            }
            match self.run(strategy, figure, type_hint).await {
                Outcome::Success(result) => {
                    debug!(
                        "{}: {} succeeded (type {}, confidence {:.2})",
                        figure.id, strategy, result.diagram_type, result.confidence
                    );
                    return Some(result);
                }
                Outcome::Failure(result) => {
                    warn!("{}: {} failed: {}", figure.id, strategy, result.description);
                    return Some(result);
                }
                Outcome::Unavailable(reason) => {
                    debug!("{}: {} unavailable: {}", figure.id, strategy, reason);
                    previous = Some(strategy);
                }
            }
        }
        None
    }

    /// Run a single strategy.
    pub async fn run(&self, strategy: Strategy, figure: &Figure, type_hint: DiagramType) -> Outcome {
        match strategy {
            Strategy::External => self.external(figure, type_hint).await,
            Strategy::Local => self.local(figure).await,
            Strategy::Basic => match figure.raw_bytes.as_deref() {
                Some(bytes) => Outcome::Success(basic(self.config, figure, bytes, type_hint)),
                None => Outcome::Unavailable("no raw bytes".into()),
            },
            Strategy::Context => match figure.surrounding_text.as_deref() {
                Some(text) if !text.trim().is_empty() => {
                    Outcome::Success(context(figure, text))
                }
                _ => Outcome::Unavailable("no surrounding text".into()),
            },
        }
    }

    async fn external(&self, figure: &Figure, type_hint: DiagramType) -> Outcome {
        let (Some(client), Some(bytes)) = (&self.vision, figure.raw_bytes.as_deref()) else {
            return Outcome::Unavailable("vision service not configured".into());
        };
        match client.analyse(&figure.id, bytes).await {
            Ok(result) => Outcome::Success(result),
            Err(VisionError::MalformedResponse(reason)) => {
                warn!("{}: unusable vision reply ({}); basic analysis", figure.id, reason);
                Outcome::Success(basic(self.config, figure, bytes, type_hint))
            }
            Err(e) if self.config.fallback_local => {
                warn!("{}: {}; falling back", figure.id, e);
                Outcome::Unavailable(e.to_string())
            }
            Err(e) => Outcome::Failure(failure_result(Strategy::External, &e)),
        }
    }

    async fn local(&self, figure: &Figure) -> Outcome {
        let (Some(provider), Some(bytes)) = (&self.local, figure.raw_bytes.as_deref()) else {
            return Outcome::Unavailable("no local vision model".into());
        };
        match analyse_local(provider, &figure.id, bytes, self.config).await {
            Ok(result) => Outcome::Success(result),
            Err(e) => {
                warn!("{}: local model: {}", figure.id, e);
                Outcome::Unavailable(e.to_string())
            }
        }
    }
}

/// Typed error payload: `type: error`, `confidence: 0.0`.
pub fn failure_result(strategy: Strategy, error: &VisionError) -> AnalysisResult {
    let mut result = AnalysisResult::new(strategy, DiagramType::Error, error.to_string())
        .with_confidence(0.0);
    if let VisionError::Http { body, .. } = error {
        result.text_excerpt = truncate_chars(body, 200);
    }
    result
}

// ── BASIC ────────────────────────────────────────────────────────────────

/// OCR-based analysis. Falls back to engine-supplied text fragments when no
/// OCR engine is configured.
pub fn basic(
    config: &ExtractionConfig,
    figure: &Figure,
    bytes: &[u8],
    type_hint: DiagramType,
) -> AnalysisResult {
    let tokens: Vec<String> = match config.ocr.as_ref() {
        Some(engine) => match engine.recognise(bytes) {
            Ok(spans) => spans
                .into_iter()
                .filter(|s| s.confidence > OCR_MIN_CONFIDENCE)
                .map(|s| s.text.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            Err(e) => {
                warn!("{}: OCR failed: {}", figure.id, e);
                return AnalysisResult::new(
                    Strategy::Basic,
                    DiagramType::Unknown,
                    format!("Image analysis failed - {e}"),
                )
                .with_confidence(BASIC_ERROR_CONFIDENCE);
            }
        },
        None => {
            info!("{}: no OCR engine configured", figure.id);
            figure.text_fragments.clone()
        }
    };

    let fallback_type = match type_hint {
        DiagramType::Unknown => DiagramType::Diagram,
        other => other,
    };

    if tokens.is_empty() {
        let mut result = AnalysisResult::new(
            Strategy::Basic,
            fallback_type,
            "Basic image analysis - diagram detected",
        )
        .with_confidence(BASIC_DEFAULT_CONFIDENCE);
        result.synthesis = Some(synthesize(&[], fallback_type, &figure.caption));
        return result;
    }

    let joined = tokens.join(" ").to_lowercase();
    let diagram_type = OCR_TYPE_RULES
        .iter()
        .find(|r| r.score(&joined) > 0)
        .map(|r| r.category)
        .unwrap_or(fallback_type);

    let preview: Vec<&str> = tokens.iter().take(5).map(String::as_str).collect();
    let mut result = AnalysisResult::new(
        Strategy::Basic,
        diagram_type,
        format!("Diagram containing text elements: {}", preview.join(", ")),
    )
    .with_confidence(BASIC_TEXT_CONFIDENCE);
    result.elements = tokens.iter().cloned().map(Element::classify).collect();
    result.text_excerpt = truncate_chars(&tokens.join(" "), 500);
    result.synthesis = Some(synthesize(&tokens, diagram_type, &figure.caption));
    result
}

// ── CONTEXT ──────────────────────────────────────────────────────────────

/// Numbers (> 0) found in `text`.
pub fn context_numbers(text: &str) -> Vec<f64> {
    RE_CONTEXT_NUMBER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| *n > 0.0)
        .collect()
}

/// Word tokens of `text` minus stopwords and single characters, first occurrence only.
pub fn context_labels(text: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for m in RE_CONTEXT_WORD.find_iter(text) {
        let word = m.as_str();
        let lower = word.to_lowercase();
        if word.len() <= 1 || CONTEXT_STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        if !labels.iter().any(|l| l.eq_ignore_ascii_case(word)) {
            labels.push(word.to_string());
        }
    }
    labels
}

/// Heuristic analysis from the figure's surrounding text.
pub fn context(figure: &Figure, text: &str) -> AnalysisResult {
    let numbers = context_numbers(text);
    let labels = context_labels(text);

    let diagram_type = DiagramType::Chart;

    let kind = {
        let s = diagram_type.as_str();
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    };
    let label_preview = labels.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
    let number_preview = numbers
        .iter()
        .take(5)
        .map(|n| format_number(*n))
        .collect::<Vec<_>>()
        .join(", ");
    let description = format!(
        "{kind} showing data related to {} with values including {}",
        if label_preview.is_empty() { "unlabelled items" } else { label_preview.as_str() },
        if number_preview.is_empty() { "none" } else { number_preview.as_str() },
    );

    let mut elements: Vec<Element> = labels.iter().take(5).map(Element::text).collect();
    elements.extend(numbers.iter().take(5).map(|n| Element::number(format_number(*n))));

    let excerpt = if text.chars().count() > 200 {
        format!("{}...", truncate_chars(text, 200))
    } else {
        text.to_string()
    };

    let tokens: Vec<String> = elements.iter().map(|e| e.content.clone()).collect();
    let mut result = AnalysisResult::new(Strategy::Context, diagram_type, description)
        .with_confidence(CONTEXT_CONFIDENCE);
    result.elements = elements;
    result.text_excerpt = excerpt;
    result.synthesis = Some(synthesize(&tokens, diagram_type, &figure.caption));
    result
}
