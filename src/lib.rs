//! # edgequake-figtab
//!
//! Turn the tables and figures of a converted document into portable
//! artifacts: Markdown / CSV / HTML tables and Mermaid diagrams.
//!
//! ## Why this crate?
//!
//! Document converters such as Docling detect tables and figures but hand
//! them over in loosely typed, version-dependent JSON. This crate maps every
//! known layout onto one canonical model, renders tables deterministically,
//! and tries to recreate each figure as Mermaid source, going from a remote
//! vision model down to plain text heuristics when nothing better is available.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Docling JSON / element list (+ markdown export)
//!  │
//!  ├─ 1. Normalize   adapters per upstream shape → Table / Figure
//!  ├─ 2. Render      tables → Markdown, CSV, HTML
//!  ├─ 3. Classify    caption keywords → diagram type
//!  ├─ 4. Analyse     EXTERNAL → LOCAL → BASIC (OCR) │ CONTEXT (no pixels)
//!  ├─ 5. Convertible? keyword scores, diagram vs screenshot
//!  ├─ 6. Mermaid     per-type generator, then static validation
//!  └─ 7. Output      TableRecord / DiagramRecord + markdown with Mermaid
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_figtab::{extract_file, ExtractionConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let output = extract_file("report.json", Some(Path::new("report.md")), &config).await?;
//!     for d in &output.diagrams {
//!         println!("{} [{}] {:.2}: {}", d.id, d.diagram_type, d.confidence, d.description);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Vision Services
//!
//! | Strategy | Needs | Confidence |
//! |----------|-------|------------|
//! | `EXTERNAL` | `enable_remote_services`, non-standard `VisionMode`, a `VisionServiceConfig` | model-dependent |
//! | `LOCAL`    | remote permission plus `local_provider` or `local_provider_name` (Ollama, LM Studio, …) | model-dependent |
//! | `BASIC`    | figure pixels, optionally an [`OcrEngine`] | 0.7 with text, 0.5 without |
//! | `CONTEXT`  | no pixels, text around the figure | 0.8 |
//!
//! Classification is keyword-based: heuristic, not semantic.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, VisionMode, VisionServiceConfig};
pub use document::{
    AnalysisResult, BoundingBox, DiagramClassification, DiagramType, Element, ElementKind, Figure,
    Strategy, SuggestedFormat, Table,
};
pub use error::{ElementWarning, ExtractError, MermaidError, VisionError};
pub use extract::{extract, extract_file, extract_str, extract_sync, extract_tables};
pub use output::{DiagramRecord, ExtractedData, ExtractionOutput, ExtractionStats, TableRecord};
pub use pipeline::dispatch::{OcrEngine, OcrText};
pub use pipeline::postprocess::integrate_mermaid;
pub use pipeline::tables::TableView;
pub use pipeline::validate::validate as validate_mermaid;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
