//! Error types for the edgequake-figtab library.
//!
//! Failures fall into two groups:
//!
//! * [`ExtractError`]: **Fatal**, extraction cannot start at all (unreadable
//!   file, input that is not a JSON document, invalid configuration).
//!   Returned as `Err(ExtractError)` from the top-level `extract*` functions.
//!
//! * Element-level failures: a single table or figure misbehaved, every
//!   sibling element is fine. These never escape as `Err`:
//!   - [`VisionError`] drives the analysis fallback chain and is only logged
//!     (or folded into a failure record when fallback is disabled);
//!   - [`MermaidError`] is the validator verdict that drops a Mermaid source;
//!   - [`ElementWarning`] is stored in [`crate::output::ExtractionOutput`]
//!     when the normalizer drops or truncates upstream data.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-figtab library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input is not valid JSON.
    #[error("Document is not valid JSON: {0}")]
    InvalidJson(String),

    /// Valid JSON, but not a document object any adapter understands.
    #[error("Unsupported document: {0}")]
    InvalidDocument(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client for the vision service could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure of one vision analysis attempt.
///
/// Returned by the EXTERNAL and LOCAL strategies; the dispatcher decides
/// whether to fall through to the next strategy or to emit a failure record.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VisionError {
    /// Endpoint, key or model missing.
    #[error("Vision service is not configured: {0}")]
    NotConfigured(String),

    /// The service answered with a non-2xx status.
    #[error("VLM API request failed: {status}")]
    Http { status: u16, body: String },

    /// Connection refused, DNS failure, TLS error, …
    #[error("VLM API connection failed: {0}")]
    Transport(String),

    /// The call exceeded the configured timeout.
    #[error("VLM API call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// 2xx, but the body has no usable `choices[0].message.content`.
    #[error("VLM API returned a malformed response: {0}")]
    MalformedResponse(String),

    /// A local `edgequake-llm` provider returned an error.
    #[error("Local vision model failed: {0}")]
    Provider(String),
}

/// Why the validator rejected a Mermaid source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MermaidError {
    #[error("Mermaid source is empty")]
    Empty,

    #[error("Unknown diagram keyword in first line: '{0}'")]
    UnknownDiagramKeyword(String),

    #[error("Unbalanced '{open}{close}': {opened} opened, {closed} closed")]
    Unbalanced {
        open: char,
        close: char,
        opened: usize,
        closed: usize,
    },

    #[error("Mermaid source declares no nodes or edges")]
    NoNodes,
}

/// A shape problem recorded while normalizing upstream elements.
///
/// Stored in [`crate::output::ExtractionOutput::warnings`]; never fatal.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum ElementWarning {
    /// The element had no usable identity and was skipped.
    #[error("{collection}[{position}]: element dropped: {reason}")]
    Dropped {
        collection: String,
        position: usize,
        reason: String,
    },

    /// A table row had more cells than headers; the surplus was cut.
    #[error("{table_id}: row {row} truncated from {cells} to {width} cells")]
    RowTruncated {
        table_id: String,
        row: usize,
        cells: usize,
        width: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_display_matches_failure_payload() {
        let e = VisionError::Http {
            status: 503,
            body: "overloaded".into(),
        };
        assert_eq!(e.to_string(), "VLM API request failed: 503");
    }

    #[test]
    fn transport_error_display() {
        let e = VisionError::Transport("connection refused".into());
        assert!(e.to_string().starts_with("VLM API connection failed"));
        assert!(e.to_string().contains("connection refused"));
    }

    #[test]
    fn timeout_display() {
        let e = VisionError::Timeout { secs: 240 };
        assert!(e.to_string().contains("240s"));
    }

    #[test]
    fn unbalanced_display() {
        let e = MermaidError::Unbalanced {
            open: '[',
            close: ']',
            opened: 2,
            closed: 1,
        };
        let msg = e.to_string();
        assert!(msg.contains("[]"), "got: {msg}");
        assert!(msg.contains("2 opened"), "got: {msg}");
    }

    #[test]
    fn row_truncated_display() {
        let w = ElementWarning::RowTruncated {
            table_id: "table_1".into(),
            row: 2,
            cells: 3,
            width: 2,
        };
        assert!(w.to_string().contains("table_1"));
        assert!(w.to_string().contains("3 to 2"));
    }

    #[test]
    fn invalid_config_display() {
        let e = ExtractError::InvalidConfig("timeout must be ≥ 1s".into());
        assert!(e.to_string().contains("timeout"));
    }
}
