//! Pipeline stages for table and figure extraction.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! normalize ──┬──▶ tables
//!             └──▶ classify ──▶ dispatch ──▶ classify ──▶ mermaid ──▶ validate ──▶ postprocess
//!                               │ vision  (EXTERNAL)
//!                               │ llm     (LOCAL)
//!                               │ BASIC / CONTEXT
//!                               └ response, structured
//! ```
//!
//! 1. [`normalize`] — adapters per upstream JSON shape, placeholder discovery
//! 2. [`tables`]    — Markdown / CSV / HTML rendering
//! 3. [`classify`]  — keyword tables for diagram type and convertibility
//! 4. [`dispatch`]  — ordered analysis strategies; the only stage with
//!    network I/O (through [`vision`] and [`llm`])
//! 5. [`mermaid`]   — per-type Mermaid generators
//! 6. [`validate`]  — static Mermaid checks
//! 7. [`postprocess`] — splice Mermaid into the markdown export

pub mod classify;
pub mod dispatch;
pub mod encode;
pub mod llm;
pub mod mermaid;
pub mod normalize;
pub mod postprocess;
pub mod response;
pub mod structured;
pub mod tables;
pub mod validate;
pub mod vision;
