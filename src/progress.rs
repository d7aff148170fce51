//! Progress-callback trait for per-figure extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to observe
//! the pipeline as it works through a document's figures.
//!
//! # Example
//!
//! ```rust
//! use edgequake_figtab::{ExtractionProgressCallback, ExtractionConfig, Strategy};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     analysed: Arc<AtomicUsize>,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_figure_complete(&self, figure_id: &str, strategy: Strategy, confidence: f64) {
//!         self.analysed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{figure_id}: {strategy} ({confidence:.2})");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     analysed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::document::Strategy;
use std::sync::Arc;

/// Called by the extraction pipeline as it processes each figure.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Figures are processed one at a time, in discovery
/// order.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once, after normalization.
    ///
    /// # Arguments
    /// * `tables`  — number of tables found
    /// * `figures` — number of figures found
    fn on_extraction_start(&self, tables: usize, figures: usize) {
        let _ = (tables, figures);
    }

    /// Called before the first analysis strategy runs for a figure.
    fn on_figure_start(&self, figure_id: &str, index: usize, total: usize) {
        let _ = (figure_id, index, total);
    }

    /// Called when a figure's analysis ends, successfully or as a failure record.
    ///
    /// # Arguments
    /// * `strategy`   — the strategy that produced the result
    /// * `confidence` — the result's confidence (0.0 for failure records)
    fn on_figure_complete(&self, figure_id: &str, strategy: Strategy, confidence: f64) {
        let _ = (figure_id, strategy, confidence);
    }

    /// Called for a figure with neither pixels nor surrounding text.
    fn on_figure_skipped(&self, figure_id: &str) {
        let _ = figure_id;
    }

    /// Called once after every figure has been attempted.
    ///
    /// # Arguments
    /// * `tables`   — table records emitted
    /// * `diagrams` — diagram records emitted
    fn on_extraction_complete(&self, tables: usize, diagrams: usize) {
        let _ = (tables, diagrams);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        skipped: AtomicUsize,
        strategies: Mutex<Vec<Strategy>>,
        totals: Mutex<Option<(usize, usize)>>,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_figure_start(&self, _figure_id: &str, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_figure_complete(&self, _figure_id: &str, strategy: Strategy, _confidence: f64) {
            self.strategies.lock().unwrap().push(strategy);
        }

        fn on_figure_skipped(&self, _figure_id: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_extraction_complete(&self, tables: usize, diagrams: usize) {
            *self.totals.lock().unwrap() = Some((tables, diagrams));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(1, 2);
        cb.on_figure_start("diagram_1", 1, 2);
        cb.on_figure_complete("diagram_1", Strategy::Basic, 0.5);
        cb.on_figure_skipped("diagram_2");
        cb.on_extraction_complete(1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_figure_start("diagram_1", 1, 2);
        tracker.on_figure_complete("diagram_1", Strategy::Context, 0.8);
        tracker.on_figure_start("diagram_2", 2, 2);
        tracker.on_figure_skipped("diagram_2");
        tracker.on_extraction_complete(0, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.strategies.lock().unwrap(), vec![Strategy::Context]);
        assert_eq!(*tracker.totals.lock().unwrap(), Some((0, 1)));
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_extraction_start(3, 4);
    }
}
