//! Progress-callback trait for per-page pipeline events.
//!
//! Inject an [`Arc<dyn ProcessProgressCallback>`] via
//! [`crate::config::ProcessConfigBuilder::progress`] to receive real-time
//! events as the pipeline rasterises each page.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a broadcast channel, a WebSocket, or a terminal progress
//! bar — without the library knowing anything about how the host application
//! communicates. The trait is `Send + Sync` so the config (and the callback
//! inside it) can move into the blocking rendering task.

use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are rendered sequentially, so events for one
/// document arrive in page order.
pub trait ProcessProgressCallback: Send + Sync {
    /// Called once after the document is opened, before any page renders.
    fn on_process_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a page has been rasterised and its links extracted.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total pages in the document
    /// * `link_count`  — link annotations found on the page
    fn on_page_rendered(&self, page_num: usize, total_pages: usize, link_count: usize) {
        let _ = (page_num, total_pages, link_count);
    }

    /// Called when a page fails to render and is skipped.
    fn on_page_failed(&self, page_num: usize, total_pages: usize, error: String) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once when the run finishes, before the result is returned.
    fn on_process_complete(&self, total_pages: usize, rendered_pages: usize) {
        let _ = (total_pages, rendered_pages);
    }
}

/// Convenience alias for the stored callback type.
pub type ProgressCallback = Arc<dyn ProcessProgressCallback>;

/// A callback that ignores every event.
pub struct NoopProgressCallback;

impl ProcessProgressCallback for NoopProgressCallback {}
