//! Error types for the letterpress pipeline.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal**: the document cannot be processed at all
//!   (unsupported MIME type, unreadable file, every page failed). Returned as
//!   `Err(PipelineError)` from the top-level `process*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page or region failed but the
//!   rest of the document is fine. Collected into
//!   [`crate::output::ProcessOutput::page_errors`] so callers can inspect a
//!   degraded-but-complete result rather than losing the whole upload to one
//!   bad page.
//!
//! Document-open and format-validation failures are strict (fail fast); the
//! rasterisation stage favours availability, degrading page by page until
//! nothing at all rendered.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the letterpress library.
///
/// Page- and region-level failures use [`PageError`] and are reported in
/// [`crate::output::ProcessOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The declared MIME type is not one the pipeline handles.
    #[error("Unsupported format '{mime}': expected application/pdf or image/*")]
    UnsupportedFormat { mime: String },

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file was declared as a PDF but does not start with `%PDF`.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// The PDF could not be opened or parsed.
    #[error("Failed to parse PDF: {detail}")]
    PdfParse { detail: String },

    /// Every page failed to render; there is nothing to return.
    #[error("All {total} pages failed to render.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// A raw image upload could not be decoded.
    #[error("Failed to decode image: {detail}")]
    ImageDecode { detail: String },

    // ── Lifecycle errors ──────────────────────────────────────────────────
    /// The per-document wall-clock budget was exceeded.
    #[error("Processing exceeded the {budget_ms}ms document budget")]
    Timeout { budget_ms: u64 },

    /// The caller's cancellation flag was observed between pages.
    #[error("Processing was cancelled")]
    Cancelled,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Engine binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install pdfium (e.g. from bblanchon/pdfium-binaries) and either place the\n\
shared library next to the executable or set PDFIUM_LIB_PATH=/path/to/dir.\n"
    )]
    EngineBinding(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page or region.
///
/// Collected alongside the output when part of a document degrades.
/// The overall run continues unless ALL pages fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed; the page was skipped.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Link-annotation extraction failed; the page was kept with no links.
    #[error("Page {page}: link extraction failed: {detail}")]
    LinkExtractionFailed { page: usize, detail: String },

    /// One segmenter gap or region could not be extracted and was omitted.
    #[error("Page {page}: region extraction failed: {detail}")]
    RegionFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page the failure belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::LinkExtractionFailed { page, .. }
            | PageError::RegionFailed { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = PipelineError::UnsupportedFormat {
            mime: "video/mp4".into(),
        };
        assert!(e.to_string().contains("video/mp4"));
    }

    #[test]
    fn all_pages_failed_display() {
        let e = PipelineError::AllPagesFailed {
            total: 4,
            first_error: "boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 4 pages"), "got: {msg}");
        assert!(msg.contains("boom"));
    }

    #[test]
    fn timeout_display() {
        let e = PipelineError::Timeout { budget_ms: 60_000 };
        assert!(e.to_string().contains("60000ms"));
    }

    #[test]
    fn page_error_reports_page() {
        let e = PageError::RenderFailed {
            page: 3,
            detail: "bad xref".into(),
        };
        assert_eq!(e.page(), 3);
        assert!(e.to_string().contains("Page 3"));
    }
}
