//! # letterpress
//!
//! Convert uploaded PDFs and bitmap images into email-ready newsletter
//! blocks, and serialise those blocks back into email-client-compatible HTML.
//!
//! ## Why this crate?
//!
//! Email clients render a dialect of HTML frozen somewhere around 2003:
//! tables for layout, inline CSS only, positioned elements stripped at will.
//! Reproducing a designed PDF newsletter in that dialect means rasterising
//! the pages, carrying every hyperlink rectangle through a chain of
//! coordinate transforms (PDF point space → rendered pixels → merged
//! composite → canonical-width strips → display pixels), and emitting links
//! in a form the strictest clients still honour (image maps). That transform
//! chain is this crate.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (PDF / image)
//!  │
//!  ├─ 1. Input    MIME dispatch + magic-byte validation
//!  ├─ 2. Raster   render pages via pdfium, extract link annotations
//!  ├─ 3a. Merge   stack pages into one scroll   (Flat mode, multi-page)
//!  ├─ 3b. Slice   resize to 1600 px, cut strips, re-derive strip links
//!  ├─ 3c. Segment text/image region partition   (Structured mode)
//!  ├─ 4. Encode   PNG buffers for block payloads
//!  └─ 5. HTML     table rows + overlay or image-map links
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use letterpress::{process_file, render_document, HtmlOptions, ProcessConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProcessConfig::builder().slice_height(500).build()?;
//!     let output = process_file("newsletter.pdf", "application/pdf", &config).await?;
//!     let html = render_document(&output.blocks, &HtmlOptions::default());
//!     println!("{html}");
//!     Ok(())
//! }
//! ```
//!
//! ## Choosing a layout mode
//!
//! | Mode | Output | Best for |
//! |------|--------|----------|
//! | `Flat` (default) | image strips of a continuous scroll | faithful visual reproduction |
//! | `Structured` | alternating text and image blocks | editable text, smaller exports |
//! | `Pages` | one block per page with a selectable text layer | page-oriented documents |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `letterpress` binary (clap + anyhow + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! letterpress = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod geometry;
pub mod html;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CancelFlag, LayoutMode, ProcessConfig, ProcessConfigBuilder, SegmenterConfig};
pub use error::{PageError, PipelineError};
pub use geometry::{LinkRegion, Rect};
pub use html::{escape_html, is_valid_url, render_document, HtmlOptions, LinkStyle};
pub use output::{Block, ImageAsset, ProcessOutput, ProcessStats};
pub use pipeline::engine::initialize;
pub use process::{
    inspect, process_bytes, process_file, process_upload, write_html, DocumentInfo,
};
pub use progress::{NoopProgressCallback, ProcessProgressCallback, ProgressCallback};
pub use stream::{process_stream, BlockStream, PageBlocks};
