//! Pipeline stages for document-to-block conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch rendering backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ raster ──▶ (merge ──▶ slice | segment) ──▶ encode
//! (sniff)   (pdfium)   (composite)  (strips) (regions)  (PNG)
//! ```
//!
//! 1. [`input`]   — classify the upload (PDF vs image) and validate magic
//!    bytes before the engine ever sees it
//! 2. [`engine`]  — idempotent pdfium initialisation and per-run binding
//! 3. [`raster`]  — rasterise pages and extract link annotations; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 4. [`merge`]   — stack multi-page bitmaps into one composite, offsetting
//!    links by cumulative page height
//! 5. [`slice`]   — resize to the canonical width and cut into strips,
//!    re-deriving each strip's links
//! 6. [`segment`] — alternative to merge/slice: partition a page into text
//!    and image regions by text geometry + pixel scanning
//! 7. [`encode`]  — PNG-encode bitmaps for block payloads
//!
//! Data flows strictly downstream; each stage returns a new, fully-owned
//! structure and never mutates its input in place.

pub mod encode;
pub mod engine;
pub mod input;
pub mod merge;
pub mod raster;
pub mod segment;
pub mod slice;
