//! Configuration types for document processing.
//!
//! All pipeline behaviour is controlled through [`ProcessConfig`], built via
//! its [`ProcessConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across requests, serialise the scalar parts for
//! logging, and diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::PipelineError;
use crate::progress::ProcessProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How a document is decomposed into blocks.
///
/// The three modes correspond to the three shapes the editor can consume:
/// a flat scroll of image strips, a structural text/image decomposition, and
/// one self-contained block per page with a selectable text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Rasterise, optionally merge pages into one tall composite, then slice
    /// into strips. (default)
    #[default]
    Flat,
    /// Partition each page into alternating text and image regions.
    Structured,
    /// One PDF block per page: full page image + transparent text layer.
    Pages,
}

/// Knobs for the text/image region segmenter.
///
/// The blank-band detection is a pixel-sampling heuristic — inherently
/// approximate — so its thresholds are configuration, not constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// A new text region starts when the next item's top exceeds the running
    /// region's bottom by more than this many pixels. Ties extend the region.
    pub gap_threshold: f32,
    /// Gaps shorter than this are discarded without sampling.
    pub min_gap_height: f32,
    /// A channel value at or above this counts as "near white".
    pub near_white_threshold: u8,
    /// Sample every Nth pixel when scanning a gap band.
    pub sample_stride: usize,
    /// Items within this y-delta are joined into the same output line.
    pub line_merge_threshold: f32,
    /// Items within this y-delta sort left-to-right as one visual line.
    pub same_line_threshold: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            gap_threshold: 10.0,
            min_gap_height: 5.0,
            near_white_threshold: 250,
            sample_stride: 10,
            line_merge_threshold: 8.0,
            same_line_threshold: 5.0,
        }
    }
}

/// A request-scoped cancellation flag, checked between page iterations.
///
/// Clone the flag, hand one copy to the config, and call [`CancelFlag::cancel`]
/// from the owning task (e.g. on client disconnect). A large multi-page PDF
/// can take seconds to minutes to rasterise; this is the only way to stop it
/// early.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Observed at the next page boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Configuration for one document-processing run.
///
/// Built via [`ProcessConfig::builder()`] or [`ProcessConfig::default()`].
///
/// # Example
/// ```rust
/// use letterpress::{LayoutMode, ProcessConfig};
///
/// let config = ProcessConfig::builder()
///     .slice_height(500)
///     .layout(LayoutMode::Flat)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ProcessConfig {
    /// PDF render scale factor. Range: 1.0–4.0. Default: 2.0.
    ///
    /// 2.0 doubles the page's point dimensions, which matches the 2x pixel
    /// density the serialiser assumes (1600 px working width shown at
    /// 800 px). Lower scales blur text on high-DPI screens; higher scales
    /// inflate memory and output size with no visible gain in email clients.
    pub render_scale: f32,

    /// Working width every bitmap is resized to before slicing. Default: 1600.
    ///
    /// Links are expressed against this width, so the serialiser's
    /// `display_width / canonical_width` projection is a single uniform
    /// scale.
    pub canonical_width: u32,

    /// Final email display width in CSS pixels. Default: 800.
    pub display_width: u32,

    /// Maximum slice height in canonical-width pixels. `<= 0` means "do not
    /// slice" — the whole bitmap becomes one slice. Default: 0.
    ///
    /// Email clients clip or downsample very tall images; slicing keeps each
    /// `<img>` within a height they handle well while the strips still abut
    /// seamlessly.
    pub slice_height: i32,

    /// Block decomposition strategy. Default: [`LayoutMode::Flat`].
    pub layout: LayoutMode,

    /// In Flat mode, stack multi-page documents into one continuous scroll
    /// before slicing. Default: true.
    ///
    /// When off, each page is sliced independently and strips keep per-page
    /// boundaries (a strip never spans two pages).
    pub merge_pages: bool,

    /// Region-segmenter thresholds (Structured mode only).
    pub segmenter: SegmenterConfig,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Per-page wall-clock budget in milliseconds; the document budget is
    /// `page_count × page_timeout_ms`. 0 disables the timeout. Default: 0.
    pub page_timeout_ms: u64,

    /// Request-scoped cancellation flag, checked between pages.
    pub cancel: Option<CancelFlag>,

    /// Per-page progress events (rendered / failed / complete).
    pub progress: Option<Arc<dyn ProcessProgressCallback>>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            render_scale: 2.0,
            canonical_width: 1600,
            display_width: 800,
            slice_height: 0,
            layout: LayoutMode::default(),
            merge_pages: true,
            segmenter: SegmenterConfig::default(),
            password: None,
            page_timeout_ms: 0,
            cancel: None,
            progress: None,
        }
    }
}

impl fmt::Debug for ProcessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessConfig")
            .field("render_scale", &self.render_scale)
            .field("canonical_width", &self.canonical_width)
            .field("display_width", &self.display_width)
            .field("slice_height", &self.slice_height)
            .field("layout", &self.layout)
            .field("merge_pages", &self.merge_pages)
            .field("segmenter", &self.segmenter)
            .field("page_timeout_ms", &self.page_timeout_ms)
            .field("cancel", &self.cancel.as_ref().map(|c| c.is_cancelled()))
            .field("progress", &self.progress.as_ref().map(|_| "<dyn Callback>"))
            .finish()
    }
}

impl ProcessConfig {
    /// Create a new builder for `ProcessConfig`.
    pub fn builder() -> ProcessConfigBuilder {
        ProcessConfigBuilder {
            config: Self::default(),
        }
    }

    /// The uniform projection from canonical width to display width
    /// (0.5 with the defaults).
    pub fn display_scale(&self) -> f32 {
        self.display_width as f32 / self.canonical_width as f32
    }
}

/// Builder for [`ProcessConfig`].
#[derive(Debug)]
pub struct ProcessConfigBuilder {
    config: ProcessConfig,
}

impl ProcessConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(1.0, 4.0);
        self
    }

    pub fn canonical_width(mut self, px: u32) -> Self {
        self.config.canonical_width = px.max(1);
        self
    }

    pub fn display_width(mut self, px: u32) -> Self {
        self.config.display_width = px.max(1);
        self
    }

    pub fn slice_height(mut self, px: i32) -> Self {
        self.config.slice_height = px;
        self
    }

    pub fn layout(mut self, mode: LayoutMode) -> Self {
        self.config.layout = mode;
        self
    }

    pub fn merge_pages(mut self, v: bool) -> Self {
        self.config.merge_pages = v;
        self
    }

    pub fn segmenter(mut self, cfg: SegmenterConfig) -> Self {
        self.config.segmenter = cfg;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn page_timeout_ms(mut self, ms: u64) -> Self {
        self.config.page_timeout_ms = ms;
        self
    }

    pub fn cancel(mut self, flag: CancelFlag) -> Self {
        self.config.cancel = Some(flag);
        self
    }

    pub fn progress(mut self, cb: Arc<dyn ProcessProgressCallback>) -> Self {
        self.config.progress = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessConfig, PipelineError> {
        let c = &self.config;
        if c.canonical_width < c.display_width {
            return Err(PipelineError::InvalidConfig(format!(
                "canonical_width ({}) must be >= display_width ({})",
                c.canonical_width, c.display_width
            )));
        }
        if !(1.0..=4.0).contains(&c.render_scale) {
            return Err(PipelineError::InvalidConfig(format!(
                "render_scale must be 1.0–4.0, got {}",
                c.render_scale
            )));
        }
        if c.segmenter.sample_stride == 0 {
            return Err(PipelineError::InvalidConfig(
                "segmenter.sample_stride must be >= 1".into(),
            ));
        }
        Ok(self.config)
    }
}
