//! Output types: the block model consumed by the editor and serialiser.
//!
//! A pipeline run produces an ordered [`Block`] list plus run statistics.
//! Blocks are created once per run and are immutable afterwards, with one
//! exception: the orchestrating layer may swap a block's PNG buffer for a
//! persisted URL after storing it (see [`ImageAsset::into_url`]). Downstream
//! consumers receive the list read-only.

use crate::error::PageError;
use crate::geometry::LinkRegion;
use serde::{Deserialize, Serialize};

/// The pixel payload of an image-bearing block.
///
/// The pipeline always emits owned PNG bytes; the persistence collaborator
/// (out of scope here) may store them and replace the asset with an opaque
/// URL it assigns (e.g. `/uploads/1712345678-ab12cd.png`). Exactly one
/// representation exists per block at any time — never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum ImageAsset {
    /// Encoded PNG bytes, serialised as base64.
    Png(#[serde(with = "png_base64")] Vec<u8>),
    /// An opaque URL assigned by the persistence layer; passed through
    /// uninterpreted.
    Url(String),
}

impl ImageAsset {
    /// An `src` attribute value: the URL, or a `data:` URI for raw bytes.
    pub fn src(&self) -> String {
        match self {
            ImageAsset::Png(bytes) => crate::pipeline::encode::data_uri(bytes),
            ImageAsset::Url(url) => url.clone(),
        }
    }

    /// Replace the buffer with a persisted URL (a no-op for URL assets).
    pub fn into_url(self, url: impl Into<String>) -> Self {
        let _ = self;
        ImageAsset::Url(url.into())
    }

    /// The PNG bytes, if this asset still owns them.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            ImageAsset::Png(bytes) => Some(bytes),
            ImageAsset::Url(_) => None,
        }
    }
}

mod png_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// One unit of newsletter content.
///
/// The pipeline emits `Image`, `Text`, and `Pdf` blocks; `Html` blocks are
/// authored by the rich-text editor layer and only pass through the
/// serialiser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    /// A bitmap strip or extracted image region, with overlay links.
    Image {
        image: ImageAsset,
        /// Natural pixel width the link coordinates are expressed against.
        width: u32,
        height: u32,
        links: Vec<LinkRegion>,
    },
    /// Already-sanitised HTML extracted from a text region.
    Text { content: String },
    /// A full PDF page: image, optional selectable text layer, and links in
    /// the page's own pixel frame.
    Pdf {
        image: ImageAsset,
        content: Option<String>,
        width: u32,
        height: u32,
        links: Vec<LinkRegion>,
    },
    /// Raw HTML authored upstream; emitted verbatim.
    Html { content: String, page_index: usize },
}

impl Block {
    /// Links carried by this block, if any.
    pub fn links(&self) -> &[LinkRegion] {
        match self {
            Block::Image { links, .. } | Block::Pdf { links, .. } => links,
            Block::Text { .. } | Block::Html { .. } => &[],
        }
    }
}

/// Timing and coverage statistics for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessStats {
    /// Pages in the source document (1 for raw images).
    pub total_pages: usize,
    /// Pages that rendered successfully.
    pub rendered_pages: usize,
    /// Pages skipped after a render failure.
    pub failed_pages: usize,
    /// Blocks in the output list.
    pub block_count: usize,
    /// Wall-clock spent rasterising.
    pub render_duration_ms: u64,
    /// Wall-clock for the whole run.
    pub total_duration_ms: u64,
}

/// The result of processing one upload.
///
/// A degraded document (some pages or regions dropped) is still `Ok`; check
/// `page_errors` and `stats.failed_pages` to see what was lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub blocks: Vec<Block>,
    pub stats: ProcessStats,
    /// Recovered page/region failures, in page order.
    pub page_errors: Vec<PageError>,
}
