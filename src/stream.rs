//! Streaming API: emit each page's blocks as soon as that page is ready.
//!
//! ## Why stream?
//!
//! Large documents take seconds to minutes to rasterise. A stream lets a
//! server push partial results to the editor as pages finish instead of
//! holding the whole block list (and every page bitmap) in memory first.
//!
//! Streaming works per page, so the cross-page merge of Flat mode is
//! unavailable by construction: each page is sliced independently, exactly
//! as eager Flat mode behaves with `merge_pages` off. Pages arrive strictly
//! in page order.

use crate::config::{LayoutMode, ProcessConfig};
use crate::error::{PageError, PipelineError};
use crate::output::{Block, ImageAsset};
use crate::pipeline::input::{self, SourceKind};
use crate::pipeline::raster::{self, RasterPage};
use crate::pipeline::segment::{self, RegionBlock};
use crate::pipeline::{encode, slice};
use futures::stream::{self, StreamExt};
use image::RgbaImage;
use std::path::Path;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::{info, warn};

/// The blocks produced from one source page.
#[derive(Debug)]
pub struct PageBlocks {
    /// 0-indexed source page.
    pub page_index: usize,
    pub blocks: Vec<Block>,
}

/// A boxed stream of per-page results.
pub type BlockStream = Pin<Box<dyn Stream<Item = Result<PageBlocks, PageError>> + Send>>;

/// Process a document, streaming each page's blocks as they are produced.
///
/// Fatal failures (unsupported MIME, unreadable document, every page failed)
/// surface as `Err(PipelineError)` before any stream exists; per-page
/// failures flow through the stream as `Err(PageError)` items.
pub async fn process_stream(
    path: impl AsRef<Path>,
    mime: &str,
    config: &ProcessConfig,
) -> Result<BlockStream, PipelineError> {
    let path = path.as_ref();
    info!("Streaming {} ({})", path.display(), mime);

    match input::classify(mime)? {
        SourceKind::Pdf => stream_pdf(path, config).await,
        SourceKind::Image => stream_image(path, config).await,
    }
}

async fn stream_pdf(path: &Path, config: &ProcessConfig) -> Result<BlockStream, PipelineError> {
    input::validate_pdf_magic(path)?;

    let extract_text = matches!(config.layout, LayoutMode::Structured | LayoutMode::Pages);
    let outcome = raster::rasterize(path, config, extract_text).await?;

    // Render failures become stream items so consumers see them in order.
    let mut items: Vec<Result<RasterPage, PageError>> = outcome
        .errors
        .into_iter()
        .filter(|e| matches!(e, PageError::RenderFailed { .. }))
        .map(Err)
        .collect();
    items.extend(outcome.pages.into_iter().map(Ok));
    items.sort_by_key(|item| match item {
        Ok(page) => page.page_index,
        Err(e) => e.page().saturating_sub(1),
    });

    let cfg = config.clone();
    let s = stream::iter(items).map(move |item| {
        item.and_then(|page| transform_page(page, &cfg))
    });
    Ok(Box::pin(s))
}

async fn stream_image(path: &Path, config: &ProcessConfig) -> Result<BlockStream, PipelineError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|_| PipelineError::FileNotFound {
            path: path.to_path_buf(),
        })?;
    let bitmap = tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes)
            .map(|img| img.to_rgba8())
            .map_err(|e| PipelineError::ImageDecode {
                detail: e.to_string(),
            })
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("Decode task panicked: {}", e)))??;

    let cfg = config.clone();
    let s = stream::iter(vec![RasterPage::from_bitmap(bitmap)])
        .map(move |page| transform_page(page, &cfg));
    Ok(Box::pin(s))
}

/// Convert one rendered page into its blocks under the configured mode.
fn transform_page(page: RasterPage, config: &ProcessConfig) -> Result<PageBlocks, PageError> {
    let page_index = page.page_index;
    let page_num = page_index + 1;

    let blocks = match config.layout {
        LayoutMode::Flat => slice::slice_bitmap(
            &page.bitmap,
            config.slice_height,
            &page.links,
            config.canonical_width,
        )
        .into_iter()
        .map(|s| {
            Ok(Block::Image {
                image: encode_asset(&s.bitmap, page_num)?,
                width: s.width,
                height: s.height,
                links: s.links,
            })
        })
        .collect::<Result<Vec<_>, PageError>>()?,

        LayoutMode::Structured => {
            let (regions, errors) = segment::segment_page(&page, &config.segmenter);
            for e in errors {
                warn!("Recovered region failure: {}", e);
            }
            regions
                .into_iter()
                .map(|region| match region {
                    RegionBlock::Text { html, .. } => Ok(Block::Text { content: html }),
                    RegionBlock::Image {
                        y,
                        height,
                        width,
                        bitmap,
                    } => Ok(Block::Image {
                        image: encode_asset(&bitmap, page_num)?,
                        width,
                        height: height.round() as u32,
                        links: segment::project_links_into_band(&page.links, y, height),
                    }),
                })
                .collect::<Result<Vec<_>, PageError>>()?
        }

        LayoutMode::Pages => {
            let layer = segment::text_layer_html(&page.text_items);
            vec![Block::Pdf {
                image: encode_asset(&page.bitmap, page_num)?,
                content: (!layer.is_empty()).then_some(layer),
                width: page.width,
                height: page.height,
                links: page.links,
            }]
        }
    };

    Ok(PageBlocks { page_index, blocks })
}

fn encode_asset(bitmap: &RgbaImage, page_num: usize) -> Result<ImageAsset, PageError> {
    encode::encode_png(bitmap)
        .map(ImageAsset::Png)
        .map_err(|e| PageError::RenderFailed {
            page: page_num,
            detail: format!("PNG encoding failed: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[tokio::test]
    async fn image_stream_yields_one_page_of_slices() {
        let tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        RgbaImage::from_pixel(1600, 1000, Rgba([5, 5, 5, 255]))
            .save_with_format(tmp.path(), image::ImageFormat::Png)
            .unwrap();

        let config = ProcessConfig::builder().slice_height(400).build().unwrap();
        let mut s = process_stream(tmp.path(), "image/png", &config)
            .await
            .unwrap();

        let mut pages = Vec::new();
        while let Some(item) = s.next().await {
            pages.push(item.unwrap());
        }
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_index, 0);
        // 1000 / 400 → 3 strips (400, 400, 200).
        assert_eq!(pages[0].blocks.len(), 3);
    }

    #[tokio::test]
    async fn stream_rejects_unsupported_mime() {
        let config = ProcessConfig::default();
        // `BlockStream` is a boxed trait object and cannot implement `Debug`,
        // so `unwrap_err()` (which needs `Ok: Debug`) won't compile; extract
        // the error by hand instead.
        let err = match process_stream("x.bin", "text/plain", &config).await {
            Ok(_) => panic!("expected an error for unsupported MIME"),
            Err(e) => e,
        };
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }
}
