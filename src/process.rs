//! Top-level document processing entry points.
//!
//! [`process_file`] is the primary API: MIME dispatch, stage orchestration,
//! and all-or-nothing failure semantics. Page- and region-level failures
//! degrade the result (see [`ProcessOutput::page_errors`]); everything else
//! propagates as a single typed [`PipelineError`] — a caller never receives
//! partial output from a failed run.
//!
//! [`process_bytes`] and [`process_upload`] wrap it with the two upload
//! lifecycles: in-memory bytes spooled to a managed temp file, and a
//! caller-owned temp file that must be deleted whether processing succeeds
//! or fails.

use crate::config::{LayoutMode, ProcessConfig};
use crate::error::{PageError, PipelineError};
use crate::output::{Block, ImageAsset, ProcessOutput, ProcessStats};
use crate::pipeline::input::{self, SourceKind};
use crate::pipeline::raster::{self, RasterPage};
use crate::pipeline::segment::{self, RegionBlock};
use crate::pipeline::slice::{self, Slice};
use crate::pipeline::{encode, merge};
use image::RgbaImage;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub use crate::pipeline::raster::DocumentInfo;

/// Process an uploaded document into an ordered block list.
///
/// Dispatches on `mime`: `application/pdf` runs the PDF pipeline in the
/// configured [`LayoutMode`]; `image/*` decodes the bitmap and runs the
/// slicer; anything else fails with
/// [`PipelineError::UnsupportedFormat`].
pub async fn process_file(
    path: impl AsRef<Path>,
    mime: &str,
    config: &ProcessConfig,
) -> Result<ProcessOutput, PipelineError> {
    let path = path.as_ref();
    let started = Instant::now();
    info!("Processing {} ({})", path.display(), mime);

    match input::classify(mime)? {
        SourceKind::Pdf => process_pdf(path, config, started).await,
        SourceKind::Image => process_image(path, config, started).await,
    }
}

/// Process in-memory document bytes.
///
/// The bytes are written to a managed temp file (the rendering engine needs
/// a file-system path) which is removed automatically on return or panic.
pub async fn process_bytes(
    bytes: &[u8],
    mime: &str,
    config: &ProcessConfig,
) -> Result<ProcessOutput, PipelineError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| PipelineError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| PipelineError::Internal(format!("tempfile write: {e}")))?;
    // `tmp` is dropped (and the file deleted) when this function returns.
    process_file(tmp.path(), mime, config).await
}

/// Process a caller-owned uploaded temp file, deleting it afterwards.
///
/// The delete runs on success *and* failure — uploads must never accumulate.
pub async fn process_upload(
    path: impl AsRef<Path>,
    mime: &str,
    config: &ProcessConfig,
) -> Result<ProcessOutput, PipelineError> {
    let path = path.as_ref();
    let _guard = UploadGuard { path };
    process_file(path, mime, config).await
}

/// Read page count and dimensions without rendering.
pub async fn inspect(
    path: impl AsRef<Path>,
    password: Option<&str>,
) -> Result<DocumentInfo, PipelineError> {
    let path = path.as_ref();
    input::validate_pdf_magic(path)?;
    raster::inspect(path, password).await
}

/// Write an exported HTML document atomically (temp file + rename).
pub async fn write_html(html: &str, path: impl AsRef<Path>) -> Result<(), PipelineError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PipelineError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            })?;
        }
    }

    let tmp_path = path.with_extension("html.tmp");
    tokio::fs::write(&tmp_path, html)
        .await
        .map_err(|e| PipelineError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| PipelineError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Deletes the wrapped upload on drop, success or failure.
struct UploadGuard<'a> {
    path: &'a Path,
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(self.path) {
            warn!("Failed to remove upload {}: {}", self.path.display(), e);
        }
    }
}

// ── PDF branch ───────────────────────────────────────────────────────────

async fn process_pdf(
    path: &Path,
    config: &ProcessConfig,
    started: Instant,
) -> Result<ProcessOutput, PipelineError> {
    input::validate_pdf_magic(path)?;

    // The wall-clock budget scales with the document: a 3-page flyer and a
    // 300-page catalogue should not share a limit.
    let info = raster::inspect(path, config.password.as_deref()).await?;
    let budget_ms = config.page_timeout_ms * info.page_count.max(1) as u64;

    let work = run_pdf_pipeline(path, config, started);
    if budget_ms > 0 {
        match tokio::time::timeout(Duration::from_millis(budget_ms), work).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout { budget_ms }),
        }
    } else {
        work.await
    }
}

async fn run_pdf_pipeline(
    path: &Path,
    config: &ProcessConfig,
    started: Instant,
) -> Result<ProcessOutput, PipelineError> {
    let extract_text = matches!(config.layout, LayoutMode::Structured | LayoutMode::Pages);

    let render_start = Instant::now();
    let outcome = raster::rasterize(path, config, extract_text).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let total_pages = outcome.total_pages;
    let rendered_pages = outcome.pages.len();
    let mut page_errors = outcome.errors;
    info!(
        "Rendered {}/{} pages in {}ms",
        rendered_pages, total_pages, render_duration_ms
    );

    let blocks = match config.layout {
        LayoutMode::Flat => flat_blocks(outcome.pages, config)?,
        LayoutMode::Structured => structured_blocks(outcome.pages, config, &mut page_errors)?,
        LayoutMode::Pages => page_blocks(outcome.pages)?,
    };

    if let Some(ref cb) = config.progress {
        cb.on_process_complete(total_pages, rendered_pages);
    }

    Ok(ProcessOutput {
        stats: ProcessStats {
            total_pages,
            rendered_pages,
            failed_pages: total_pages - rendered_pages,
            block_count: blocks.len(),
            render_duration_ms,
            total_duration_ms: started.elapsed().as_millis() as u64,
        },
        blocks,
        page_errors,
    })
}

/// Flat mode: merge (optional) then slice into image strips.
fn flat_blocks(pages: Vec<RasterPage>, config: &ProcessConfig) -> Result<Vec<Block>, PipelineError> {
    let mut blocks = Vec::new();

    if pages.len() > 1 && config.merge_pages {
        let composite = merge::merge_pages(pages);
        let slices = slice::slice_bitmap(
            &composite.bitmap,
            config.slice_height,
            &composite.links,
            config.canonical_width,
        );
        for s in slices {
            blocks.push(slice_to_block(s)?);
        }
    } else {
        // Each page sliced independently: strips never span a page boundary.
        for page in pages {
            let slices = slice::slice_bitmap(
                &page.bitmap,
                config.slice_height,
                &page.links,
                config.canonical_width,
            );
            for s in slices {
                blocks.push(slice_to_block(s)?);
            }
        }
    }

    Ok(blocks)
}

fn slice_to_block(slice: Slice) -> Result<Block, PipelineError> {
    Ok(Block::Image {
        image: encode_asset(&slice.bitmap)?,
        width: slice.width,
        height: slice.height,
        links: slice.links,
    })
}

/// Structured mode: per-page text/image decomposition, skipping merge/slice.
fn structured_blocks(
    pages: Vec<RasterPage>,
    config: &ProcessConfig,
    page_errors: &mut Vec<PageError>,
) -> Result<Vec<Block>, PipelineError> {
    let mut blocks = Vec::new();

    for page in pages {
        let (regions, errors) = segment::segment_page(&page, &config.segmenter);
        page_errors.extend(errors);
        debug!(
            "Page {}: {} regions",
            page.page_index + 1,
            regions.len()
        );

        for region in regions {
            match region {
                RegionBlock::Text { html, .. } => blocks.push(Block::Text { content: html }),
                RegionBlock::Image {
                    y,
                    height,
                    width,
                    bitmap,
                } => {
                    let links = segment::project_links_into_band(&page.links, y, height);
                    blocks.push(Block::Image {
                        image: encode_asset(&bitmap)?,
                        width,
                        height: height.round() as u32,
                        links,
                    });
                }
            }
        }
    }

    Ok(blocks)
}

/// Pages mode: one self-contained PDF block per page.
fn page_blocks(pages: Vec<RasterPage>) -> Result<Vec<Block>, PipelineError> {
    let mut blocks = Vec::with_capacity(pages.len());
    for page in pages {
        let layer = segment::text_layer_html(&page.text_items);
        blocks.push(Block::Pdf {
            image: encode_asset(&page.bitmap)?,
            content: (!layer.is_empty()).then_some(layer),
            width: page.width,
            height: page.height,
            links: page.links,
        });
    }
    Ok(blocks)
}

// ── Image branch ─────────────────────────────────────────────────────────

async fn process_image(
    path: &Path,
    config: &ProcessConfig,
    started: Instant,
) -> Result<ProcessOutput, PipelineError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PipelineError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(PipelineError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let work = async {
        let render_start = Instant::now();
        let bitmap = decode_image(bytes).await?;
        let page = RasterPage::from_bitmap(bitmap);
        let render_duration_ms = render_start.elapsed().as_millis() as u64;

        if let Some(ref cb) = config.progress {
            cb.on_process_start(1);
            cb.on_page_rendered(1, 1, 0);
        }

        let slices = slice::slice_bitmap(
            &page.bitmap,
            config.slice_height,
            &page.links,
            config.canonical_width,
        );
        let blocks = slices
            .into_iter()
            .map(slice_to_block)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(ref cb) = config.progress {
            cb.on_process_complete(1, 1);
        }

        Ok(ProcessOutput {
            stats: ProcessStats {
                total_pages: 1,
                rendered_pages: 1,
                failed_pages: 0,
                block_count: blocks.len(),
                render_duration_ms,
                total_duration_ms: started.elapsed().as_millis() as u64,
            },
            blocks,
            page_errors: Vec::new(),
        })
    };

    if config.page_timeout_ms > 0 {
        match tokio::time::timeout(Duration::from_millis(config.page_timeout_ms), work).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                budget_ms: config.page_timeout_ms,
            }),
        }
    } else {
        work.await
    }
}

/// Decode image bytes off the async runtime's hot path.
async fn decode_image(bytes: Vec<u8>) -> Result<RgbaImage, PipelineError> {
    tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes)
            .map(|img| img.to_rgba8())
            .map_err(|e| PipelineError::ImageDecode {
                detail: e.to_string(),
            })
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("Decode task panicked: {}", e)))?
}

fn encode_asset(bitmap: &RgbaImage) -> Result<ImageAsset, PipelineError> {
    encode::encode_png(bitmap)
        .map(ImageAsset::Png)
        .map_err(|e| PipelineError::Internal(format!("PNG encoding failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn write_png(width: u32, height: u32) -> tempfile::NamedTempFile {
        let tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        img.save_with_format(tmp.path(), image::ImageFormat::Png)
            .unwrap();
        tmp
    }

    #[tokio::test]
    async fn unsupported_mime_is_rejected() {
        let config = ProcessConfig::default();
        let err = process_file("whatever.bin", "application/zip", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn image_upload_slices_into_blocks() {
        let tmp = write_png(1600, 2000);
        let config = ProcessConfig::builder().slice_height(500).build().unwrap();

        let output = process_file(tmp.path(), "image/png", &config).await.unwrap();
        assert_eq!(output.blocks.len(), 4);
        assert_eq!(output.stats.total_pages, 1);
        assert_eq!(output.stats.block_count, 4);
        for block in &output.blocks {
            match block {
                Block::Image {
                    width,
                    height,
                    links,
                    ..
                } => {
                    assert_eq!(*width, 1600);
                    assert_eq!(*height, 500);
                    assert!(links.is_empty());
                }
                other => panic!("expected image block, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn image_upload_without_slicing_is_one_block() {
        let tmp = write_png(1600, 2000);
        let config = ProcessConfig::builder().slice_height(0).build().unwrap();

        let output = process_file(tmp.path(), "image/png", &config).await.unwrap();
        assert_eq!(output.blocks.len(), 1);
        match &output.blocks[0] {
            Block::Image { height, .. } => assert_eq!(*height, 2000),
            other => panic!("expected image block, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slice_height_larger_than_image_means_one_block() {
        let tmp = write_png(1600, 2000);
        let config = ProcessConfig::builder().slice_height(3000).build().unwrap();

        let output = process_file(tmp.path(), "image/png", &config).await.unwrap();
        assert_eq!(output.blocks.len(), 1);
    }

    #[tokio::test]
    async fn process_bytes_spools_and_cleans_up() {
        let img = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();

        let config = ProcessConfig::default();
        let output = process_bytes(&bytes, "image/png", &config).await.unwrap();
        assert_eq!(output.blocks.len(), 1);
    }

    #[tokio::test]
    async fn process_upload_deletes_the_file_even_on_failure() {
        let tmp = write_png(10, 10);
        // Steal the path and persist the file so the guard is the only cleanup.
        let (_file, path) = tmp.keep().unwrap();

        let config = ProcessConfig::default();
        // Declared PDF, actually PNG: fails the magic check.
        let err = process_upload(&path, "application/pdf", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotAPdf { .. }));
        assert!(!path.exists(), "upload must be deleted on failure");
    }

    #[tokio::test]
    async fn garbage_image_bytes_fail_to_decode() {
        let config = ProcessConfig::default();
        let err = process_bytes(b"not an image at all", "image/png", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ImageDecode { .. }));
    }

    #[tokio::test]
    async fn missing_pdf_fails_before_engine_load() {
        let config = ProcessConfig::default();
        let err = process_file("/no/such/file.pdf", "application/pdf", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn write_html_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("export.html");
        write_html("<!DOCTYPE html><html></html>", &out).await.unwrap();
        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.starts_with("<!DOCTYPE html>"));
        assert!(!dir.path().join("export.html.tmp").exists());
    }
}
