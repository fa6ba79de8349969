//! PDF rasterisation: render pages to bitmaps and extract link annotations
//! in matching pixel coordinates.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread designed for blocking operations, preventing the Tokio worker
//! threads from stalling during CPU-heavy rendering. Pages within one
//! document render strictly sequentially — the engine's rendering context is
//! not reentrancy-safe, and diagnostics assume page order.
//!
//! ## Coordinate transform
//!
//! PDF rectangles use a bottom-left origin with y growing upward; bitmaps use
//! a top-left origin with y growing downward. Every extracted rectangle is
//! mapped through the same viewport transform the renderer uses
//! (`x_px = x_pt × scale`, `y_px = (page_height_pt − y_pt) × scale`) and then
//! corner-normalised, because PDF producers emit annotation rectangles with
//! arbitrary corner ordering.

use crate::config::ProcessConfig;
use crate::error::{PageError, PipelineError};
use crate::geometry::{LinkRegion, Rect};
use crate::pipeline::engine;
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// One rendered page: bitmap, link set, and (optionally) text geometry.
///
/// Owned exclusively by the stage that produced it until the next stage
/// consumes it; nothing retains a page bitmap once its blocks exist.
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// 0-indexed source page.
    pub page_index: usize,
    pub bitmap: RgbaImage,
    /// Bitmap pixel dimensions at render scale.
    pub width: u32,
    pub height: u32,
    /// Link annotations in bitmap pixel space (top-left origin).
    pub links: Vec<LinkRegion>,
    /// Text runs in bitmap pixel space; populated only when requested.
    pub text_items: Vec<TextItem>,
}

impl RasterPage {
    /// Wrap an already-decoded bitmap (raw image uploads) as a single page
    /// with no links or text.
    pub fn from_bitmap(bitmap: RgbaImage) -> Self {
        let (width, height) = bitmap.dimensions();
        Self {
            page_index: 0,
            bitmap,
            width,
            height,
            links: Vec::new(),
            text_items: Vec::new(),
        }
    }
}

/// One text run with its viewport-pixel-space geometry.
///
/// `y` is the top of the run, `bottom` its baseline-derived bottom edge;
/// `height` comes from the font matrix, scaled into pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub bottom: f32,
    pub width: f32,
    pub height: f32,
}

/// The rasteriser's result: rendered pages plus recovered per-page failures.
#[derive(Debug)]
pub struct RasterOutcome {
    pub pages: Vec<RasterPage>,
    /// Pages in the source document, including failed ones.
    pub total_pages: usize,
    pub errors: Vec<PageError>,
}

/// Basic document facts, obtained without rendering.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// First page size in PDF points.
    pub page_width_pts: f32,
    pub page_height_pts: f32,
}

/// Rasterise every page of a PDF into bitmaps with pixel-space links.
///
/// A single page's render failure skips that page (recorded in
/// [`RasterOutcome::errors`]); a link-extraction failure keeps the page with
/// an empty link set. Only when every page fails does the call return
/// [`PipelineError::AllPagesFailed`].
pub async fn rasterize(
    pdf_path: &Path,
    config: &ProcessConfig,
    extract_text: bool,
) -> Result<RasterOutcome, PipelineError> {
    let path = pdf_path.to_path_buf();
    let config = config.clone();

    tokio::task::spawn_blocking(move || rasterize_blocking(&path, &config, extract_text))
        .await
        .map_err(|e| PipelineError::Internal(format!("Render task panicked: {}", e)))?
}

/// Read page count and first-page dimensions without rendering.
pub async fn inspect(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentInfo, PipelineError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || inspect_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| PipelineError::Internal(format!("Inspect task panicked: {}", e)))?
}

// ── Blocking implementations ─────────────────────────────────────────────

fn rasterize_blocking(
    pdf_path: &Path,
    config: &ProcessConfig,
    extract_text: bool,
) -> Result<RasterOutcome, PipelineError> {
    engine::initialize()?;
    let pdfium = engine::bind()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, config.password.as_deref())
        .map_err(|e| PipelineError::PdfParse {
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(PipelineError::PdfParse {
            detail: "document has no pages".into(),
        });
    }
    info!("PDF loaded: {} pages", total_pages);

    if let Some(ref cb) = config.progress {
        cb.on_process_start(total_pages);
    }

    let scale = config.render_scale;
    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let mut rendered = Vec::with_capacity(total_pages);
    let mut errors = Vec::new();

    for index in 0..total_pages {
        if let Some(ref cancel) = config.cancel {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
        }
        let page_num = index + 1;

        let page = match pages.get(index as u16) {
            Ok(p) => p,
            Err(e) => {
                warn!("Page {}: failed to open: {:?}", page_num, e);
                record_render_failure(&mut errors, config, page_num, total_pages, format!("{e:?}"));
                continue;
            }
        };

        let bitmap = match page.render_with_config(&render_config) {
            Ok(b) => b.as_image().to_rgba8(),
            Err(e) => {
                warn!("Page {}: render failed: {:?}", page_num, e);
                record_render_failure(&mut errors, config, page_num, total_pages, format!("{e:?}"));
                continue;
            }
        };
        let (width, height) = bitmap.dimensions();
        debug!("Rendered page {} → {}x{} px", page_num, width, height);

        let page_height_pts = page.height().value;
        let links = match extract_links(&page, index, scale, page_height_pts) {
            Ok(links) => links,
            Err(e) => {
                // The page image is fine; only its hyperlinks are lost.
                warn!("Page {}: link extraction failed: {:?}", page_num, e);
                errors.push(PageError::LinkExtractionFailed {
                    page: page_num,
                    detail: format!("{e:?}"),
                });
                Vec::new()
            }
        };

        let text_items = if extract_text {
            extract_text_items(&page, scale, page_height_pts)
        } else {
            Vec::new()
        };

        if let Some(ref cb) = config.progress {
            cb.on_page_rendered(page_num, total_pages, links.len());
        }

        rendered.push(RasterPage {
            page_index: index,
            bitmap,
            width,
            height,
            links,
            text_items,
        });
    }

    if rendered.is_empty() {
        let first_error = errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(PipelineError::AllPagesFailed {
            total: total_pages,
            first_error,
        });
    }

    Ok(RasterOutcome {
        pages: rendered,
        total_pages,
        errors,
    })
}

fn record_render_failure(
    errors: &mut Vec<PageError>,
    config: &ProcessConfig,
    page_num: usize,
    total_pages: usize,
    detail: String,
) {
    if let Some(ref cb) = config.progress {
        cb.on_page_failed(page_num, total_pages, detail.clone());
    }
    errors.push(PageError::RenderFailed {
        page: page_num,
        detail,
    });
}

/// Extract `Link` annotations with resolved URI targets, transformed into the
/// rendered bitmap's pixel frame.
///
/// Extraction preserves every annotation with a URI — scheme filtering is a
/// serialiser concern, applied at emission time, never here.
fn extract_links(
    page: &PdfPage<'_>,
    page_index: usize,
    scale: f32,
    page_height_pts: f32,
) -> Result<Vec<LinkRegion>, PdfiumError> {
    let mut links = Vec::new();

    for annotation in page.annotations().iter() {
        let PdfPageAnnotation::Link(ref link_annotation) = annotation else {
            continue;
        };

        let Some(uri) = link_annotation
            .link()
            .ok()
            .and_then(|link| link.action())
            .and_then(|action| action.as_uri_action().and_then(|uri| uri.uri().ok()))
        else {
            continue;
        };
        if uri.is_empty() {
            continue;
        }

        let bounds = link_annotation.bounds()?;
        let rect = viewport_rect(&bounds, scale, page_height_pts);
        links.push(LinkRegion::new(uri, rect, page_index));
    }

    debug!("Page {}: {} link annotations", page_index + 1, links.len());
    Ok(links)
}

/// Extract text runs with pixel-space geometry for the segmenter and the
/// text-layer builder.
///
/// A text failure is not worth losing the page over: the result degrades to
/// "no text items" and the segmenter will treat the page as one image.
fn extract_text_items(page: &PdfPage<'_>, scale: f32, page_height_pts: f32) -> Vec<TextItem> {
    let text = match page.text() {
        Ok(t) => t,
        Err(e) => {
            warn!("Text extraction unavailable: {:?}", e);
            return Vec::new();
        }
    };

    let mut items = Vec::new();
    for segment in text.segments().iter() {
        let run = segment.text();
        if run.trim().is_empty() {
            continue;
        }
        let bounds = segment.bounds();
        let rect = viewport_rect(&bounds, scale, page_height_pts);
        items.push(TextItem {
            text: run,
            x: rect.x,
            y: rect.y,
            bottom: rect.y + rect.height,
            width: rect.width,
            height: rect.height,
        });
    }
    items
}

/// Map a PDF-space rectangle (bottom-left origin, y-up, points) into the
/// rendered bitmap's frame (top-left origin, y-down, pixels at `scale`).
fn viewport_rect(bounds: &PdfRect, scale: f32, page_height_pts: f32) -> Rect {
    let x1 = bounds.left.value * scale;
    let x2 = bounds.right.value * scale;
    let y1 = (page_height_pts - bounds.bottom.value) * scale;
    let y2 = (page_height_pts - bounds.top.value) * scale;
    Rect::from_corners(x1, y1, x2, y2)
}

fn inspect_blocking(pdf_path: &Path, password: Option<&str>) -> Result<DocumentInfo, PipelineError> {
    engine::initialize()?;
    let pdfium = engine::bind()?;

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, password)
            .map_err(|e| PipelineError::PdfParse {
                detail: format!("{:?}", e),
            })?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    let (width_pts, height_pts) = match pages.get(0) {
        Ok(first) => (first.width().value, first.height().value),
        Err(_) => (0.0, 0.0),
    };

    Ok(DocumentInfo {
        page_count,
        page_width_pts: width_pts,
        page_height_pts: height_pts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Geometry-only tests; rendering against real PDFs lives in the gated
    // integration suite (tests/pipeline.rs).

    #[test]
    fn viewport_rect_flips_y_axis() {
        // 800x600pt page at scale 2.0; PDF rect [72, 72, 144, 100]
        // (x1, y1, x2, y2 in points, bottom-left origin).
        let bounds = PdfRect::new(
            PdfPoints::new(72.0),
            PdfPoints::new(72.0),
            PdfPoints::new(100.0),
            PdfPoints::new(144.0),
        );
        let r = viewport_rect(&bounds, 2.0, 600.0);
        assert_eq!(r.x, 144.0);
        // Top edge comes from the rect's *top* (y=100pt): (600-100)*2 = 1000.
        assert_eq!(r.y, 1000.0);
        assert_eq!(r.width, 144.0);
        assert_eq!(r.height, 56.0);
        // y grows downward: top < bottom.
        assert!(r.y < r.y + r.height);
    }

    #[test]
    fn viewport_rect_normalises_swapped_corners() {
        // Producers sometimes emit top/bottom swapped.
        let swapped = PdfRect::new(
            PdfPoints::new(100.0),
            PdfPoints::new(144.0),
            PdfPoints::new(72.0),
            PdfPoints::new(72.0),
        );
        let r = viewport_rect(&swapped, 2.0, 600.0);
        assert_eq!((r.x, r.y, r.width, r.height), (144.0, 1000.0, 144.0, 56.0));
    }

    #[test]
    fn from_bitmap_wraps_dimensions() {
        let page = RasterPage::from_bitmap(RgbaImage::new(320, 200));
        assert_eq!(page.width, 320);
        assert_eq!(page.height, 200);
        assert!(page.links.is_empty());
    }
}
