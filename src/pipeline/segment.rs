//! Region segmentation: partition a rendered page into alternating text and
//! image regions.
//!
//! This is deliberately a pixel-scanning heuristic, not a layout model. Text
//! geometry drives the vertical partition; whatever ink remains in the gaps
//! between text regions is either blank whitespace (discarded) or a visual
//! element (cropped out as an image region). The thresholds live in
//! [`SegmenterConfig`] because the heuristic's correctness is inherently
//! approximate.
//!
//! The pass structure:
//!
//! 1. embed hyperlinks into the text runs they overlap (centre test),
//!    escaping text as it is wrapped — downstream consumers receive
//!    ready-to-emit HTML
//! 2. group runs into regions with a greedy top-to-bottom sweep
//! 3. scan the bands between regions for non-near-white pixels and crop the
//!    ones that carry ink
//! 4. re-sort each region into reading order and join same-line runs into
//!    paragraphs

use crate::config::SegmenterConfig;
use crate::error::PageError;
use crate::geometry::LinkRegion;
use crate::html::escape_html;
use crate::pipeline::raster::{RasterPage, TextItem};
use image::{imageops, RgbaImage};
use tracing::{debug, warn};

/// One region of a segmented page, in top-to-bottom order.
#[derive(Debug, Clone)]
pub enum RegionBlock {
    /// A run of text lines, already escaped and wrapped in `<p>` elements.
    Text { y: f32, height: f32, html: String },
    /// A cropped band of the page bitmap that carries visible ink.
    Image {
        y: f32,
        height: f32,
        width: u32,
        bitmap: RgbaImage,
    },
}

impl RegionBlock {
    pub fn y(&self) -> f32 {
        match self {
            RegionBlock::Text { y, .. } | RegionBlock::Image { y, .. } => *y,
        }
    }

    pub fn height(&self) -> f32 {
        match self {
            RegionBlock::Text { height, .. } | RegionBlock::Image { height, .. } => *height,
        }
    }
}

/// Partition a page into text and image regions.
///
/// Per-gap extraction failures are recovered locally: the gap is omitted and
/// the failure recorded, never escalated to the document level.
pub fn segment_page(page: &RasterPage, cfg: &SegmenterConfig) -> (Vec<RegionBlock>, Vec<PageError>) {
    let page_num = page.page_index + 1;
    let items = embed_links(&page.text_items, &page.links);
    let regions = group_regions(&items, cfg.gap_threshold);
    debug!("Page {}: {} text regions", page_num, regions.len());

    let mut blocks = Vec::new();
    let mut errors = Vec::new();
    let mut last_y = 0.0f32;

    for region in &regions {
        push_gap_image(page, cfg, last_y, region.min, &mut blocks, &mut errors);

        blocks.push(RegionBlock::Text {
            y: region.min,
            height: region.max - region.min,
            html: region_html(&region.items, cfg),
        });
        last_y = region.max;
    }

    // Trailing band below the last text region (or the whole page when no
    // text was found).
    push_gap_image(
        page,
        cfg,
        last_y,
        page.height as f32,
        &mut blocks,
        &mut errors,
    );

    (blocks, errors)
}

/// Project a page-level link set into a horizontal band's local frame.
///
/// Links that vertically intersect `[band_y, band_y + band_height)` are kept
/// and shifted so `y = 0` is the band's top; everything else is dropped.
pub fn project_links_into_band(
    links: &[LinkRegion],
    band_y: f32,
    band_height: f32,
) -> Vec<LinkRegion> {
    links
        .iter()
        .filter(|link| link.rect.vertical_overlap(band_y, band_y + band_height) > 0.0)
        .map(|link| {
            let mut link = link.clone();
            link.rect = link.rect.translated(0.0, -band_y);
            link
        })
        .collect()
}

/// Build the transparent, selectable text layer for a full-page block.
///
/// Spans are absolutely positioned in the page's own pixel frame; the
/// surrounding container owns scaling. Text is escaped here — the output is
/// ready-to-emit HTML.
pub fn text_layer_html(items: &[TextItem]) -> String {
    let mut spans = Vec::with_capacity(items.len());
    for item in items {
        if item.text.trim().is_empty() {
            continue;
        }
        let width_style = if item.width > 0.0 {
            format!(" width: {:.2}px;", item.width)
        } else {
            String::new()
        };
        spans.push(format!(
            "<span style=\"position: absolute; left: {:.2}px; top: {:.2}px; \
             font-size: {:.2}px; font-family: sans-serif; color: transparent; \
             white-space: pre; pointer-events: auto;{}\">{}</span>",
            item.x,
            item.y,
            item.height,
            width_style,
            escape_html(&item.text)
        ));
    }
    spans.join("\n")
}

// ── Internal passes ──────────────────────────────────────────────────────

/// A text run with its geometry and ready-to-emit HTML fragment.
#[derive(Debug, Clone)]
struct EmbeddedItem {
    html: String,
    x: f32,
    y: f32,
    bottom: f32,
}

/// Escape every run and wrap the ones whose centre falls inside a link
/// rectangle in an anchor.
///
/// Embedding is one-way: the text block carries the anchor markup, not a
/// separate link list. The centre test is the safest overlap check — plain
/// bbox intersection misfires on adjacent columns.
fn embed_links(items: &[TextItem], links: &[LinkRegion]) -> Vec<EmbeddedItem> {
    items
        .iter()
        .filter(|item| !item.text.trim().is_empty())
        .map(|item| {
            let cx = item.x + item.width / 2.0;
            let cy = item.y + item.height / 2.0;
            let escaped = escape_html(&item.text);
            let html = match links.iter().find(|l| l.rect.contains_point(cx, cy)) {
                Some(link) => format!(
                    "<a href=\"{}\" style=\"color: blue; text-decoration: underline;\">{}</a>",
                    escape_html(&link.url),
                    escaped
                ),
                None => escaped,
            };
            EmbeddedItem {
                html,
                x: item.x,
                y: item.y,
                bottom: item.bottom,
            }
        })
        .collect()
}

#[derive(Debug)]
struct TextRegion {
    min: f32,
    max: f32,
    items: Vec<EmbeddedItem>,
}

/// Greedy single-pass grouping of y-sorted runs into contiguous regions.
///
/// A new region starts when the next run's top exceeds the running region's
/// bottom by more than `gap_threshold`; a run landing exactly on the
/// threshold extends the region.
fn group_regions(items: &[EmbeddedItem], gap_threshold: f32) -> Vec<TextRegion> {
    let mut sorted: Vec<&EmbeddedItem> = items.iter().collect();
    sorted.sort_by(|a, b| a.y.total_cmp(&b.y));

    let mut regions: Vec<TextRegion> = Vec::new();
    for item in sorted {
        match regions.last_mut() {
            Some(region) if item.y <= region.max + gap_threshold => {
                region.max = region.max.max(item.bottom);
                region.items.push(item.clone());
            }
            _ => regions.push(TextRegion {
                min: item.y,
                max: item.bottom,
                items: vec![item.clone()],
            }),
        }
    }
    regions
}

/// Crop the band `[top, bottom)` out of the page if it carries visible ink.
fn push_gap_image(
    page: &RasterPage,
    cfg: &SegmenterConfig,
    top: f32,
    bottom: f32,
    blocks: &mut Vec<RegionBlock>,
    errors: &mut Vec<PageError>,
) {
    let gap_height = bottom - top;
    if gap_height <= cfg.min_gap_height {
        return;
    }

    let y0 = top.max(0.0).round() as u32;
    let h = gap_height.round() as u32;
    if y0 >= page.height || h == 0 {
        return;
    }
    let h = h.min(page.height - y0);

    if band_is_blank(&page.bitmap, y0, h, cfg) {
        return;
    }

    if page.width == 0 {
        warn!(
            "Page {}: cannot crop {}px gap from empty bitmap",
            page.page_index + 1,
            h
        );
        errors.push(PageError::RegionFailed {
            page: page.page_index + 1,
            detail: format!("gap at y={y0} has no backing pixels"),
        });
        return;
    }

    let bitmap = imageops::crop_imm(&page.bitmap, 0, y0, page.width, h).to_image();
    blocks.push(RegionBlock::Image {
        y: y0 as f32,
        height: h as f32,
        width: page.width,
        bitmap,
    });
}

/// Sample the band every `sample_stride` pixels; any opaque pixel darker than
/// the near-white threshold in any channel marks the band as carrying ink.
fn band_is_blank(bitmap: &RgbaImage, y0: u32, h: u32, cfg: &SegmenterConfig) -> bool {
    let width = bitmap.width() as usize;
    if width == 0 {
        return true;
    }
    let total = width * h as usize;
    let t = cfg.near_white_threshold;

    let mut idx = 0usize;
    while idx < total {
        let x = (idx % width) as u32;
        let y = y0 + (idx / width) as u32;
        let px = bitmap.get_pixel(x, y);
        if px[3] > 0 && (px[0] < t || px[1] < t || px[2] < t) {
            return false;
        }
        idx += cfg.sample_stride;
    }
    true
}

/// Re-sort a region into reading order and join same-line runs into `<p>`
/// elements.
fn region_html(items: &[EmbeddedItem], cfg: &SegmenterConfig) -> String {
    let mut ordered: Vec<&EmbeddedItem> = items.iter().collect();
    ordered.sort_by(|a, b| {
        if (a.y - b.y).abs() < cfg.same_line_threshold {
            a.x.total_cmp(&b.x)
        } else {
            a.y.total_cmp(&b.y)
        }
    });

    let mut html = String::new();
    let mut line_y: Option<f32> = None;
    let mut line = String::new();

    for item in ordered {
        match line_y {
            None => {
                line_y = Some(item.y);
                line = item.html.clone();
            }
            Some(y) if (item.y - y).abs() < cfg.line_merge_threshold => {
                line.push(' ');
                line.push_str(&item.html);
            }
            Some(_) => {
                html.push_str(&paragraph(&line));
                line_y = Some(item.y);
                line = item.html.clone();
            }
        }
    }
    if !line.is_empty() {
        html.push_str(&paragraph(&line));
    }
    html
}

fn paragraph(line: &str) -> String {
    format!("<p style=\"margin: 0; line-height: 1.4;\">{line}</p>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use image::Rgba;

    fn item(text: &str, x: f32, y: f32, width: f32, height: f32) -> TextItem {
        TextItem {
            text: text.to_string(),
            x,
            y,
            bottom: y + height,
            width,
            height,
        }
    }

    fn page_with(bitmap: RgbaImage, items: Vec<TextItem>, links: Vec<LinkRegion>) -> RasterPage {
        let (width, height) = bitmap.dimensions();
        RasterPage {
            page_index: 0,
            bitmap,
            width,
            height,
            links,
            text_items: items,
        }
    }

    fn white_page(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn blank_page_with_text_yields_one_text_region() {
        let page = page_with(
            white_page(200, 400),
            vec![
                item("Hello", 10.0, 50.0, 60.0, 12.0),
                item("world", 80.0, 50.0, 60.0, 12.0),
            ],
            vec![],
        );
        let (blocks, errors) = segment_page(&page, &SegmenterConfig::default());
        assert!(errors.is_empty());
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            RegionBlock::Text { html, y, .. } => {
                assert_eq!(*y, 50.0);
                assert_eq!(
                    html,
                    "<p style=\"margin: 0; line-height: 1.4;\">Hello world</p>"
                );
            }
            other => panic!("expected text region, got {other:?}"),
        }
    }

    #[test]
    fn inked_gap_between_regions_becomes_image() {
        let mut bitmap = white_page(200, 400);
        // Paint a solid band between the two text regions.
        for y in 120..180 {
            for x in 0..200 {
                bitmap.put_pixel(x, y, Rgba([40, 40, 40, 255]));
            }
        }
        let page = page_with(
            bitmap,
            vec![
                item("above", 10.0, 80.0, 50.0, 12.0),
                item("below", 10.0, 300.0, 50.0, 12.0),
            ],
            vec![],
        );
        let (blocks, errors) = segment_page(&page, &SegmenterConfig::default());
        assert!(errors.is_empty());
        // text, image (the painted band), text
        assert_eq!(blocks.len(), 3);
        assert!(matches!(blocks[0], RegionBlock::Text { .. }));
        match &blocks[1] {
            RegionBlock::Image { y, height, .. } => {
                assert!(*y >= 92.0);
                assert!(*height > 0.0);
            }
            other => panic!("expected image region, got {other:?}"),
        }
        assert!(matches!(blocks[2], RegionBlock::Text { .. }));
    }

    #[test]
    fn blank_gaps_are_discarded() {
        let page = page_with(
            white_page(200, 400),
            vec![
                item("top", 10.0, 40.0, 30.0, 12.0),
                item("bottom", 10.0, 300.0, 60.0, 12.0),
            ],
            vec![],
        );
        let (blocks, _) = segment_page(&page, &SegmenterConfig::default());
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| matches!(b, RegionBlock::Text { .. })));
    }

    #[test]
    fn link_overlapping_text_is_embedded_as_anchor() {
        let links = vec![LinkRegion::new(
            "https://example.com/page?a=1&b=2",
            Rect::new(0.0, 45.0, 100.0, 20.0),
            0,
        )];
        let page = page_with(
            white_page(200, 200),
            vec![item("Click <here>", 10.0, 50.0, 60.0, 12.0)],
            links,
        );
        let (blocks, _) = segment_page(&page, &SegmenterConfig::default());
        match &blocks[0] {
            RegionBlock::Text { html, .. } => {
                assert!(html.contains("<a href=\"https://example.com/page?a=1&amp;b=2\""));
                assert!(html.contains("Click &lt;here&gt;"));
            }
            other => panic!("expected text region, got {other:?}"),
        }
    }

    #[test]
    fn gap_threshold_tie_extends_region() {
        let cfg = SegmenterConfig::default();
        // Second item starts exactly gap_threshold below the first's bottom.
        let items = embed_links(
            &[
                item("a", 0.0, 0.0, 10.0, 10.0),
                item("b", 0.0, 10.0 + cfg.gap_threshold, 10.0, 10.0),
            ],
            &[],
        );
        let regions = group_regions(&items, cfg.gap_threshold);
        assert_eq!(regions.len(), 1);

        // One pixel further splits.
        let items = embed_links(
            &[
                item("a", 0.0, 0.0, 10.0, 10.0),
                item("b", 0.0, 11.0 + cfg.gap_threshold, 10.0, 10.0),
            ],
            &[],
        );
        let regions = group_regions(&items, cfg.gap_threshold);
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn reading_order_sorts_columns_within_a_line() {
        let page = page_with(
            white_page(200, 100),
            vec![
                // Same visual line, emitted out of x order.
                item("right", 100.0, 20.0, 40.0, 10.0),
                item("left", 10.0, 22.0, 40.0, 10.0),
            ],
            vec![],
        );
        let (blocks, _) = segment_page(&page, &SegmenterConfig::default());
        match &blocks[0] {
            RegionBlock::Text { html, .. } => {
                assert!(html.contains("left right"), "got: {html}");
            }
            other => panic!("expected text region, got {other:?}"),
        }
    }

    #[test]
    fn project_links_into_band_filters_and_translates() {
        let links = vec![
            LinkRegion::new("https://a.example", Rect::new(0.0, 10.0, 10.0, 10.0), 0),
            LinkRegion::new("https://b.example", Rect::new(0.0, 500.0, 10.0, 10.0), 0),
        ];
        let projected = project_links_into_band(&links, 5.0, 100.0);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].rect.y, 5.0);
    }

    #[test]
    fn text_layer_positions_and_escapes() {
        let layer = text_layer_html(&[item("a < b", 12.0, 34.0, 56.0, 7.5)]);
        assert!(layer.contains("left: 12.00px"));
        assert!(layer.contains("top: 34.00px"));
        assert!(layer.contains("font-size: 7.50px"));
        assert!(layer.contains("a &lt; b"));
    }

    #[test]
    fn page_with_no_text_becomes_single_image_region() {
        let mut bitmap = white_page(100, 100);
        bitmap.put_pixel(50, 50, Rgba([0, 0, 0, 255]));
        let page = page_with(bitmap, vec![], vec![]);
        let (blocks, _) = segment_page(&page, &SegmenterConfig::default());
        assert_eq!(blocks.len(), 1);
        assert!(matches!(blocks[0], RegionBlock::Image { .. }));
    }
}
