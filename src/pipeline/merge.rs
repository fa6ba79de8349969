//! Page merging: stack rendered pages into one tall composite.
//!
//! Used in Flat mode when a multi-page document should read as one
//! continuous scroll. Pages are composited top-to-bottom onto a white canvas
//! sized `(max_width, total_height)`; each page's links shift down by the
//! cumulative height of the pages above it, producing one flat link list in
//! composite coordinates. Single-page documents skip this stage entirely.

use crate::pipeline::raster::RasterPage;
use image::{imageops, Rgba, RgbaImage};
use tracing::debug;

/// Composite an ordered page list into a single [`RasterPage`].
///
/// Narrower pages keep their own width and are left-aligned against a white
/// background. Link `page_index` values are preserved so a link can still be
/// traced to its source page after merging.
pub fn merge_pages(pages: Vec<RasterPage>) -> RasterPage {
    let total_height: u32 = pages.iter().map(|p| p.height).sum();
    let max_width: u32 = pages.iter().map(|p| p.width).max().unwrap_or(0);
    debug!(
        "Merging {} pages into {}x{} composite",
        pages.len(),
        max_width,
        total_height
    );

    let mut canvas = RgbaImage::from_pixel(
        max_width.max(1),
        total_height.max(1),
        Rgba([255, 255, 255, 255]),
    );
    let mut links = Vec::new();
    let mut offset: u32 = 0;

    for page in pages {
        imageops::replace(&mut canvas, &page.bitmap, 0, offset as i64);
        links.extend(
            page.links
                .into_iter()
                .map(|mut link| {
                    link.rect = link.rect.translated(0.0, offset as f32);
                    link
                }),
        );
        offset += page.height;
    }

    let (width, height) = canvas.dimensions();
    RasterPage {
        page_index: 0,
        bitmap: canvas,
        width,
        height,
        links,
        text_items: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{LinkRegion, Rect};

    fn page(index: usize, width: u32, height: u32, links: Vec<LinkRegion>) -> RasterPage {
        RasterPage {
            page_index: index,
            bitmap: RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255])),
            width,
            height,
            links,
            text_items: Vec::new(),
        }
    }

    #[test]
    fn merge_stacks_heights_and_offsets_links() {
        // Two 100x100 pages; second page has a link at y=20.
        let link = LinkRegion::new("https://example.com", Rect::new(5.0, 20.0, 40.0, 10.0), 1);
        let merged = merge_pages(vec![
            page(0, 100, 100, vec![]),
            page(1, 100, 100, vec![link]),
        ]);

        assert_eq!(merged.width, 100);
        assert_eq!(merged.height, 200);
        assert_eq!(merged.links.len(), 1);
        assert_eq!(merged.links[0].rect.y, 120.0);
        assert_eq!(merged.links[0].rect.x, 5.0);
        assert_eq!(merged.links[0].page_index, 1);
    }

    #[test]
    fn merge_offsets_are_strictly_increasing() {
        let pages: Vec<RasterPage> = (0..4)
            .map(|i| {
                page(
                    i,
                    50,
                    (50 + 10 * i) as u32,
                    vec![LinkRegion::new(
                        "https://example.com",
                        Rect::new(0.0, 0.0, 10.0, 10.0),
                        i,
                    )],
                )
            })
            .collect();
        let expected_offsets = [0.0, 50.0, 110.0, 180.0];

        let merged = merge_pages(pages);
        let ys: Vec<f32> = merged.links.iter().map(|l| l.rect.y).collect();
        assert_eq!(ys, expected_offsets);
        assert!(ys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn merge_pads_narrow_pages_with_white() {
        let merged = merge_pages(vec![page(0, 40, 10, vec![]), page(1, 100, 10, vec![])]);
        assert_eq!(merged.width, 100);
        assert_eq!(merged.height, 20);
        // Area right of the narrow first page stays white.
        assert_eq!(*merged.bitmap.get_pixel(90, 5), Rgba([255, 255, 255, 255]));
        // The narrow page's own pixels are composited.
        assert_eq!(*merged.bitmap.get_pixel(20, 5), Rgba([10, 20, 30, 255]));
    }
}
