//! Image slicing: resize to the canonical working width and cut into
//! horizontal strips, carrying each strip's links along.
//!
//! All strips come out at the canonical width (1600 px by default — 2x
//! density for an 800 px email display). Links are rescaled by
//! `canonical_width / source_width`, translated into each strip's local
//! frame, and then **inclusion-filtered**, not truncated: a link spanning a
//! strip boundary appears whole in every strip it overlaps, positioned
//! relative to that strip's top edge. The overlay renderer clips at the image
//! boundary anyway, so cutting the rectangle would only complicate the math.

use crate::geometry::LinkRegion;
use image::{imageops, RgbaImage};
use tracing::debug;

/// A horizontal strip of a (possibly merged) page at canonical width.
#[derive(Debug, Clone)]
pub struct Slice {
    pub bitmap: RgbaImage,
    /// Top edge of this strip in the resized source's frame.
    pub y_offset: u32,
    pub width: u32,
    pub height: u32,
    /// Links relative to the strip's own top edge, inclusion-filtered
    /// against `[0, height)`.
    pub links: Vec<LinkRegion>,
}

/// Resize `bitmap` to `canonical_width` and cut it into strips of at most
/// `target_height` pixels.
///
/// `target_height <= 0` is the documented "do not slice" sentinel: the
/// result is one strip covering the full resized height. The last strip may
/// be shorter than `target_height`.
pub fn slice_bitmap(
    bitmap: &RgbaImage,
    target_height: i32,
    links: &[LinkRegion],
    canonical_width: u32,
) -> Vec<Slice> {
    let (src_width, src_height) = bitmap.dimensions();
    if src_width == 0 || src_height == 0 {
        return Vec::new();
    }

    let scale = canonical_width as f32 / src_width as f32;
    let resized_height = ((src_height as f32) * scale).round().max(1.0) as u32;
    let resized = if src_width == canonical_width {
        bitmap.clone()
    } else {
        imageops::resize(
            bitmap,
            canonical_width,
            resized_height,
            imageops::FilterType::Lanczos3,
        )
    };

    let scaled_links: Vec<LinkRegion> = links
        .iter()
        .map(|link| {
            let mut link = link.clone();
            link.rect = link.rect.scaled(scale);
            link
        })
        .collect();

    let step = if target_height <= 0 {
        resized_height
    } else {
        target_height as u32
    };

    let mut slices = Vec::new();
    let mut y: u32 = 0;
    while y < resized_height {
        let h = step.min(resized_height - y);
        let strip = imageops::crop_imm(&resized, 0, y, canonical_width, h).to_image();

        let strip_links: Vec<LinkRegion> = scaled_links
            .iter()
            .map(|link| {
                let mut link = link.clone();
                link.rect = link.rect.translated(0.0, -(y as f32));
                link
            })
            .filter(|link| link.rect.intersects_band(h as f32))
            .collect();

        slices.push(Slice {
            bitmap: strip,
            y_offset: y,
            width: canonical_width,
            height: h,
            links: strip_links,
        });
        y += h;
    }

    debug!(
        "Sliced {}x{} → {} strips of ≤{} px at width {}",
        src_width,
        src_height,
        slices.len(),
        step,
        canonical_width
    );
    slices
}
