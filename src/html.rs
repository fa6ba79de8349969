//! HTML serialisation: turn a block list into a self-contained,
//! email-client-compatible document.
//!
//! Email HTML is its own dialect: tables for layout, inline CSS only, and no
//! assumption that positioned CSS survives the client's sanitiser. Two link
//! strategies exist because no single one works everywhere:
//!
//! * **Overlay** — one absolutely-positioned `<a>` per link over a
//!   `position: relative` container. Precise, but clients that strip
//!   positioned CSS (notably Outlook) silently lose every link.
//! * **Image map** — a single `<map>`/`<area>` per image. Clunky but
//!   supported by virtually every client, including ones that strip CSS.
//!
//! PDF page blocks always use the image map regardless of the requested
//! style; their optional text layer is wrapped in Outlook-conditional
//! comments because Outlook cannot stack transparent text over an image
//! without wrecking the layout.
//!
//! Every URL is re-validated against the scheme allow-list immediately
//! before emission — the serialiser never trusts upstream filtering.

use crate::geometry::LinkRegion;
use crate::output::Block;
use tracing::debug;

/// How link rectangles are rendered over images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStyle {
    /// CSS-absolute anchor overlays. (default)
    #[default]
    Overlay,
    /// `<map>`/`<area>` image maps — maximum email-client compatibility.
    ImageMap,
}

/// Options for [`render_document`].
#[derive(Debug, Clone)]
pub struct HtmlOptions {
    /// Document title, escaped into `<title>`.
    pub title: String,
    /// Link strategy for image blocks (PDF blocks always use the image map).
    pub link_style: LinkStyle,
    /// Final display width in CSS pixels.
    pub display_width: u32,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            title: "Newsletter".to_string(),
            link_style: LinkStyle::default(),
            display_width: 800,
        }
    }
}

/// Escape text for interpolation into HTML content or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Scheme allow-list check for link URLs.
///
/// Only `http`, `https`, and `mailto` survive; everything else — including
/// `javascript:` and scheme-relative strings — is rejected. Applied at
/// emission time; extraction never filters.
pub fn is_valid_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https" | "mailto"),
        Err(_) => false,
    }
}

/// Serialise a block list into a complete HTML document.
pub fn render_document(blocks: &[Block], opts: &HtmlOptions) -> String {
    let rows: String = blocks
        .iter()
        .enumerate()
        .map(|(index, block)| render_block(block, index, opts))
        .collect();

    debug!("Serialised {} blocks to HTML", blocks.len());

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <style>
    body {{ font-family: sans-serif; }}
    .textLayer {{
      position: absolute;
      left: 0;
      top: 0;
      right: 0;
      bottom: 0;
      overflow: hidden;
      line-height: 1.0;
      pointer-events: none;
    }}
    .textLayer span {{
      color: transparent;
      position: absolute;
      white-space: pre;
      cursor: text;
      transform-origin: 0% 0%;
      pointer-events: auto;
    }}
    .textLayer ::selection {{
      background: rgba(0, 0, 255, 0.3);
      color: transparent;
    }}
  </style>
</head>
<body style="margin: 0; padding: 0; background-color: #f4f4f4;">
  <table align="center" border="0" cellpadding="0" cellspacing="0" width="100%" style="max-width: {width}px; background-color: #ffffff; margin: 0 auto;">
{rows}  </table>
</body>
</html>
"#,
        title = escape_html(&opts.title),
        width = opts.display_width,
    )
}

// ── Per-block rendering ──────────────────────────────────────────────────

fn render_block(block: &Block, index: usize, opts: &HtmlOptions) -> String {
    match block {
        Block::Image {
            image,
            width,
            links,
            ..
        } => {
            let scale = display_scale(opts.display_width, *width);
            match opts.link_style {
                LinkStyle::Overlay => image_row_overlay(&image.src(), links, scale, opts),
                LinkStyle::ImageMap => {
                    image_row_map(&image.src(), links, scale, index, None, opts)
                }
            }
        }
        Block::Text { content } => format!(
            "    <tr>\n      <td style=\"padding: 20px; font-family: sans-serif; \
             font-size: 16px; line-height: 1.5; color: #333;\">{content}</td>\n    </tr>\n"
        ),
        Block::Pdf {
            image,
            content,
            width,
            links,
            ..
        } => {
            let scale = display_scale(opts.display_width, *width);
            image_row_map(&image.src(), links, scale, index, content.as_deref(), opts)
        }
        Block::Html { content, .. } => format!(
            "    <tr>\n      <td align=\"center\" style=\"padding: 0;\">{content}</td>\n    </tr>\n"
        ),
    }
}

/// Projection from a block's natural width onto the display width.
fn display_scale(display_width: u32, natural_width: u32) -> f32 {
    if natural_width == 0 {
        1.0
    } else {
        display_width as f32 / natural_width as f32
    }
}

/// An image row with absolutely-positioned anchor overlays.
fn image_row_overlay(src: &str, links: &[LinkRegion], scale: f32, opts: &HtmlOptions) -> String {
    let overlays: String = links
        .iter()
        .filter(|link| is_valid_url(&link.url))
        .map(|link| {
            let url = escape_html(&link.url);
            let r = link.rect.scaled(scale);
            format!(
                "          <a href=\"{url}\" target=\"_blank\" title=\"{url}\" style=\"\
                 position: absolute; left: {:.1}px; top: {:.1}px; width: {:.1}px; \
                 height: {:.1}px; z-index: 10; cursor: pointer;\"></a>\n",
                r.x, r.y, r.width, r.height
            )
        })
        .collect();

    let img = format!(
        "<img src=\"{src}\" alt=\"\" style=\"display: block; width: 100%; \
         max-width: {}px; height: auto; border: 0;\" />",
        opts.display_width
    );

    if overlays.is_empty() {
        format!(
            "    <tr>\n      <td align=\"center\" style=\"padding: 0;\">\n        {img}\n      </td>\n    </tr>\n"
        )
    } else {
        format!(
            "    <tr>\n      <td align=\"center\" style=\"padding: 0;\">\n        \
             <div style=\"position: relative; width: 100%; max-width: {}px; margin: 0 auto;\">\n          \
             {img}\n{overlays}        </div>\n      </td>\n    </tr>\n",
            opts.display_width
        )
    }
}

/// An image row using a `<map>`; used for image blocks in ImageMap mode and
/// for every PDF page block.
fn image_row_map(
    src: &str,
    links: &[LinkRegion],
    scale: f32,
    index: usize,
    text_layer: Option<&str>,
    opts: &HtmlOptions,
) -> String {
    let map_name = format!("map-block-{index}");

    let areas: String = links
        .iter()
        .filter(|link| is_valid_url(&link.url))
        .map(|link| {
            let url = escape_html(&link.url);
            let r = &link.rect;
            let x1 = (r.x * scale).round() as i64;
            let y1 = (r.y * scale).round() as i64;
            let x2 = ((r.x + r.width) * scale).round() as i64;
            let y2 = ((r.y + r.height) * scale).round() as i64;
            format!(
                "            <area shape=\"rect\" coords=\"{x1},{y1},{x2},{y2}\" \
                 href=\"{url}\" target=\"_blank\" alt=\"Link\" />\n"
            )
        })
        .collect();

    // Outlook cannot stack transparent positioned text over an image; hide
    // the layer from mso, show it everywhere else.
    let layer = match text_layer {
        Some(content) if !content.is_empty() => format!(
            "          <!--[if !mso]><!--><div class=\"textLayer\" \
             style=\"position: absolute; top: 0; left: 0; width: 100%; height: 100%; \
             pointer-events: none;\">{content}</div><!--<![endif]-->\n"
        ),
        _ => String::new(),
    };

    format!(
        "    <tr>\n      <td align=\"center\" style=\"padding: 0;\">\n        \
         <div style=\"position: relative; width: 100%; max-width: {width}px;\">\n          \
         <img src=\"{src}\" width=\"{width}\" usemap=\"#{map_name}\" \
         style=\"width: 100%; height: auto; display: block;\" border=\"0\" />\n\
         {layer}          <map name=\"{map_name}\">\n{areas}          </map>\n        \
         </div>\n      </td>\n    </tr>\n",
        width = opts.display_width,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{LinkRegion, Rect};
    use crate::output::ImageAsset;

    fn image_block(links: Vec<LinkRegion>) -> Block {
        Block::Image {
            image: ImageAsset::Url("/uploads/a.png".into()),
            width: 1600,
            height: 500,
            links,
        }
    }

    #[test]
    fn escape_covers_attribute_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">&"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;"
        );
    }

    #[test]
    fn url_allow_list() {
        assert!(is_valid_url("https://example.com"));
        assert!(is_valid_url("http://example.com/path?q=1"));
        assert!(is_valid_url("mailto:a@b.com"));
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("ftp://x"));
        assert!(!is_valid_url("data:text/html,hi"));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn document_shell_is_self_contained() {
        let html = render_document(&[], &HtmlOptions::default());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<meta charset=\"utf-8\">"));
        assert!(html.contains("<title>Newsletter</title>"));
        assert!(!html.contains("<link rel"));
    }

    #[test]
    fn title_is_escaped() {
        let opts = HtmlOptions {
            title: "<script>x</script>".into(),
            ..HtmlOptions::default()
        };
        let html = render_document(&[], &opts);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn overlay_links_scale_by_half_at_default_widths() {
        let block = image_block(vec![LinkRegion::new(
            "https://example.com",
            Rect::new(200.0, 100.0, 400.0, 60.0),
            0,
        )]);
        let html = render_document(&[block], &HtmlOptions::default());
        assert!(html.contains("left: 100.0px"), "got: {html}");
        assert!(html.contains("top: 50.0px"));
        assert!(html.contains("width: 200.0px"));
        assert!(html.contains("height: 30.0px"));
        assert!(html.contains("position: relative"));
    }

    #[test]
    fn image_map_coords_round_at_half_scale() {
        let block = image_block(vec![LinkRegion::new(
            "https://example.com",
            Rect::new(200.0, 200.0, 200.0, 200.0),
            0,
        )]);
        let opts = HtmlOptions {
            link_style: LinkStyle::ImageMap,
            ..HtmlOptions::default()
        };
        let html = render_document(&[block], &opts);
        assert!(html.contains("coords=\"100,100,200,200\""), "got: {html}");
        assert!(html.contains("usemap=\"#map-block-0\""));
        assert!(html.contains("<map name=\"map-block-0\">"));
    }

    #[test]
    fn javascript_urls_never_reach_the_output() {
        let block = image_block(vec![
            LinkRegion::new("javascript:alert(1)", Rect::new(0.0, 0.0, 10.0, 10.0), 0),
            LinkRegion::new("https://ok.example", Rect::new(0.0, 20.0, 10.0, 10.0), 0),
        ]);
        for style in [LinkStyle::Overlay, LinkStyle::ImageMap] {
            let opts = HtmlOptions {
                link_style: style,
                ..HtmlOptions::default()
            };
            let html = render_document(&[block.clone()], &opts);
            assert!(!html.contains("javascript:"), "style {style:?}: {html}");
            assert!(html.contains("https://ok.example"));
        }
    }

    #[test]
    fn pdf_block_always_uses_image_map_with_conditional_text_layer() {
        let block = Block::Pdf {
            image: ImageAsset::Url("/uploads/page-1.png".into()),
            content: Some("<span>hello</span>".into()),
            width: 1600,
            height: 2000,
            links: vec![LinkRegion::new(
                "https://example.com",
                Rect::new(0.0, 0.0, 100.0, 40.0),
                0,
            )],
        };
        // Overlay requested, but PDF blocks must still emit a map.
        let html = render_document(&[block], &HtmlOptions::default());
        assert!(html.contains("<map name=\"map-block-0\">"));
        assert!(html.contains("<!--[if !mso]><!-->"));
        assert!(html.contains("<!--<![endif]-->"));
        assert!(html.contains("class=\"textLayer\""));
    }

    #[test]
    fn pdf_block_without_text_layer_omits_conditional() {
        let block = Block::Pdf {
            image: ImageAsset::Url("/uploads/page-1.png".into()),
            content: None,
            width: 800,
            height: 1000,
            links: vec![],
        };
        let html = render_document(&[block], &HtmlOptions::default());
        assert!(!html.contains("mso"));
    }

    #[test]
    fn text_and_html_blocks_pass_content_verbatim() {
        let blocks = vec![
            Block::Text {
                content: "<p>already sanitised</p>".into(),
            },
            Block::Html {
                content: "<table><tr><td>raw</td></tr></table>".into(),
                page_index: 0,
            },
        ];
        let html = render_document(&blocks, &HtmlOptions::default());
        assert!(html.contains("<p>already sanitised</p>"));
        assert!(html.contains("<td>raw</td>"));
    }

    #[test]
    fn natural_width_overrides_default_scale() {
        // An 800-wide block at display 800 → scale 1.0.
        let block = Block::Image {
            image: ImageAsset::Url("/uploads/b.png".into()),
            width: 800,
            height: 100,
            links: vec![LinkRegion::new(
                "https://example.com",
                Rect::new(40.0, 10.0, 80.0, 20.0),
                0,
            )],
        };
        let html = render_document(&[block], &HtmlOptions::default());
        assert!(html.contains("left: 40.0px"));
        assert!(html.contains("width: 80.0px"));
    }
}
