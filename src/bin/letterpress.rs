//! CLI binary for letterpress.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ProcessConfig`, runs the pipeline, and writes HTML or JSON output.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use letterpress::{
    inspect, process_file, render_document, write_html, HtmlOptions, LayoutMode, LinkStyle,
    ProcessConfig, ProcessProgressCallback, ProgressCallback,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live page-rendering bar plus per-page log
/// lines. Pages render sequentially, so events arrive in page order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar length is set by `on_process_start` once the document has
    /// been opened and its page count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ProcessProgressCallback for CliProgressCallback {
    fn on_process_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rendering");
    }

    fn on_page_rendered(&self, page_num: usize, total: usize, link_count: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{link_count} links")),
        ));
        self.bar.inc(1);
    }

    fn on_page_failed(&self, page_num: usize, total: usize, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 {
            format!("{}…", &error[..79])
        } else {
            error
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_process_complete(&self, total_pages: usize, rendered_pages: usize) {
        let failed = total_pages.saturating_sub(rendered_pages);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages rendered",
                green("✔"),
                bold(&rendered_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages rendered  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&rendered_pages.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a PDF newsletter to email HTML (stdout)
  letterpress newsletter.pdf

  # Write to a file, slicing the scroll into 500px strips
  letterpress newsletter.pdf --slice-height 500 -o newsletter.html

  # Structural decomposition into text + image blocks
  letterpress newsletter.pdf --layout structured -o newsletter.html

  # One block per page with a selectable text layer, image-map links
  letterpress newsletter.pdf --layout pages -o newsletter.html

  # Slice a tall promo image
  letterpress promo.png --slice-height 800 -o promo.html

  # Emit the block list as JSON instead of HTML
  letterpress newsletter.pdf --json > blocks.json

  # Page count and dimensions only (no rendering)
  letterpress newsletter.pdf --inspect-only

LAYOUT MODES:
  flat        continuous scroll of image strips (default)
  structured  alternating text and image blocks
  pages       one self-contained block per page

LINK STYLES:
  overlay     CSS-positioned anchors (precise; stripped by some clients)
  imagemap    <map>/<area> regions (works in virtually all email clients)

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Directory containing the pdfium shared library

SETUP:
  letterpress renders PDFs through pdfium. Install a pdfium build (e.g. from
  bblanchon/pdfium-binaries) and place the shared library next to the
  executable, on the system library path, or in $PDFIUM_LIB_PATH.
"#;

/// Convert PDF and image files into email-ready newsletter HTML.
#[derive(Parser, Debug)]
#[command(
    name = "letterpress",
    version,
    about = "Convert PDF and image files into email-ready newsletter HTML",
    long_about = "Convert PDF documents and bitmap images into positioned newsletter blocks \
and serialise them as self-contained, email-client-compatible HTML with clickable link \
regions (CSS overlays or image maps).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input file (PDF or PNG/JPEG image).
    input: PathBuf,

    /// Write HTML to this file instead of stdout.
    #[arg(short, long, env = "LETTERPRESS_OUTPUT")]
    output: Option<PathBuf>,

    /// Declared MIME type; sniffed from the file extension when omitted.
    #[arg(long)]
    mime: Option<String>,

    /// Block decomposition: flat, structured, pages.
    #[arg(long, env = "LETTERPRESS_LAYOUT", value_enum, default_value = "flat")]
    layout: LayoutArg,

    /// Link rendering: overlay, imagemap.
    #[arg(long = "links", env = "LETTERPRESS_LINKS", value_enum, default_value = "overlay")]
    link_style: LinkStyleArg,

    /// Maximum strip height in pixels; 0 disables slicing.
    #[arg(long, env = "LETTERPRESS_SLICE_HEIGHT", default_value_t = 0)]
    slice_height: i32,

    /// Document title for the exported HTML.
    #[arg(long, env = "LETTERPRESS_TITLE", default_value = "Newsletter")]
    title: String,

    /// PDF render scale factor (1.0–4.0).
    #[arg(long, env = "LETTERPRESS_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Keep multi-page documents as separate pages instead of merging them
    /// into one continuous scroll (flat mode only).
    #[arg(long)]
    no_merge: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "LETTERPRESS_PASSWORD")]
    password: Option<String>,

    /// Per-page wall-clock budget in milliseconds; 0 disables the timeout.
    #[arg(long, env = "LETTERPRESS_PAGE_TIMEOUT", default_value_t = 0)]
    page_timeout: u64,

    /// Output the block list as JSON instead of HTML.
    #[arg(long, env = "LETTERPRESS_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "LETTERPRESS_NO_PROGRESS")]
    no_progress: bool,

    /// Print page count and dimensions only, no rendering.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LETTERPRESS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LETTERPRESS_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum LayoutArg {
    Flat,
    Structured,
    Pages,
}

impl From<LayoutArg> for LayoutMode {
    fn from(v: LayoutArg) -> Self {
        match v {
            LayoutArg::Flat => LayoutMode::Flat,
            LayoutArg::Structured => LayoutMode::Structured,
            LayoutArg::Pages => LayoutMode::Pages,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum LinkStyleArg {
    Overlay,
    Imagemap,
}

impl From<LinkStyleArg> for LinkStyle {
    fn from(v: LinkStyleArg) -> Self {
        match v {
            LinkStyleArg::Overlay => LinkStyle::Overlay,
            LinkStyleArg::Imagemap => LinkStyle::ImageMap,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active; the
    // bar provides the feedback that matters.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mime = match cli.mime.clone() {
        Some(m) => m,
        None => sniff_mime(&cli.input)?,
    };

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input, cli.password.as_deref())
            .await
            .context("Failed to inspect document")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            println!("File:    {}", cli.input.display());
            println!("Pages:   {}", info.page_count);
            println!(
                "Size:    {:.1} x {:.1} pt",
                info.page_width_pts, info.page_height_pts
            );
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress: Option<ProgressCallback> = if show_progress && mime == "application/pdf" {
        Some(CliProgressCallback::new_dynamic() as ProgressCallback)
    } else {
        None
    };

    let mut builder = ProcessConfig::builder()
        .layout(cli.layout.clone().into())
        .slice_height(cli.slice_height)
        .render_scale(cli.scale)
        .merge_pages(!cli.no_merge)
        .page_timeout_ms(cli.page_timeout);
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run pipeline ─────────────────────────────────────────────────────
    let output = process_file(&cli.input, &mime, &config)
        .await
        .context("Processing failed")?;

    if !cli.quiet && !output.page_errors.is_empty() {
        for e in &output.page_errors {
            eprintln!("  {} {}", cyan("⚠"), e);
        }
    }

    // ── Emit output ──────────────────────────────────────────────────────
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let html = render_document(
        &output.blocks,
        &HtmlOptions {
            title: cli.title.clone(),
            link_style: cli.link_style.clone().into(),
            display_width: 800,
        },
    );

    if let Some(ref out_path) = cli.output {
        write_html(&html, out_path).await.context("Write failed")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} blocks  {}ms  →  {}",
                green("✔"),
                output.stats.block_count,
                output.stats.total_duration_ms,
                bold(&out_path.display().to_string()),
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(html.as_bytes())
            .context("Failed to write to stdout")?;
    }

    Ok(())
}

/// Guess the MIME type from the file extension.
fn sniff_mime(path: &std::path::Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => Ok("application/pdf".to_string()),
        "png" => Ok("image/png".to_string()),
        "jpg" | "jpeg" => Ok("image/jpeg".to_string()),
        other => anyhow::bail!(
            "Cannot infer MIME type from extension '.{other}'; pass --mime explicitly"
        ),
    }
}
