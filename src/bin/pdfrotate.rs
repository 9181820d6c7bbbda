//! CLI binary for edgequake-pdf-rotate.
//!
//! A thin shim over the library crate: loads the inputs into a
//! `RotateSession`, applies the rotation flags, exports, and writes the
//! results next to each other in the output directory.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf_rotate::{
    FileId, HttpUsageReporter, LocalUsageLog, NoopUsageReporter, PageId, PdfiumRasterizer,
    ProgressCallback, RotateConfig, RotateSession, RotationDelta, RotationProgressCallback,
    StatusReport, UploadedFile, UsageReporter,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
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

/// Terminal progress callback: one bar for the file currently being
/// exported, plus a log line per loaded, rejected and exported file.
struct CliProgressCallback {
    bar: ProgressBar,
    preview_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(100);
        bar.set_style(style);
        bar.set_prefix("Loading");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            preview_errors: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl RotationProgressCallback for CliProgressCallback {
    fn on_file_added(&self, file_name: &str, total_pages: u32) {
        self.bar.println(format!(
            "  {} {}  {}",
            cyan("◆"),
            bold(file_name),
            dim(&format!("{total_pages} pages"))
        ));
    }

    fn on_file_rejected(&self, file_name: &str, reason: &str) {
        self.bar
            .println(format!("  {} {}  {}", red("✗"), file_name, red(reason)));
    }

    fn on_thumbnail_complete(&self, file_name: &str, page_num: u32, total_pages: u32) {
        self.bar
            .set_message(format!("preview {file_name} {page_num}/{total_pages}"));
    }

    fn on_thumbnail_error(&self, _file_name: &str, _page_num: u32, _error: &str) {
        self.preview_errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_export_start(&self, file_name: &str) {
        self.bar.set_prefix("Rotating");
        self.bar.set_position(0);
        self.bar.set_message(file_name.to_string());
    }

    fn on_export_progress(&self, _file_name: &str, progress: u8) {
        self.bar.set_position(u64::from(progress));
    }

    fn on_export_complete(&self, file_name: &str, output_name: &str, bytes: usize) {
        self.bar.println(format!(
            "  {} {} → {}  {}",
            green("✓"),
            file_name,
            bold(output_name),
            dim(&format!("{bytes} bytes"))
        ));
    }

    fn on_export_error(&self, file_name: &str, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), file_name, red(&msg)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Turn every page of a scan clockwise
  pdfrotate --rotate-all cw scan.pdf -o out/

  # Page-level edits: file index (or name) : page = delta
  pdfrotate --rotate 1:2=180 --rotate 2:1=ccw a.pdf b.pdf

  # Select pages across files, then rotate the selection once
  pdfrotate --select a.pdf:1 --select b.pdf:3 --rotate-selected 90 a.pdf b.pdf

  # Show the page model (sizes, rotations, preview state) without exporting
  pdfrotate --inspect --rotate-all 90 report.pdf

  # Write JPEG previews of every page
  pdfrotate --thumbnails previews/ report.pdf

DELTA:
  cw, right, +90, 90        one quarter-turn clockwise
  ccw, left, -90            one quarter-turn counter-clockwise
  180, 270, -180, …         any multiple of 90, applied as quarter-turns

OUTPUT:
  Each input is written as <name>_rotated.pdf in the output directory.
  A file with no rotated page is copied byte for byte.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (only needed for --thumbnails / --inspect previews)
  RUST_LOG                Override log filter (e.g. edgequake_pdf_rotate=debug)
"#;

/// Rotate pages of PDF files.
#[derive(Parser, Debug)]
#[command(
    name = "pdfrotate",
    version,
    about = "Rotate pages of PDF files: per page, per file or across a selection",
    long_about = "Rotate pages of one or more PDF files. Rotations are applied to the page \
/Rotate attribute only, so content is never re-rendered; unedited files are passed through \
byte for byte.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input PDF files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Rotate every page of every input by DELTA.
    #[arg(long, value_name = "DELTA", allow_hyphen_values = true)]
    rotate_all: Option<String>,

    /// Rotate one page: FILE:PAGE=DELTA (FILE is a 1-based input index or file name).
    #[arg(long, value_name = "FILE:PAGE=DELTA", allow_hyphen_values = true)]
    rotate: Vec<String>,

    /// Add a page to the selection: FILE:PAGE.
    #[arg(long, value_name = "FILE:PAGE")]
    select: Vec<String>,

    /// Rotate the selected pages by DELTA.
    #[arg(long, value_name = "DELTA", allow_hyphen_values = true, requires = "select")]
    rotate_selected: Option<String>,

    /// Directory for rotated PDFs.
    #[arg(short, long, env = "PDFROTATE_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Suffix inserted before `.pdf` in output names.
    #[arg(long, env = "PDFROTATE_SUFFIX", default_value = "_rotated")]
    suffix: String,

    /// Write a JPEG preview of every page into this directory.
    #[arg(long, value_name = "DIR")]
    thumbnails: Option<PathBuf>,

    /// Preview scale relative to the page size in points (0.1–4.0).
    #[arg(long, env = "PDFROTATE_SCALE", default_value_t = 0.75)]
    scale: f32,

    /// Maximum previews rendered at the same time.
    #[arg(long, env = "PDFROTATE_RENDER_CONCURRENCY", default_value_t = 2)]
    render_concurrency: usize,

    /// Per-page preview timeout in seconds.
    #[arg(long, env = "PDFROTATE_RENDER_TIMEOUT")]
    render_timeout: Option<u64>,

    /// Per-file export timeout in seconds.
    #[arg(long, env = "PDFROTATE_EXPORT_TIMEOUT")]
    export_timeout: Option<u64>,

    /// Print the page model instead of exporting.
    #[arg(long)]
    inspect: bool,

    /// Print a JSON status report on stdout.
    #[arg(long, env = "PDFROTATE_JSON")]
    json: bool,

    /// Append usage events to this JSON file.
    #[arg(long, env = "PDFROTATE_USAGE_LOG", conflicts_with = "usage_endpoint")]
    usage_log: Option<PathBuf>,

    /// POST usage events to this URL.
    #[arg(long, env = "PDFROTATE_USAGE_ENDPOINT")]
    usage_endpoint: Option<String>,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "PDFROTATE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFROTATE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFROTATE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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
        .with_writer(std::io::stderr)
        .init();

    // ── Parse edit flags up front so typos fail before any work ─────────
    let rotate_all = cli.rotate_all.as_deref().map(parse_delta).transpose()?;
    let page_edits = cli
        .rotate
        .iter()
        .map(|s| parse_page_edit(s))
        .collect::<Result<Vec<_>>>()?;
    let selections = cli
        .select
        .iter()
        .map(|s| parse_page_ref(s))
        .collect::<Result<Vec<_>>>()?;
    let rotate_selected = cli.rotate_selected.as_deref().map(parse_delta).transpose()?;

    // ── Build session ────────────────────────────────────────────────────
    let progress = if show_progress {
        Some(CliProgressCallback::new())
    } else {
        None
    };
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressCallback))?;
    let session = RotateSession::builder()
        .rasterizer(Arc::new(PdfiumRasterizer::from_config(&config)))
        .usage_reporter(build_usage_reporter(&cli)?)
        .config(config)
        .build();

    // ── Load ─────────────────────────────────────────────────────────────
    let results = session.add_paths(&cli.inputs).await;
    let mut loaded: Vec<Option<FileId>> = Vec::with_capacity(results.len());
    for (path, result) in cli.inputs.iter().zip(results) {
        match result {
            Ok(id) => loaded.push(Some(id)),
            Err(e) => {
                if !show_progress && !cli.quiet {
                    eprintln!("{} {}: {}", red("✗"), path.display(), e);
                }
                loaded.push(None);
            }
        }
    }
    if loaded.iter().all(Option::is_none) {
        if let Some(p) = &progress {
            p.finish();
        }
        anyhow::bail!("No input could be loaded");
    }

    // ── Edits ────────────────────────────────────────────────────────────
    if let Some(turns) = &rotate_all {
        for id in loaded.iter().flatten() {
            for &delta in turns {
                session.rotate_all_pages(id, delta)?;
            }
        }
    }
    for edit in &page_edits {
        let (id, page) = resolve_page(&session, &cli.inputs, &loaded, &edit.target)?;
        for &delta in &edit.turns {
            session.rotate_page(&id, &page, delta)?;
        }
    }
    for target in &selections {
        let (_, page) = resolve_page(&session, &cli.inputs, &loaded, target)?;
        session.select_page(&page)?;
    }
    if let Some(turns) = &rotate_selected {
        for &delta in turns {
            session.rotate_selected(delta);
        }
    }

    // ── Previews ─────────────────────────────────────────────────────────
    if cli.thumbnails.is_some() || cli.inspect {
        session.wait_for_thumbnails().await;
    }
    if let Some(dir) = &cli.thumbnails {
        let written = write_thumbnails(&session, dir).await?;
        if !cli.quiet && !cli.json {
            eprintln!("{} {} previews → {}", green("✔"), written, dir.display());
        }
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect {
        if let Some(p) = &progress {
            p.finish();
        }
        let snapshot = session.snapshot();
        if cli.json {
            print_json(&session.status())?;
        } else {
            for file in snapshot.files() {
                print_page_model(file);
            }
        }
        return Ok(());
    }

    // ── Export ───────────────────────────────────────────────────────────
    let outcomes = session.process_files().await;
    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(_) => {
                let path = session
                    .write_output(&outcome.file, &cli.output_dir)
                    .await
                    .with_context(|| format!("Failed to write output for {}", outcome.name))?;
                if !show_progress && !cli.quiet && !cli.json {
                    eprintln!("{} {} → {}", green("✓"), outcome.name, path.display());
                }
            }
            Err(e) => {
                failed += 1;
                if !show_progress && !cli.quiet {
                    eprintln!("{} {}: {}", red("✗"), outcome.name, e);
                }
            }
        }
    }
    if let Some(p) = &progress {
        p.finish();
    }

    if cli.json {
        print_json(&session.status())?;
    } else if !cli.quiet {
        let done = outcomes.len() - failed;
        eprintln!(
            "{}  {}/{} files  →  {}",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            done,
            outcomes.len(),
            bold(&cli.output_dir.display().to_string()),
        );
        if let Some(p) = &progress {
            let errors = p.preview_errors.load(Ordering::SeqCst);
            if errors > 0 {
                eprintln!("   {}", dim(&format!("{errors} previews failed")));
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} files failed to export", failed, outcomes.len());
    }
    Ok(())
}

/// Map CLI args to `RotateConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RotateConfig> {
    let mut builder = RotateConfig::builder()
        .output_suffix(cli.suffix.clone())
        .preview_scale(cli.scale)
        .previews(cli.thumbnails.is_some() || cli.inspect)
        .max_concurrent_renders(cli.render_concurrency);

    if let Some(secs) = cli.render_timeout {
        builder = builder.render_timeout_secs(secs);
    }
    if let Some(secs) = cli.export_timeout {
        builder = builder.export_timeout_secs(secs);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn build_usage_reporter(cli: &Cli) -> Result<Arc<dyn UsageReporter>> {
    if let Some(ref path) = cli.usage_log {
        return Ok(Arc::new(LocalUsageLog::persistent(path.clone())));
    }
    if let Some(ref url) = cli.usage_endpoint {
        let reporter =
            HttpUsageReporter::new(url.clone(), 10).context("Failed to build usage reporter")?;
        return Ok(Arc::new(reporter));
    }
    Ok(Arc::new(NoopUsageReporter))
}

// ── Flag parsing ─────────────────────────────────────────────────────────────

/// `FILE:PAGE`, FILE being a 1-based input index or a file name.
#[derive(Debug, Clone, PartialEq)]
struct PageRef {
    file: String,
    page: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct PageEdit {
    target: PageRef,
    turns: Vec<RotationDelta>,
}

/// Parse a DELTA into quarter-turns: `cw`/`ccw` names, or any multiple of 90.
fn parse_delta(s: &str) -> Result<Vec<RotationDelta>> {
    let s = s.trim();
    if let Ok(degrees) = s.parse::<i64>() {
        if degrees % 90 != 0 {
            anyhow::bail!("Rotation must be a multiple of 90 degrees (got {})", degrees);
        }
        let quarter_turns = degrees / 90;
        let step = if quarter_turns >= 0 {
            RotationDelta::Clockwise
        } else {
            RotationDelta::CounterClockwise
        };
        return Ok(vec![step; quarter_turns.unsigned_abs() as usize % 4]);
    }
    let delta: RotationDelta = s
        .parse()
        .with_context(|| format!("Invalid rotation '{}'", s))?;
    Ok(vec![delta])
}

fn parse_page_ref(s: &str) -> Result<PageRef> {
    let (file, page) = s
        .rsplit_once(':')
        .with_context(|| format!("Expected FILE:PAGE, got '{}'", s))?;
    let page: u32 = page
        .trim()
        .parse()
        .with_context(|| format!("Invalid page number in '{}'", s))?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok(PageRef {
        file: file.trim().to_string(),
        page,
    })
}

fn parse_page_edit(s: &str) -> Result<PageEdit> {
    let (target, delta) = s
        .split_once('=')
        .with_context(|| format!("Expected FILE:PAGE=DELTA, got '{}'", s))?;
    Ok(PageEdit {
        target: parse_page_ref(target)?,
        turns: parse_delta(delta)?,
    })
}

/// Find the loaded file and page a `PageRef` points at.
fn resolve_page(
    session: &RotateSession,
    inputs: &[PathBuf],
    loaded: &[Option<FileId>],
    target: &PageRef,
) -> Result<(FileId, PageId)> {
    let index = match target.file.parse::<usize>() {
        Ok(n) if n >= 1 && n <= inputs.len() => n - 1,
        _ => inputs
            .iter()
            .position(|p| {
                p == Path::new(&target.file)
                    || p.file_name().map(|n| n.to_string_lossy() == target.file.as_str())
                        == Some(true)
            })
            .with_context(|| format!("No input named '{}'", target.file))?,
    };
    let id = loaded[index]
        .clone()
        .with_context(|| format!("{} was not loaded", inputs[index].display()))?;

    let snapshot = session.snapshot();
    let file = snapshot
        .file(&id)
        .with_context(|| format!("{} is no longer loaded", inputs[index].display()))?;
    let page = file
        .page_by_number(target.page)
        .with_context(|| format!("{} has no page {}", file.name, target.page))?;
    Ok((id, page.id.clone()))
}

// ── Output helpers ───────────────────────────────────────────────────────────

async fn write_thumbnails(session: &RotateSession, dir: &Path) -> Result<usize> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let snapshot = session.snapshot();
    let mut written = 0;
    for file in snapshot.files() {
        let stem = Path::new(&file.name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.id.to_string());
        for page in &file.pages {
            if let Some(thumb) = &page.thumbnail {
                let path = dir.join(format!("{stem}-page-{}.jpg", page.page_number));
                tokio::fs::write(&path, &thumb.data[..])
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                written += 1;
            }
        }
    }
    Ok(written)
}

fn print_page_model(file: &UploadedFile) {
    println!("File:    {}", file.name);
    println!("Status:  {}", file.status.label());
    println!("Pages:   {}", file.total_pages);
    for page in &file.pages {
        let preview = if page.thumbnail_loading {
            "loading".to_string()
        } else if page.thumbnail_error {
            "failed".to_string()
        } else if let Some(t) = &page.thumbnail {
            format!("{}x{}", t.width, t.height)
        } else {
            "-".to_string()
        };
        println!(
            "  {:>4}  {:>7.1} x {:<7.1}  rotate {:>4}  preview {}",
            page.page_number,
            page.width,
            page.height,
            page.rotation.to_string(),
            preview
        );
    }
}

fn print_json(report: &StatusReport) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(report).context("Failed to serialise status")?
    );
    Ok(())
}
