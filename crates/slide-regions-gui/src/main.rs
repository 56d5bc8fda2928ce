use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use std::path::PathBuf;

use slide_regions::AnnotateOptions;

mod app;
mod backend;
mod logger;
#[cfg(feature = "pdf-viewer")]
mod pages;

/// Annotate LaTeX regions in a PDF deck of slides.
///
/// Drag to draw a box; the key bindings are listed at the bottom of the window.
/// Crops land in the output directory and a background worker writes a `.tex`
/// file next to each one.
#[derive(Parser)]
#[command(name = "slide-regions", version)]
struct Cli {
    /// PDF slide deck to annotate
    #[arg(default_value = "slides.pdf")]
    pdf: PathBuf,

    /// Directory for image crops and OCR results [default: latex_regions]
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// JSON options file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Render resolution
    #[arg(long)]
    dpi: Option<f32>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let logger = logger::AppLogger::new(500, level);
    logger.clone().init()?;

    let runtime = tokio::runtime::Runtime::new()?;

    let mut options = match &cli.config {
        Some(path) => runtime
            .block_on(AnnotateOptions::load(path))
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => AnnotateOptions::default(),
    };
    if let Some(out) = cli.out {
        options.output_dir = out;
    }
    if let Some(dpi) = cli.dpi {
        options.dpi = dpi;
    }
    options.validate()?;

    let pdf = std::path::absolute(&cli.pdf)?;
    options.output_dir = std::path::absolute(&options.output_dir)?;

    if !pdf.is_file() {
        anyhow::bail!("PDF file not found: {}", pdf.display());
    }
    std::fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            options.output_dir.display()
        )
    })?;

    run_viewer(pdf, options, logger, runtime)?;
    log::info!("All done. Bye!");
    Ok(())
}

#[cfg(feature = "pdf-viewer")]
fn run_viewer(
    pdf: PathBuf,
    options: AnnotateOptions,
    logger: logger::AppLogger,
    runtime: tokio::runtime::Runtime,
) -> Result<()> {
    use slide_regions::Orchestrator;

    let pages = pages::PdfiumPages::open(&pdf)
        .with_context(|| format!("Failed to open {}", pdf.display()))?;

    let (update_tx, update_rx) = crossbeam_channel::unbounded();
    let (event_tx, event_rx) = crossbeam_channel::unbounded();

    let keys = options.keys.clone();
    let window_title = options.window_title.clone();
    let handle = runtime.handle().clone();
    let annotator = std::thread::Builder::new()
        .name("annotator".to_string())
        .spawn(move || {
            let mut backend = backend::ChannelBackend::new(update_tx.clone(), event_rx);
            let summary = Orchestrator::new(pages, options).run(&mut backend, &handle);
            let _ = update_tx.send(backend::ViewerUpdate::Finished);
            summary
        })?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 900.0])
            .with_position([100.0, 100.0])
            .with_title(window_title.as_str()),
        ..Default::default()
    };

    let app_logger = logger.clone();
    eframe::run_native(
        &window_title,
        native_options,
        Box::new(move |_cc| {
            Ok(Box::new(app::AnnotatorApp::new(
                event_tx, update_rx, app_logger, &keys,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Viewer failed: {}", e))?;

    // The window is gone, so the annotation thread sees Closed and winds down
    let summary = annotator
        .join()
        .map_err(|_| anyhow::anyhow!("Annotation thread panicked"))??;

    log::info!(
        "{} pages visited, {} crops saved, {} results written",
        summary.pages_visited,
        summary.crops_written,
        summary.worker.written
    );
    Ok(())
}

#[cfg(not(feature = "pdf-viewer"))]
fn run_viewer(
    _pdf: PathBuf,
    _options: AnnotateOptions,
    _logger: logger::AppLogger,
    _runtime: tokio::runtime::Runtime,
) -> Result<()> {
    anyhow::bail!("PDF rendering not available (pdf-viewer feature disabled)")
}
