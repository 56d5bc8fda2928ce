//! Page traversal and worker lifecycle for a whole document

use image::RgbaImage;

use crate::export::export_crops;
use crate::options::AnnotateOptions;
use crate::session::{AnnotationSession, DisplayBackend, Outcome};
use crate::types::*;
use crate::worker::{OcrWorker, Recognizer, StopSignal, WorkerHandle, WorkerReport};

/// Turns page indices into raster images
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Render the page at `page_index` (0-based) at `dpi`
    fn render(&mut self, page_index: usize, dpi: f32) -> Result<RgbaImage>;
}

/// Current page index, bounded by `[0, page_count)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigator {
    index: usize,
    page_count: usize,
    quit: bool,
}

impl Navigator {
    pub fn new(page_count: usize) -> Self {
        Self {
            index: 0,
            page_count,
            quit: false,
        }
    }

    /// Page to show next, or `None` once the traversal is over
    pub fn current(&self) -> Option<usize> {
        (!self.quit && self.index < self.page_count).then_some(self.index)
    }

    /// Back on the first page stays on the first page.
    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Next => self.index += 1,
            Outcome::Back => self.index = self.index.saturating_sub(1),
            Outcome::Quit => self.quit = true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_visited: usize,
    pub crops_written: usize,
    /// The operator quit before walking off the end of the document
    pub quit: bool,
    pub worker: WorkerReport,
}

pub struct Orchestrator<P> {
    pages: P,
    options: AnnotateOptions,
}

impl<P: PageSource> Orchestrator<P> {
    pub fn new(pages: P, options: AnnotateOptions) -> Self {
        Self { pages, options }
    }

    pub fn options(&self) -> &AnnotateOptions {
        &self.options
    }

    /// Annotate the document with the placeholder OCR worker running on `runtime`.
    ///
    /// Blocks on the worker at the end, so it must not be called from inside the runtime.
    pub fn run(
        &mut self,
        backend: &mut impl DisplayBackend,
        runtime: &tokio::runtime::Handle,
    ) -> Result<RunSummary> {
        let worker = OcrWorker::placeholder(self.options.worker);
        self.run_with(backend, runtime, worker)
    }

    /// Annotate the document while `worker` processes exported crops.
    ///
    /// The worker is started before the first page and stopped only after the
    /// annotation loop has exited, including when it exits with an error.
    /// Waiting for the worker blocks, so this must not be called from inside
    /// the runtime.
    pub fn run_with<R: Recognizer + 'static>(
        &mut self,
        backend: &mut impl DisplayBackend,
        runtime: &tokio::runtime::Handle,
        worker: OcrWorker<R>,
    ) -> Result<RunSummary> {
        if self.pages.page_count() == 0 {
            return Err(RegionError::NoPages);
        }

        let handle = WorkerHandle::spawn(
            runtime,
            self.options.output_dir.clone(),
            worker,
            StopSignal::new(),
        );

        let annotated = self.annotate(backend);
        let report = handle.shutdown();

        let mut summary = annotated?;
        summary.worker = report?;
        log::info!(
            "Visited {} pages, saved {} crops, wrote {} results",
            summary.pages_visited,
            summary.crops_written,
            summary.worker.written
        );
        Ok(summary)
    }

    fn annotate(&mut self, backend: &mut impl DisplayBackend) -> Result<RunSummary> {
        let page_count = self.pages.page_count();
        let mut navigator = Navigator::new(page_count);
        let mut summary = RunSummary::default();

        while let Some(index) = navigator.current() {
            let page = self.pages.render(index, self.options.dpi)?;
            let result =
                AnnotationSession::new(&page, index + 1, page_count, &self.options).run(backend)?;
            summary.pages_visited += 1;

            log::debug!(
                "Page {} done: {:?} with {} regions",
                index + 1,
                result.outcome,
                result.regions.len()
            );

            match result.outcome {
                Outcome::Quit => summary.quit = true,
                Outcome::Next | Outcome::Back if !result.regions.is_empty() => {
                    let written =
                        export_crops(&page, &result.regions, index, &self.options.output_dir)?;
                    summary.crops_written += written.len();
                }
                Outcome::Next | Outcome::Back => {}
            }

            navigator.apply(result.outcome);
        }

        Ok(summary)
    }
}
