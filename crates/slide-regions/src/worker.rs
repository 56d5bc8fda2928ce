//! Background OCR worker
//!
//! The worker never receives work directly. Each pass rescans the output
//! directory from scratch and treats every crop without a result file as
//! pending, so a restarted worker picks up exactly where the last one stopped.
//! Only one worker per directory is supported: two workers can both see the
//! same crop as pending and process it twice.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::export::{is_crop_file, partial_path_for, result_path_for};
use crate::options::WorkerTimings;
use crate::types::*;

/// Placeholder recognition output, handed out in a cycle
pub const LATEX_SNIPPETS: [&str; 10] = [
    r"\hat{y}=\sigma(Wx+b)",
    r"L=\frac{1}{N}\sum_{i=1}^{N}(y_i-\hat{y}_i)^2",
    r"p(z\mid x)=\frac{p(x\mid z)p(z)}{p(x)}",
    r"\theta \leftarrow \theta-\eta\nabla_\theta L",
    r"q(z) \approx p(z \mid x)",
    r"\mathrm{ELBO}=\mathbb{E}_{q}[\log p(x,z)]-\mathbb{E}_{q}[\log q(z)]",
    r"K(x_i,x_j)=\exp\left(-\frac{\|x_i-x_j\|^2}{2\sigma^2}\right)",
    r"a^{(l)}=\mathrm{ReLU}(W^{(l)}a^{(l-1)}+b^{(l)})",
    r"\text{softmax}(z)_k = \frac{e^{z_k}}{\sum_j e^{z_j}}",
    r"f(x)=\mathrm{sign}(w^Tx+b)",
];

/// Cancellation token shared by the orchestrator and the worker.
///
/// Set once at shutdown; never reset.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal is set
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// Sleep for `duration` unless stopped first. Returns true if the signal is set.
async fn wait_or_stop(stop: &StopSignal, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => stop.is_set(),
        _ = stop.stopped() => true,
    }
}

/// Turns a crop into text. Swap in a real OCR engine here.
pub trait Recognizer: Send {
    fn recognize(&mut self, crop: &Path) -> String;
}

/// Cycles through [`LATEX_SNIPPETS`] without looking at the crop
#[derive(Debug, Clone, Default)]
pub struct PlaceholderRecognizer {
    next: usize,
}

impl PlaceholderRecognizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Recognizer for PlaceholderRecognizer {
    fn recognize(&mut self, _crop: &Path) -> String {
        let label = LATEX_SNIPPETS[self.next % LATEX_SNIPPETS.len()];
        self.next += 1;
        label.to_string()
    }
}

/// Result of one scan of the output directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Output directory does not exist yet
    DirectoryMissing,
    /// Every crop already has a result
    Idle,
    Processed { written: usize, failed: usize },
    /// Stop signal observed; the current item was left unprocessed
    Stopped,
}

/// Totals over the worker's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub passes: usize,
    pub written: usize,
    pub failed: usize,
}

enum ItemOutcome {
    Written,
    Failed,
    Abandoned,
}

pub struct OcrWorker<R> {
    recognizer: R,
    timings: WorkerTimings,
    report: WorkerReport,
}

impl OcrWorker<PlaceholderRecognizer> {
    pub fn placeholder(timings: WorkerTimings) -> Self {
        Self::new(PlaceholderRecognizer::new(), timings)
    }
}

impl<R: Recognizer> OcrWorker<R> {
    pub fn new(recognizer: R, timings: WorkerTimings) -> Self {
        Self {
            recognizer,
            timings,
            report: WorkerReport::default(),
        }
    }

    pub fn report(&self) -> WorkerReport {
        self.report
    }

    /// Loop over passes until `stop` is set.
    pub async fn run(mut self, dir: &Path, stop: &StopSignal) -> WorkerReport {
        log::info!("OCR worker started on {}", dir.display());

        while !stop.is_set() {
            let pause = match self.run_pass(dir, stop).await {
                Ok(PassOutcome::DirectoryMissing) => Some(self.timings.missing_dir_backoff()),
                Ok(PassOutcome::Idle) => Some(self.timings.idle_interval()),
                Ok(PassOutcome::Processed { .. }) => None,
                Ok(PassOutcome::Stopped) => break,
                Err(e) => {
                    log::warn!("Failed to scan {}: {}", dir.display(), e);
                    Some(self.timings.idle_interval())
                }
            };

            if let Some(pause) = pause {
                if wait_or_stop(stop, pause).await {
                    break;
                }
            }
        }

        log::info!(
            "OCR worker shutting down ({} written, {} failed)",
            self.report.written,
            self.report.failed
        );
        self.report
    }

    /// Scan `dir` once and process every crop that has no result yet.
    pub async fn run_pass(&mut self, dir: &Path, stop: &StopSignal) -> Result<PassOutcome> {
        let Some(pending) = pending_crops(dir).await? else {
            log::debug!("Waiting for {} to appear", dir.display());
            return Ok(PassOutcome::DirectoryMissing);
        };
        self.report.passes += 1;

        if pending.is_empty() {
            return Ok(PassOutcome::Idle);
        }
        log::debug!("Found {} pending crops", pending.len());

        let (mut written, mut failed) = (0, 0);
        for crop in &pending {
            if stop.is_set() {
                return Ok(PassOutcome::Stopped);
            }
            match self.process(crop, stop).await {
                ItemOutcome::Written => written += 1,
                ItemOutcome::Failed => failed += 1,
                ItemOutcome::Abandoned => return Ok(PassOutcome::Stopped),
            }
        }

        Ok(PassOutcome::Processed { written, failed })
    }

    async fn process(&mut self, crop: &Path, stop: &StopSignal) -> ItemOutcome {
        let label = self.recognizer.recognize(crop);
        log::info!("Processing {} -> '{}'", display_name(crop), label);

        for _ in 0..self.timings.steps {
            if wait_or_stop(stop, self.timings.step()).await {
                log::info!("Abandoned {}", display_name(crop));
                return ItemOutcome::Abandoned;
            }
        }

        let result = result_path_for(crop);
        match write_result(&result, &label).await {
            Ok(()) => {
                log::info!("  -> wrote {}", display_name(&result));
                self.report.written += 1;
                ItemOutcome::Written
            }
            Err(e) => {
                log::warn!("Failed to write {}: {}", display_name(&result), e);
                self.report.failed += 1;
                ItemOutcome::Failed
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

/// Crops in `dir` without a result file, in enumeration order.
///
/// `None` when the directory does not exist.
async fn pending_crops(dir: &Path) -> Result<Option<Vec<PathBuf>>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut pending = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_crop_file(&path) || !entry.file_type().await?.is_file() {
            continue;
        }
        if tokio::fs::try_exists(result_path_for(&path)).await? {
            continue;
        }
        pending.push(path);
    }
    Ok(Some(pending))
}

async fn write_result(path: &Path, label: &str) -> Result<()> {
    let partial = partial_path_for(path);
    let written: std::io::Result<()> = async {
        tokio::fs::write(&partial, format!("{}\n", label)).await?;
        tokio::fs::rename(&partial, path).await
    }
    .await;

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    Ok(())
}

/// A worker running as a task on a tokio runtime
pub struct WorkerHandle {
    stop: StopSignal,
    task: JoinHandle<WorkerReport>,
    runtime: tokio::runtime::Handle,
}

impl WorkerHandle {
    pub fn spawn<R: Recognizer + 'static>(
        runtime: &tokio::runtime::Handle,
        dir: PathBuf,
        worker: OcrWorker<R>,
        stop: StopSignal,
    ) -> Self {
        let task_stop = stop.clone();
        let task = runtime.spawn(async move { worker.run(&dir, &task_stop).await });
        Self {
            stop,
            task,
            runtime: runtime.clone(),
        }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Set the stop signal and wait for the worker task to finish.
    pub async fn stop_and_wait(self) -> Result<WorkerReport> {
        self.stop.set();
        Ok(self.task.await?)
    }

    /// Blocking form of [`stop_and_wait`](Self::stop_and_wait).
    ///
    /// Must not be called from inside the runtime.
    pub fn shutdown(self) -> Result<WorkerReport> {
        self.stop.set();
        let runtime = self.runtime.clone();
        Ok(runtime.block_on(self.task)?)
    }
}
