pub mod export;
mod options;
pub mod orchestrator;
mod regions;
mod render;
pub mod session;
mod types;
pub mod worker;

pub use export::{crop_file_name, export_crops, is_crop_file, result_path_for};
pub use options::*;
pub use orchestrator::{Navigator, Orchestrator, PageSource, RunSummary};
pub use regions::RegionStore;
pub use render::render_overlay;
pub use session::{
    AnnotationSession, DisplayBackend, InputEvent, KeyCode, Outcome, PointerKind, SessionResult,
};
pub use types::*;
pub use worker::{
    OcrWorker, PassOutcome, PlaceholderRecognizer, Recognizer, StopSignal, WorkerHandle,
    WorkerReport,
};
