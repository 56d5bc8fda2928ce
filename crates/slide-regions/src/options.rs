use crate::session::KeyCode;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Annotation and worker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateOptions {
    /// Directory shared by the exporter and the OCR worker
    pub output_dir: PathBuf,

    // Rendering
    pub dpi: f32,
    pub window_title: String,
    pub overlay: OverlayStyle,

    // Input
    pub keys: KeyBindings,
    /// How long one iteration of the annotation loop waits for input
    pub poll_interval_ms: u64,

    // Background OCR
    pub worker: WorkerTimings,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("latex_regions"),
            dpi: 200.0,
            window_title: "Slide Viewer".to_string(),
            overlay: OverlayStyle::default(),
            keys: KeyBindings::default(),
            poll_interval_ms: 10,
            worker: WorkerTimings::default(),
        }
    }
}

impl AnnotateOptions {
    /// Load options from JSON file
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options: Self = serde_json::from_slice(&bytes)
            .map_err(|e| RegionError::Config(format!("Failed to parse config: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to JSON file
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if !(self.dpi.is_finite() && self.dpi > 0.0) {
            return Err(RegionError::Config(format!(
                "DPI must be positive, got {}",
                self.dpi
            )));
        }

        if !(self.overlay.thickness.is_finite() && self.overlay.thickness > 0.0) {
            return Err(RegionError::Config(
                "Overlay thickness must be positive".to_string(),
            ));
        }

        if self.worker.steps == 0 {
            return Err(RegionError::Config(
                "Worker must take at least one processing step".to_string(),
            ));
        }

        self.keys.validate()
    }
}

/// Outline drawn around each region in the viewer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// RGBA
    pub color: [u8; 4],
    pub thickness: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: [0, 255, 0, 255],
            thickness: 2.0,
        }
    }
}

/// What a key press does inside an annotation session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Remove the most recent region
    Undo,
    /// Remove every region on the page
    Clear,
    /// Save regions and go to the next page
    Advance,
    /// Save regions and go back one page
    Retreat,
    /// Quit without saving the current page
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub undo: KeyCode,
    pub clear: KeyCode,
    pub advance: KeyCode,
    pub retreat: KeyCode,
    pub cancel: KeyCode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            undo: KeyCode::Char('u'),
            clear: KeyCode::Char('c'),
            advance: KeyCode::Char('q'),
            retreat: KeyCode::Char('b'),
            cancel: KeyCode::Escape,
        }
    }
}

impl KeyBindings {
    fn entries(&self) -> [(KeyCode, KeyAction); 5] {
        [
            (self.undo, KeyAction::Undo),
            (self.clear, KeyAction::Clear),
            (self.advance, KeyAction::Advance),
            (self.retreat, KeyAction::Retreat),
            (self.cancel, KeyAction::Cancel),
        ]
    }

    pub fn action_for(&self, key: KeyCode) -> Option<KeyAction> {
        self.entries()
            .into_iter()
            .find(|(bound, _)| *bound == key)
            .map(|(_, action)| action)
    }

    pub fn validate(&self) -> Result<()> {
        let entries = self.entries();
        for (i, (key, action)) in entries.iter().enumerate() {
            if let Some((_, other)) = entries[i + 1..].iter().find(|(k, _)| k == key) {
                return Err(RegionError::Config(format!(
                    "Key '{}' is bound to both {:?} and {:?}",
                    key, action, other
                )));
            }
        }
        Ok(())
    }
}

/// Timing of the background OCR worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerTimings {
    /// Wait before re-checking a missing output directory
    pub missing_dir_backoff_ms: u64,
    /// Wait after a pass that found nothing to do
    pub idle_interval_ms: u64,
    /// One increment of simulated processing; the stop signal is checked between increments
    pub step_ms: u64,
    pub steps: u32,
}

impl Default for WorkerTimings {
    fn default() -> Self {
        Self {
            missing_dir_backoff_ms: 2000,
            idle_interval_ms: 1000,
            step_ms: 100,
            steps: 30,
        }
    }
}

impl WorkerTimings {
    pub fn missing_dir_backoff(&self) -> Duration {
        Duration::from_millis(self.missing_dir_backoff_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    /// Nominal duration of processing one crop
    pub fn processing_time(&self) -> Duration {
        self.step() * self.steps
    }
}
