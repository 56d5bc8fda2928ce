//! Interactive annotation of a single page
//!
//! An [`AnnotationSession`] owns the regions drawn on one visit to one page.
//! It talks to the window system only through [`DisplayBackend`], so the same
//! state machine runs behind the egui viewer and behind scripted test backends.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::options::{AnnotateOptions, KeyAction};
use crate::regions::RegionStore;
use crate::render::render_overlay;
use crate::types::*;

/// Window and input capabilities the annotation loop needs
pub trait DisplayBackend {
    fn set_title(&mut self, title: &str) -> Result<()>;

    /// Show a fully composed frame (page plus overlay)
    fn present(&mut self, frame: &RgbaImage) -> Result<()>;

    /// Wait at most `timeout` for the next input event
    fn poll_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Press,
    Release,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Primary button activity, in page pixel coordinates
    Pointer { kind: PointerKind, x: i32, y: i32 },
    Key(KeyCode),
    /// The window went away; treated like the cancel key
    Closed,
}

impl InputEvent {
    pub fn press(x: i32, y: i32) -> Self {
        Self::Pointer {
            kind: PointerKind::Press,
            x,
            y,
        }
    }

    pub fn release(x: i32, y: i32) -> Self {
        Self::Pointer {
            kind: PointerKind::Release,
            x,
            y,
        }
    }
}

/// Key identity as delivered by a backend and written in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyCode {
    Char(char),
    Escape,
    Enter,
    Space,
    Backspace,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Char(c) => write!(f, "{}", c),
            KeyCode::Escape => write!(f, "Escape"),
            KeyCode::Enter => write!(f, "Enter"),
            KeyCode::Space => write!(f, "Space"),
            KeyCode::Backspace => write!(f, "Backspace"),
            KeyCode::ArrowLeft => write!(f, "ArrowLeft"),
            KeyCode::ArrowRight => write!(f, "ArrowRight"),
            KeyCode::ArrowUp => write!(f, "ArrowUp"),
            KeyCode::ArrowDown => write!(f, "ArrowDown"),
        }
    }
}

impl FromStr for KeyCode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(KeyCode::Char(c.to_ascii_lowercase()));
        }
        match s {
            "Escape" | "Esc" => Ok(KeyCode::Escape),
            "Enter" | "Return" => Ok(KeyCode::Enter),
            "Space" => Ok(KeyCode::Space),
            "Backspace" => Ok(KeyCode::Backspace),
            "ArrowLeft" | "Left" => Ok(KeyCode::ArrowLeft),
            "ArrowRight" | "Right" => Ok(KeyCode::ArrowRight),
            "ArrowUp" | "Up" => Ok(KeyCode::ArrowUp),
            "ArrowDown" | "Down" => Ok(KeyCode::ArrowDown),
            _ => Err(format!("Unknown key: {:?}", s)),
        }
    }
}

impl TryFrom<String> for KeyCode {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyCode> for String {
    fn from(key: KeyCode) -> Self {
        key.to_string()
    }
}

/// How a page visit ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Save and move to the next page
    Next,
    /// Save and move to the previous page
    Back,
    /// Stop without saving this page
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    pub outcome: Outcome,
    /// Regions as drawn; always empty for [`Outcome::Quit`]
    pub regions: Vec<Region>,
}

/// Annotation state for one visit to one page
pub struct AnnotationSession<'a> {
    page: &'a RgbaImage,
    page_number: usize,
    page_count: usize,
    options: &'a AnnotateOptions,
    store: RegionStore,
    anchor: Option<Point>,
    dirty: bool,
}

impl<'a> AnnotationSession<'a> {
    /// `page_number` is 1-based and only used for display.
    pub fn new(
        page: &'a RgbaImage,
        page_number: usize,
        page_count: usize,
        options: &'a AnnotateOptions,
    ) -> Self {
        Self {
            page,
            page_number,
            page_count,
            options,
            store: RegionStore::new(),
            anchor: None,
            dirty: true,
        }
    }

    pub fn title(&self) -> String {
        format!(
            "{} - ({} / {})",
            self.options.window_title, self.page_number, self.page_count
        )
    }

    pub fn regions(&self) -> &[Region] {
        self.store.snapshot()
    }

    /// True while a press has been seen without its release
    pub fn is_dragging(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn render_frame(&self) -> RgbaImage {
        render_overlay(self.page, self.store.snapshot(), &self.options.overlay)
    }

    /// Apply one input event. Returns the outcome once the page is done.
    pub fn handle_event(&mut self, event: InputEvent) -> Option<Outcome> {
        match event {
            InputEvent::Pointer { kind, x, y } => {
                self.handle_pointer(kind, Point::new(x, y));
                None
            }
            InputEvent::Key(key) => self.handle_key(key),
            InputEvent::Closed => Some(Outcome::Quit),
        }
    }

    fn handle_pointer(&mut self, kind: PointerKind, point: Point) {
        match kind {
            PointerKind::Press => self.anchor = Some(point),
            PointerKind::Release => {
                if let Some(anchor) = self.anchor.take() {
                    let region = Region::new(anchor, point);
                    log::debug!("Region added on page {}: {:?}", self.page_number, region);
                    self.store.append(region);
                    self.dirty = true;
                }
            }
            PointerKind::Move => {}
        }
    }

    fn handle_key(&mut self, key: KeyCode) -> Option<Outcome> {
        match self.options.keys.action_for(key)? {
            KeyAction::Undo => {
                if self.store.undo_last().is_some() {
                    self.dirty = true;
                }
                None
            }
            KeyAction::Clear => {
                if !self.store.is_empty() {
                    self.store.clear();
                    self.dirty = true;
                }
                None
            }
            KeyAction::Advance => Some(Outcome::Next),
            KeyAction::Retreat => Some(Outcome::Back),
            KeyAction::Cancel => Some(Outcome::Quit),
        }
    }

    /// Drive the page until an outcome is reached.
    pub fn run(mut self, backend: &mut impl DisplayBackend) -> Result<SessionResult> {
        backend.set_title(&self.title())?;
        let timeout = self.options.poll_interval();

        loop {
            if self.dirty {
                let frame = self.render_frame();
                backend.present(&frame)?;
                self.dirty = false;
            }

            let Some(event) = backend.poll_event(timeout)? else {
                continue;
            };

            if let Some(outcome) = self.handle_event(event) {
                return Ok(self.finish(outcome));
            }
        }
    }

    pub fn finish(self, outcome: Outcome) -> SessionResult {
        let regions = match outcome {
            Outcome::Quit => Vec::new(),
            Outcome::Next | Outcome::Back => self.store.into_vec(),
        };
        SessionResult { outcome, regions }
    }
}
