use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Document contains no pages")]
    NoPages,
    #[error("Page index {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },
    #[error("Render error: {0}")]
    Render(String),
    #[error("Display backend error: {0}")]
    Backend(String),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, RegionError>;

/// A position in page pixel coordinates. May lie outside the page bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A user-drawn rectangle, stored exactly as entered (press point, release point).
///
/// Corners are not normalized; the exporter sorts and clamps them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub start: Point,
    pub end: Point,
}

impl Region {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Sort corners per axis and clamp them to `[0, width] x [0, height]`.
    ///
    /// Returns `None` when the clamped rectangle has zero width or height.
    pub fn normalized(&self, width: u32, height: u32) -> Option<PixelRect> {
        let (x1, x2) = clamp_span(self.start.x, self.end.x, width);
        let (y1, y2) = clamp_span(self.start.y, self.end.y, height);
        if x2 == x1 || y2 == y1 {
            return None;
        }
        Some(PixelRect {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}

fn clamp_span(a: i32, b: i32, limit: u32) -> (u32, u32) {
    let clamp = |v: i32| -> u32 { (v.max(0) as i64).min(limit as i64) as u32 };
    (clamp(a.min(b)), clamp(a.max(b)))
}

/// Non-empty, in-bounds rectangle ready to be cropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}
