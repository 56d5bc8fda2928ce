//! Crop export and the shared-directory naming contract
//!
//! Crop files are `slide_<NNN>_crop_<k>.png`; the OCR result for a crop has the
//! same stem with a `.tex` extension. Both sides write through a `.partial`
//! sibling and rename, so readers only ever see complete files.

use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::types::*;

pub const CROP_EXTENSION: &str = "png";
pub const RESULT_EXTENSION: &str = "tex";
const PARTIAL_SUFFIX: &str = "partial";

/// File name for the `ordinal`-th crop (1-based) of the page at `page_index` (0-based)
pub fn crop_file_name(page_index: usize, ordinal: usize) -> String {
    format!(
        "slide_{:03}_crop_{}.{}",
        page_index + 1,
        ordinal,
        CROP_EXTENSION
    )
}

pub fn is_crop_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(CROP_EXTENSION)
}

/// Path of the result artifact that marks `crop` as processed
pub fn result_path_for(crop: &Path) -> PathBuf {
    crop.with_extension(RESULT_EXTENSION)
}

/// Temporary sibling used while `path` is being written
pub(crate) fn partial_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

/// Write each non-degenerate region of `page` to `out_dir` as a PNG crop.
///
/// Regions that clamp to zero width or height are skipped and do not consume
/// an ordinal. Ordinals start at 1 and skip any name that already has a crop
/// or a result on disk, so revisiting a page never rewrites an earlier crop
/// and a new crop never inherits a stale result. Returns the written paths in
/// order.
pub fn export_crops(
    page: &RgbaImage,
    regions: &[Region],
    page_index: usize,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let (width, height) = page.dimensions();
    let mut written = Vec::new();
    let mut ordinal = 0;

    for rect in regions.iter().filter_map(|r| r.normalized(width, height)) {
        let path = loop {
            ordinal += 1;
            let candidate = out_dir.join(crop_file_name(page_index, ordinal));
            if !candidate.exists() && !result_path_for(&candidate).exists() {
                break candidate;
            }
        };

        let crop = image::imageops::crop_imm(page, rect.x, rect.y, rect.width, rect.height)
            .to_image();
        write_png_atomically(&crop, &path)?;

        log::info!(
            "Saved {} ({}x{})",
            path.file_name().unwrap_or_default().to_string_lossy(),
            rect.width,
            rect.height
        );
        written.push(path);
    }

    Ok(written)
}

/// Encoding errors surface as `RegionError::Image`, filesystem errors as `RegionError::Io`.
fn write_png_atomically(image: &RgbaImage, path: &Path) -> Result<()> {
    let mut encoded = Cursor::new(Vec::new());
    image.write_to(&mut encoded, ImageFormat::Png)?;

    let partial = partial_path_for(path);
    let written = std::fs::write(&partial, encoded.into_inner())
        .and_then(|()| std::fs::rename(&partial, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&partial);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn page() -> RgbaImage {
        RgbaImage::from_fn(300, 200, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255]))
    }

    fn region(x1: i32, y1: i32, x2: i32, y2: i32) -> Region {
        Region::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    #[test]
    fn test_crop_file_name() {
        assert_eq!(crop_file_name(0, 1), "slide_001_crop_1.png");
        assert_eq!(crop_file_name(41, 12), "slide_042_crop_12.png");
        assert_eq!(crop_file_name(1233, 2), "slide_1234_crop_2.png");
    }

    #[test]
    fn test_result_path_and_crop_detection() {
        let crop = Path::new("/tmp/out/slide_001_crop_1.png");
        assert_eq!(
            result_path_for(crop),
            PathBuf::from("/tmp/out/slide_001_crop_1.tex")
        );
        assert!(is_crop_file(crop));
        assert!(!is_crop_file(Path::new("slide_001_crop_1.tex")));
        assert!(!is_crop_file(Path::new("slide_001_crop_1.png.partial")));
        assert_eq!(
            partial_path_for(crop),
            PathBuf::from("/tmp/out/slide_001_crop_1.png.partial")
        );
    }

    #[test]
    fn test_export_writes_crops_with_page_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let page = page();

        // drawn right-to-left, bottom-to-top
        let written = export_crops(&page, &[region(60, 70, 10, 20)], 4, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("slide_005_crop_1.png")]);

        let crop = image::open(&written[0]).unwrap().to_rgba8();
        assert_eq!(crop.dimensions(), (50, 50));
        assert_eq!(*crop.get_pixel(0, 0), *page.get_pixel(10, 20));
        assert_eq!(*crop.get_pixel(49, 49), *page.get_pixel(59, 69));
    }

    #[test]
    fn test_degenerate_regions_skip_ordinals() {
        let dir = tempfile::tempdir().unwrap();
        let regions = [
            region(5, 5, 5, 5),       // click
            region(10, 10, 40, 40),   // ok -> 1
            region(10, 10, 80, 10),   // zero height
            region(-50, 0, -1, 100),  // left of page
            region(250, 150, 400, 300), // clamped -> 2
        ];

        let written = export_crops(&page(), &regions, 0, dir.path()).unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("slide_001_crop_1.png"),
                dir.path().join("slide_001_crop_2.png"),
            ]
        );

        let clamped = image::open(&written[1]).unwrap();
        assert_eq!((clamped.width(), clamped.height()), (50, 50));

        let mut names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["slide_001_crop_1.png", "slide_001_crop_2.png"]);
    }

    #[test]
    fn test_revisit_continues_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let page = page();

        let first = export_crops(&page, &[region(0, 0, 20, 20)], 2, dir.path()).unwrap();
        let original = std::fs::read(&first[0]).unwrap();

        let second = export_crops(
            &page,
            &[region(30, 30, 90, 90), region(100, 100, 110, 120)],
            2,
            dir.path(),
        )
        .unwrap();
        assert_eq!(
            second,
            vec![
                dir.path().join("slide_003_crop_2.png"),
                dir.path().join("slide_003_crop_3.png"),
            ]
        );
        assert_eq!(std::fs::read(&first[0]).unwrap(), original);

        // other pages still start at 1
        let other = export_crops(&page, &[region(0, 0, 20, 20)], 3, dir.path()).unwrap();
        assert_eq!(other, vec![dir.path().join("slide_004_crop_1.png")]);
    }

    #[test]
    fn test_no_regions_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let written = export_crops(&page(), &[], 0, dir.path()).unwrap();
        assert!(written.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = export_crops(&page(), &[region(0, 0, 10, 10)], 0, &missing);
        assert!(matches!(result, Err(RegionError::Io(_))));
    }

    #[test]
    fn test_orphaned_result_reserves_its_ordinal() {
        let dir = tempfile::tempdir().unwrap();
        // crop deleted by hand, its result left behind
        std::fs::write(dir.path().join("slide_001_crop_1.tex"), "OLD LABEL\n").unwrap();

        let written = export_crops(&page(), &[region(0, 0, 50, 50)], 0, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("slide_001_crop_2.png")]);
        assert!(!dir.path().join("slide_001_crop_1.png").exists());
        assert!(!result_path_for(&written[0]).exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("slide_001_crop_1.tex")).unwrap(),
            "OLD LABEL\n"
        );
    }
}
