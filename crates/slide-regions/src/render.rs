//! Overlay rendering for the annotation viewer using tiny-skia

use image::RgbaImage;
use tiny_skia::{LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::options::OverlayStyle;
use crate::types::Region;

/// Convert RgbaImage to Pixmap, apply drawing function, and copy back
fn with_pixmap(img: &mut RgbaImage, f: impl FnOnce(&mut Pixmap)) {
    let Some(size) = tiny_skia::IntSize::from_wh(img.width(), img.height()) else {
        return;
    };
    let Some(mut pixmap) = Pixmap::from_vec(img.as_raw().clone(), size) else {
        return;
    };

    f(&mut pixmap);

    img.copy_from_slice(pixmap.data());
}

/// Copy of `page` with every region outlined.
///
/// Regions are drawn as entered; anything outside the page is clipped.
pub fn render_overlay(page: &RgbaImage, regions: &[Region], style: &OverlayStyle) -> RgbaImage {
    let mut frame = page.clone();
    if regions.is_empty() {
        return frame;
    }

    with_pixmap(&mut frame, |pixmap| {
        let [r, g, b, a] = style.color;
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = false;

        let stroke = Stroke {
            width: style.thickness,
            line_join: LineJoin::Miter,
            ..Default::default()
        };

        for region in regions {
            let min_x = region.start.x.min(region.end.x) as f32;
            let max_x = region.start.x.max(region.end.x) as f32;
            let min_y = region.start.y.min(region.end.y) as f32;
            let max_y = region.start.y.max(region.end.y) as f32;

            let mut pb = PathBuilder::new();
            pb.move_to(min_x, min_y);
            pb.line_to(max_x, min_y);
            pb.line_to(max_x, max_y);
            pb.line_to(min_x, max_y);
            pb.close();
            let Some(path) = pb.finish() else {
                continue;
            };

            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    });

    frame
}
