//! Raster rendering of vectorized paths for visual comparison.
//!
//! Strokes a [`VectorImage`] back to pixels via tiny-skia and produces
//! side-by-side comparison PNGs against the source skeleton.

use std::path::Path;

use kurbo::{BezPath, PathEl};
use tiny_skia::{Color, ColorU8, LineCap, LineJoin, Paint, Pixmap, Stroke, Transform};

use crate::bitmap::BinaryImage;
use crate::error::VectorizeError;
use crate::vector::{Segment, VectorImage};

const SEPARATOR: u32 = 2;
const LINE_COLOR: [u8; 4] = [30, 90, 220, 255];
const ARC_COLOR: [u8; 4] = [220, 40, 40, 255];

/// Convert a kurbo `BezPath` to a `tiny_skia::Path`, mapping pixel-center
/// coordinates to panel coordinates at `scale`.
fn kurbo_to_tinyskia(bezpath: &BezPath, scale: f32) -> Option<tiny_skia::Path> {
    let map = |p: kurbo::Point| ((p.x as f32 + 0.5) * scale, (p.y as f32 + 0.5) * scale);
    let mut pb = tiny_skia::PathBuilder::new();
    for el in bezpath.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                let (x, y) = map(p);
                pb.move_to(x, y);
            }
            PathEl::LineTo(p) => {
                let (x, y) = map(p);
                pb.line_to(x, y);
            }
            PathEl::QuadTo(c, p) => {
                let (cx, cy) = map(c);
                let (px, py) = map(p);
                pb.quad_to(cx, cy, px, py);
            }
            PathEl::CurveTo(c1, c2, p) => {
                let (c1x, c1y) = map(c1);
                let (c2x, c2y) = map(c2);
                let (px, py) = map(p);
                pb.cubic_to(c1x, c1y, c2x, c2y, px, py);
            }
            PathEl::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

/// Encode a pixmap to PNG bytes.
fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, VectorizeError> {
    let mut buf = Vec::new();
    let mut encoder = png::Encoder::new(&mut buf, pixmap.width(), pixmap.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .map_err(|e| VectorizeError::Render(e.to_string()))?;
    writer
        .write_image_data(pixmap.data())
        .map_err(|e| VectorizeError::Render(e.to_string()))?;
    drop(writer);
    Ok(buf)
}

fn blank_panel(width: u32, height: u32) -> Result<Pixmap, VectorizeError> {
    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        VectorizeError::Render(format!("cannot allocate a {width}x{height} canvas"))
    })?;
    pixmap.fill(Color::WHITE);
    Ok(pixmap)
}

fn panel_size(width: usize, height: usize, scale: u32) -> (u32, u32) {
    (width as u32 * scale.max(1), height as u32 * scale.max(1))
}

/// Stroke every path onto `pixmap`: lines in blue, arcs in red.
fn stroke_vectors(pixmap: &mut Pixmap, vectors: &VectorImage, scale: f32) {
    let mut lines = BezPath::new();
    let mut arcs = BezPath::new();
    for path in &vectors.paths {
        for segment in &path.segments {
            let target = match segment {
                Segment::Line(_) => &mut lines,
                Segment::Arc(_) => &mut arcs,
            };
            target.move_to(segment.start());
            segment.append_to(target);
        }
    }

    let stroke = Stroke {
        width: (scale * 0.4).max(1.0),
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    for (path, [r, g, b, a]) in [(&lines, LINE_COLOR), (&arcs, ARC_COLOR)] {
        let Some(sk_path) = kurbo_to_tinyskia(path, scale) else {
            continue;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = true;
        pixmap.stroke_path(&sk_path, &paint, &stroke, Transform::identity(), None);
    }
}

/// Paint skeleton pixels as `scale`-sized squares of `color`.
fn paint_skeleton(pixmap: &mut Pixmap, skeleton: &BinaryImage, scale: u32, color: ColorU8) {
    let width = pixmap.width();
    let color = color.premultiply();
    let pixels = pixmap.pixels_mut();
    for (x, y) in skeleton.foreground() {
        for dy in 0..scale {
            for dx in 0..scale {
                let px = x as u32 * scale + dx;
                let py = y as u32 * scale + dy;
                pixels[(py * width + px) as usize] = color;
            }
        }
    }
}

/// Rasterize the vector paths at `scale` panel pixels per image pixel.
pub fn render_vectors(vectors: &VectorImage, scale: u32) -> Result<Pixmap, VectorizeError> {
    let (w, h) = panel_size(vectors.width, vectors.height, scale);
    let mut pixmap = blank_panel(w, h)?;
    stroke_vectors(&mut pixmap, vectors, scale.max(1) as f32);
    Ok(pixmap)
}

/// Render a side-by-side comparison PNG.
///
/// Left panel: the skeleton. Middle: the vector paths (lines blue, arcs
/// red). Right: the vectors over a faded skeleton.
pub fn render_comparison(
    skeleton: &BinaryImage,
    vectors: &VectorImage,
    output_path: &Path,
    scale: u32,
) -> Result<(), VectorizeError> {
    let scale = scale.max(1);
    let (panel_w, panel_h) = panel_size(skeleton.width(), skeleton.height(), scale);

    let mut source_panel = blank_panel(panel_w, panel_h)?;
    paint_skeleton(&mut source_panel, skeleton, scale, ColorU8::from_rgba(0, 0, 0, 255));

    let traced_panel = render_vectors(vectors, scale)?;

    let mut overlay_panel = blank_panel(panel_w, panel_h)?;
    paint_skeleton(&mut overlay_panel, skeleton, scale, ColorU8::from_rgba(200, 200, 200, 255));
    stroke_vectors(&mut overlay_panel, vectors, scale as f32);

    // ── Composite ──
    let total_w = panel_w * 3 + SEPARATOR * 2;
    let mut composite = Pixmap::new(total_w, panel_h).ok_or_else(|| {
        VectorizeError::Render(format!("cannot allocate a {total_w}x{panel_h} canvas"))
    })?;
    composite.fill(Color::from_rgba8(200, 200, 200, 255));
    let panels = [&source_panel, &traced_panel, &overlay_panel];
    let pixels = composite.pixels_mut();
    for (i, panel) in panels.iter().enumerate() {
        let x0 = i as u32 * (panel_w + SEPARATOR);
        let src = panel.pixels();
        // Vector panels can be smaller when the image reports other dimensions.
        let (w, h) = (panel.width().min(panel_w), panel.height().min(panel_h));
        for y in 0..h {
            for x in 0..w {
                pixels[(y * total_w + x0 + x) as usize] = src[(y * panel.width() + x) as usize];
            }
        }
    }

    std::fs::write(output_path, encode_png(&composite)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use kurbo::Point;

    use super::*;
    use crate::vector::{LineSegment, Path as VectorPath};

    fn horizontal_line() -> VectorImage {
        VectorImage {
            width: 20,
            height: 10,
            paths: vec![VectorPath {
                points: Vec::new(),
                closed: false,
                segments: vec![Segment::Line(LineSegment::new(
                    Point::new(2.0, 5.0),
                    Point::new(17.0, 5.0),
                    Vec::new(),
                ))],
            }],
        }
    }

    fn is_white(pixmap: &Pixmap, x: u32, y: u32) -> bool {
        let p = pixmap.pixel(x, y).expect("in bounds");
        p.red() == 255 && p.green() == 255 && p.blue() == 255
    }

    #[test]
    fn vectors_are_stroked_at_scale() {
        let pixmap = render_vectors(&horizontal_line(), 4).expect("render");
        assert_eq!((pixmap.width(), pixmap.height()), (80, 40));
        // Pixel (10, 5) centre → (42, 22) in panel space.
        assert!(!is_white(&pixmap, 42, 22));
        assert!(is_white(&pixmap, 42, 5));
        assert!(is_white(&pixmap, 2, 22), "line starts at pixel 2");
    }

    #[test]
    fn empty_canvas_is_an_error() {
        assert!(matches!(
            render_vectors(&VectorImage::default(), 4),
            Err(VectorizeError::Render(_))
        ));
    }

    #[test]
    fn comparison_png_has_three_panels() {
        let skeleton = BinaryImage::from_fn(20, 10, |x, y| y == 5 && (2..18).contains(&x))
            .expect("valid");
        let dir = tempfile::tempdir().expect("temp dir");
        let out = dir.path().join("compare.png");
        render_comparison(&skeleton, &horizontal_line(), &out, 3).expect("render");

        let png = image::open(&out).expect("readable png").into_rgba8();
        assert_eq!(png.dimensions(), (60 * 3 + SEPARATOR * 2, 30));
        // Skeleton pixel (5, 5) in the left panel is black.
        assert_eq!(png.get_pixel(16, 16).0, [0, 0, 0, 255]);
        // Separator is gray.
        assert_eq!(png.get_pixel(60, 0).0, [200, 200, 200, 255]);
    }
}
