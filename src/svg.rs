//! SVG export and a minimal path-data parser.
//!
//! Each [`Path`] becomes one `<path>` element: `M` to the first segment's
//! start, `L` per line, `A` per arc, `Z` when closed. Pixel centers sit at
//! integer coordinates in the engine but at `+0.5` in SVG's corner-origin
//! grid, so every emitted point is shifted by half a pixel and the parser
//! shifts it back.
//!
//! This is a pure module with no I/O; it produces and consumes strings.

use std::fmt::Write;

use kurbo::{Point, Vec2};
use thiserror::Error;

use crate::vector::{ArcSegment, Path, Segment, VectorImage};

/// Offset from engine pixel coordinates to SVG coordinates.
const PIXEL_CENTER: Vec2 = Vec2::new(0.5, 0.5);

/// Presentation attributes for [`to_svg_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct SvgStyle {
    pub stroke: String,
    pub stroke_width: f64,
    /// Emitted as a `<title>` element when present.
    pub title: Option<String>,
}

impl Default for SvgStyle {
    fn default() -> Self {
        Self {
            stroke: "black".to_string(),
            stroke_width: 1.0,
            title: None,
        }
    }
}

/// Escape the five XML special characters.
fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn write_point(out: &mut String, p: Point) {
    let p = p + PIXEL_CENTER;
    let _ = write!(out, " {} {}", p.x, p.y);
}

fn write_arc(out: &mut String, radius: f64, large: bool, sweep: bool, to: Point) {
    let _ = write!(out, " A {radius} {radius} 0 {} {}", large as u8, sweep as u8);
    write_point(out, to);
}

fn write_arc_segment(out: &mut String, arc: &ArcSegment) {
    if arc.is_full_circle() {
        // A single arc command cannot end where it starts; go through the
        // antipode instead.
        let antipode = arc.center + (arc.center - arc.start);
        write_arc(out, arc.radius, false, arc.clockwise, antipode);
        write_arc(out, arc.radius, false, arc.clockwise, arc.end);
    } else {
        write_arc(out, arc.radius, arc.large_arc(), arc.clockwise, arc.end);
    }
}

/// Build the SVG `d` attribute for a path. Empty for a path without
/// segments.
pub fn path_data(path: &Path) -> String {
    let mut out = String::new();
    let Some(first) = path.segments.first() else {
        return out;
    };
    out.push('M');
    write_point(&mut out, first.start());
    for segment in &path.segments {
        match segment {
            Segment::Line(line) => {
                out.push_str(" L");
                write_point(&mut out, line.end);
            }
            Segment::Arc(arc) => write_arc_segment(&mut out, arc),
        }
    }
    if path.closed {
        out.push_str(" Z");
    }
    out
}

/// Serialize a vectorized image into a standalone SVG document.
///
/// The `viewBox` matches the source bitmap, so the document overlays the
/// skeleton pixel for pixel.
#[must_use]
pub fn to_svg_document(image: &VectorImage, style: &SvgStyle) -> String {
    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = image.width,
        h = image.height,
    );
    if let Some(title) = &style.title {
        let _ = writeln!(out, "  <title>{}</title>", xml_escape(title));
    }
    let attrs = format!(
        r#"fill="none" stroke="{}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round""#,
        xml_escape(&style.stroke),
        style.stroke_width
    );
    for path in &image.paths {
        let d = path_data(path);
        if !d.is_empty() {
            let _ = writeln!(out, r#"  <path d="{d}" {attrs}/>"#);
        }
    }
    let _ = writeln!(out, "</svg>");
    out
}

/// One absolute path command, in engine pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    ArcTo {
        radii: Vec2,
        x_rotation: f64,
        large_arc: bool,
        sweep: bool,
        to: Point,
    },
    ClosePath,
}

impl PathCommand {
    /// The point the command moves to, if any.
    pub fn target(&self) -> Option<Point> {
        match *self {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => Some(p),
            PathCommand::ArcTo { to, .. } => Some(to),
            PathCommand::ClosePath => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SvgParseError {
    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedCharacter { ch: char, offset: usize },

    #[error("unsupported path command {0:?} (only absolute M, L, A, Z)")]
    UnsupportedCommand(char),

    #[error("command {command:?} is missing arguments")]
    MissingArguments { command: char },

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("arc flag must be 0 or 1 at offset {offset}")]
    InvalidFlag { offset: usize },
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() || c == ',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn at_number(&mut self) -> bool {
        self.skip_separators();
        matches!(self.peek(), Some(c) if c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    }

    fn number(&mut self, command: char) -> Result<f64, SvgParseError> {
        if !self.at_number() {
            return Err(SvgParseError::MissingArguments { command });
        }
        let bytes = self.src.as_bytes();
        let start = self.pos;
        let mut end = start;
        if matches!(bytes.get(end), Some(b'-' | b'+')) {
            end += 1;
        }
        while matches!(bytes.get(end), Some(b) if b.is_ascii_digit()) {
            end += 1;
        }
        if bytes.get(end) == Some(&b'.') {
            end += 1;
            while matches!(bytes.get(end), Some(b) if b.is_ascii_digit()) {
                end += 1;
            }
        }
        if matches!(bytes.get(end), Some(b'e' | b'E')) {
            end += 1;
            if matches!(bytes.get(end), Some(b'-' | b'+')) {
                end += 1;
            }
            while matches!(bytes.get(end), Some(b) if b.is_ascii_digit()) {
                end += 1;
            }
        }
        let text = &self.src[start..end];
        self.pos = end;
        text.parse()
            .map_err(|_| SvgParseError::InvalidNumber(text.to_string()))
    }

    fn point(&mut self, command: char) -> Result<Point, SvgParseError> {
        let x = self.number(command)?;
        let y = self.number(command)?;
        Ok(Point::new(x, y) - PIXEL_CENTER)
    }

    fn flag(&mut self, command: char) -> Result<bool, SvgParseError> {
        self.skip_separators();
        let offset = self.pos;
        match self.peek() {
            Some('0') => {
                self.pos += 1;
                Ok(false)
            }
            Some('1') => {
                self.pos += 1;
                Ok(true)
            }
            Some(_) => Err(SvgParseError::InvalidFlag { offset }),
            None => Err(SvgParseError::MissingArguments { command }),
        }
    }
}

/// Parse absolute `M`/`L`/`A`/`Z` path data as written by [`path_data`],
/// undoing the half-pixel shift.
///
/// Repeated argument groups follow the SVG rules: extra pairs after `M`
/// are line-tos, extra groups after `L` or `A` repeat the command.
pub fn parse_path_data(d: &str) -> Result<Vec<PathCommand>, SvgParseError> {
    let mut lexer = Lexer::new(d);
    let mut commands = Vec::new();
    let mut previous: Option<char> = None;

    loop {
        lexer.skip_separators();
        let Some(c) = lexer.peek() else {
            break;
        };
        let command = if c.is_ascii_alphabetic() {
            lexer.pos += c.len_utf8();
            c
        } else {
            match previous {
                Some('M') if lexer.at_number() => 'L',
                Some(p @ ('L' | 'A')) if lexer.at_number() => p,
                _ => {
                    return Err(SvgParseError::UnexpectedCharacter {
                        ch: c,
                        offset: lexer.pos,
                    })
                }
            }
        };

        let parsed = match command {
            'M' => PathCommand::MoveTo(lexer.point(command)?),
            'L' => PathCommand::LineTo(lexer.point(command)?),
            'A' => {
                let rx = lexer.number(command)?;
                let ry = lexer.number(command)?;
                let x_rotation = lexer.number(command)?;
                let large_arc = lexer.flag(command)?;
                let sweep = lexer.flag(command)?;
                let to = lexer.point(command)?;
                PathCommand::ArcTo {
                    radii: Vec2::new(rx, ry),
                    x_rotation,
                    large_arc,
                    sweep,
                    to,
                }
            }
            'Z' | 'z' => PathCommand::ClosePath,
            other => return Err(SvgParseError::UnsupportedCommand(other)),
        };
        commands.push(parsed);
        previous = Some(command.to_ascii_uppercase());
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::bitmap::BinaryImage;
    use crate::vector::LineSegment;
    use crate::vectorize::vectorize_skeleton;

    fn line_path(points: &[(f64, f64)], closed: bool) -> Path {
        let segments = points
            .windows(2)
            .map(|w| {
                Segment::Line(LineSegment::new(
                    Point::new(w[0].0, w[0].1),
                    Point::new(w[1].0, w[1].1),
                    Vec::new(),
                ))
            })
            .collect();
        Path {
            points: Vec::new(),
            closed,
            segments,
        }
    }

    fn assert_round_trip(image: &VectorImage) {
        for path in &image.paths {
            let commands = parse_path_data(&path_data(path)).expect("own output parses");
            let targets: Vec<Point> = commands.iter().filter_map(PathCommand::target).collect();
            let first = commands.first().and_then(PathCommand::target).expect("leading move-to");
            assert!(first.distance(path.segments[0].start()) < 1e-6);
            for segment in &path.segments {
                for p in [segment.start(), segment.end()] {
                    assert!(
                        targets.iter().any(|t| t.distance(p) < 1e-6),
                        "endpoint {p:?} lost in round trip"
                    );
                }
            }
            assert_eq!(
                commands.last() == Some(&PathCommand::ClosePath),
                path.closed
            );
        }
    }

    #[test]
    fn line_path_data_is_shifted_to_pixel_centers() {
        let path = line_path(&[(0.0, 10.0), (39.0, 10.0), (39.0, 2.25)], false);
        assert_eq!(path_data(&path), "M 0.5 10.5 L 39.5 10.5 L 39.5 2.75");

        let closed = line_path(&[(1.0, 1.0), (4.0, 1.0), (1.0, 3.0), (1.0, 1.0)], true);
        assert!(path_data(&closed).ends_with(" Z"));
        assert_eq!(path_data(&line_path(&[], false)), "");
    }

    #[test]
    fn arc_flags() {
        let arc = ArcSegment {
            start: Point::new(15.0, 10.0),
            end: Point::new(10.0, 15.0),
            center: Point::new(10.0, 10.0),
            radius: 5.0,
            start_angle: 0.0,
            end_angle: std::f64::consts::FRAC_PI_2,
            clockwise: true,
            points: Vec::new(),
        };
        let path = Path {
            points: Vec::new(),
            closed: false,
            segments: vec![Segment::Arc(arc.clone())],
        };
        assert_eq!(path_data(&path), "M 15.5 10.5 A 5 5 0 0 1 10.5 15.5");

        let long_way = Path {
            segments: vec![Segment::Arc(ArcSegment {
                clockwise: false,
                ..arc
            })],
            ..path
        };
        assert_eq!(path_data(&long_way), "M 15.5 10.5 A 5 5 0 1 0 10.5 15.5");
    }

    #[test]
    fn full_circle_goes_through_the_antipode() {
        let start = Point::new(15.0, 10.0);
        let path = Path {
            points: Vec::new(),
            closed: true,
            segments: vec![Segment::Arc(ArcSegment {
                start,
                end: start,
                center: Point::new(10.0, 10.0),
                radius: 5.0,
                start_angle: 0.0,
                end_angle: 0.0,
                clockwise: true,
                points: Vec::new(),
            })],
        };
        assert_eq!(
            path_data(&path),
            "M 15.5 10.5 A 5 5 0 0 1 5.5 10.5 A 5 5 0 0 1 15.5 10.5 Z"
        );
    }

    #[test]
    fn document_has_one_path_per_vector_path() {
        let image = VectorImage {
            width: 50,
            height: 20,
            paths: vec![
                line_path(&[(0.0, 10.0), (39.0, 10.0)], false),
                line_path(&[], false),
                line_path(&[(2.0, 2.0), (2.0, 8.0)], false),
            ],
        };
        let style = SvgStyle {
            title: Some("plan <A&B>".to_string()),
            ..SvgStyle::default()
        };
        let svg = to_svg_document(&image, &style);
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains(r#"viewBox="0 0 50 20""#));
        assert!(svg.contains("<title>plan &lt;A&amp;B&gt;</title>"));
        assert_eq!(svg.matches("<path ").count(), 2);
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn parser_follows_svg_repetition_rules() {
        let commands = parse_path_data("M0.5,0.5 2.5 0.5 L 4.5 0.5 4.5 2.5 A 1 1 0 01 6.5 2.5 z")
            .expect("valid path data");
        assert_eq!(
            commands,
            vec![
                PathCommand::MoveTo(Point::new(0.0, 0.0)),
                PathCommand::LineTo(Point::new(2.0, 0.0)),
                PathCommand::LineTo(Point::new(4.0, 0.0)),
                PathCommand::LineTo(Point::new(4.0, 2.0)),
                PathCommand::ArcTo {
                    radii: Vec2::new(1.0, 1.0),
                    x_rotation: 0.0,
                    large_arc: false,
                    sweep: true,
                    to: Point::new(6.0, 2.0),
                },
                PathCommand::ClosePath,
            ]
        );
        assert_eq!(
            parse_path_data("M 1e1 -2.5E-1").expect("exponents"),
            vec![PathCommand::MoveTo(Point::new(9.5, -0.75))]
        );
    }

    #[test]
    fn parser_rejects_what_it_does_not_support() {
        assert_eq!(
            parse_path_data("M 0 0 l 1 1"),
            Err(SvgParseError::UnsupportedCommand('l'))
        );
        assert_eq!(
            parse_path_data("M 0"),
            Err(SvgParseError::MissingArguments { command: 'M' })
        );
        assert!(matches!(
            parse_path_data("M 0 0 A 1 1 0 2 0 3 3"),
            Err(SvgParseError::InvalidFlag { .. })
        ));
        assert!(matches!(
            parse_path_data("1 2"),
            Err(SvgParseError::UnexpectedCharacter { ch: '1', offset: 0 })
        ));
        assert_eq!(
            parse_path_data("M - 1"),
            Err(SvgParseError::InvalidNumber("-".to_string()))
        );
    }

    #[test]
    fn vectorized_drawing_round_trips() {
        let mut pixels: HashSet<(usize, usize)> = HashSet::new();
        for k in 0..4000 {
            let t = std::f64::consts::TAU * k as f64 / 4000.0;
            pixels.insert(((30.0 + 14.0 * t.cos()).round() as usize, (30.0 + 14.0 * t.sin()).round() as usize));
        }
        pixels.extend((5..60).map(|x| (x, 55)));
        pixels.extend((40..55).map(|y| (58, y)));
        pixels.extend((0..20).map(|i| (40 + i, 5 + i)));
        let image = BinaryImage::from_fn(64, 64, |x, y| pixels.contains(&(x, y))).expect("valid");

        let vectors = vectorize_skeleton(&image);
        assert!(vectors.arc_count() >= 1);
        assert!(vectors.line_count() >= 1);
        assert_round_trip(&vectors);
    }
}
