// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometric helpers: canvas-expanding rotation, projective warps, and the
// Hough-line quadrilateral finder used for perspective correction.

use image::{GrayImage, Pixel};
use imageproc::definitions::Image;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};

/// Four corners in order: top-left, top-right, bottom-right, bottom-left.
pub type Quad = [(f32, f32); 4];

// -- Warps --------------------------------------------------------------------

/// Rotate about the centre by `angle_deg` (clockwise on screen), sizing the
/// output so the rotated source fits entirely. Uncovered pixels get `fill`.
pub fn rotate_expanded<P>(image: &Image<P>, angle_deg: f32, fill: P) -> Image<P>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    let (w, h) = (image.width() as f32, image.height() as f32);
    let theta = angle_deg.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let new_w = (w * cos + h * sin).round().max(1.0);
    let new_h = (w * sin + h * cos).round().max(1.0);

    let projection = Projection::translate(new_w / 2.0, new_h / 2.0)
        * Projection::rotate(theta)
        * Projection::translate(-w / 2.0, -h / 2.0);
    warp_to(image, &projection, new_w as u32, new_h as u32, fill)
}

/// Warp `image` through `projection` (input to output coordinates) into a
/// `width` x `height` canvas.
pub fn warp_to<P>(
    image: &Image<P>,
    projection: &Projection,
    width: u32,
    height: u32,
    fill: P,
) -> Image<P>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    let mut out = Image::<P>::from_pixel(width.max(1), height.max(1), fill);
    warp_into(image, projection, Interpolation::Bilinear, fill, &mut out);
    out
}

// -- Hough quadrilateral ------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum EdgeKind {
    Top,
    Bottom,
    Left,
    Right,
}

/// Split Hough lines into near-horizontal and near-vertical sets.
///
/// `PolarLine::angle_in_degrees` is the angle of the line's normal, so a
/// horizontal line has a normal near 90° and a vertical one near 0° or 180°.
/// Lines more than 30° off either axis are dropped.
fn split_lines(lines: &[PolarLine]) -> (Vec<PolarLine>, Vec<PolarLine>) {
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();
    for line in lines {
        let angle = line.angle_in_degrees;
        if (60..=120).contains(&angle) {
            horizontal.push(*line);
        } else if angle <= 30 || angle >= 150 {
            vertical.push(*line);
        }
    }
    (horizontal, vertical)
}

/// Where a line crosses the image's central column (horizontal lines) or
/// central row (vertical lines).
fn crossing(line: &PolarLine, centre: (f32, f32), kind: EdgeKind) -> f32 {
    let theta = (line.angle_in_degrees as f32).to_radians();
    let (sin, cos) = theta.sin_cos();
    match kind {
        EdgeKind::Top | EdgeKind::Bottom => (line.r - centre.0 * cos) / sin,
        EdgeKind::Left | EdgeKind::Right => (line.r - centre.1 * sin) / cos,
    }
}

/// The outermost line of a set on the requested side.
fn extreme_line(lines: &[PolarLine], centre: (f32, f32), kind: EdgeKind) -> Option<PolarLine> {
    let key = |l: &&PolarLine| crossing(l, centre, kind);
    let cmp = |a: &&PolarLine, b: &&PolarLine| key(a).total_cmp(&key(b));
    match kind {
        EdgeKind::Top | EdgeKind::Left => lines.iter().min_by(cmp).copied(),
        EdgeKind::Bottom | EdgeKind::Right => lines.iter().max_by(cmp).copied(),
    }
}

/// Intersection of two lines in Hough form `x cos θ + y sin θ = r`.
/// `None` for (nearly) parallel lines.
fn intersect(a: &PolarLine, b: &PolarLine) -> Option<(f32, f32)> {
    let (sin_a, cos_a) = (a.angle_in_degrees as f64).to_radians().sin_cos();
    let (sin_b, cos_b) = (b.angle_in_degrees as f64).to_radians().sin_cos();
    let denom = cos_a * sin_b - sin_a * cos_b;
    if denom.abs() < 1e-6 {
        return None;
    }
    let (ra, rb) = (a.r as f64, b.r as f64);
    let x = (ra * sin_b - rb * sin_a) / denom;
    let y = (rb * cos_a - ra * cos_b) / denom;
    Some((x as f32, y as f32))
}

/// Shoelace area of a quadrilateral with ordered vertices.
pub fn quad_area(corners: &Quad) -> f32 {
    let mut twice = 0.0f32;
    for i in 0..4 {
        let j = (i + 1) % 4;
        twice += corners[i].0 * corners[j].1 - corners[j].0 * corners[i].1;
    }
    twice.abs() / 2.0
}

/// Find the page outline in a Canny edge map as the quadrilateral bounded by
/// the outermost near-horizontal and near-vertical Hough lines.
pub fn find_quad(edges: &GrayImage) -> Option<Quad> {
    let (w, h) = edges.dimensions();
    let diagonal = ((w as f64).powi(2) + (h as f64).powi(2)).sqrt();
    let options = LineDetectionOptions {
        vote_threshold: (diagonal * 0.25).max(80.0) as u32,
        suppression_radius: 8,
    };
    let lines = detect_lines(edges, options);
    let (horizontal, vertical) = split_lines(&lines);
    if horizontal.len() < 2 || vertical.len() < 2 {
        return None;
    }

    let centre = (w as f32 / 2.0, h as f32 / 2.0);
    let top = extreme_line(&horizontal, centre, EdgeKind::Top)?;
    let bottom = extreme_line(&horizontal, centre, EdgeKind::Bottom)?;
    let left = extreme_line(&vertical, centre, EdgeKind::Left)?;
    let right = extreme_line(&vertical, centre, EdgeKind::Right)?;

    Some([
        intersect(&top, &left)?,
        intersect(&top, &right)?,
        intersect(&bottom, &right)?,
        intersect(&bottom, &left)?,
    ])
}

/// Output size for flattening `quad`: the longer of each pair of opposite
/// edges.
pub fn quad_target_size(quad: &Quad) -> (u32, u32) {
    let dist = |a: (f32, f32), b: (f32, f32)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
    let width = dist(quad[0], quad[1]).max(dist(quad[3], quad[2]));
    let height = dist(quad[0], quad[3]).max(dist(quad[1], quad[2]));
    (width.round().max(1.0) as u32, height.round().max(1.0) as u32)
}

/// Projection taking `quad` onto the axis-aligned `width` x `height` rectangle.
pub fn flatten_projection(quad: &Quad, width: u32, height: u32) -> Option<Projection> {
    let (w, h) = (width as f32, height as f32);
    Projection::from_control_points(*quad, [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn quad_area_of_rectangle() {
        let corners = [(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)];
        assert!((quad_area(&corners) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn perpendicular_lines_intersect() {
        // y = 100 and x = 50.
        let h = PolarLine {
            r: 100.0,
            angle_in_degrees: 90,
        };
        let v = PolarLine {
            r: 50.0,
            angle_in_degrees: 0,
        };
        let (x, y) = intersect(&h, &v).unwrap();
        assert!((x - 50.0).abs() < 0.5 && (y - 100.0).abs() < 0.5);
    }

    #[test]
    fn parallel_lines_do_not_intersect() {
        let a = PolarLine {
            r: 50.0,
            angle_in_degrees: 0,
        };
        let b = PolarLine {
            r: 100.0,
            angle_in_degrees: 0,
        };
        assert!(intersect(&a, &b).is_none());
    }

    #[test]
    fn lines_split_by_normal_angle() {
        let lines = [
            PolarLine { r: 10.0, angle_in_degrees: 90 },
            PolarLine { r: 20.0, angle_in_degrees: 88 },
            PolarLine { r: 30.0, angle_in_degrees: 0 },
            PolarLine { r: 40.0, angle_in_degrees: 175 },
            PolarLine { r: 50.0, angle_in_degrees: 45 },
        ];
        let (horizontal, vertical) = split_lines(&lines);
        assert_eq!(horizontal.len(), 2);
        assert_eq!(vertical.len(), 2);
    }

    #[test]
    fn extremes_follow_position_not_radius() {
        let centre = (100.0, 100.0);
        let lines = [
            PolarLine { r: 40.0, angle_in_degrees: 90 },
            PolarLine { r: 160.0, angle_in_degrees: 90 },
        ];
        let top = extreme_line(&lines, centre, EdgeKind::Top).unwrap();
        assert_eq!(top.r, 40.0);
        // Near x = 22 with the normal pointing left.
        let verticals = [
            PolarLine { r: -20.0, angle_in_degrees: 179 },
            PolarLine { r: 170.0, angle_in_degrees: 0 },
        ];
        let left = extreme_line(&verticals, centre, EdgeKind::Left).unwrap();
        assert_eq!(left.r, -20.0);
    }

    #[test]
    fn rotation_by_zero_keeps_size() {
        let img = GrayImage::from_pixel(40, 20, Luma([9]));
        let out = rotate_expanded(&img, 0.0, Luma([255]));
        assert_eq!(out.dimensions(), (40, 20));
        assert_eq!(out.get_pixel(20, 10).0[0], 9);
    }

    #[test]
    fn right_angle_rotation_swaps_axes() {
        let img = GrayImage::from_pixel(40, 20, Luma([9]));
        assert_eq!(rotate_expanded(&img, 90.0, Luma([255])).dimensions(), (20, 40));
    }

    #[test]
    fn finds_bright_page_on_dark_background() {
        let mut edges = GrayImage::new(400, 500);
        for x in 50..350 {
            edges.put_pixel(x, 60, Luma([255]));
            edges.put_pixel(x, 440, Luma([255]));
        }
        for y in 60..441 {
            edges.put_pixel(50, y, Luma([255]));
            edges.put_pixel(350, y, Luma([255]));
        }
        let quad = find_quad(&edges).expect("quad");
        assert!((quad[0].0 - 50.0).abs() < 2.0 && (quad[0].1 - 60.0).abs() < 2.0);
        assert!((quad[2].0 - 350.0).abs() < 2.0 && (quad[2].1 - 440.0).abs() < 2.0);
        assert!(quad_target_size(&quad).0.abs_diff(300) <= 3);
    }
}
