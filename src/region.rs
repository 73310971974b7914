//! Plate candidate localisation
//!
//! Edges are traced into contours and every contour is put through a chain
//! of cheap geometric filters: area bounds, a four-vertex polygon
//! approximation, then bounding box proportions typical of plates.

use crate::config::RegionParams;
use image::{imageops, GrayImage};
use imageproc::contours::find_contours;
use imageproc::edges::canny;
use imageproc::geometry::{arc_length, contour_area};
use imageproc::point::Point;
use serde::Serialize;

/// Axis-aligned rectangle in source image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// True when the rectangle is non-empty and lies inside a `width x height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }

    /// Copy this region out of `image` into a new buffer
    pub fn crop(&self, image: &GrayImage) -> GrayImage {
        imageops::crop_imm(image, self.x, self.y, self.width, self.height).to_image()
    }
}

/// Finds rectangular regions shaped like registration plates
#[derive(Debug, Clone, Default)]
pub struct RegionDetector {
    params: RegionParams,
}

impl RegionDetector {
    pub fn new(params: RegionParams) -> Self {
        Self { params }
    }

    /// Candidate regions in contour discovery order
    pub fn detect(&self, image: &GrayImage) -> Vec<Region> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let edges = canny(image, self.params.canny_low, self.params.canny_high);
        let contours = find_contours::<i32>(&edges);
        let image_area = width as f64 * height as f64;

        let mut regions = Vec::new();
        for contour in &contours {
            let points = &contour.points;
            if points.len() < 4 {
                continue;
            }

            let area = contour_area(points);
            if !self.area_in_range(area, image_area) {
                continue;
            }

            let epsilon = self.params.approx_epsilon_fraction * arc_length(points, true);
            let vertices = approximate_closed_polygon(points, epsilon).len();
            let bbox = bounding_rect(points);

            if self.accepts(area, vertices, &bbox, image_area) && bbox.fits_within(width, height) {
                regions.push(bbox);
            }
        }

        tracing::debug!(
            contours = contours.len(),
            regions = regions.len(),
            "Region detection complete"
        );

        regions
    }

    /// Full acceptance rule for one contour
    pub fn accepts(&self, area: f64, vertices: usize, bbox: &Region, image_area: f64) -> bool {
        let p = &self.params;
        let ratio = bbox.aspect_ratio();
        self.area_in_range(area, image_area)
            && vertices == 4
            && ratio >= p.min_aspect_ratio
            && ratio <= p.max_aspect_ratio
            && bbox.width > p.min_width
            && bbox.height > p.min_height
    }

    fn area_in_range(&self, area: f64, image_area: f64) -> bool {
        area >= self.params.min_area && area <= self.params.max_area_fraction * image_area
    }
}

fn distance(a: Point<i32>, b: Point<i32>) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Inclusive bounding box of a point set
fn bounding_rect(points: &[Point<i32>]) -> Region {
    let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
    let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Region::new(
        min_x.max(0) as u32,
        min_y.max(0) as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    )
}

/// Douglas-Peucker simplification of a closed curve.
///
/// The curve is split at the point farthest from its first point and each
/// half is simplified as an open chain. On a traced contour the first and
/// last points are neighbours, so a chord between them is useless as the
/// initial reference line.
fn approximate_closed_polygon(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let start = points[0];
    let (split, _) = points
        .iter()
        .enumerate()
        .fold((0, 0.0), |(best_i, best_d), (i, &p)| {
            let d = distance(start, p);
            if d > best_d {
                (i, d)
            } else {
                (best_i, best_d)
            }
        });
    if split == 0 {
        return vec![start];
    }

    let mut first = simplify_open(&points[..=split], epsilon);
    first.pop();

    let mut closing: Vec<Point<i32>> = points[split..].to_vec();
    closing.push(start);
    let mut second = simplify_open(&closing, epsilon);
    second.pop();

    first.extend(second);
    first
}

/// Douglas-Peucker on an open chain; keeps both endpoints
fn simplify_open(chain: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    let last = chain.len() - 1;
    if last < 2 {
        return chain.to_vec();
    }

    let (a, b) = (chain[0], chain[last]);
    let mut max_d = 0.0;
    let mut index = 0;
    for (i, &p) in chain.iter().enumerate().take(last).skip(1) {
        let d = point_line_distance(p, a, b);
        if d > max_d {
            max_d = d;
            index = i;
        }
    }

    if max_d > epsilon {
        let mut left = simplify_open(&chain[..=index], epsilon);
        left.pop();
        left.extend(simplify_open(&chain[index..], epsilon));
        left
    } else {
        vec![a, b]
    }
}

fn point_line_distance(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let len = distance(a, b);
    if len == 0.0 {
        return distance(p, a);
    }
    let cross = (b.x - a.x) as f64 * (p.y - a.y) as f64 - (b.y - a.y) as f64 * (p.x - a.x) as f64;
    cross.abs() / len
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn rect_outline(x: i32, y: i32, w: i32, h: i32) -> Vec<Point<i32>> {
        let mut pts = Vec::new();
        for i in 0..w {
            pts.push(Point::new(x + i, y));
        }
        for j in 1..h {
            pts.push(Point::new(x + w - 1, y + j));
        }
        for i in (0..w - 1).rev() {
            pts.push(Point::new(x + i, y + h - 1));
        }
        for j in (1..h - 1).rev() {
            pts.push(Point::new(x, y + j));
        }
        pts
    }

    #[test]
    fn test_accepts_plate_shaped_quadrilateral() {
        let detector = RegionDetector::default();
        let bbox = Region::new(10, 10, 200, 60);
        assert!((bbox.aspect_ratio() - 3.333).abs() < 0.01);
        assert!(detector.accepts(12000.0, 4, &bbox, 640.0 * 480.0));
    }

    #[test]
    fn test_rejects_tall_box() {
        let detector = RegionDetector::default();
        let bbox = Region::new(10, 10, 50, 60);
        assert!(!detector.accepts(3000.0, 4, &bbox, 640.0 * 480.0));
    }

    #[test]
    fn test_rejects_small_area_regardless_of_shape() {
        let detector = RegionDetector::default();
        let bbox = Region::new(10, 10, 200, 60);
        assert!(!detector.accepts(500.0, 4, &bbox, 640.0 * 480.0));
    }

    #[test]
    fn test_rejects_non_quadrilateral_and_oversized() {
        let detector = RegionDetector::default();
        let bbox = Region::new(0, 0, 200, 60);
        assert!(!detector.accepts(12000.0, 5, &bbox, 640.0 * 480.0));
        // More than 30% of a 300x100 frame
        assert!(!detector.accepts(12000.0, 4, &bbox, 300.0 * 100.0));
    }

    #[test]
    fn test_rejects_boundary_dimensions() {
        let detector = RegionDetector::default();
        // width must exceed 100, height must exceed 30
        assert!(!detector.accepts(3000.0, 4, &Region::new(0, 0, 100, 40), 1e6));
        assert!(!detector.accepts(3000.0, 4, &Region::new(0, 0, 120, 30), 1e6));
        assert!(detector.accepts(3000.0, 4, &Region::new(0, 0, 101, 31), 1e6));
    }

    #[test]
    fn test_rectangle_outline_approximates_to_four_vertices() {
        let pts = rect_outline(5, 5, 200, 60);
        let eps = 0.02 * arc_length(&pts, true);
        let approx = approximate_closed_polygon(&pts, eps);
        assert_eq!(approx.len(), 4, "got {:?}", approx);
    }

    #[test]
    fn test_triangle_is_not_quadrilateral() {
        let pts = vec![Point::new(0, 0), Point::new(100, 0), Point::new(50, 80)];
        let approx = approximate_closed_polygon(&pts, 1.0);
        assert_eq!(approx.len(), 3);
    }

    #[test]
    fn test_contour_area_length_and_bounds() {
        let pts = rect_outline(0, 0, 11, 6);
        assert_eq!(contour_area(&pts), 50.0);
        assert_eq!(arc_length(&pts, true), 30.0);
        assert_eq!(bounding_rect(&pts), Region::new(0, 0, 11, 6));
    }

    #[test]
    fn test_blank_image_has_no_regions() {
        let img = GrayImage::from_pixel(320, 240, Luma([128]));
        assert!(RegionDetector::default().detect(&img).is_empty());
    }

    #[test]
    fn test_detects_bright_rectangle() {
        let mut img = GrayImage::from_pixel(400, 300, Luma([0]));
        draw_filled_rect_mut(&mut img, Rect::at(100, 120).of_size(200, 60), Luma([255]));

        let regions = RegionDetector::default().detect(&img);

        assert!(!regions.is_empty());
        let r = regions[0];
        assert!((r.x as i32 - 100).abs() <= 3, "x = {}", r.x);
        assert!((r.y as i32 - 120).abs() <= 3, "y = {}", r.y);
        assert!((r.width as i32 - 200).abs() <= 6, "width = {}", r.width);
        assert!((r.height as i32 - 60).abs() <= 6, "height = {}", r.height);
    }

    #[test]
    fn test_region_crop_and_bounds() {
        let img = GrayImage::from_fn(50, 40, |x, y| Luma([(x + y) as u8]));
        let region = Region::new(10, 5, 20, 10);
        assert!(region.fits_within(50, 40));
        assert!(!Region::new(40, 0, 20, 10).fits_within(50, 40));
        let crop = region.crop(&img);
        assert_eq!(crop.dimensions(), (20, 10));
        assert_eq!(crop.get_pixel(0, 0).0[0], 15);
    }
}
