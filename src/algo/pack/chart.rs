//! Per-island geometry prepared for packing.
//!
//! A [`Chart`] is an island's elements expressed in a local frame whose
//! bounding box starts at the origin. Unless rotation is preserved, the frame
//! is turned so the island's minimum-area bounding rectangle is axis-aligned.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use nalgebra::{Point2, Rotation2};

use super::guillotine::Orientation;
use crate::algo::islands::Island;
use crate::mesh::{ElementId, UvOverlay};

/// Islands with a UV area at or below this are treated as degenerate.
pub(crate) const DEGENERATE_AREA: f64 = 1e-14;

/// Rotations smaller than this are not applied.
const MIN_ROTATION: f64 = 1e-12;

/// An island ready for placement.
#[derive(Debug, Clone)]
pub(crate) struct Chart {
    /// Island elements, ascending.
    pub elements: Vec<ElementId>,
    /// Local coordinates of `elements`, within `[0, width] x [0, height]`.
    pub local: Vec<Point2<f64>>,
    pub width: f64,
    pub height: f64,
    /// UV area of the island after any pre-scaling.
    pub uv_area: f64,
    pub degenerate: bool,
}

impl Chart {
    /// Prepare an island for packing.
    ///
    /// Coordinates are read in the external convention and multiplied by
    /// `prescale` before the local frame is fitted.
    pub fn from_island(
        island: &Island,
        overlay: &UvOverlay,
        prescale: f64,
        preserve_rotation: bool,
    ) -> Self {
        let uv_area = island.uv_area(overlay) * prescale * prescale;
        let points: Vec<Point2<f64>> = island
            .elements
            .iter()
            .map(|&e| overlay.external_element(e) * prescale)
            .collect();

        let degenerate = uv_area <= DEGENERATE_AREA;
        let angle = if preserve_rotation || degenerate {
            0.0
        } else {
            min_area_angle(&points)
        };

        let points: Vec<Point2<f64>> = if angle.abs() < MIN_ROTATION {
            points
        } else {
            let rotation = Rotation2::new(-angle);
            points.iter().map(|p| rotation * p).collect()
        };

        let (min, max) = bounds(&points);
        let local = points.iter().map(|p| Point2::from(p - min)).collect();

        Self {
            elements: island.elements.clone(),
            local,
            width: max.x - min.x,
            height: max.y - min.y,
            uv_area,
            degenerate,
        }
    }

    /// Area of the chart's bounding rectangle.
    #[inline]
    pub fn bounding_area(&self) -> f64 {
        self.width * self.height
    }

    /// Longer side of the bounding rectangle.
    #[inline]
    pub fn max_side(&self) -> f64 {
        self.width.max(self.height)
    }

    /// Map a local coordinate through an orientation, staying in the
    /// oriented bounding box.
    #[inline]
    pub fn orient(&self, p: Point2<f64>, orientation: Orientation) -> Point2<f64> {
        match orientation {
            Orientation::Identity => p,
            Orientation::Rotate90 => Point2::new(self.height - p.y, p.x),
            Orientation::Transpose => Point2::new(p.y, p.x),
        }
    }
}

fn bounds(points: &[Point2<f64>]) -> (Point2<f64>, Point2<f64>) {
    let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    if points.is_empty() {
        return (Point2::origin(), Point2::origin());
    }
    (min, max)
}

fn rotated_bounding_area(points: &[Point2<f64>], angle: f64) -> f64 {
    let rotation = Rotation2::new(-angle);
    let rotated: Vec<Point2<f64>> = points.iter().map(|p| rotation * p).collect();
    let (min, max) = bounds(&rotated);
    (max.x - min.x) * (max.y - min.y)
}

/// Angle in `(-pi/4, pi/4]` whose counter-rotation gives the smallest
/// axis-aligned bounding rectangle.
///
/// Candidates are the directions of the convex hull edges. The unrotated
/// frame wins unless a candidate is strictly smaller.
pub(crate) fn min_area_angle(points: &[Point2<f64>]) -> f64 {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        return 0.0;
    }

    let mut best_angle = 0.0;
    let mut best_area = rotated_bounding_area(&hull, 0.0);

    for i in 0..hull.len() {
        let edge = hull[(i + 1) % hull.len()] - hull[i];
        let mut angle = edge.y.atan2(edge.x).rem_euclid(FRAC_PI_2);
        if angle > FRAC_PI_4 {
            angle -= FRAC_PI_2;
        }
        if angle.abs() < MIN_ROTATION {
            continue;
        }
        let area = rotated_bounding_area(&hull, angle);
        if area < best_area * (1.0 - 1e-9) {
            best_area = area;
            best_angle = angle;
        }
    }

    best_angle
}

/// Convex hull by Andrew's monotone chain, counter-clockwise, without
/// collinear points.
pub(crate) fn convex_hull(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let cross = |o: Point2<f64>, a: Point2<f64>, b: Point2<f64>| {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    };

    let mut hull: Vec<Point2<f64>> = Vec::with_capacity(2 * sorted.len());
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::islands::find_islands;
    use crate::mesh::{build_from_triangles, build_uv_overlay};
    use nalgebra::Point3;

    fn quad_overlay(uvs: &[Point2<f64>]) -> UvOverlay {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mesh = build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap();
        build_uv_overlay(&mesh, uvs, &[Some([0, 1, 2]), Some([0, 2, 3])]).unwrap()
    }

    fn diamond() -> Vec<Point2<f64>> {
        // A 0.4 x 0.2 rectangle rotated by 30 degrees about (0.5, 0.5).
        let rotation = Rotation2::new(30f64.to_radians());
        [(-0.2, -0.1), (0.2, -0.1), (0.2, 0.1), (-0.2, 0.1)]
            .iter()
            .map(|&(x, y)| Point2::new(0.5, 0.5) + rotation * nalgebra::Vector2::new(x, y))
            .collect()
    }

    #[test]
    fn test_convex_hull_drops_interior() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.5, 0.5),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
            Point2::new(0.5, 0.0),
        ];
        let hull = convex_hull(&points);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Point2::new(0.5, 0.5)));
        assert!(!hull.contains(&Point2::new(0.5, 0.0)));
    }

    #[test]
    fn test_axis_aligned_square_is_not_rotated() {
        let overlay = quad_overlay(&[
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]);
        let island = find_islands(&overlay, None).remove(0);
        let chart = Chart::from_island(&island, &overlay, 1.0, false);
        assert!(!chart.degenerate);
        assert!((chart.width - 1.0).abs() < 1e-12);
        assert!((chart.height - 1.0).abs() < 1e-12);
        assert_eq!(chart.local[0], Point2::new(0.0, 0.0));
    }

    #[test]
    fn test_rotated_rectangle_is_straightened() {
        let overlay = quad_overlay(&diamond());
        let island = find_islands(&overlay, None).remove(0);

        let chart = Chart::from_island(&island, &overlay, 1.0, false);
        assert!((chart.bounding_area() - 0.08).abs() < 1e-9);
        assert!((chart.max_side() - 0.4).abs() < 1e-9);

        let fixed = Chart::from_island(&island, &overlay, 1.0, true);
        assert!(fixed.bounding_area() > chart.bounding_area() + 0.01);
    }

    #[test]
    fn test_prescale() {
        let overlay = quad_overlay(&[
            Point2::new(0.0, 0.0),
            Point2::new(0.5, 0.0),
            Point2::new(0.5, 0.5),
            Point2::new(0.0, 0.5),
        ]);
        let island = find_islands(&overlay, None).remove(0);
        let chart = Chart::from_island(&island, &overlay, 2.0, true);
        assert!((chart.width - 1.0).abs() < 1e-12);
        assert!((chart.uv_area - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_collapsed_island_is_degenerate() {
        let overlay = quad_overlay(&[Point2::new(0.3, 0.3); 4]);
        let island = find_islands(&overlay, None).remove(0);
        let chart = Chart::from_island(&island, &overlay, 1.0, false);
        assert!(chart.degenerate);
        assert_eq!(chart.bounding_area(), 0.0);
    }

    #[test]
    fn test_orient_stays_in_box() {
        let overlay = quad_overlay(&[
            Point2::new(0.0, 0.0),
            Point2::new(0.5, 0.0),
            Point2::new(0.5, 0.25),
            Point2::new(0.0, 0.25),
        ]);
        let island = find_islands(&overlay, None).remove(0);
        let chart = Chart::from_island(&island, &overlay, 1.0, true);
        for &p in &chart.local {
            for orientation in [Orientation::Rotate90, Orientation::Transpose] {
                let q = chart.orient(p, orientation);
                assert!(q.x >= -1e-12 && q.x <= chart.height + 1e-12);
                assert!(q.y >= -1e-12 && q.y <= chart.width + 1e-12);
            }
        }
    }
}
