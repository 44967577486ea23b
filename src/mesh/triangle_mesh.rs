//! Triangle mesh with UV layers.
//!
//! [`TriangleMesh`] is an indexed triangle list with any number of
//! [`UvOverlay`] layers attached. Layout only ever reads the geometry; UV
//! layers are edited through [`UvPatch`](crate::algo::UvPatch) or the
//! overlay setters.

use nalgebra::{Affine3, Point3};

use super::index::{TriangleId, VertexId};
use super::overlay::UvOverlay;
use crate::error::{LayoutError, Result};

/// An indexed triangle mesh carrying zero or more UV layers.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub(crate) positions: Vec<Point3<f64>>,

    /// Vertex triples, one per triangle.
    pub(crate) triangles: Vec<[VertexId; 3]>,

    /// UV layers, each covering every triangle.
    pub(crate) uv_layers: Vec<UvOverlay>,
}

impl TriangleMesh {
    // ==================== Accessors ====================

    /// Get the number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Get the number of triangles.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Get the number of UV layers.
    #[inline]
    pub fn num_uv_layers(&self) -> usize {
        self.uv_layers.len()
    }

    /// Check whether a triangle ID refers to an existing triangle.
    #[inline]
    pub fn is_triangle(&self, t: TriangleId) -> bool {
        t.is_valid() && t.index() < self.triangles.len()
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId) -> &Point3<f64> {
        &self.positions[v.index()]
    }

    /// Get the three vertices of a triangle.
    #[inline]
    pub fn triangle(&self, t: TriangleId) -> [VertexId; 3] {
        self.triangles[t.index()]
    }

    /// Get a UV layer.
    #[inline]
    pub fn uv_layer(&self, index: usize) -> Option<&UvOverlay> {
        self.uv_layers.get(index)
    }

    /// Get a mutable UV layer.
    #[inline]
    pub fn uv_layer_mut(&mut self, index: usize) -> Option<&mut UvOverlay> {
        self.uv_layers.get_mut(index)
    }

    /// Iterate over all triangle IDs.
    pub fn triangle_ids(&self) -> impl Iterator<Item = TriangleId> + '_ {
        (0..self.triangles.len()).map(TriangleId::new)
    }

    /// Iterate over all vertex positions with their IDs.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Point3<f64>)> + '_ {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, p)| (VertexId::new(i), p))
    }

    // ==================== Geometry ====================

    /// Get the positions of the three corners of a triangle.
    pub fn triangle_positions(&self, t: TriangleId) -> [Point3<f64>; 3] {
        let [v0, v1, v2] = self.triangle(t);
        [*self.position(v0), *self.position(v1), *self.position(v2)]
    }

    /// Compute the area of a triangle in object space.
    pub fn triangle_area(&self, t: TriangleId) -> f64 {
        let [p0, p1, p2] = self.triangle_positions(t);
        0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
    }

    /// Compute the area of a triangle after mapping it into world space.
    pub fn triangle_world_area(&self, t: TriangleId, transform: &Affine3<f64>) -> f64 {
        let [p0, p1, p2] = self.triangle_positions(t).map(|p| transform.transform_point(&p));
        0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
    }

    /// Compute the total object-space surface area.
    pub fn surface_area(&self) -> f64 {
        self.triangle_ids().map(|t| self.triangle_area(t)).sum()
    }

    /// Compute the bounding box of the vertex positions.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.positions.first()?;
        let (mut min, mut max) = (first, first);
        for p in &self.positions {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }
        Some((min, max))
    }

    // ==================== UV layers ====================

    /// Attach a UV layer and return its index.
    ///
    /// The overlay must cover exactly this mesh's triangles, and every set
    /// triangle must reference existing elements whose parent vertices match
    /// the triangle's corners.
    pub fn add_uv_layer(&mut self, overlay: UvOverlay) -> Result<usize> {
        self.validate_overlay(&overlay)?;
        self.uv_layers.push(overlay);
        Ok(self.uv_layers.len() - 1)
    }

    /// Check that an overlay is consistent with this mesh.
    pub fn validate_overlay(&self, overlay: &UvOverlay) -> Result<()> {
        if overlay.num_triangles() != self.num_triangles() {
            return Err(LayoutError::TriangleCountMismatch {
                overlay: overlay.num_triangles(),
                mesh: self.num_triangles(),
            });
        }

        for t in overlay.set_triangle_ids() {
            let Some(elements) = overlay.triangle(t) else {
                continue;
            };
            let vertices = self.triangle(t);
            for (&e, &v) in elements.iter().zip(vertices.iter()) {
                if !overlay.is_element(e) {
                    return Err(LayoutError::InvalidElement {
                        triangle: t.index(),
                        element: e.index(),
                    });
                }
                let parent = overlay.element_parent(e);
                if parent != v {
                    return Err(LayoutError::ElementParentMismatch {
                        triangle: t.index(),
                        element: e.index(),
                        parent: parent.index(),
                        vertex: v.index(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{build_from_triangles, ElementId};
    use nalgebra::{Point2, Vector3};

    fn right_triangle() -> TriangleMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap()
    }

    #[test]
    fn test_triangle_area() {
        let mesh = right_triangle();
        assert!((mesh.triangle_area(TriangleId::new(0)) - 2.0).abs() < 1e-12);
        assert!((mesh.surface_area() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_world_area_uses_transform() {
        let mesh = right_triangle();
        let scale = Affine3::from_matrix_unchecked(
            nalgebra::Matrix4::new_nonuniform_scaling(&Vector3::new(3.0, 2.0, 1.0)),
        );
        let area = mesh.triangle_world_area(TriangleId::new(0), &scale);
        assert!((area - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_add_uv_layer_validates_counts() {
        let mut mesh = right_triangle();
        let err = mesh.add_uv_layer(UvOverlay::new(2)).unwrap_err();
        assert!(matches!(err, LayoutError::TriangleCountMismatch { overlay: 2, mesh: 1 }));
    }

    #[test]
    fn test_add_uv_layer_validates_parents() {
        let mut mesh = right_triangle();
        let mut overlay = UvOverlay::new(1);
        let e0 = overlay.append_element(VertexId::new(0), Point2::new(0.0, 0.0));
        let e1 = overlay.append_element(VertexId::new(2), Point2::new(1.0, 0.0));
        let e2 = overlay.append_element(VertexId::new(1), Point2::new(0.0, 1.0));
        overlay.set_triangle(TriangleId::new(0), [e0, e1, e2]);

        let err = mesh.add_uv_layer(overlay).unwrap_err();
        assert!(matches!(err, LayoutError::ElementParentMismatch { triangle: 0, .. }));
        assert_eq!(mesh.num_uv_layers(), 0);
    }

    #[test]
    fn test_add_uv_layer_validates_elements() {
        let mut mesh = right_triangle();
        let mut overlay = UvOverlay::new(1);
        overlay.set_triangle(
            TriangleId::new(0),
            [ElementId::new(0), ElementId::new(1), ElementId::new(5)],
        );
        let err = mesh.add_uv_layer(overlay).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidElement { triangle: 0, element: 0 }));
    }
}
