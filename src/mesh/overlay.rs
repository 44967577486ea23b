//! Per-corner UV overlay.
//!
//! A [`UvOverlay`] stores one [`ElementId`] per triangle corner. Elements own
//! a 2D coordinate and remember the mesh vertex they belong to; triangles that
//! share an element are stitched together in UV space. Triangles may be unset,
//! in which case they carry no UVs in this layer.
//!
//! # Coordinate convention
//!
//! Element coordinates are stored in the *internal* convention, where the V
//! axis is flipped relative to the external (authoring/texture) convention:
//!
//! ```text
//! V_internal = 1 - V_external
//! ```
//!
//! Use [`to_external`]/[`to_internal`] or the `*_external` accessors whenever
//! reasoning about tiles or the unit square.

use nalgebra::Point2;

use super::index::{ElementId, TriangleId, VertexId};

/// Convert a coordinate from the internal storage convention to the external one.
#[inline]
pub fn to_external(uv: Point2<f64>) -> Point2<f64> {
    Point2::new(uv.x, 1.0 - uv.y)
}

/// Convert a coordinate from the external convention to the internal storage one.
#[inline]
pub fn to_internal(uv: Point2<f64>) -> Point2<f64> {
    Point2::new(uv.x, 1.0 - uv.y)
}

/// A UV layer: per-triangle element triples plus the element coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct UvOverlay {
    /// Element coordinates (internal convention), indexed by element ID.
    elements: Vec<Point2<f64>>,
    /// Parent vertex of each element.
    parents: Vec<VertexId>,
    /// Element triple for each triangle, or `None` for unset triangles.
    triangles: Vec<Option<[ElementId; 3]>>,
}

impl UvOverlay {
    /// Create an overlay for `num_triangles` triangles, all initially unset.
    pub fn new(num_triangles: usize) -> Self {
        Self {
            elements: Vec::new(),
            parents: Vec::new(),
            triangles: vec![None; num_triangles],
        }
    }

    // ==================== Accessors ====================

    /// Get the number of elements.
    #[inline]
    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Get the number of triangles the overlay covers (set or not).
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Check whether an element ID refers to an existing element.
    #[inline]
    pub fn is_element(&self, e: ElementId) -> bool {
        e.is_valid() && e.index() < self.elements.len()
    }

    /// Get an element coordinate in the internal convention.
    #[inline]
    pub fn element(&self, e: ElementId) -> Point2<f64> {
        self.elements[e.index()]
    }

    /// Set an element coordinate in the internal convention.
    #[inline]
    pub fn set_element(&mut self, e: ElementId, uv: Point2<f64>) {
        self.elements[e.index()] = uv;
    }

    /// Get an element coordinate in the external convention.
    #[inline]
    pub fn external_element(&self, e: ElementId) -> Point2<f64> {
        to_external(self.element(e))
    }

    /// Set an element coordinate given in the external convention.
    #[inline]
    pub fn set_external_element(&mut self, e: ElementId, uv: Point2<f64>) {
        self.set_element(e, to_internal(uv));
    }

    /// Get the parent vertex of an element.
    #[inline]
    pub fn element_parent(&self, e: ElementId) -> VertexId {
        self.parents[e.index()]
    }

    /// Get the element triple of a triangle, if the triangle is set.
    #[inline]
    pub fn triangle(&self, t: TriangleId) -> Option<[ElementId; 3]> {
        self.triangles.get(t.index()).copied().flatten()
    }

    /// Check whether a triangle has UVs in this overlay.
    #[inline]
    pub fn is_set_triangle(&self, t: TriangleId) -> bool {
        self.triangle(t).is_some()
    }

    /// Get the three external-convention UVs of a set triangle.
    pub fn triangle_external_uvs(&self, t: TriangleId) -> Option<[Point2<f64>; 3]> {
        self.triangle(t).map(|[a, b, c]| {
            [
                self.external_element(a),
                self.external_element(b),
                self.external_element(c),
            ]
        })
    }

    // ==================== Iteration ====================

    /// Iterate over all element IDs.
    pub fn element_ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        (0..self.elements.len()).map(ElementId::new)
    }

    /// Iterate over the IDs of all set triangles.
    pub fn set_triangle_ids(&self) -> impl Iterator<Item = TriangleId> + '_ {
        self.triangles
            .iter()
            .enumerate()
            .filter(|(_, tri)| tri.is_some())
            .map(|(i, _)| TriangleId::new(i))
    }

    /// Build the element → triangles adjacency over set triangles.
    ///
    /// Triangle lists are in ascending triangle order. A triangle that uses
    /// an element at more than one corner is listed once.
    pub fn element_triangles(&self) -> Vec<Vec<TriangleId>> {
        let mut adjacency = vec![Vec::new(); self.elements.len()];
        for t in self.set_triangle_ids() {
            if let Some(tri) = self.triangle(t) {
                for (corner, e) in tri.iter().enumerate() {
                    if tri[..corner].contains(e) {
                        continue;
                    }
                    adjacency[e.index()].push(t);
                }
            }
        }
        adjacency
    }

    // ==================== Construction ====================

    /// Append a new element (internal convention) and return its ID.
    pub fn append_element(&mut self, parent: VertexId, uv: Point2<f64>) -> ElementId {
        let id = ElementId::new(self.elements.len());
        self.elements.push(uv);
        self.parents.push(parent);
        id
    }

    /// Assign the element triple of a triangle.
    ///
    /// Element IDs are not checked here; [`TriangleMesh::add_uv_layer`]
    /// validates the whole overlay against the mesh.
    ///
    /// [`TriangleMesh::add_uv_layer`]: super::TriangleMesh::add_uv_layer
    pub fn set_triangle(&mut self, t: TriangleId, elements: [ElementId; 3]) {
        self.triangles[t.index()] = Some(elements);
    }

    /// Mark a triangle as carrying no UVs.
    pub fn unset_triangle(&mut self, t: TriangleId) {
        self.triangles[t.index()] = None;
    }

    /// Replace one corner reference of a set triangle.
    pub(crate) fn replace_corner(&mut self, t: TriangleId, from: ElementId, to: ElementId) {
        if let Some(tri) = self.triangles[t.index()].as_mut() {
            for e in tri.iter_mut() {
                if *e == from {
                    *e = to;
                }
            }
        }
    }

    /// Duplicate an element (same parent and coordinate) and return the copy.
    pub(crate) fn duplicate_element(&mut self, e: ElementId) -> ElementId {
        let uv = self.element(e);
        let parent = self.element_parent(e);
        self.append_element(parent, uv)
    }

    /// Collect the distinct elements used by a set of triangles, ascending.
    ///
    /// Unset triangles contribute nothing.
    pub fn triangle_elements(&self, triangles: &[TriangleId]) -> Vec<ElementId> {
        let mut elements: Vec<ElementId> = triangles
            .iter()
            .filter_map(|&t| self.triangle(t))
            .flatten()
            .collect();
        elements.sort_unstable();
        elements.dedup();
        elements
    }

    /// Bounding box of all elements in the external convention.
    ///
    /// Returns `None` if the overlay has no elements.
    pub fn external_bounding_box(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        let mut ids = self.element_ids();
        let first = self.external_element(ids.next()?);
        let (mut min, mut max) = (first, first);
        for e in ids {
            let uv = self.external_element(e);
            min.x = min.x.min(uv.x);
            min.y = min.y.min(uv.y);
            max.x = max.x.max(uv.x);
            max.y = max.y.max(uv.y);
        }
        Some((min, max))
    }
}
