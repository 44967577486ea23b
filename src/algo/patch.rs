//! Sparse UV patches.
//!
//! A layout run never touches the caller's mesh. It returns a [`UvPatch`]
//! describing how one UV layer changed: elements appended by splitting,
//! triangles whose corner references were rewritten, and elements that moved.
//! The host applies the patch in one step with [`UvPatch::apply`], which
//! checks the whole patch against the mesh before changing anything.

use nalgebra::Point2;

use crate::error::{LayoutError, Result};
use crate::mesh::{to_external, ElementId, TriangleId, TriangleMesh, UvOverlay, VertexId};

/// An element appended to the layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewElement {
    /// ID the element receives once appended.
    pub id: ElementId,
    /// Parent vertex.
    pub parent: VertexId,
    /// Coordinate in the internal convention.
    pub uv: Point2<f64>,
}

/// The difference between a UV layer before and after a layout run.
#[derive(Debug, Clone, PartialEq)]
pub struct UvPatch {
    layer: usize,
    base_elements: usize,
    base_triangles: usize,
    new_elements: Vec<NewElement>,
    triangles: Vec<(TriangleId, [ElementId; 3])>,
    moved: Vec<(ElementId, Point2<f64>)>,
}

impl UvPatch {
    /// Diff two versions of a layer.
    ///
    /// `after` must have been derived from `before` by appending elements,
    /// rewriting triangle corners and moving elements.
    pub(crate) fn diff(layer: usize, before: &UvOverlay, after: &UvOverlay) -> Self {
        let base_elements = before.num_elements();

        let moved = before
            .element_ids()
            .filter_map(|e| {
                let (old, new) = (before.element(e), after.element(e));
                let changed =
                    old.x.to_bits() != new.x.to_bits() || old.y.to_bits() != new.y.to_bits();
                changed.then_some((e, new))
            })
            .collect();

        let new_elements = after
            .element_ids()
            .skip(base_elements)
            .map(|id| NewElement {
                id,
                parent: after.element_parent(id),
                uv: after.element(id),
            })
            .collect();

        let triangles = (0..before.num_triangles())
            .map(TriangleId::new)
            .filter_map(|t| match (before.triangle(t), after.triangle(t)) {
                (old, Some(new)) if old != Some(new) => Some((t, new)),
                _ => None,
            })
            .collect();

        Self {
            layer,
            base_elements,
            base_triangles: before.num_triangles(),
            new_elements,
            triangles,
            moved,
        }
    }

    /// Index of the UV layer the patch applies to.
    pub fn layer(&self) -> usize {
        self.layer
    }

    /// Whether applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.new_elements.is_empty() && self.triangles.is_empty() && self.moved.is_empty()
    }

    /// Elements appended by the patch, in ID order.
    pub fn new_elements(&self) -> &[NewElement] {
        &self.new_elements
    }

    /// Triangles whose element references change, ascending.
    pub fn rewritten_triangles(&self) -> &[(TriangleId, [ElementId; 3])] {
        &self.triangles
    }

    /// Existing elements that move, ascending, with their new internal coordinate.
    pub fn moved_elements(&self) -> &[(ElementId, Point2<f64>)] {
        &self.moved
    }

    /// New internal coordinate of an element touched by the patch.
    pub fn get(&self, e: ElementId) -> Option<Point2<f64>> {
        if e.index() >= self.base_elements {
            return self
                .new_elements
                .get(e.index() - self.base_elements)
                .map(|n| n.uv);
        }
        self.moved
            .binary_search_by_key(&e, |&(id, _)| id)
            .ok()
            .map(|i| self.moved[i].1)
    }

    /// Like [`get`](Self::get), in the external convention.
    pub fn get_external(&self, e: ElementId) -> Option<Point2<f64>> {
        self.get(e).map(to_external)
    }

    /// Apply the patch to a mesh.
    ///
    /// Fails with [`LayoutError::PatchMismatch`] (leaving the mesh
    /// untouched) if the target layer is not the one the patch was computed
    /// from.
    pub fn apply(&self, mesh: &mut TriangleMesh) -> Result<()> {
        let available = mesh.num_uv_layers();
        let vertices: Vec<[VertexId; 3]> = self
            .triangles
            .iter()
            .map(|&(t, _)| {
                if mesh.is_triangle(t) {
                    mesh.triangle(t)
                } else {
                    [VertexId::invalid(); 3]
                }
            })
            .collect();
        let overlay = mesh
            .uv_layer_mut(self.layer)
            .ok_or(LayoutError::MissingUvLayer {
                index: self.layer,
                available,
            })?;
        self.check(overlay, &vertices)?;
        self.write(overlay);
        Ok(())
    }

    fn check(&self, overlay: &UvOverlay, vertices: &[[VertexId; 3]]) -> Result<()> {
        if overlay.num_elements() != self.base_elements {
            return Err(LayoutError::PatchMismatch(format!(
                "layer has {} elements, patch expects {}",
                overlay.num_elements(),
                self.base_elements
            )));
        }
        if overlay.num_triangles() != self.base_triangles {
            return Err(LayoutError::PatchMismatch(format!(
                "layer covers {} triangles, patch expects {}",
                overlay.num_triangles(),
                self.base_triangles
            )));
        }

        let parent_of = |e: ElementId| {
            if e.index() < self.base_elements {
                Some(overlay.element_parent(e))
            } else {
                self.new_elements
                    .get(e.index() - self.base_elements)
                    .map(|n| n.parent)
            }
        };

        for (&(t, elements), corners) in self.triangles.iter().zip(vertices) {
            for (&e, &v) in elements.iter().zip(corners) {
                if !e.is_valid() || parent_of(e) != Some(v) {
                    return Err(LayoutError::PatchMismatch(format!(
                        "triangle {} corner does not match element {}",
                        t.index(),
                        e.index()
                    )));
                }
            }
        }

        Ok(())
    }

    fn write(&self, overlay: &mut UvOverlay) {
        for n in &self.new_elements {
            overlay.append_element(n.parent, n.uv);
        }
        for &(t, elements) in &self.triangles {
            overlay.set_triangle(t, elements);
        }
        for &(e, uv) in &self.moved {
            overlay.set_element(e, uv);
        }
    }
}
