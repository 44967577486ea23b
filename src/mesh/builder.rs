//! Mesh construction utilities.
//!
//! This module provides functions for building triangle meshes and their UV
//! layers from face-vertex lists, as commonly found in mesh file formats.

use std::collections::BTreeMap;

use nalgebra::{Point2, Point3};

use super::index::{TriangleId, VertexId};
use super::overlay::{to_internal, UvOverlay};
use super::triangle_mesh::TriangleMesh;
use crate::error::{LayoutError, Result};

/// Build a triangle mesh from vertices and triangle faces.
///
/// # Arguments
/// * `vertices` - List of vertex positions
/// * `faces` - List of triangles, each as [v0, v1, v2] indices
///
/// # Returns
/// A mesh without UV layers, or an error if the input is invalid.
///
/// # Example
/// ```
/// use uvlayout::mesh::build_from_triangles;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_triangles(), 1);
/// ```
pub fn build_from_triangles(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<TriangleMesh> {
    if faces.is_empty() {
        return Err(LayoutError::EmptyMesh);
    }

    for (fi, face) in faces.iter().enumerate() {
        for &vi in face {
            if vi >= vertices.len() {
                return Err(LayoutError::InvalidVertexIndex {
                    triangle: fi,
                    vertex: vi,
                });
            }
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(LayoutError::DegenerateFace { triangle: fi });
        }
    }

    Ok(TriangleMesh {
        positions: vertices.to_vec(),
        triangles: faces
            .iter()
            .map(|f| f.map(VertexId::new))
            .collect(),
        uv_layers: Vec::new(),
    })
}

/// Build a UV overlay for `mesh` from an indexed list of texture coordinates.
///
/// `uvs` are given in the external convention (as authored, e.g. OBJ `vt`).
/// `uv_faces[t]` holds the UV indices of triangle `t`'s corners, or `None`
/// for a triangle without UVs. One element is created per distinct
/// (vertex, UV index) pair, so triangles sharing both a vertex and a UV index
/// share an element.
///
/// The returned overlay has been validated against `mesh` but is not
/// attached; use [`TriangleMesh::add_uv_layer`].
pub fn build_uv_overlay(
    mesh: &TriangleMesh,
    uvs: &[Point2<f64>],
    uv_faces: &[Option<[usize; 3]>],
) -> Result<UvOverlay> {
    if uv_faces.len() != mesh.num_triangles() {
        return Err(LayoutError::TriangleCountMismatch {
            overlay: uv_faces.len(),
            mesh: mesh.num_triangles(),
        });
    }

    let mut overlay = UvOverlay::new(mesh.num_triangles());
    let mut element_map = BTreeMap::new();

    for (ti, uv_face) in uv_faces.iter().enumerate() {
        let Some(uv_face) = uv_face else {
            continue;
        };
        let t = TriangleId::new(ti);
        let vertices = mesh.triangle(t);
        let mut elements = [Default::default(); 3];
        for corner in 0..3 {
            let ui = uv_face[corner];
            let uv = *uvs.get(ui).ok_or(LayoutError::InvalidElement {
                triangle: ti,
                element: ui,
            })?;
            let v = vertices[corner];
            elements[corner] = *element_map
                .entry((v, ui))
                .or_insert_with(|| overlay.append_element(v, to_internal(uv)));
        }
        overlay.set_triangle(t, elements);
    }

    mesh.validate_overlay(&overlay)?;
    Ok(overlay)
}

/// Convert a mesh to face-vertex representation.
///
/// Returns (vertices, faces) where faces are triangles as vertex indices.
pub fn to_face_vertex(mesh: &TriangleMesh) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let faces = mesh
        .triangles
        .iter()
        .map(|tri| tri.map(|v| v.index()))
        .collect();
    (mesh.positions.clone(), faces)
}
