//! Core mesh data structures.
//!
//! This module provides the triangle mesh and UV overlay representation the
//! layout algorithms operate on.
//!
//! # Overview
//!
//! - [`TriangleMesh`] holds vertex positions, triangles and UV layers.
//! - [`UvOverlay`] maps every triangle corner to a UV element. Elements are
//!   shared between triangles that are stitched in UV space.
//!
//! Mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`TriangleId`] - Identifies a triangle
//! - [`ElementId`] - Identifies a UV element of one overlay
//!
//! # Construction
//!
//! ```
//! use uvlayout::mesh::{build_from_triangles, build_uv_overlay};
//! use nalgebra::{Point2, Point3};
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let mut mesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
//!
//! let uvs = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.5, 1.0)];
//! let overlay = build_uv_overlay(&mesh, &uvs, &[Some([0, 1, 2])]).unwrap();
//! let layer = mesh.add_uv_layer(overlay).unwrap();
//! assert_eq!(mesh.uv_layer(layer).unwrap().num_elements(), 3);
//! ```

mod builder;
mod index;
mod overlay;
mod triangle_mesh;

pub use builder::{build_from_triangles, build_uv_overlay, to_face_vertex};
pub use index::{ElementId, TriangleId, VertexId};
pub use overlay::{to_external, to_internal, UvOverlay};
pub use triangle_mesh::TriangleMesh;
