//! # uvlayout
//!
//! UV atlas layout for triangle meshes.
//!
//! uvlayout takes a mesh whose UV layer has already been cut into charts and
//! arranges those charts: it splits bowtie vertices, finds the UV islands,
//! optionally keeps them in their UDIM tiles, and then either transforms,
//! repacks, stacks or density-normalizes them. A run never mutates its
//! input; it returns a [`UvPatch`](algo::UvPatch) that is applied in one
//! step once the run has completed.
//!
//! ## Features
//!
//! - **Island extraction**: bowtie splitting and union-find connected components
//! - **UDIM tiles**: per-tile packing with per-tile texture resolutions
//! - **Packing**: guillotine bin packing with gutters, rotation and flips
//! - **Texel density**: scale islands by world-space area before packing
//! - **Background jobs**: cancellable runs on worker threads
//! - **File formats**: Wavefront OBJ with texture coordinates
//!
//! ## Quick Start
//!
//! ```no_run
//! use uvlayout::prelude::*;
//!
//! let mut mesh = uvlayout::io::load("model.obj").unwrap();
//!
//! let policy = LayoutPolicy::default()
//!     .with_texture_resolution(2048)
//!     .with_gutter_texels(4.0);
//! let outcome = run_layout(&policy, &mesh, &Affine3::identity(), &NeverCancel).unwrap();
//!
//! if let Some(result) = outcome.completed() {
//!     for warning in &result.report.warnings {
//!         println!("{}", warning);
//!     }
//!     result.patch.apply(&mut mesh).unwrap();
//! }
//! uvlayout::io::save(&mesh, "packed.obj").unwrap();
//! ```
//!
//! ## UV Conventions
//!
//! Coordinates are stored with V flipped (`v_internal = 1 - v_external`).
//! Tile classification, file I/O and the public `external_*` accessors use
//! the external convention, where UDIM tile 1001 spans `[0, 1]²`.
//!
//! ```
//! use uvlayout::mesh::{to_external, to_internal};
//! use nalgebra::Point2;
//!
//! let uv = Point2::new(0.25, 0.75);
//! assert_eq!(to_internal(uv), Point2::new(0.25, 0.25));
//! assert_eq!(to_external(to_internal(uv)), uv);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod host;
pub mod io;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use uvlayout::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::{
        run_layout, CancelFlag, Cancellation, LayoutMode, LayoutOperatorFactory, LayoutOutcome,
        LayoutPolicy, LayoutWarning, NeverCancel, TileId, UvPatch,
    };
    pub use crate::error::{LayoutError, Result};
    pub use crate::mesh::{
        build_from_triangles, build_uv_overlay, ElementId, TriangleId, TriangleMesh, UvOverlay,
        VertexId,
    };
    pub use nalgebra::{Affine3, Point2, Point3, Vector2};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_two_islands_end_to_end() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let mut mesh = build_from_triangles(&vertices, &[[0, 1, 2], [3, 4, 5]]).unwrap();
        let uvs = vec![
            Point2::new(-3.0, 0.0),
            Point2::new(-1.0, 0.0),
            Point2::new(-3.0, 2.0),
            Point2::new(5.0, 5.0),
            Point2::new(6.0, 5.0),
            Point2::new(5.0, 6.0),
        ];
        let overlay =
            build_uv_overlay(&mesh, &uvs, &[Some([0, 1, 2]), Some([3, 4, 5])]).unwrap();
        mesh.add_uv_layer(overlay).unwrap();

        let outcome =
            run_layout(&LayoutPolicy::default(), &mesh, &Affine3::identity(), &NeverCancel)
                .unwrap();
        let result = outcome.completed().unwrap();
        assert_eq!(result.report.islands, 2);
        result.patch.apply(&mut mesh).unwrap();

        let (min, max) = mesh.uv_layer(0).unwrap().external_bounding_box().unwrap();
        assert!(min.x >= 0.0 && min.y >= 0.0);
        assert!(max.x <= 1.0 && max.y <= 1.0);
    }
}
