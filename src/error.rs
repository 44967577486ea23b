//! Error types for uvlayout.
//!
//! Fatal conditions are reported as [`LayoutError`] values. Conditions the
//! layout recovers from (degenerate islands, under-filled packings) are not
//! errors; they are collected as warnings in the layout report.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`LayoutError`].
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Errors that can occur while building meshes or running a layout.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// The mesh has no triangles.
    #[error("mesh has no triangles")]
    EmptyMesh,

    /// A triangle references an invalid vertex index.
    #[error("triangle {triangle} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The triangle index.
        triangle: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A triangle has duplicate vertex indices.
    #[error("triangle {triangle} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The triangle index.
        triangle: usize,
    },

    /// The requested UV layer does not exist on the mesh.
    #[error("UV layer {index} does not exist (mesh has {available} layers)")]
    MissingUvLayer {
        /// The requested layer index.
        index: usize,
        /// Number of layers present on the mesh.
        available: usize,
    },

    /// A triangle references a UV element that does not exist.
    #[error("triangle {triangle} references invalid UV element {element}")]
    InvalidElement {
        /// The triangle index.
        triangle: usize,
        /// The invalid element index.
        element: usize,
    },

    /// A UV element is attached to a different vertex than the triangle corner using it.
    #[error("UV element {element} has parent {parent}; triangle {triangle} uses vertex {vertex}")]
    ElementParentMismatch {
        /// The triangle index.
        triangle: usize,
        /// The element index.
        element: usize,
        /// The element's parent vertex.
        parent: usize,
        /// The triangle corner's vertex.
        vertex: usize,
    },

    /// A UV overlay was built for a different number of triangles.
    #[error("UV overlay covers {overlay} triangles but the mesh has {mesh}")]
    TriangleCountMismatch {
        /// Triangle count of the overlay.
        overlay: usize,
        /// Triangle count of the mesh.
        mesh: usize,
    },

    /// A patch does not match the mesh it is being applied to.
    #[error("UV patch does not match the target mesh: {0}")]
    PatchMismatch(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving mesh to file.
    #[error("failed to save mesh to {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl LayoutError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        LayoutError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_layer_message() {
        let err = LayoutError::MissingUvLayer {
            index: 3,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "UV layer 3 does not exist (mesh has 1 layers)"
        );
    }

    #[test]
    fn test_invalid_param() {
        let err = LayoutError::invalid_param("texture_resolution", 0, "must be positive");
        assert!(matches!(
            err,
            LayoutError::InvalidParameter {
                name: "texture_resolution",
                ..
            }
        ));
        assert!(err.to_string().contains("must be positive"));
    }
}
