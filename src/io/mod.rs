//! Mesh file I/O.
//!
//! Meshes are read and written with their UV layer, so a layout can be run
//! on a file and the result inspected in any DCC tool.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Notes |
//! |--------|-----------|------|------|-------|
//! | Wavefront OBJ | `.obj` | ✓ | ✓ | `v`/`vt`/`f`, one UV layer |
//!
//! # Usage
//!
//! ```no_run
//! use uvlayout::io::{load, save};
//!
//! let mesh = load("model.obj").unwrap();
//! save(&mesh, "output.obj").unwrap();
//! ```

pub mod obj;

use std::path::Path;

use crate::error::{LayoutError, Result};
use crate::mesh::TriangleMesh;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Wavefront OBJ format.
    Obj,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "obj" => Some(Format::Obj),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

fn detect(path: &Path) -> Result<Format> {
    Format::from_path(path).ok_or_else(|| LayoutError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a mesh from a file with automatic format detection.
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Obj => obj::load(path),
    }
}

/// Save a mesh to a file with automatic format detection.
pub fn save<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Obj => obj::save(mesh, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_extension("OBJ"), Some(Format::Obj));
        assert_eq!(Format::from_path("a/b/model.obj"), Some(Format::Obj));
        assert_eq!(Format::from_path("model.stl"), None);
        assert_eq!(Format::from_path("model"), None);
    }

    #[test]
    fn test_unsupported_format() {
        match load("model.fbx") {
            Err(LayoutError::UnsupportedFormat { extension }) => assert_eq!(extension, "fbx"),
            other => panic!("unexpected result: {:?}", other.map(|m| m.num_triangles())),
        }
        assert!(matches!(
            load("model"),
            Err(LayoutError::UnsupportedFormat { .. })
        ));
    }
}
