//! Wavefront OBJ format support.
//!
//! Only geometry and texture coordinates are read: `v`, `vt` and `f`
//! statements. Polygons are fan-triangulated, and negative (relative)
//! indices are resolved. Normals and grouping statements are ignored.
//!
//! Texture coordinates are read and written in the external convention, as
//! authored. When any face carries `vt` indices the mesh gets one UV layer;
//! faces without them are left unset in that layer.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::{Point2, Point3};

use crate::error::{LayoutError, Result};
use crate::mesh::{build_from_triangles, build_uv_overlay, TriangleMesh};

/// Raw contents of an OBJ file, triangulated.
#[derive(Debug, Default)]
struct ObjData {
    positions: Vec<Point3<f64>>,
    uvs: Vec<Point2<f64>>,
    faces: Vec<[usize; 3]>,
    uv_faces: Vec<Option<[usize; 3]>>,
    skipped: usize,
}

/// Load a mesh from an OBJ file.
///
/// # Example
///
/// ```no_run
/// use uvlayout::io::obj;
///
/// let mesh = obj::load("model.obj").unwrap();
/// println!("{} UV layer(s)", mesh.num_uv_layers());
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let data = parse(BufReader::new(file)).map_err(|message| LayoutError::LoadError {
        path: path.to_path_buf(),
        message,
    })?;

    if data.skipped > 0 {
        log::warn!(
            "{}: skipped {} degenerate triangle(s)",
            path.display(),
            data.skipped
        );
    }
    if data.faces.is_empty() {
        return Err(LayoutError::LoadError {
            path: path.to_path_buf(),
            message: "OBJ file contains no valid triangles".to_string(),
        });
    }

    let mut mesh = build_from_triangles(&data.positions, &data.faces)?;
    if data.uv_faces.iter().any(Option::is_some) {
        let overlay = build_uv_overlay(&mesh, &data.uvs, &data.uv_faces)?;
        mesh.add_uv_layer(overlay)?;
    }
    Ok(mesh)
}

fn parse<R: BufRead>(reader: R) -> std::result::Result<ObjData, String> {
    let mut data = ObjData::default();

    for (line_index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| e.to_string())?;
        let line_number = line_index + 1;
        let mut tokens = line.split_whitespace();
        let at_line = |message: String| format!("line {}: {}", line_number, message);

        match tokens.next() {
            Some("v") => {
                let coords = parse_floats(tokens, 3).map_err(at_line)?;
                data.positions
                    .push(Point3::new(coords[0], coords[1], coords[2]));
            }
            Some("vt") => {
                let coords = parse_floats(tokens, 2).map_err(at_line)?;
                data.uvs.push(Point2::new(coords[0], coords[1]));
            }
            Some("f") => {
                let corners = tokens
                    .map(|token| parse_corner(token, data.positions.len(), data.uvs.len()))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(at_line)?;
                if corners.len() < 3 {
                    return Err(at_line(format!(
                        "face has {} vertices, expected at least 3",
                        corners.len()
                    )));
                }

                let with_uvs = corners.iter().all(|c| c.1.is_some());
                for i in 1..corners.len() - 1 {
                    let tri = [corners[0], corners[i], corners[i + 1]];
                    let face = tri.map(|c| c.0);
                    if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                        data.skipped += 1;
                        continue;
                    }
                    data.faces.push(face);
                    data.uv_faces
                        .push(with_uvs.then(|| tri.map(|c| c.1.unwrap_or_default())));
                }
            }
            _ => {}
        }
    }

    Ok(data)
}

fn parse_floats<'a>(
    tokens: impl Iterator<Item = &'a str>,
    count: usize,
) -> std::result::Result<Vec<f64>, String> {
    let values = tokens
        .take(count)
        .map(|t| t.parse::<f64>().map_err(|_| format!("invalid number '{}'", t)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if values.len() < count {
        return Err(format!("expected {} coordinates, found {}", count, values.len()));
    }
    Ok(values)
}

/// Parse one `v`, `v/vt`, `v//vn` or `v/vt/vn` face corner into 0-based
/// position and UV indices.
fn parse_corner(
    token: &str,
    num_positions: usize,
    num_uvs: usize,
) -> std::result::Result<(usize, Option<usize>), String> {
    let mut parts = token.split('/');
    let position = parts
        .next()
        .ok_or_else(|| format!("invalid face corner '{}'", token))
        .and_then(|p| resolve_index(p, num_positions))?;
    let uv = match parts.next() {
        Some(p) if !p.is_empty() => Some(resolve_index(p, num_uvs)?),
        _ => None,
    };
    Ok((position, uv))
}

/// Resolve a 1-based (or negative, relative) OBJ index.
fn resolve_index(token: &str, count: usize) -> std::result::Result<usize, String> {
    let index: i64 = token
        .parse()
        .map_err(|_| format!("invalid index '{}'", token))?;
    let resolved = match index {
        i if i > 0 => i - 1,
        i if i < 0 => count as i64 + i,
        _ => return Err("index 0 is not valid in OBJ".to_string()),
    };
    if resolved < 0 || resolved >= count as i64 {
        return Err(format!("index {} out of range ({} defined)", index, count));
    }
    Ok(resolved as usize)
}

/// Save a mesh to an OBJ file, writing UV layer 0 if present.
///
/// # Example
///
/// ```no_run
/// use uvlayout::io::obj;
///
/// let mesh = obj::load("model.obj").unwrap();
/// obj::save(&mesh, "copy.obj").unwrap();
/// ```
pub fn save<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    save_layer(mesh, 0, None, path)
}

/// Save a mesh to an OBJ file with one chosen UV layer.
///
/// Every element of the layer becomes one `vt` entry. `mtl_file`, when
/// given, is referenced with `mtllib`/`usemtl` so the layout can be
/// previewed with a texture (see [`write_mtl`]).
pub fn save_layer<P: AsRef<Path>>(
    mesh: &TriangleMesh,
    layer: usize,
    mtl_file: Option<&str>,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write(mesh, layer, mtl_file, &mut writer).map_err(|e| LayoutError::SaveError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write<W: Write>(
    mesh: &TriangleMesh,
    layer: usize,
    mtl_file: Option<&str>,
    writer: &mut W,
) -> std::io::Result<()> {
    writeln!(writer, "# uvlayout")?;
    if let Some(mtl) = mtl_file {
        writeln!(writer, "mtllib {}", mtl)?;
    }
    for (_, p) in mesh.vertices() {
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }

    let overlay = mesh.uv_layer(layer);
    if let Some(overlay) = overlay {
        for e in overlay.element_ids() {
            let uv = overlay.external_element(e);
            writeln!(writer, "vt {} {}", uv.x, uv.y)?;
        }
    }
    if mtl_file.is_some() {
        writeln!(writer, "usemtl material0")?;
    }

    for t in mesh.triangle_ids() {
        let [a, b, c] = mesh.triangle(t).map(|v| v.index() + 1);
        match overlay.and_then(|o| o.triangle(t)) {
            Some(elements) => {
                let [ua, ub, uc] = elements.map(|e| e.index() + 1);
                writeln!(writer, "f {}/{} {}/{} {}/{}", a, ua, b, ub, c, uc)?;
            }
            None => writeln!(writer, "f {} {} {}", a, b, c)?,
        }
    }

    writer.flush()
}

/// Write a material library with one textured material, `material0`.
pub fn write_mtl<P: AsRef<Path>>(path: P, texture: &str) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "newmtl material0")?;
    writeln!(writer, "Kd 1 1 1")?;
    writeln!(writer, "map_Kd {}", texture)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TriangleId;
    use std::io::Cursor;
    use tempfile::TempDir;

    const QUAD: &str = "\
# unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn test_parse_quad() {
        let data = parse(Cursor::new(QUAD)).unwrap();
        assert_eq!(data.positions.len(), 4);
        assert_eq!(data.uvs.len(), 4);
        assert_eq!(data.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(data.uv_faces, vec![Some([0, 1, 2]), Some([0, 2, 3])]);
    }

    #[test]
    fn test_negative_indices_and_missing_uvs() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.5 0.5\nf -3 -2 -1\nf 1/1 2/1 3/-1\n";
        let data = parse(Cursor::new(source)).unwrap();
        assert_eq!(data.faces, vec![[0, 1, 2], [0, 1, 2]]);
        assert_eq!(data.uv_faces, vec![None, Some([0, 0, 0])]);
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = parse(Cursor::new("v 0 0 0\nv 1 0\n")).unwrap_err();
        assert!(err.starts_with("line 2:"), "{}", err);

        let err = parse(Cursor::new("v 0 0 0\nf 1 2 3\n")).unwrap_err();
        assert!(err.contains("out of range"), "{}", err);

        let err = parse(Cursor::new("v 0 0 0\nv 1 0 0\nf 1 2\n")).unwrap_err();
        assert!(err.contains("at least 3"), "{}", err);
    }

    #[test]
    fn test_degenerate_faces_are_skipped() {
        let data = parse(Cursor::new("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 1 2\nf 1 2 3\n")).unwrap();
        assert_eq!(data.skipped, 1);
        assert_eq!(data.faces.len(), 1);
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("quad.obj");
        std::fs::write(&input, QUAD).unwrap();

        let mesh = load(&input).unwrap();
        assert_eq!(mesh.num_triangles(), 2);
        assert_eq!(mesh.num_uv_layers(), 1);
        let overlay = mesh.uv_layer(0).unwrap();
        assert_eq!(overlay.num_elements(), 4);

        let output = dir.path().join("copy.obj");
        save(&mesh, &output).unwrap();
        let reloaded = load(&output).unwrap();
        let again = reloaded.uv_layer(0).unwrap();
        assert_eq!(again.num_elements(), overlay.num_elements());
        for e in overlay.element_ids() {
            let (a, b) = (overlay.external_element(e), again.external_element(e));
            assert!((a - b).norm() < 1e-12);
        }
        assert_eq!(
            again.triangle(TriangleId::new(1)),
            overlay.triangle(TriangleId::new(1))
        );
    }

    #[test]
    fn test_mesh_without_uvs() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("tri.obj");
        std::fs::write(&input, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let mesh = load(&input).unwrap();
        assert_eq!(mesh.num_uv_layers(), 0);

        let output = dir.path().join("out.obj");
        save(&mesh, &output).unwrap();
        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.contains("f 1 2 3"));
        assert!(!text.contains("vt"));
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.obj");
        std::fs::write(&empty, "v 0 0 0\n").unwrap();
        assert!(matches!(load(&empty), Err(LayoutError::LoadError { .. })));
        assert!(matches!(
            load(dir.path().join("missing.obj")),
            Err(LayoutError::Io(_))
        ));
    }

    #[test]
    fn test_material_library() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("quad.obj");
        std::fs::write(&input, QUAD).unwrap();
        let mesh = load(&input).unwrap();

        let output = dir.path().join("textured.obj");
        save_layer(&mesh, 0, Some("textured.mtl"), &output).unwrap();
        write_mtl(dir.path().join("textured.mtl"), "grid.png").unwrap();

        let obj = std::fs::read_to_string(&output).unwrap();
        assert!(obj.contains("mtllib textured.mtl"));
        assert!(obj.contains("usemtl material0"));
        let mtl = std::fs::read_to_string(dir.path().join("textured.mtl")).unwrap();
        assert!(mtl.contains("map_Kd grid.png"));
    }
}
