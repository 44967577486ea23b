//! Pack a grid of scattered UV islands and write the result as OBJ.
//!
//! Run with: cargo run --example pack_grid -- [output_dir]
//!
//! Writes `grid_before.obj`, `grid_after.obj` and `grid.mtl` (referencing a
//! `uv_grid.png` you provide) so the layout can be checked in any viewer.

use std::env;
use std::path::PathBuf;

use uvlayout::io::obj;
use uvlayout::prelude::*;

fn main() {
    env_logger::init();

    let out_dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    // Eight quads of different sizes, scattered far outside the unit square
    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    let mut uvs = Vec::new();
    let mut uv_faces = Vec::new();
    for k in 0..8 {
        let base = vertices.len();
        let x = k as f64 * 1.5;
        let size = 0.5 + 0.25 * (k % 3) as f64;
        vertices.push(Point3::new(x, 0.0, 0.0));
        vertices.push(Point3::new(x + size, 0.0, 0.0));
        vertices.push(Point3::new(x + size, size, 0.0));
        vertices.push(Point3::new(x, size, 0.0));
        faces.push([base, base + 1, base + 2]);
        faces.push([base, base + 2, base + 3]);

        let (u, v) = (k as f64 * 2.0 - 5.0, (k % 2) as f64 * 3.0);
        uvs.push(Point2::new(u, v));
        uvs.push(Point2::new(u + size, v));
        uvs.push(Point2::new(u + size, v + size));
        uvs.push(Point2::new(u, v + size));
        uv_faces.push(Some([base, base + 1, base + 2]));
        uv_faces.push(Some([base, base + 2, base + 3]));
    }

    let mut mesh = build_from_triangles(&vertices, &faces).expect("Failed to build mesh");
    let overlay = build_uv_overlay(&mesh, &uvs, &uv_faces).expect("Failed to build UVs");
    mesh.add_uv_layer(overlay).expect("Failed to attach UVs");
    println!(
        "Built mesh: {} vertices, {} triangles",
        mesh.num_vertices(),
        mesh.num_triangles()
    );

    obj::write_mtl(out_dir.join("grid.mtl"), "uv_grid.png").expect("Failed to write MTL");
    obj::save_layer(&mesh, 0, Some("grid.mtl"), out_dir.join("grid_before.obj"))
        .expect("Failed to save OBJ");

    let policy = LayoutPolicy::default()
        .with_texture_resolution(512)
        .with_gutter_texels(4.0);
    let outcome = run_layout(&policy, &mesh, &Affine3::identity(), &NeverCancel)
        .expect("Layout failed");
    let result = outcome.completed().expect("Layout was cancelled");

    for warning in &result.report.warnings {
        println!("Warning: {}", warning);
    }
    result.patch.apply(&mut mesh).expect("Failed to apply layout");

    if let Some((min, max)) = mesh.uv_layer(0).and_then(|o| o.external_bounding_box()) {
        println!(
            "UV bounds: ({:.3}, {:.3}) to ({:.3}, {:.3})",
            min.x, min.y, max.x, max.y
        );
    }

    obj::save_layer(&mesh, 0, Some("grid.mtl"), out_dir.join("grid_after.obj"))
        .expect("Failed to save OBJ");
    println!("Saved: {}", out_dir.join("grid_after.obj").display());
}
