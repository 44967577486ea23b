//! uvlayout CLI - UV atlas layout command-line tool.
//!
//! Usage: uvlayout <COMMAND> [OPTIONS] <INPUT> [OUTPUT]
//!
//! Run `uvlayout --help` for available commands. Set `RUST_LOG=debug` to
//! follow the individual layout stages.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use uvlayout::algo::islands::{find_islands, split_bowties};
use uvlayout::algo::udim::classify_tiles;
use uvlayout::algo::{LayoutMode, LayoutOperatorFactory, LayoutOutcome, LayoutPolicy, TileId};
use uvlayout::host;
use uvlayout::io;
use uvlayout::nalgebra::Vector2;

#[derive(Parser)]
#[command(name = "uvlayout")]
#[command(author, version, about = "UV atlas layout CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display mesh and UV layer information
    Info {
        /// Input mesh file
        input: PathBuf,

        /// UV layer to inspect
        #[arg(short, long, default_value = "0")]
        layer: usize,
    },

    /// Lay out the UV islands of a mesh
    Layout {
        /// Input mesh file
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Layout mode
        #[arg(short, long, value_enum, default_value = "repack")]
        mode: Mode,

        /// UV layer to lay out
        #[arg(short, long, default_value = "0")]
        layer: usize,

        /// Texture resolution in texels
        #[arg(short, long, default_value = "1024")]
        resolution: u32,

        /// Gutter between islands, in texels
        #[arg(short, long, default_value = "1.0")]
        gutter: f64,

        /// Keep the islands' current scale
        #[arg(long)]
        preserve_scale: bool,

        /// Keep the islands' current rotation
        #[arg(long)]
        preserve_rotation: bool,

        /// Allow islands to be mirrored
        #[arg(long)]
        allow_flips: bool,

        /// Uniform scale applied after the layout
        #[arg(long, default_value = "1.0")]
        scale: f64,

        /// Translation applied after the layout, as U,V
        #[arg(long, value_parser = parse_translation, allow_hyphen_values = true)]
        translate: Option<Vector2<f64>>,

        /// Keep islands in their UDIM tiles and pack each tile separately
        #[arg(long)]
        udim: bool,

        /// Per-tile texture resolution, as UDIM=RES (repeatable)
        #[arg(long = "tile-resolution", value_parser = parse_tile_resolution)]
        tile_resolutions: Vec<(TileId, u32)>,

        /// Split bowtie vertices even in transform-only mode
        #[arg(long)]
        split_bowties: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Only apply the scale and translation
    TransformOnly,
    /// Pack islands into the unit square
    Repack,
    /// Stack islands on top of each other in the unit square
    Stack,
    /// Repack with islands scaled to a uniform texel density
    Normalize,
}

impl From<Mode> for LayoutMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::TransformOnly => LayoutMode::TransformOnly,
            Mode::Repack => LayoutMode::Repack,
            Mode::Stack => LayoutMode::Stack,
            Mode::Normalize => LayoutMode::Normalize,
        }
    }
}

fn parse_translation(s: &str) -> Result<Vector2<f64>, String> {
    let (u, v) = s
        .split_once(',')
        .ok_or_else(|| format!("expected U,V but got '{}'", s))?;
    let parse = |c: &str| {
        c.trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid number '{}'", c))
    };
    Ok(Vector2::new(parse(u)?, parse(v)?))
}

fn parse_tile_resolution(s: &str) -> Result<(TileId, u32), String> {
    let (udim, resolution) = s
        .split_once('=')
        .ok_or_else(|| format!("expected UDIM=RES but got '{}'", s))?;
    let tile = udim
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(TileId::from_udim)
        .ok_or_else(|| format!("invalid UDIM number '{}'", udim))?;
    let resolution = resolution
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid resolution '{}'", resolution))?;
    Ok((tile, resolution))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info { input, layer } => {
            cmd_info(&input, layer)?;
        }

        Commands::Layout {
            input,
            output,
            mode,
            layer,
            resolution,
            gutter,
            preserve_scale,
            preserve_rotation,
            allow_flips,
            scale,
            translate,
            udim,
            tile_resolutions,
            split_bowties,
        } => {
            let mut policy = LayoutPolicy::default()
                .with_mode(mode.into())
                .with_uv_layer(layer)
                .with_texture_resolution(resolution)
                .with_gutter_texels(gutter)
                .with_preserve_scale(preserve_scale)
                .with_preserve_rotation(preserve_rotation)
                .with_allow_flips(allow_flips)
                .with_global_transform(scale, translate.unwrap_or_else(Vector2::zeros))
                .with_maintain_udim(udim)
                .with_always_split_bowties(split_bowties);
            if !tile_resolutions.is_empty() {
                let overrides: BTreeMap<TileId, u32> = tile_resolutions.into_iter().collect();
                policy = policy.with_tile_resolutions(overrides);
            }
            cmd_layout(&input, &output, policy)?;
        }
    }

    Ok(())
}

fn cmd_info(input: &PathBuf, layer: usize) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;

    println!("File: {}", input.display());
    println!("Vertices: {}", mesh.num_vertices());
    println!("Triangles: {}", mesh.num_triangles());
    println!("Surface area: {:.6}", mesh.surface_area());
    println!("UV layers: {}", mesh.num_uv_layers());

    let Some(overlay) = mesh.uv_layer(layer) else {
        println!("Layer {}: not present", layer);
        return Ok(());
    };

    let set = overlay.set_triangle_ids().count();
    println!("\nLayer {}:", layer);
    println!("  Elements: {}", overlay.num_elements());
    println!("  Triangles with UVs: {} of {}", set, overlay.num_triangles());
    if let Some((min, max)) = overlay.external_bounding_box() {
        println!(
            "  Bounds: ({:.4}, {:.4}) to ({:.4}, {:.4})",
            min.x, min.y, max.x, max.y
        );
    }

    let mut working = overlay.clone();
    let bowties = split_bowties(&mut working);
    let islands = find_islands(&working, None);
    println!("  Bowtie vertices: {}", bowties);
    println!("  Islands: {}", islands.len());

    let tiles = classify_tiles(overlay, None);
    println!("  Tiles:");
    for bucket in &tiles {
        println!("    {}: {} triangles", bucket.tile, bucket.triangles.len());
    }

    Ok(())
}

fn cmd_layout(
    input: &PathBuf,
    output: &PathBuf,
    policy: LayoutPolicy,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut mesh = io::load(input)?;
    println!(
        "Loaded: {} vertices, {} triangles",
        mesh.num_vertices(),
        mesh.num_triangles()
    );

    let mode = policy.mode;
    let mesh_snapshot = Arc::new(mesh.clone());
    let factory = LayoutOperatorFactory::new(policy, mesh_snapshot);

    println!("Running {} layout...", mode);
    let start = Instant::now();
    let outcome = host::submit_layout(factory.make_operator())
        .wait()
        .ok_or("layout job ended without a result")??;
    let elapsed = start.elapsed();

    let result = match outcome {
        LayoutOutcome::Completed(result) => result,
        LayoutOutcome::Cancelled => return Err("layout was cancelled".into()),
    };

    for warning in &result.report.warnings {
        log::warn!("{}", warning);
    }
    println!(
        "Laid out {} islands in {} tile(s) ({:.2?})",
        result.report.islands,
        result.report.tiles.max(1),
        elapsed
    );

    result.patch.apply(&mut mesh)?;
    io::save(&mesh, output)?;
    println!("Saved: {}", output.display());

    Ok(())
}
