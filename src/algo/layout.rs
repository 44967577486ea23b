//! Layout orchestration.
//!
//! [`run_layout`] drives one layout run over a single UV layer:
//!
//! 1. validate the [`LayoutPolicy`] and copy the layer;
//! 2. split bowtie elements (always, except for plain transforms);
//! 3. pack, either once over the selection or once per occupied UDIM tile;
//! 4. apply the optional global scale and translation;
//! 5. diff the copy against the input into a [`UvPatch`].
//!
//! The input mesh is never modified. Cancellation is polled between stages,
//! around every packer invocation and for every island inside the packer.
//! A cancelled run produces no patch.
//!
//! # Example
//!
//! ```
//! use uvlayout::algo::{run_layout, LayoutMode, LayoutOutcome, LayoutPolicy, NeverCancel};
//! use uvlayout::mesh::{build_from_triangles, build_uv_overlay};
//! use nalgebra::{Affine3, Point2, Point3};
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mut mesh = build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap();
//! let uvs = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(3.0, 0.0),
//!     Point2::new(3.0, 3.0),
//!     Point2::new(0.0, 3.0),
//! ];
//! let overlay = build_uv_overlay(&mesh, &uvs, &[Some([0, 1, 2]), Some([0, 2, 3])]).unwrap();
//! mesh.add_uv_layer(overlay).unwrap();
//!
//! let policy = LayoutPolicy::default().with_mode(LayoutMode::Repack);
//! let outcome = run_layout(&policy, &mesh, &Affine3::identity(), &NeverCancel).unwrap();
//! let LayoutOutcome::Completed(result) = outcome else {
//!     unreachable!()
//! };
//! result.patch.apply(&mut mesh).unwrap();
//!
//! let (min, max) = mesh.uv_layer(0).unwrap().external_bounding_box().unwrap();
//! assert!(min.x > 0.0 && max.x < 1.0);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use nalgebra::{Affine3, Point2, Vector2};
use rayon::prelude::*;

use super::cancel::{Cancellation, Cancelled};
use super::islands::{separate_shared_elements, split_bowties};
use super::pack::{ChartPacker, PackFlags, PackOptions, PackReport};
use super::patch::UvPatch;
use super::udim::{classify_tiles, TileId, TileResolutions};
use crate::error::{LayoutError, Result};
use crate::mesh::{TriangleId, TriangleMesh, UvOverlay};

/// How islands are rearranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutMode {
    /// Leave islands where they are; only the global transform applies.
    TransformOnly,
    /// Pack islands into the unit square at a common scale.
    #[default]
    Repack,
    /// Fit all islands into the unit square with one shared transform.
    Stack,
    /// Equalize texel density from world-space areas, then repack.
    Normalize,
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayoutMode::TransformOnly => "transform-only",
            LayoutMode::Repack => "repack",
            LayoutMode::Stack => "stack",
            LayoutMode::Normalize => "normalize",
        };
        f.write_str(name)
    }
}

/// A layout mode together with the packer flags it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutStrategy {
    /// No packing.
    TransformOnly,
    /// [`ChartPacker::standard_pack`].
    Repack(PackFlags),
    /// [`ChartPacker::stack_pack`].
    Stack(PackFlags),
    /// [`ChartPacker::standard_pack`] with world-density scaling.
    Normalize(PackFlags),
}

/// Configuration of one layout run.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPolicy {
    /// How islands are rearranged.
    pub mode: LayoutMode,
    /// Index of the UV layer to lay out.
    pub uv_layer: usize,
    /// Texture resolution in texels; the gutter is measured against it.
    pub texture_resolution: u32,
    /// Keep island scale (translate/rotate only).
    pub preserve_scale: bool,
    /// Keep island rotation.
    pub preserve_rotation: bool,
    /// Allow mirrored placements when rotation is preserved. A flip mirrors
    /// an island across its diagonal, swapping its U and V axes.
    pub allow_flips: bool,
    /// Padding around islands, in texels.
    pub gutter_texels: f64,
    /// Uniform scale applied after packing.
    pub global_scale: f64,
    /// Translation applied after packing, external convention.
    pub global_translation: Vector2<f64>,
    /// Pack each occupied UDIM tile separately, keeping islands in their tile.
    pub maintain_udim: bool,
    /// Per-tile texture resolutions, used with `maintain_udim`.
    pub tile_resolutions: Option<BTreeMap<TileId, u32>>,
    /// Restrict the run to these triangles.
    pub selection: Option<BTreeSet<TriangleId>>,
    /// Split bowties even when only transforming.
    pub always_split_bowties: bool,
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        Self {
            mode: LayoutMode::Repack,
            uv_layer: 0,
            texture_resolution: 1024,
            preserve_scale: false,
            preserve_rotation: false,
            allow_flips: false,
            gutter_texels: 1.0,
            global_scale: 1.0,
            global_translation: Vector2::zeros(),
            maintain_udim: false,
            tile_resolutions: None,
            selection: None,
            always_split_bowties: false,
        }
    }
}

impl LayoutPolicy {
    /// Set the layout mode.
    pub fn with_mode(mut self, mode: LayoutMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the UV layer index.
    pub fn with_uv_layer(mut self, uv_layer: usize) -> Self {
        self.uv_layer = uv_layer;
        self
    }

    /// Set the texture resolution.
    pub fn with_texture_resolution(mut self, texture_resolution: u32) -> Self {
        self.texture_resolution = texture_resolution;
        self
    }

    /// Set whether island scale is preserved.
    pub fn with_preserve_scale(mut self, preserve_scale: bool) -> Self {
        self.preserve_scale = preserve_scale;
        self
    }

    /// Set whether island rotation is preserved.
    pub fn with_preserve_rotation(mut self, preserve_rotation: bool) -> Self {
        self.preserve_rotation = preserve_rotation;
        self
    }

    /// Set whether diagonal mirroring (U/V swap) is allowed.
    pub fn with_allow_flips(mut self, allow_flips: bool) -> Self {
        self.allow_flips = allow_flips;
        self
    }

    /// Set the gutter in texels.
    pub fn with_gutter_texels(mut self, gutter_texels: f64) -> Self {
        self.gutter_texels = gutter_texels;
        self
    }

    /// Set the post-layout transform `uv * scale + translation`.
    pub fn with_global_transform(mut self, scale: f64, translation: Vector2<f64>) -> Self {
        self.global_scale = scale;
        self.global_translation = translation;
        self
    }

    /// Set whether UDIM tiles are packed separately.
    pub fn with_maintain_udim(mut self, maintain_udim: bool) -> Self {
        self.maintain_udim = maintain_udim;
        self
    }

    /// Set per-tile texture resolutions.
    pub fn with_tile_resolutions(mut self, tile_resolutions: BTreeMap<TileId, u32>) -> Self {
        self.tile_resolutions = Some(tile_resolutions);
        self
    }

    /// Restrict the run to a set of triangles.
    pub fn with_selection(mut self, selection: impl IntoIterator<Item = TriangleId>) -> Self {
        self.selection = Some(selection.into_iter().collect());
        self
    }

    /// Set whether bowties are split for transform-only runs.
    pub fn with_always_split_bowties(mut self, always_split_bowties: bool) -> Self {
        self.always_split_bowties = always_split_bowties;
        self
    }

    /// Resolve the mode into the strategy dispatched on by the run.
    pub fn strategy(&self) -> LayoutStrategy {
        let flags = PackFlags {
            allow_flips: self.allow_flips,
            preserve_scale: self.preserve_scale,
            preserve_rotation: self.preserve_rotation,
        };
        match self.mode {
            LayoutMode::TransformOnly => LayoutStrategy::TransformOnly,
            LayoutMode::Repack => LayoutStrategy::Repack(flags),
            LayoutMode::Stack => LayoutStrategy::Stack(flags),
            LayoutMode::Normalize => LayoutStrategy::Normalize(flags),
        }
    }

    /// Texture resolution of every tile.
    pub fn resolutions(&self) -> TileResolutions {
        TileResolutions::with_overrides(
            self.texture_resolution,
            self.tile_resolutions.clone().unwrap_or_default(),
        )
    }

    /// Check that the policy's numeric parameters are usable.
    pub fn validate(&self) -> Result<()> {
        if self.texture_resolution == 0 {
            return Err(LayoutError::invalid_param(
                "texture_resolution",
                self.texture_resolution,
                "must be positive",
            ));
        }
        if !self.gutter_texels.is_finite() || self.gutter_texels < 0.0 {
            return Err(LayoutError::invalid_param(
                "gutter_texels",
                self.gutter_texels,
                "must be finite and non-negative",
            ));
        }
        if !self.global_scale.is_finite() {
            return Err(LayoutError::invalid_param(
                "global_scale",
                self.global_scale,
                "must be finite",
            ));
        }
        if !self.global_translation.iter().all(|c| c.is_finite()) {
            return Err(LayoutError::invalid_param(
                "global_translation",
                format!("({}, {})", self.global_translation.x, self.global_translation.y),
                "must be finite",
            ));
        }
        if let Some((tile, _)) = self
            .tile_resolutions
            .iter()
            .flatten()
            .find(|&(_, &resolution)| resolution == 0)
        {
            return Err(LayoutError::invalid_param(
                "tile_resolutions",
                tile,
                "resolution must be positive",
            ));
        }
        Ok(())
    }

    fn has_global_transform(&self) -> bool {
        self.global_scale != 1.0 || self.global_translation != Vector2::zeros()
    }
}

/// A recoverable problem encountered during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutWarning {
    /// Islands with zero UV area were collapsed into one-texel slots.
    DegenerateIsland {
        /// Tile being packed, for UDIM runs.
        tile: Option<TileId>,
        /// Number of degenerate islands.
        islands: usize,
    },
    /// The packing does not fill the square as requested.
    PackingUnderfit {
        /// Tile being packed, for UDIM runs.
        tile: Option<TileId>,
        /// Fraction of the square covered by island triangles.
        utilization: f64,
        /// Whether the islands extend beyond the square.
        overflow: bool,
    },
}

impl fmt::Display for LayoutWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tile = |tile: &Option<TileId>| match tile {
            Some(tile) => format!("tile {}: ", tile),
            None => String::new(),
        };
        match self {
            LayoutWarning::DegenerateIsland { tile: t, islands } => write!(
                f,
                "{}{} degenerate island(s) placed in one-texel slots",
                tile(t),
                islands
            ),
            LayoutWarning::PackingUnderfit {
                tile: t,
                utilization,
                overflow,
            } => write!(
                f,
                "{}packing underfit (utilization {:.1}%{})",
                tile(t),
                utilization * 100.0,
                if *overflow { ", overflows the unit square" } else { "" }
            ),
        }
    }
}

/// Statistics and warnings of a completed run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutReport {
    /// Recoverable problems, in the order they occurred.
    pub warnings: Vec<LayoutWarning>,
    /// Elements created by bowtie splitting.
    pub bowties_split: usize,
    /// Elements created to separate UDIM tiles.
    pub tile_seams_split: usize,
    /// Number of tiles packed (UDIM runs only).
    pub tiles: usize,
    /// Number of islands packed.
    pub islands: usize,
}

/// The product of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    /// Changes to apply to the mesh.
    pub patch: UvPatch,
    /// What happened along the way.
    pub report: LayoutReport,
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutOutcome {
    /// The run finished.
    Completed(LayoutResult),
    /// The run observed a cancellation request and stopped.
    Cancelled,
}

impl LayoutOutcome {
    /// Whether the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LayoutOutcome::Cancelled)
    }

    /// The result of a completed run.
    pub fn completed(self) -> Option<LayoutResult> {
        match self {
            LayoutOutcome::Completed(result) => Some(result),
            LayoutOutcome::Cancelled => None,
        }
    }
}

macro_rules! return_if_cancelled {
    ($cancel:expr, $stage:expr) => {
        if $cancel.is_cancelled() {
            log::debug!("layout cancelled {}", $stage);
            return Ok(LayoutOutcome::Cancelled);
        }
    };
}

macro_rules! packed_or_cancelled {
    ($packed:expr, $stage:expr) => {
        match $packed {
            Ok(packed) => packed,
            Err(Cancelled) => {
                log::debug!("layout cancelled {}", $stage);
                return Ok(LayoutOutcome::Cancelled);
            }
        }
    };
}

/// Run a layout over one UV layer of `mesh`.
///
/// `world_transform` maps mesh positions to world space; it only matters for
/// [`LayoutMode::Normalize`].
///
/// # Errors
/// - [`LayoutError::InvalidParameter`] if the policy is unusable.
/// - [`LayoutError::MissingUvLayer`] if the layer does not exist.
pub fn run_layout(
    policy: &LayoutPolicy,
    mesh: &TriangleMesh,
    world_transform: &Affine3<f64>,
    cancel: &dyn Cancellation,
) -> Result<LayoutOutcome> {
    policy.validate()?;
    let original = mesh
        .uv_layer(policy.uv_layer)
        .ok_or(LayoutError::MissingUvLayer {
            index: policy.uv_layer,
            available: mesh.num_uv_layers(),
        })?;

    return_if_cancelled!(cancel, "before start");
    let mut overlay = original.clone();
    let mut report = LayoutReport::default();
    let strategy = policy.strategy();

    if strategy != LayoutStrategy::TransformOnly || policy.always_split_bowties {
        report.bowties_split = split_bowties(&mut overlay);
    }
    return_if_cancelled!(cancel, "after bowtie split");

    let selection: Option<Vec<TriangleId>> = policy.selection.as_ref().map(|selection| {
        selection
            .iter()
            .copied()
            .filter(|&t| mesh.is_triangle(t) && overlay.is_set_triangle(t))
            .collect()
    });

    let world_areas: Option<Vec<f64>> = match strategy {
        LayoutStrategy::Normalize(_) => Some(
            (0..mesh.num_triangles())
                .into_par_iter()
                .map(|i| mesh.triangle_world_area(TriangleId::new(i), world_transform))
                .collect(),
        ),
        _ => None,
    };
    let world_areas = world_areas.as_deref();

    if policy.maintain_udim {
        let buckets = classify_tiles(&overlay, selection.as_deref());
        let tile_of: BTreeMap<TriangleId, TileId> = buckets
            .iter()
            .flat_map(|bucket| bucket.triangles.iter().map(move |&t| (t, bucket.tile)))
            .collect();
        if strategy != LayoutStrategy::TransformOnly {
            report.tile_seams_split =
                separate_shared_elements(&mut overlay, |t| tile_of.get(&t).copied());
        }
        report.tiles = buckets.len();

        let resolutions = policy.resolutions();
        for bucket in &buckets {
            return_if_cancelled!(cancel, "before tile");
            let resolution = resolutions.resolve(bucket.tile);
            log::debug!(
                "packing tile {} ({} triangles, {}px)",
                bucket.tile,
                bucket.triangles.len(),
                resolution
            );
            let packed = pack_region(
                strategy,
                &mut overlay,
                Some(&bucket.triangles),
                resolution,
                policy.gutter_texels,
                world_areas,
                cancel,
            );
            if let Some(packed) = packed_or_cancelled!(packed, "while packing tile") {
                // Packed corners may sit on 1.0, which floors into the next tile.
                let offset = bucket.tile.offset();
                for e in overlay.triangle_elements(&bucket.triangles) {
                    let uv = overlay.external_element(e);
                    overlay.set_external_element(e, bucket.tile.clamp(uv + offset));
                }
                record(&mut report, &packed, Some(bucket.tile));
            }
            return_if_cancelled!(cancel, "after tile");
        }
    } else {
        return_if_cancelled!(cancel, "before packing");
        let packed = pack_region(
            strategy,
            &mut overlay,
            selection.as_deref(),
            policy.texture_resolution,
            policy.gutter_texels,
            world_areas,
            cancel,
        );
        if let Some(packed) = packed_or_cancelled!(packed, "while packing") {
            record(&mut report, &packed, None);
        }
        return_if_cancelled!(cancel, "after packing");
    }

    return_if_cancelled!(cancel, "before global transform");
    if policy.has_global_transform() {
        apply_global_transform(&mut overlay, selection.as_deref(), policy);
    }

    let patch = UvPatch::diff(policy.uv_layer, original, &overlay);
    log::debug!(
        "layout finished: {} moved, {} new elements, {} warning(s)",
        patch.moved_elements().len(),
        patch.new_elements().len(),
        report.warnings.len()
    );
    Ok(LayoutOutcome::Completed(LayoutResult { patch, report }))
}

/// Run the packer selected by `strategy` over one region.
///
/// Returns `Ok(None)` when the strategy does not pack.
fn pack_region(
    strategy: LayoutStrategy,
    overlay: &mut UvOverlay,
    triangles: Option<&[TriangleId]>,
    resolution: u32,
    gutter_texels: f64,
    world_areas: Option<&[f64]>,
    cancel: &dyn Cancellation,
) -> std::result::Result<Option<PackReport>, Cancelled> {
    let options = PackOptions::default()
        .with_texture_resolution(resolution)
        .with_gutter_texels(gutter_texels);

    let report = match strategy {
        LayoutStrategy::TransformOnly => return Ok(None),
        LayoutStrategy::Repack(flags) => ChartPacker::new(options.with_flags(flags))
            .standard_pack(overlay, triangles, None, cancel)?,
        LayoutStrategy::Stack(flags) => {
            ChartPacker::new(options.with_flags(flags)).stack_pack(overlay, triangles, cancel)?
        }
        LayoutStrategy::Normalize(flags) => ChartPacker::new(
            options.with_flags(flags).with_scale_by_world_density(true),
        )
        .standard_pack(overlay, triangles, world_areas, cancel)?,
    };
    Ok(Some(report))
}

/// Fold a packer report into the run report, logging its warnings.
fn record(report: &mut LayoutReport, packed: &PackReport, tile: Option<TileId>) {
    report.islands += packed.islands;

    let mut push = |warning: LayoutWarning| {
        log::warn!("{}", warning);
        report.warnings.push(warning);
    };
    if packed.degenerate_islands > 0 {
        push(LayoutWarning::DegenerateIsland {
            tile,
            islands: packed.degenerate_islands,
        });
    }
    if packed.is_underfit() {
        push(LayoutWarning::PackingUnderfit {
            tile,
            utilization: packed.utilization,
            overflow: packed.overflow,
        });
    }
}

/// Apply `uv * scale + translation` (external convention) to every worked
/// element: all elements, or those of the selected triangles.
fn apply_global_transform(
    overlay: &mut UvOverlay,
    selection: Option<&[TriangleId]>,
    policy: &LayoutPolicy,
) {
    let elements = match selection {
        Some(triangles) => overlay.triangle_elements(triangles),
        None => overlay.element_ids().collect(),
    };
    for e in elements {
        let uv = overlay.external_element(e);
        let moved = Point2::from(uv.coords * policy.global_scale + policy.global_translation);
        overlay.set_external_element(e, moved);
    }
}
