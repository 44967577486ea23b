//! Chart packing into the unit square.
//!
//! [`ChartPacker`] rearranges the islands of a UV overlay inside `[0, 1]^2`
//! (external convention):
//!
//! - [`ChartPacker::standard_pack`] packs every island into its own slot,
//!   separated by the gutter, at the largest common scale that fits.
//!   With world-density scaling enabled, islands are first rescaled so their
//!   texel density matches across the mesh.
//! - [`ChartPacker::stack_pack`] fits the union of all islands into the
//!   square with one shared transform, so islands keep their relative
//!   placement (and overlap if they overlapped before).
//!
//! Packing never fails. When no gutter-respecting placement exists the
//! islands are laid out best effort and the returned [`PackReport`] says so.
//! Both modes poll a [`Cancellation`] per island and return [`Cancelled`]
//! without touching the overlay once it fires.
//!
//! # Example
//!
//! ```
//! use uvlayout::algo::pack::{ChartPacker, PackOptions};
//! use uvlayout::algo::NeverCancel;
//! use uvlayout::mesh::{build_from_triangles, build_uv_overlay};
//! use nalgebra::{Point2, Point3};
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mesh = build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap();
//! let uvs = vec![
//!     Point2::new(2.0, 2.0),
//!     Point2::new(6.0, 2.0),
//!     Point2::new(6.0, 6.0),
//!     Point2::new(2.0, 6.0),
//! ];
//! let mut overlay = build_uv_overlay(&mesh, &uvs, &[Some([0, 1, 2]), Some([0, 2, 3])]).unwrap();
//!
//! let packer = ChartPacker::new(PackOptions::default().with_gutter_texels(0.0));
//! let report = packer.standard_pack(&mut overlay, None, None, &NeverCancel).unwrap();
//! assert!(report.is_success());
//!
//! let (min, max) = overlay.external_bounding_box().unwrap();
//! assert!(min.x.abs() < 1e-9 && (max.x - 1.0).abs() < 1e-9);
//! ```

mod chart;
mod guillotine;

pub use guillotine::Orientation;

use nalgebra::{Point2, Vector2};
use rayon::prelude::*;

use self::chart::{Chart, DEGENERATE_AREA};
use self::guillotine::{GuillotinePacker, Placement, EPSILON};
use super::cancel::{Cancellation, Cancelled};
use super::islands::{find_islands, triangle_area_2d, working_triangles, Island};
use crate::mesh::{TriangleId, UvOverlay};

/// Bisection steps of the scale search.
const SCALE_ITERATIONS: usize = 40;

/// Orientation and scale flags shared by the packing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackFlags {
    /// Allow mirrored placements. A flip mirrors an island across its
    /// diagonal, swapping its U and V axes.
    pub allow_flips: bool,
    /// Keep the islands' current scale.
    pub preserve_scale: bool,
    /// Keep the islands' current rotation.
    pub preserve_rotation: bool,
}

/// Options for [`ChartPacker`].
#[derive(Debug, Clone, PartialEq)]
pub struct PackOptions {
    /// Padding around each island, in texels.
    pub gutter_texels: f64,
    /// Allow mirrored placements. Only used when rotation is preserved,
    /// since free rotation already covers the useful orientations.
    ///
    /// A flip mirrors an island across its diagonal: U and V swap, so a
    /// wide island becomes a tall one without being rotated.
    pub allow_flips: bool,
    /// Keep the islands' current scale (translate/rotate only).
    pub preserve_scale: bool,
    /// Keep the islands' current rotation.
    pub preserve_rotation: bool,
    /// Texture resolution the gutter is measured against.
    pub texture_resolution: u32,
    /// Equalize texel density using world-space triangle areas.
    pub scale_by_world_density: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            gutter_texels: 1.0,
            allow_flips: false,
            preserve_scale: false,
            preserve_rotation: false,
            texture_resolution: 1024,
            scale_by_world_density: false,
        }
    }
}

impl PackOptions {
    /// Set the gutter in texels.
    pub fn with_gutter_texels(mut self, gutter_texels: f64) -> Self {
        self.gutter_texels = gutter_texels;
        self
    }

    /// Set the texture resolution.
    pub fn with_texture_resolution(mut self, texture_resolution: u32) -> Self {
        self.texture_resolution = texture_resolution;
        self
    }

    /// Set whether diagonal mirroring (U/V swap) is allowed.
    pub fn with_allow_flips(mut self, allow_flips: bool) -> Self {
        self.allow_flips = allow_flips;
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

    /// Set whether texel density is equalized from world-space areas.
    pub fn with_scale_by_world_density(mut self, scale_by_world_density: bool) -> Self {
        self.scale_by_world_density = scale_by_world_density;
        self
    }

    /// Apply all three orientation/scale flags at once.
    pub fn with_flags(mut self, flags: PackFlags) -> Self {
        self.allow_flips = flags.allow_flips;
        self.preserve_scale = flags.preserve_scale;
        self.preserve_rotation = flags.preserve_rotation;
        self
    }

    /// Size of one texel in UV units.
    #[inline]
    pub fn texel(&self) -> f64 {
        1.0 / f64::from(self.texture_resolution.max(1))
    }

    /// Gutter in UV units.
    #[inline]
    pub fn gutter(&self) -> f64 {
        self.gutter_texels * self.texel()
    }

    fn orientations(&self) -> Vec<Orientation> {
        let mut orientations = vec![Orientation::Identity];
        if !self.preserve_rotation {
            orientations.push(Orientation::Rotate90);
        } else if self.allow_flips {
            orientations.push(Orientation::Transpose);
        }
        orientations
    }
}

/// Summary of one packer invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PackReport {
    /// Number of islands handled.
    pub islands: usize,
    /// Islands with zero UV area, given a one-texel slot.
    pub degenerate_islands: usize,
    /// Common scale applied to the islands.
    pub scale: f64,
    /// Fraction of the unit square covered by island triangles.
    pub utilization: f64,
    /// No gutter-respecting placement existed; the layout is best effort.
    pub best_effort: bool,
    /// Scale was preserved and the islands leave the square under-filled.
    pub underfilled: bool,
    /// Scale was preserved and the islands do not fit in the square.
    pub overflow: bool,
}

impl PackReport {
    /// Whether a valid placement was found at the requested scale rule.
    pub fn is_success(&self) -> bool {
        !self.best_effort && !self.overflow
    }

    /// Whether the result should be reported as a packing underfit.
    pub fn is_underfit(&self) -> bool {
        self.best_effort || self.underfilled || self.overflow
    }
}

/// Packs UV islands into the unit square.
#[derive(Debug, Clone, Default)]
pub struct ChartPacker {
    options: PackOptions,
}

impl ChartPacker {
    /// Create a packer with the given options.
    pub fn new(options: PackOptions) -> Self {
        Self { options }
    }

    /// The packer's options.
    pub fn options(&self) -> &PackOptions {
        &self.options
    }

    /// Pack each island into its own gutter-padded slot.
    ///
    /// Only the islands of `triangles` (all set triangles when `None`) move.
    /// `world_areas`, indexed by triangle, is used when world-density
    /// scaling is enabled and ignored otherwise.
    ///
    /// `cancel` is polled for every island while charts are built and while
    /// each candidate scale is arranged.
    pub fn standard_pack(
        &self,
        overlay: &mut UvOverlay,
        triangles: Option<&[TriangleId]>,
        world_areas: Option<&[f64]>,
        cancel: &dyn Cancellation,
    ) -> Result<PackReport, Cancelled> {
        let islands = find_islands(overlay, triangles);
        let mut report = PackReport {
            islands: islands.len(),
            scale: 1.0,
            ..Default::default()
        };
        if islands.is_empty() {
            return Ok(report);
        }

        let charts = {
            let view: &UvOverlay = overlay;
            let prescales = match (self.options.scale_by_world_density, world_areas) {
                (true, Some(areas)) => density_scales(&islands, view, areas),
                _ => vec![1.0; islands.len()],
            };
            let preserve_rotation = self.options.preserve_rotation;
            islands
                .par_iter()
                .zip(prescales.par_iter())
                .map(|(island, &prescale)| {
                    cancel.check()?;
                    Ok(Chart::from_island(island, view, prescale, preserve_rotation))
                })
                .collect::<Result<Vec<_>, Cancelled>>()?
        };
        report.degenerate_islands = charts.iter().filter(|c| c.degenerate).count();

        let mut order: Vec<usize> = (0..charts.len()).collect();
        order.sort_by(|&a, &b| charts[b].bounding_area().total_cmp(&charts[a].bounding_area()));

        let gutter = self.options.gutter();
        let texel = self.options.texel();
        match self.search_scale(&charts, &order, cancel)? {
            Some((scale, placements)) => {
                write_charts(overlay, &charts, &placements, scale, gutter, texel);
                report.scale = scale;
                if self.options.preserve_scale {
                    let (extent_x, extent_y) = self.extent(&charts, &placements, scale);
                    report.underfilled = extent_x < 1.0 - EPSILON && extent_y < 1.0 - EPSILON;
                }
            }
            None => {
                let (scale, overflow) = self.best_effort(overlay, &charts, &order);
                report.scale = scale;
                report.best_effort = true;
                report.overflow = overflow;
            }
        }

        report.utilization = charts
            .iter()
            .map(|c| c.uv_area * report.scale * report.scale)
            .sum();

        log::debug!(
            "packed {} island(s) at scale {:.6}, utilization {:.3}",
            report.islands,
            report.scale,
            report.utilization
        );
        Ok(report)
    }

    /// Fit the union of all islands into the square with one transform.
    pub fn stack_pack(
        &self,
        overlay: &mut UvOverlay,
        triangles: Option<&[TriangleId]>,
        cancel: &dyn Cancellation,
    ) -> Result<PackReport, Cancelled> {
        cancel.check()?;
        let working = working_triangles(overlay, triangles);
        let elements = overlay.triangle_elements(&working);
        let mut report = PackReport {
            islands: find_islands(overlay, Some(&working)).len(),
            scale: 1.0,
            ..Default::default()
        };
        if elements.is_empty() {
            return Ok(report);
        }
        cancel.check()?;

        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &e in &elements {
            let uv = overlay.external_element(e);
            min.x = min.x.min(uv.x);
            min.y = min.y.min(uv.y);
            max.x = max.x.max(uv.x);
            max.y = max.y.max(uv.y);
        }
        let extent = (max.x - min.x).max(max.y - min.y);

        let gutter = self.options.gutter();
        let available = 1.0 - 2.0 * gutter;
        let (scale, offset) = if self.options.preserve_scale || extent <= EPSILON {
            (1.0, gutter)
        } else if available <= 0.0 {
            report.best_effort = true;
            (1.0 / extent, 0.0)
        } else {
            (available / extent, gutter)
        };
        if extent <= EPSILON {
            report.degenerate_islands = report.islands;
        }
        if self.options.preserve_scale {
            let used = extent + 2.0 * gutter;
            report.overflow = used > 1.0 + EPSILON;
            report.underfilled = used < 1.0 - EPSILON;
        }

        for &e in &elements {
            let uv = overlay.external_element(e);
            let moved = Point2::new(
                (uv.x - min.x) * scale + offset,
                (uv.y - min.y) * scale + offset,
            );
            overlay.set_external_element(e, moved);
        }

        report.scale = scale;
        report.utilization = working
            .iter()
            .filter_map(|&t| overlay.triangle_external_uvs(t))
            .map(|[a, b, c]| triangle_area_2d(a, b, c))
            .sum();
        Ok(report)
    }

    /// Slot size of a chart at a given scale, gutter included.
    fn slot(&self, chart: &Chart, scale: f64) -> (f64, f64) {
        let gutter = self.options.gutter();
        if chart.degenerate {
            let side = self.options.texel() + 2.0 * gutter;
            (side, side)
        } else {
            (chart.width * scale + 2.0 * gutter, chart.height * scale + 2.0 * gutter)
        }
    }

    /// Place every chart at `scale`, in `order`. Returns placements indexed
    /// by chart, or `None` if some chart does not fit.
    fn arrange(
        &self,
        charts: &[Chart],
        order: &[usize],
        scale: f64,
        cancel: &dyn Cancellation,
    ) -> Result<Option<Vec<Placement>>, Cancelled> {
        let orientations = self.options.orientations();
        let mut packer = GuillotinePacker::new(1.0, 1.0);
        let mut placements = vec![None; charts.len()];
        for &i in order {
            cancel.check()?;
            let (w, h) = self.slot(&charts[i], scale);
            match packer.insert(w, h, &orientations) {
                Some(placement) => placements[i] = Some(placement),
                None => return Ok(None),
            }
        }
        Ok(placements.into_iter().collect())
    }

    /// Largest scale with a valid placement, or the fixed scale 1 when
    /// scale is preserved.
    fn search_scale(
        &self,
        charts: &[Chart],
        order: &[usize],
        cancel: &dyn Cancellation,
    ) -> Result<Option<(f64, Vec<Placement>)>, Cancelled> {
        let fixed = |scale: f64| -> Result<Option<(f64, Vec<Placement>)>, Cancelled> {
            Ok(self.arrange(charts, order, scale, cancel)?.map(|p| (scale, p)))
        };
        if self.options.preserve_scale {
            return fixed(1.0);
        }

        let available = 1.0 - 2.0 * self.options.gutter();
        if available <= 0.0 {
            return Ok(None);
        }

        let live = charts.iter().filter(|c| !c.degenerate);
        let max_side = live.clone().map(Chart::max_side).fold(0.0, f64::max);
        let total_area: f64 = live.map(Chart::bounding_area).sum();
        if max_side <= 0.0 {
            return fixed(1.0);
        }

        let mut hi = (available / max_side).min((1.0 / total_area).sqrt());
        if let Some(found) = fixed(hi)? {
            return Ok(Some(found));
        }

        let Some(mut best) = fixed(0.0)? else {
            return Ok(None);
        };
        let mut lo = 0.0;
        for _ in 0..SCALE_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            match fixed(mid)? {
                Some(found) => {
                    lo = mid;
                    best = found;
                }
                None => hi = mid,
            }
        }
        Ok(Some(best))
    }

    /// Right and top edges of the occupied slots.
    fn extent(&self, charts: &[Chart], placements: &[Placement], scale: f64) -> (f64, f64) {
        charts
            .iter()
            .zip(placements)
            .fold((0.0f64, 0.0f64), |(x, y), (chart, p)| {
                let (w, h) = self.slot(chart, scale);
                let (w, h) = p.orientation.extent(w, h);
                (x.max(p.x + w), y.max(p.y + h))
            })
    }

    /// Shelf-place the charts at their own size, ignoring the gutter, then
    /// fit the result into the square (unless scale is preserved).
    ///
    /// Returns the applied scale and whether the output overflows the square.
    fn best_effort(
        &self,
        overlay: &mut UvOverlay,
        charts: &[Chart],
        order: &[usize],
    ) -> (f64, bool) {
        let texel = self.options.texel();
        let size = |c: &Chart| {
            if c.degenerate {
                (texel, texel)
            } else {
                (c.width, c.height)
            }
        };

        let total_area: f64 = charts.iter().map(|c| size(c).0 * size(c).1).sum();
        let widest = charts.iter().map(|c| size(c).0).fold(0.0, f64::max);
        let shelf_width = if self.options.preserve_scale {
            widest.max(1.0)
        } else {
            widest.max(total_area.sqrt())
        };

        let mut origins = vec![Point2::origin(); charts.len()];
        let (mut cursor_x, mut shelf_y, mut shelf_height) = (0.0f64, 0.0f64, 0.0f64);
        let mut extent = (0.0f64, 0.0f64);
        for &i in order {
            let (w, h) = size(&charts[i]);
            if cursor_x > 0.0 && cursor_x + w > shelf_width + EPSILON {
                shelf_y += shelf_height;
                shelf_height = 0.0;
                cursor_x = 0.0;
            }
            origins[i] = Point2::new(cursor_x, shelf_y);
            cursor_x += w;
            shelf_height = shelf_height.max(h);
            extent = (extent.0.max(cursor_x), extent.1.max(shelf_y + h));
        }

        let longest = extent.0.max(extent.1);
        let fit = if self.options.preserve_scale || longest <= 0.0 {
            1.0
        } else {
            1.0 / longest
        };
        let placements: Vec<Placement> = origins
            .iter()
            .map(|o| Placement {
                x: o.x * fit,
                y: o.y * fit,
                orientation: Orientation::Identity,
            })
            .collect();
        write_charts(overlay, charts, &placements, fit, 0.0, texel * fit);

        (fit, longest * fit > 1.0 + EPSILON)
    }
}

/// Per-island scale factors that equalize world-space texel density.
///
/// Island `i` is scaled by `sqrt(target * world_i / uv_i)` where `target` is
/// the mesh-wide ratio of UV area to world area. Islands without UV or world
/// area keep their size.
fn density_scales(islands: &[Island], overlay: &UvOverlay, world_areas: &[f64]) -> Vec<f64> {
    let areas: Vec<(f64, f64)> = islands
        .par_iter()
        .map(|island| {
            let world: f64 = island
                .triangles
                .iter()
                .map(|t| world_areas.get(t.index()).copied().unwrap_or(0.0))
                .sum();
            (island.uv_area(overlay), world)
        })
        .collect();

    let total_uv: f64 = areas.iter().map(|a| a.0).sum();
    let total_world: f64 = areas.iter().map(|a| a.1).sum();
    if total_uv <= DEGENERATE_AREA || total_world <= 0.0 {
        return vec![1.0; islands.len()];
    }

    let target = total_uv / total_world;
    areas
        .into_iter()
        .map(|(uv, world)| {
            if uv <= DEGENERATE_AREA || world <= 0.0 {
                1.0
            } else {
                (target * world / uv).sqrt()
            }
        })
        .collect()
}

/// Write placed charts back to the overlay.
///
/// Degenerate charts collapse to the centre of their `texel`-sized slot.
fn write_charts(
    overlay: &mut UvOverlay,
    charts: &[Chart],
    placements: &[Placement],
    scale: f64,
    gutter: f64,
    texel: f64,
) {
    for (chart, placement) in charts.iter().zip(placements) {
        let origin = Point2::new(placement.x + gutter, placement.y + gutter);
        if chart.degenerate {
            let centre = origin + Vector2::new(0.5 * texel, 0.5 * texel);
            for &e in &chart.elements {
                overlay.set_external_element(e, centre);
            }
            continue;
        }
        for (&e, &local) in chart.elements.iter().zip(&chart.local) {
            let oriented = chart.orient(local, placement.orientation);
            overlay.set_external_element(e, origin + oriented.coords * scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::cancel::{CancelFlag, NeverCancel};
    use crate::mesh::{build_from_triangles, build_uv_overlay, ElementId, TriangleMesh};
    use nalgebra::Point3;

    /// `n` disjoint axis-aligned quads, each given as (min corner, size).
    fn quads(rects: &[(f64, f64, f64, f64)]) -> (TriangleMesh, UvOverlay) {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        let mut uvs = Vec::new();
        let mut uv_faces = Vec::new();
        for (i, &(x, y, w, h)) in rects.iter().enumerate() {
            let base = 4 * i;
            for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                vertices.push(Point3::new(i as f64 * 2.0 + dx, dy, 0.0));
                uvs.push(Point2::new(x + dx * w, y + dy * h));
            }
            faces.push([base, base + 1, base + 2]);
            faces.push([base, base + 2, base + 3]);
            uv_faces.push(Some([base, base + 1, base + 2]));
            uv_faces.push(Some([base, base + 2, base + 3]));
        }
        let mesh = build_from_triangles(&vertices, &faces).unwrap();
        let overlay = build_uv_overlay(&mesh, &uvs, &uv_faces).unwrap();
        (mesh, overlay)
    }

    fn island_bounds(overlay: &UvOverlay) -> Vec<(Point2<f64>, Point2<f64>)> {
        find_islands(overlay, None)
            .iter()
            .map(|island| island.external_bounds(overlay))
            .collect()
    }

    #[test]
    fn test_options_defaults_and_builders() {
        let options = PackOptions::default();
        assert_eq!(options.texture_resolution, 1024);
        assert_eq!(options.gutter_texels, 1.0);
        assert!((options.gutter() - 1.0 / 1024.0).abs() < 1e-15);

        let options = options.with_flags(PackFlags {
            allow_flips: true,
            preserve_scale: false,
            preserve_rotation: true,
        });
        assert_eq!(
            options.orientations(),
            vec![Orientation::Identity, Orientation::Transpose]
        );
        assert_eq!(
            PackOptions::default().orientations(),
            vec![Orientation::Identity, Orientation::Rotate90]
        );
    }

    #[test]
    fn test_flip_mirrors_across_diagonal() {
        let flipping = PackOptions::default()
            .with_preserve_rotation(true)
            .with_allow_flips(true);
        assert_eq!(
            flipping.orientations(),
            vec![Orientation::Identity, Orientation::Transpose]
        );
        assert_eq!(
            PackOptions::default().with_preserve_rotation(true).orientations(),
            vec![Orientation::Identity]
        );
        assert_eq!(
            PackOptions::default().with_allow_flips(true).orientations(),
            vec![Orientation::Identity, Orientation::Rotate90]
        );

        // U and V swap: the wide island's far corner ends up on the V axis.
        let (_, overlay) = quads(&[(0.0, 0.0, 1.0, 0.25)]);
        let island = &find_islands(&overlay, None)[0];
        let chart = Chart::from_island(island, &overlay, 1.0, true);
        assert_eq!((chart.width, chart.height), (1.0, 0.25));
        let corner = Point2::new(1.0, 0.25);
        assert_eq!(chart.orient(corner, Orientation::Transpose), Point2::new(0.25, 1.0));
    }

    #[test]
    fn test_single_square_fills_unit_rect() {
        let (_, mut overlay) = quads(&[(3.0, -2.0, 0.5, 0.5)]);
        let packer = ChartPacker::new(PackOptions::default().with_gutter_texels(0.0));
        let report = packer.standard_pack(&mut overlay, None, None, &NeverCancel).unwrap();
        assert!(report.is_success());
        assert!((report.scale - 2.0).abs() < 1e-12);
        assert!((report.utilization - 1.0).abs() < 1e-9);

        let (min, max) = overlay.external_bounding_box().unwrap();
        assert!(min.x.abs() < 1e-9 && min.y.abs() < 1e-9);
        assert!((max.x - 1.0).abs() < 1e-9 && (max.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_islands_respect_gutter() {
        let (_, mut overlay) = quads(&[
            (0.0, 0.0, 1.0, 1.0),
            (0.0, 0.0, 1.0, 0.5),
            (0.0, 0.0, 0.3, 0.7),
            (0.0, 0.0, 0.2, 0.2),
            (0.0, 0.0, 0.6, 0.1),
        ]);
        let options = PackOptions::default()
            .with_texture_resolution(64)
            .with_gutter_texels(2.0);
        let gutter = options.gutter();
        let report = ChartPacker::new(options)
            .standard_pack(&mut overlay, None, None, &NeverCancel)
            .unwrap();
        assert!(report.is_success());
        assert_eq!(report.islands, 5);

        let bounds = island_bounds(&overlay);
        let tol = 1e-8;
        for (min, max) in &bounds {
            assert!(min.x >= gutter - tol && min.y >= gutter - tol);
            assert!(max.x <= 1.0 - gutter + tol && max.y <= 1.0 - gutter + tol);
        }
        for (i, a) in bounds.iter().enumerate() {
            for b in &bounds[i + 1..] {
                let separated = a.1.x + gutter <= b.0.x - gutter + tol
                    || b.1.x + gutter <= a.0.x - gutter + tol
                    || a.1.y + gutter <= b.0.y - gutter + tol
                    || b.1.y + gutter <= a.0.y - gutter + tol;
                assert!(separated, "islands {:?} and {:?} overlap", a, b);
            }
        }
    }

    #[test]
    fn test_subset_leaves_other_islands() {
        let (_, mut overlay) = quads(&[(0.0, 0.0, 1.0, 1.0), (5.0, 5.0, 1.0, 1.0)]);
        let untouched = overlay.external_element(ElementId::new(4));
        let packer = ChartPacker::new(PackOptions::default());
        let first = [TriangleId::new(0), TriangleId::new(1)];
        let report = packer
            .standard_pack(&mut overlay, Some(&first), None, &NeverCancel)
            .unwrap();
        assert_eq!(report.islands, 1);
        assert_eq!(overlay.external_element(ElementId::new(4)), untouched);
    }

    #[test]
    fn test_preserve_scale_reports_underfill() {
        let (_, mut overlay) = quads(&[(4.0, 4.0, 0.25, 0.25)]);
        let packer = ChartPacker::new(PackOptions::default().with_preserve_scale(true));
        let report = packer.standard_pack(&mut overlay, None, None, &NeverCancel).unwrap();
        assert!(report.is_success());
        assert!(report.underfilled);
        assert!(report.is_underfit());
        assert_eq!(report.scale, 1.0);

        let (min, max) = overlay.external_bounding_box().unwrap();
        assert!(((max.x - min.x) - 0.25).abs() < 1e-9);
        assert!(min.x >= 0.0 && max.x <= 1.0);
    }

    #[test]
    fn test_preserve_scale_overflow_is_not_rescaled() {
        let (_, mut overlay) = quads(&[(0.0, 0.0, 2.0, 1.0)]);
        let packer = ChartPacker::new(
            PackOptions::default()
                .with_preserve_scale(true)
                .with_preserve_rotation(true),
        );
        let report = packer.standard_pack(&mut overlay, None, None, &NeverCancel).unwrap();
        assert!(!report.is_success());
        assert!(report.overflow);
        let (min, max) = overlay.external_bounding_box().unwrap();
        assert!(((max.x - min.x) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_pathological_gutter_is_best_effort() {
        let (_, mut overlay) = quads(&[(0.0, 0.0, 1.0, 1.0), (0.0, 0.0, 0.5, 1.0)]);
        let packer = ChartPacker::new(
            PackOptions::default()
                .with_texture_resolution(4)
                .with_gutter_texels(2.0),
        );
        let report = packer.standard_pack(&mut overlay, None, None, &NeverCancel).unwrap();
        assert!(report.best_effort);
        assert!(!report.is_success());
        assert!(report.is_underfit());

        let (min, max) = overlay.external_bounding_box().unwrap();
        assert!(min.x >= -1e-9 && min.y >= -1e-9);
        assert!(max.x <= 1.0 + 1e-9 && max.y <= 1.0 + 1e-9);
    }

    #[test]
    fn test_degenerate_island_gets_texel_slot() {
        let (_, mut overlay) = quads(&[(0.0, 0.0, 1.0, 1.0), (0.3, 0.3, 0.0, 0.0)]);
        let options = PackOptions::default().with_texture_resolution(16);
        let texel = options.texel();
        let report = ChartPacker::new(options)
            .standard_pack(&mut overlay, None, None, &NeverCancel)
            .unwrap();
        assert_eq!(report.degenerate_islands, 1);
        assert!(report.is_success());

        let collapsed: Vec<_> = (4..8)
            .map(|i| overlay.external_element(ElementId::new(i)))
            .collect();
        assert!(collapsed.iter().all(|p| *p == collapsed[0]));
        let (min, max) = island_bounds(&overlay)[0];
        let p = collapsed[0];
        let inside = p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y;
        assert!(!inside);
        assert!(p.x >= texel * 0.5 && p.x <= 1.0);
    }

    #[test]
    fn test_world_density_equalizes_texels() {
        // Same UV size, but the second quad is twice as long in world space.
        let (mut mesh, overlay) = quads(&[(0.0, 0.0, 0.5, 0.5), (0.0, 0.0, 0.5, 0.5)]);
        for v in 4..8 {
            mesh.positions[v].x *= 2.0;
            mesh.positions[v].y *= 2.0;
        }
        let world: Vec<f64> = mesh.triangle_ids().map(|t| mesh.triangle_area(t)).collect();

        let mut overlay = overlay;
        let packer = ChartPacker::new(PackOptions::default().with_scale_by_world_density(true));
        packer
            .standard_pack(&mut overlay, None, Some(&world), &NeverCancel)
            .unwrap();

        let areas: Vec<f64> = find_islands(&overlay, None)
            .iter()
            .map(|island| island.uv_area(&overlay))
            .collect();
        assert!((areas[1] / areas[0] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_stack_pack_shares_transform() {
        let (_, mut overlay) = quads(&[(0.0, 0.0, 1.0, 1.0), (0.0, 0.0, 1.0, 1.0)]);
        let options = PackOptions::default().with_texture_resolution(32);
        let gutter = options.gutter();
        let report = ChartPacker::new(options)
            .stack_pack(&mut overlay, None, &NeverCancel)
            .unwrap();
        assert_eq!(report.islands, 2);

        let bounds = island_bounds(&overlay);
        assert_eq!(bounds[0], bounds[1]);
        assert!((bounds[0].0.x - gutter).abs() < 1e-12);
        assert!((bounds[0].1.y - (1.0 - gutter)).abs() < 1e-12);
    }

    #[test]
    fn test_cancelled_pack_leaves_overlay() {
        let (_, mut overlay) = quads(&[(0.0, 0.0, 1.0, 1.0), (5.0, 5.0, 0.5, 0.5)]);
        let before = overlay.clone();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let packer = ChartPacker::default();
        assert_eq!(
            packer.standard_pack(&mut overlay, None, None, &cancel),
            Err(Cancelled)
        );
        assert_eq!(packer.stack_pack(&mut overlay, None, &cancel), Err(Cancelled));
        assert_eq!(overlay, before);
    }

    #[test]
    fn test_empty_selection() {
        let (_, mut overlay) = quads(&[(0.0, 0.0, 1.0, 1.0)]);
        let before = overlay.clone();
        let packer = ChartPacker::default();
        let report = packer
            .standard_pack(&mut overlay, Some(&[]), None, &NeverCancel)
            .unwrap();
        assert_eq!(report.islands, 0);
        let report = packer.stack_pack(&mut overlay, Some(&[]), &NeverCancel).unwrap();
        assert_eq!(report.islands, 0);
        assert_eq!(overlay, before);
    }
}
