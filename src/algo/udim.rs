//! UDIM tile classification.
//!
//! UDIM extends the unit UV square into a grid of unit tiles, each backed by
//! its own texture. Tile `(u, v)` covers `[u, u+1) x [v, v+1)` in the external
//! convention and is conventionally numbered `1001 + u + 10 * v`.
//!
//! A triangle belongs to the tile containing its UV centroid.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use nalgebra::{Point2, Vector2};

use super::islands::working_triangles;
use crate::mesh::{TriangleId, UvOverlay};

/// Integer coordinate of a UDIM tile.
///
/// Tiles order row by row (`v`, then `u`), which matches UDIM numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileId {
    /// Column (U direction).
    pub u: i32,
    /// Row (V direction).
    pub v: i32,
}

impl TileId {
    /// First UDIM number, assigned to tile `(0, 0)`.
    pub const UDIM_BASE: u32 = 1001;

    /// Number of tile columns in the UDIM numbering scheme.
    pub const UDIM_COLUMNS: i32 = 10;

    /// Create a tile ID from its grid coordinate.
    pub const fn new(u: i32, v: i32) -> Self {
        Self { u, v }
    }

    /// Tile containing an external-convention UV coordinate.
    pub fn containing(uv: Point2<f64>) -> Self {
        Self::new(uv.x.floor() as i32, uv.y.floor() as i32)
    }

    /// The UDIM number of this tile, if it has one.
    ///
    /// Only tiles with `0 <= u < 10` and `v >= 0` are numbered.
    pub fn udim(self) -> Option<u32> {
        if (0..Self::UDIM_COLUMNS).contains(&self.u) && self.v >= 0 {
            Some(Self::UDIM_BASE + self.u as u32 + (Self::UDIM_COLUMNS * self.v) as u32)
        } else {
            None
        }
    }

    /// Tile for a UDIM number (e.g. 1002 is tile `(1, 0)`).
    pub fn from_udim(udim: u32) -> Option<Self> {
        let offset = udim.checked_sub(Self::UDIM_BASE)? as i32;
        Some(Self::new(
            offset % Self::UDIM_COLUMNS,
            offset / Self::UDIM_COLUMNS,
        ))
    }

    /// Offset of the tile's lower-left corner from the origin.
    pub fn offset(self) -> Vector2<f64> {
        Vector2::new(self.u as f64, self.v as f64)
    }

    /// Clamp an external-convention coordinate into the tile.
    ///
    /// The upper edge belongs to the next tile, so coordinates on or past it
    /// are pulled just below it. The result always satisfies
    /// `TileId::containing(tile.clamp(uv)) == tile`.
    pub fn clamp(self, uv: Point2<f64>) -> Point2<f64> {
        fn axis(x: f64, lo: f64) -> f64 {
            let hi = lo + 1.0;
            let below = hi - f64::EPSILON * hi.abs().max(1.0);
            x.clamp(lo, below)
        }
        Point2::new(axis(uv.x, self.u as f64), axis(uv.y, self.v as f64))
    }
}

impl Ord for TileId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.v, self.u).cmp(&(other.v, other.u))
    }
}

impl PartialOrd for TileId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.udim() {
            Some(udim) => write!(f, "{} ({}, {})", udim, self.u, self.v),
            None => write!(f, "({}, {})", self.u, self.v),
        }
    }
}

/// The triangles occupying one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileBucket {
    /// The tile.
    pub tile: TileId,
    /// Triangles whose centroid lies in the tile, ascending.
    pub triangles: Vec<TriangleId>,
}

/// Tile of a set triangle, from its external-convention UV centroid.
pub fn triangle_tile(overlay: &UvOverlay, t: TriangleId) -> Option<TileId> {
    let [a, b, c] = overlay.triangle_external_uvs(t)?;
    let centroid = Point2::from((a.coords + b.coords + c.coords) / 3.0);
    Some(TileId::containing(centroid))
}

/// Bucket triangles by the tile they occupy.
///
/// Only set triangles are classified, restricted to `triangles` when given.
/// Only occupied tiles are returned, ordered by tile ID.
pub fn classify_tiles(overlay: &UvOverlay, triangles: Option<&[TriangleId]>) -> Vec<TileBucket> {
    let mut buckets: BTreeMap<TileId, Vec<TriangleId>> = BTreeMap::new();
    for t in working_triangles(overlay, triangles) {
        if let Some(tile) = triangle_tile(overlay, t) {
            buckets.entry(tile).or_default().push(t);
        }
    }

    buckets
        .into_iter()
        .map(|(tile, triangles)| TileBucket { tile, triangles })
        .collect()
}

/// Texture resolution per tile: explicit overrides over a global default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileResolutions {
    default: u32,
    overrides: BTreeMap<TileId, u32>,
}

impl TileResolutions {
    /// Use `default` for every tile.
    pub fn uniform(default: u32) -> Self {
        Self {
            default,
            overrides: BTreeMap::new(),
        }
    }

    /// Use `overrides` where present, else `default`.
    pub fn with_overrides(default: u32, overrides: BTreeMap<TileId, u32>) -> Self {
        Self { default, overrides }
    }

    /// Resolution for a tile.
    pub fn resolve(&self, tile: TileId) -> u32 {
        self.overrides.get(&tile).copied().unwrap_or(self.default)
    }
}
