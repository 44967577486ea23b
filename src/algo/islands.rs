//! UV island extraction.
//!
//! An island (chart) is a maximal set of triangles connected through shared
//! UV elements. That notion is only unambiguous once every element is used by
//! a single edge-connected fan of triangles, so [`split_bowties`] runs before
//! islands are extracted.
//!
//! # Example
//!
//! ```
//! use uvlayout::algo::islands::{find_islands, split_bowties};
//! use uvlayout::mesh::{build_from_triangles, build_uv_overlay};
//! use nalgebra::{Point2, Point3};
//!
//! // Two triangles touching at a single UV corner.
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//!     Point3::new(-1.0, 0.0, 0.0),
//!     Point3::new(0.0, -1.0, 0.0),
//! ];
//! let mesh = build_from_triangles(&vertices, &[[0, 1, 2], [0, 3, 4]]).unwrap();
//! let uvs = vec![
//!     Point2::new(0.5, 0.5),
//!     Point2::new(1.0, 0.5),
//!     Point2::new(0.5, 1.0),
//!     Point2::new(0.0, 0.5),
//!     Point2::new(0.5, 0.0),
//! ];
//! let mut overlay =
//!     build_uv_overlay(&mesh, &uvs, &[Some([0, 1, 2]), Some([0, 3, 4])]).unwrap();
//!
//! assert_eq!(find_islands(&overlay, None).len(), 1);
//! assert_eq!(split_bowties(&mut overlay), 1);
//! assert_eq!(find_islands(&overlay, None).len(), 2);
//! ```

use std::collections::BTreeMap;

use nalgebra::Point2;

use crate::mesh::{ElementId, TriangleId, UvOverlay};

/// A connected group of triangles in UV space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Island {
    /// Triangles of the island, ascending.
    pub triangles: Vec<TriangleId>,
    /// Distinct elements used by the island, ascending.
    pub elements: Vec<ElementId>,
}

impl Island {
    /// Total UV area of the island's triangles.
    pub fn uv_area(&self, overlay: &UvOverlay) -> f64 {
        self.triangles
            .iter()
            .filter_map(|&t| overlay.triangle_external_uvs(t))
            .map(|[a, b, c]| triangle_area_2d(a, b, c))
            .sum()
    }

    /// Bounding box of the island's elements in the external convention.
    pub fn external_bounds(&self, overlay: &UvOverlay) -> (Point2<f64>, Point2<f64>) {
        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &e in &self.elements {
            let uv = overlay.external_element(e);
            min.x = min.x.min(uv.x);
            min.y = min.y.min(uv.y);
            max.x = max.x.max(uv.x);
            max.y = max.y.max(uv.y);
        }
        (min, max)
    }
}

/// Unsigned area of a 2D triangle.
#[inline]
pub(crate) fn triangle_area_2d(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
    0.5 * ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)).abs()
}

/// Disjoint-set (union-find) with path compression.
#[derive(Debug)]
pub(crate) struct UnionFind {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            rank: vec![0; n],
        }
    }

    pub fn find(&mut self, x: u32) -> u32 {
        let idx = x as usize;
        let p = self.parent[idx];
        if p != x {
            let root = self.find(p);
            self.parent[idx] = root;
        }
        self.parent[idx]
    }

    /// Union by rank. Returns `true` if `a` and `b` were in different sets.
    pub fn union(&mut self, a: u32, b: u32) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        let (ra_idx, rb_idx) = (ra as usize, rb as usize);
        if self.rank[ra_idx] < self.rank[rb_idx] {
            self.parent[ra_idx] = rb;
        } else if self.rank[ra_idx] > self.rank[rb_idx] {
            self.parent[rb_idx] = ra;
        } else {
            self.parent[rb_idx] = ra;
            self.rank[ra_idx] = self.rank[ra_idx].saturating_add(1);
        }
        true
    }
}

/// Split every bowtie element of the overlay.
///
/// An element is a bowtie when the triangles using it do not form a single
/// edge-connected fan. The fan containing the lowest triangle ID keeps the
/// element; every other fan gets its own copy (same parent vertex, same
/// coordinate) and its triangles are rewritten to use it.
///
/// Returns the number of elements created.
pub fn split_bowties(overlay: &mut UvOverlay) -> usize {
    let adjacency = overlay.element_triangles();
    let mut created = 0;

    for (ei, triangles) in adjacency.iter().enumerate() {
        if triangles.len() < 2 {
            continue;
        }
        let e = ElementId::new(ei);
        let fans = element_fans(overlay, e, triangles);
        for fan in fans.iter().skip(1) {
            let copy = overlay.duplicate_element(e);
            for &t in fan {
                overlay.replace_corner(t, e, copy);
            }
            created += 1;
        }
    }

    if created > 0 {
        log::debug!("split {} bowtie element(s)", created);
    }
    created
}

/// Group the triangles around `e` into edge-connected fans.
///
/// Two triangles are in the same fan when they share a second element, i.e.
/// a UV edge through `e`. Fans are returned in order of their lowest triangle.
fn element_fans(
    overlay: &UvOverlay,
    e: ElementId,
    triangles: &[TriangleId],
) -> Vec<Vec<TriangleId>> {
    let corners: Vec<[ElementId; 3]> = triangles
        .iter()
        .map(|&t| overlay.triangle(t).unwrap_or([e; 3]))
        .collect();

    let mut uf = UnionFind::new(triangles.len());
    for i in 0..corners.len() {
        for j in (i + 1)..corners.len() {
            let shares_edge = corners[i]
                .iter()
                .any(|x| *x != e && corners[j].contains(x));
            if shares_edge {
                uf.union(i as u32, j as u32);
            }
        }
    }

    group_by_root(&mut uf, triangles)
}

/// Detach elements shared by triangles that belong to different groups.
///
/// `group_of` assigns a group key to each set triangle (triangles outside
/// every group may return `None`, which counts as one more group). For every
/// element used by more than one group, the group containing the lowest
/// triangle keeps the element and the others receive copies.
///
/// Returns the number of elements created.
pub fn separate_shared_elements<K, F>(overlay: &mut UvOverlay, group_of: F) -> usize
where
    K: Ord,
    F: Fn(TriangleId) -> Option<K>,
{
    let adjacency = overlay.element_triangles();
    let mut created = 0;

    for (ei, triangles) in adjacency.iter().enumerate() {
        if triangles.len() < 2 {
            continue;
        }
        let e = ElementId::new(ei);

        let mut groups: Vec<(Option<K>, Vec<TriangleId>)> = Vec::new();
        for &t in triangles {
            let key = group_of(t);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(t),
                None => groups.push((key, vec![t])),
            }
        }

        for (_, members) in groups.iter().skip(1) {
            let copy = overlay.duplicate_element(e);
            for &t in members {
                overlay.replace_corner(t, e, copy);
            }
            created += 1;
        }
    }

    created
}

/// Extract the islands of the overlay.
///
/// When `triangles` is given, only those triangles (that are set in the
/// overlay) participate; connectivity through triangles outside the subset
/// is ignored. Islands are ordered by their lowest triangle ID.
pub fn find_islands(overlay: &UvOverlay, triangles: Option<&[TriangleId]>) -> Vec<Island> {
    let working = working_triangles(overlay, triangles);

    let mut uf = UnionFind::new(overlay.num_elements());
    for &t in &working {
        if let Some([a, b, c]) = overlay.triangle(t) {
            uf.union(a.raw(), b.raw());
            uf.union(a.raw(), c.raw());
        }
    }

    let mut island_of_root: BTreeMap<u32, usize> = BTreeMap::new();
    let mut islands: Vec<Island> = Vec::new();
    for &t in &working {
        let Some(tri) = overlay.triangle(t) else {
            continue;
        };
        let root = uf.find(tri[0].raw());
        let index = *island_of_root.entry(root).or_insert_with(|| {
            islands.push(Island {
                triangles: Vec::new(),
                elements: Vec::new(),
            });
            islands.len() - 1
        });
        let island = &mut islands[index];
        island.triangles.push(t);
        island.elements.extend_from_slice(&tri);
    }

    for island in &mut islands {
        island.elements.sort_unstable();
        island.elements.dedup();
    }

    islands
}

/// Resolve an optional triangle subset to sorted, distinct, set triangles.
pub(crate) fn working_triangles(
    overlay: &UvOverlay,
    triangles: Option<&[TriangleId]>,
) -> Vec<TriangleId> {
    match triangles {
        Some(subset) => {
            let mut working: Vec<TriangleId> = subset
                .iter()
                .copied()
                .filter(|&t| overlay.is_set_triangle(t))
                .collect();
            working.sort_unstable();
            working.dedup();
            working
        }
        None => overlay.set_triangle_ids().collect(),
    }
}

/// Group indices by union-find root, ordered by first member.
fn group_by_root(uf: &mut UnionFind, triangles: &[TriangleId]) -> Vec<Vec<TriangleId>> {
    let mut group_of_root: BTreeMap<u32, usize> = BTreeMap::new();
    let mut groups: Vec<Vec<TriangleId>> = Vec::new();
    for (i, &t) in triangles.iter().enumerate() {
        let root = uf.find(i as u32);
        let index = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[index].push(t);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{build_from_triangles, build_uv_overlay, VertexId};
    use nalgebra::Point3;

    /// A fan of four triangles around vertex 0, stitched along shared edges
    /// except between triangles 1 and 2, which only share the centre.
    fn broken_fan() -> UvOverlay {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
        ];
        let faces = vec![[0, 1, 2], [0, 2, 3], [0, 5, 4], [0, 4, 1]];
        let mesh = build_from_triangles(&vertices, &faces).unwrap();
        let uvs = vec![
            Point2::new(0.5, 0.5),
            Point2::new(1.0, 0.5),
            Point2::new(0.5, 1.0),
            Point2::new(0.0, 0.5),
            Point2::new(0.5, 0.0),
            Point2::new(0.0, 0.5),
        ];
        build_uv_overlay(
            &mesh,
            &uvs,
            &[Some([0, 1, 2]), Some([0, 2, 3]), Some([0, 5, 4]), Some([0, 4, 1])],
        )
        .unwrap()
    }

    #[test]
    fn test_union_find() {
        let mut uf = UnionFind::new(4);
        assert!(uf.union(0, 1));
        assert!(uf.union(2, 3));
        assert!(!uf.union(1, 0));
        assert_eq!(uf.find(0), uf.find(1));
        assert_ne!(uf.find(1), uf.find(2));
    }

    #[test]
    fn test_connected_fan_is_not_split() {
        // Triangles 1 and 2 are joined through 0 and 3, so the fan is whole.
        let mut overlay = broken_fan();
        assert_eq!(split_bowties(&mut overlay), 0);
        assert_eq!(find_islands(&overlay, None).len(), 1);
    }

    #[test]
    fn test_bowtie_split_creates_copy() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
        ];
        let mesh = build_from_triangles(&vertices, &[[0, 1, 2], [0, 3, 4]]).unwrap();
        let uvs = vec![
            Point2::new(0.5, 0.5),
            Point2::new(1.0, 0.5),
            Point2::new(0.5, 1.0),
            Point2::new(0.0, 0.5),
            Point2::new(0.5, 0.0),
        ];
        let mut overlay =
            build_uv_overlay(&mesh, &uvs, &[Some([0, 1, 2]), Some([0, 3, 4])]).unwrap();
        let before = overlay.num_elements();

        assert_eq!(split_bowties(&mut overlay), 1);
        assert_eq!(overlay.num_elements(), before + 1);

        let copy = ElementId::new(before);
        let tri0 = overlay.triangle(TriangleId::new(0)).unwrap();
        let tri1 = overlay.triangle(TriangleId::new(1)).unwrap();
        assert_eq!(tri0[0], ElementId::new(0));
        assert_eq!(tri1[0], copy);
        assert_eq!(overlay.element(copy), overlay.element(ElementId::new(0)));
        assert_eq!(overlay.element_parent(copy), VertexId::new(0));

        // The result validates against the mesh.
        assert!(mesh.validate_overlay(&overlay).is_ok());

        // Splitting is idempotent.
        assert_eq!(split_bowties(&mut overlay), 0);
    }

    #[test]
    fn test_find_islands_subset() {
        let overlay = broken_fan();
        let islands = find_islands(&overlay, Some(&[TriangleId::new(2), TriangleId::new(0)]));
        // Without triangles 1 and 3 the two remaining triangles only touch at
        // the centre element, which still joins them.
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].triangles, vec![TriangleId::new(0), TriangleId::new(2)]);
    }

    #[test]
    fn test_find_islands_ignores_unset() {
        let mut overlay = broken_fan();
        overlay.unset_triangle(TriangleId::new(3));
        let islands = find_islands(&overlay, Some(&[TriangleId::new(3)]));
        assert!(islands.is_empty());
    }

    #[test]
    fn test_island_area_and_bounds() {
        let overlay = broken_fan();
        let island = find_islands(&overlay, None).remove(0);
        assert!((island.uv_area(&overlay) - 0.5).abs() < 1e-12);
        let (min, max) = island.external_bounds(&overlay);
        assert_eq!(min, Point2::new(0.0, 0.0));
        assert_eq!(max, Point2::new(1.0, 1.0));
    }

    #[test]
    fn test_separate_shared_elements() {
        let mut overlay = broken_fan();
        let before = overlay.num_elements();
        // Left half (triangles 1, 2) versus right half (0, 3).
        let created = separate_shared_elements(&mut overlay, |t| Some(matches!(t.index(), 1 | 2)));
        // The centre is shared by both halves; vertex 2's element by 0 and 1;
        // vertex 4's element by 2 and 3.
        assert_eq!(created, 3);
        assert_eq!(overlay.num_elements(), before + 3);
        assert_eq!(find_islands(&overlay, None).len(), 2);
    }
}
