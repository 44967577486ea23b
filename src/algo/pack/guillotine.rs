//! Guillotine rectangle packing with best-short-side-fit.
//!
//! The bin starts as a single free rectangle. Each insertion picks the free
//! rectangle whose shorter leftover side is smallest, places the item in its
//! lower-left corner and splits the remainder into two free rectangles along
//! the shorter leftover axis.

/// Tolerance used for fit tests and for discarding sliver rectangles.
pub(crate) const EPSILON: f64 = 1e-9;

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    fn fits(&self, w: f64, h: f64) -> bool {
        w <= self.w + EPSILON && h <= self.h + EPSILON
    }
}

/// How an item is oriented inside its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// As given.
    Identity,
    /// Rotated a quarter turn counter-clockwise.
    Rotate90,
    /// Mirrored across the diagonal (swap of the two axes).
    Transpose,
}

impl Orientation {
    /// Whether the orientation exchanges the item's width and height.
    #[inline]
    pub fn swaps_axes(self) -> bool {
        !matches!(self, Orientation::Identity)
    }

    /// Slot extent of a `w` x `h` item in this orientation.
    #[inline]
    pub fn extent(self, w: f64, h: f64) -> (f64, f64) {
        if self.swaps_axes() {
            (h, w)
        } else {
            (w, h)
        }
    }
}

/// Where and how an item was placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Placement {
    pub x: f64,
    pub y: f64,
    pub orientation: Orientation,
}

/// A guillotine packer over a fixed-size bin.
#[derive(Debug, Clone)]
pub(crate) struct GuillotinePacker {
    free: Vec<Rect>,
}

impl GuillotinePacker {
    /// Create a packer for a `width` x `height` bin.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            free: vec![Rect::new(0.0, 0.0, width, height)],
        }
    }

    /// Place a `w` x `h` item, trying `orientations` in order.
    ///
    /// Returns `None` if no free rectangle can hold the item.
    pub fn insert(&mut self, w: f64, h: f64, orientations: &[Orientation]) -> Option<Placement> {
        let (index, orientation) = self.find_bssf(w, h, orientations)?;
        let rect = self.free.swap_remove(index);
        let (ow, oh) = orientation.extent(w, h);
        self.split(&rect, ow, oh);
        Some(Placement {
            x: rect.x,
            y: rect.y,
            orientation,
        })
    }

    /// Best short side fit. Ties keep the earliest rectangle and orientation.
    fn find_bssf(
        &self,
        w: f64,
        h: f64,
        orientations: &[Orientation],
    ) -> Option<(usize, Orientation)> {
        let mut best = None;
        let mut best_short_side = f64::INFINITY;

        for (i, rect) in self.free.iter().enumerate() {
            for &orientation in orientations {
                let (ow, oh) = orientation.extent(w, h);
                if !rect.fits(ow, oh) {
                    continue;
                }
                let short_side = (rect.w - ow).min(rect.h - oh);
                if short_side < best_short_side - EPSILON {
                    best_short_side = short_side;
                    best = Some((i, orientation));
                }
            }
        }

        best
    }

    fn split(&mut self, rect: &Rect, w: f64, h: f64) {
        let right_w = rect.w - w;
        let above_h = rect.h - h;

        // Split along the shorter leftover axis so the larger piece stays whole.
        let (right, above) = if right_w <= above_h {
            (
                Rect::new(rect.x + w, rect.y, right_w, h),
                Rect::new(rect.x, rect.y + h, rect.w, above_h),
            )
        } else {
            (
                Rect::new(rect.x + w, rect.y, right_w, rect.h),
                Rect::new(rect.x, rect.y + h, w, above_h),
            )
        };

        for piece in [right, above] {
            if piece.w > EPSILON && piece.h > EPSILON {
                self.free.push(piece);
            }
        }
    }
}
