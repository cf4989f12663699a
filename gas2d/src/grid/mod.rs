//! Indexing of the box grid the simulation domain is binned into
//!
//! Boxes are addressed either by a 2D [`BoxCoord`] or by a flat [`BoxId`]
//! (`x + y * num_boxes_x`). The horizontal axis is bounded by walls, so
//! coordinates never wrap there. The vertical axis is periodic.

use std::fmt;

use anyhow::{Result, anyhow};
use num::Integer;
use strum_macros::EnumIter;

/// Box counts within this distance of an integer are treated as integers
/// when deriving the grid from physical extents
const EXTENT_TOLERANCE: f64 = 1e-9;

/// Flat identifier of a valid box
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoxId(usize);

impl BoxId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Integer box coordinate (signed, since a step may leave the domain)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoxCoord {
    pub x: isize,
    pub y: isize
}

impl BoxCoord {
    pub fn new(x: isize, y: isize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for BoxCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned single box steps
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter)]
pub enum Direction {
    Up, Right, Down, Left
}

impl Direction {
    fn offset(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, 1),
            Direction::Right => (1, 0),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0)
        }
    }
}

/// Shape of the periodic boundary between the last and the first row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Seam {
    /// The last row is a full box row
    Aligned,
    /// The last row is thinner than a box because the box size does not
    /// divide the domain height. Rows on either side of it can interact
    /// across it.
    PartialRow
}

/// Geometry of the box grid
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    num_boxes_x: usize,
    num_boxes_y: usize,
    /// Interaction reach in boxes (box size times radius covers the cutoff)
    radius: usize,
    seam: Seam
}

/// Builder for `Grid` with default values (radius 1, aligned seam)
pub struct GridBuilder {
    num_boxes_x: usize,
    num_boxes_y: usize,
    radius: usize,
    seam: Seam
}

impl GridBuilder {
    pub fn new(num_boxes_x: usize, num_boxes_y: usize) -> Self {
        Self {
            num_boxes_x,
            num_boxes_y,
            radius: 1,
            seam: Seam::Aligned
        }
    }

    pub fn with_radius(mut self, radius: usize) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_seam(mut self, seam: Seam) -> Self {
        self.seam = seam;
        self
    }

    pub fn build(self) -> Result<Grid> {
        if self.num_boxes_x == 0 || self.num_boxes_y == 0 {
            return Err(anyhow!("Grid needs at least one box per axis, got {}x{}",
                self.num_boxes_x, self.num_boxes_y));
        }
        if self.radius == 0 {
            return Err(anyhow!("Decomposition radius must be at least 1"));
        }
        // Coordinates are signed, so the box count must fit
        if self.num_boxes_x.checked_mul(self.num_boxes_y).map_or(true, |n| n > isize::MAX as usize) {
            return Err(anyhow!("Grid of {}x{} boxes is too large", self.num_boxes_x, self.num_boxes_y));
        }
        Ok(Grid {
            num_boxes_x: self.num_boxes_x,
            num_boxes_y: self.num_boxes_y,
            radius: self.radius,
            seam: self.seam
        })
    }
}

/// Number of boxes needed to cover `length` and whether the last one is partial
fn boxes_along(length: f64, box_size: f64) -> (usize, bool) {
    let boxes = length / box_size;
    let count = (boxes - EXTENT_TOLERANCE).ceil().max(1.0);
    (count as usize, (count - boxes).abs() > EXTENT_TOLERANCE)
}

impl Grid {
    /// Grid with radius 1 and an aligned seam
    pub fn new(num_boxes_x: usize, num_boxes_y: usize) -> Result<Self> {
        GridBuilder::new(num_boxes_x, num_boxes_y).build()
    }

    /// Derive the grid from the physical domain size. The box size must not
    /// be smaller than the interaction cutoff (radius 1).
    pub fn from_extent(width: f64, height: f64, box_size: f64) -> Result<Self> {
        if !(box_size > 0.0 && box_size.is_finite()) {
            return Err(anyhow!("Box size must be positive and finite, got {}", box_size));
        }
        if !(width > 0.0 && width.is_finite() && height > 0.0 && height.is_finite()) {
            return Err(anyhow!("Domain extent must be positive and finite, got {}x{}", width, height));
        }
        let (num_boxes_x, _) = boxes_along(width, box_size);
        let (num_boxes_y, partial) = boxes_along(height, box_size);
        let seam = if partial { Seam::PartialRow } else { Seam::Aligned };
        GridBuilder::new(num_boxes_x, num_boxes_y)
            .with_seam(seam)
            .build()
    }

    pub fn num_boxes_x(&self) -> usize {
        self.num_boxes_x
    }

    pub fn num_boxes_y(&self) -> usize {
        self.num_boxes_y
    }

    pub fn num_boxes(&self) -> usize {
        self.num_boxes_x * self.num_boxes_y
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn seam(&self) -> Seam {
        self.seam
    }

    pub fn is_valid(&self, coord: BoxCoord) -> bool {
        coord.x >= 0 && (coord.x as usize) < self.num_boxes_x
            && coord.y >= 0 && (coord.y as usize) < self.num_boxes_y
    }

    /// Flat id of a coordinate (`None` outside the grid, which is the normal
    /// case for neighbors beyond the walls)
    pub fn to_id(&self, coord: BoxCoord) -> Option<BoxId> {
        if self.is_valid(coord) {
            Some(BoxId(coord.x as usize + coord.y as usize * self.num_boxes_x))
        }
        else {
            None
        }
    }

    pub fn to_coord(&self, id: BoxId) -> Option<BoxCoord> {
        if id.0 < self.num_boxes() {
            Some(self.decompose(id))
        }
        else {
            None
        }
    }

    fn decompose(&self, id: BoxId) -> BoxCoord {
        let (y, x) = id.0.div_rem(&self.num_boxes_x);
        BoxCoord::new(x as isize, y as isize)
    }

    /// All ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = BoxId> {
        (0..self.num_boxes()).map(BoxId)
    }

    /// All valid coordinates in id order
    pub fn coords(&self) -> impl Iterator<Item = BoxCoord> + '_ {
        self.ids().map(move |id| self.decompose(id))
    }

    pub fn wrap_y(&self, y: isize) -> isize {
        y.rem_euclid(self.num_boxes_y as isize)
    }

    /// Move one box. Vertical steps wrap if `periodic_y` is set, horizontal
    /// steps never do.
    pub fn step(&self, coord: BoxCoord, direction: Direction, periodic_y: bool) -> BoxCoord {
        let (dx, dy) = direction.offset();
        let y = coord.y + dy;
        BoxCoord::new(coord.x + dx, if periodic_y { self.wrap_y(y) } else { y })
    }

    /// Number of box steps between two rows, taking the shorter way around
    /// the periodic axis. A partial seam row is not counted when it is
    /// passed through.
    pub fn row_distance(&self, a: usize, b: usize) -> usize {
        debug_assert!(a < self.num_boxes_y && b < self.num_boxes_y);
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let direct = high - low;
        if direct == 0 {
            return 0;
        }
        let thin_seam = self.seam == Seam::PartialRow && high < self.num_boxes_y - 1;
        let around = self.num_boxes_y - direct - usize::from(thin_seam);
        direct.min(around)
    }

    /// Whether particles in the two boxes can be within the cutoff
    pub fn in_range(&self, a: BoxCoord, b: BoxCoord) -> bool {
        if !self.is_valid(a) || !self.is_valid(b) {
            return false;
        }
        (a.x - b.x).unsigned_abs() <= self.radius
            && self.row_distance(a.y as usize, b.y as usize) <= self.radius
    }

    /// Whether two rows are only in range because the partial seam row between
    /// them is not counted
    pub fn in_range_across_partial_row(&self, a: usize, b: usize) -> bool {
        if self.seam != Seam::PartialRow {
            return false;
        }
        let direct = a.abs_diff(b);
        direct.min(self.num_boxes_y - direct) > self.radius && self.row_distance(a, b) <= self.radius
    }

    /// Furthest row offset an interaction can span
    fn row_reach(&self) -> usize {
        match self.seam {
            Seam::Aligned => self.radius,
            Seam::PartialRow => self.radius + 1
        }
    }

    /// Rows within interaction range of `row` (including itself), top to bottom
    pub(crate) fn rows_in_range(&self, row: usize) -> Vec<usize> {
        let reach = self.row_reach() as isize;
        let mut rows = Vec::with_capacity(2 * reach as usize + 1);
        for dy in (-reach..=reach).rev() {
            let other = self.wrap_y(row as isize + dy) as usize;
            // Short periodic axes map several offsets onto the same row
            if self.row_distance(row, other) <= self.radius && !rows.contains(&other) {
                rows.push(other);
            }
        }
        rows
    }

    /// All boxes in range of `coord` except the box itself, top row first
    pub fn neighborhood(&self, coord: BoxCoord) -> Vec<BoxId> {
        let origin = match self.to_id(coord) {
            Some(origin) => origin,
            None => return vec![]
        };
        let radius = self.radius as isize;
        let mut neighbors = vec![];
        for row in self.rows_in_range(coord.y as usize) {
            for dx in -radius..=radius {
                // Walls truncate the neighborhood
                if let Some(id) = self.to_id(BoxCoord::new(coord.x + dx, row as isize)) {
                    if id != origin {
                        neighbors.push(id);
                    }
                }
            }
        }
        neighbors
    }
}
