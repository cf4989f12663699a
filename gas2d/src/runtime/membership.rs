//! Binning of particles into grid boxes

use anyhow::{Result, anyhow};

use crate::{grid::{BoxCoord, BoxId, Grid}, utils::Vec2};

use super::Domain;

/// Particle indices per box (by box id), rebuilt before every force sweep
#[derive(Clone, Debug)]
pub struct BoxMembership {
    boxes: Vec<Vec<usize>>
}

impl BoxMembership {
    pub fn new(grid: &Grid) -> Self {
        Self {
            boxes: vec![vec![]; grid.num_boxes()]
        }
    }

    /// Sort all particles into their boxes (allocations are reused)
    pub fn rebuild(&mut self, grid: &Grid, domain: &Domain, box_size: f64, positions: &[Vec2]) -> Result<()> {
        if self.boxes.len() != grid.num_boxes() {
            self.boxes.resize_with(grid.num_boxes(), Vec::new);
        }
        for members in self.boxes.iter_mut() {
            members.clear();
        }
        for (particle, position) in positions.iter().enumerate() {
            if !domain.contains(*position) {
                return Err(anyhow!("Particle {} at ({}, {}) is outside of the domain",
                    particle, position.x, position.y));
            }
            let id = box_of(grid, box_size, *position)
                .ok_or_else(|| anyhow!("Particle {} at ({}, {}) is outside of the grid",
                    particle, position.x, position.y))?;
            self.boxes[id.index()].push(particle);
        }
        Ok(())
    }

    /// Particles in a box (empty for unknown boxes)
    pub fn particles_in(&self, id: BoxId) -> &[usize] {
        self.boxes.get(id.index()).map_or(&[], Vec::as_slice)
    }

    pub fn num_boxes(&self) -> usize {
        self.boxes.len()
    }

    pub fn num_particles(&self) -> usize {
        self.boxes.iter().map(Vec::len).sum()
    }

    /// Member lists in box id order
    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.boxes.iter().map(Vec::as_slice)
    }
}

/// Box containing a position. Positions on the far edges (and on a partial
/// seam row) belong to the last box of the axis.
pub fn box_of(grid: &Grid, box_size: f64, position: Vec2) -> Option<BoxId> {
    if !(position.x >= 0.0 && position.y >= 0.0) {
        return None;
    }
    let x = ((position.x / box_size).floor() as usize).min(grid.num_boxes_x() - 1);
    let y = ((position.y / box_size).floor() as usize).min(grid.num_boxes_y() - 1);
    grid.to_id(BoxCoord::new(x as isize, y as isize))
}
