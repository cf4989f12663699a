//! Per-particle state of the gas

use anyhow::{Result, anyhow};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::utils::Vec2;

use super::Domain;

/// Store (and thus root owner) for all particle data used in a simulation
#[derive(Clone, Debug)]
pub struct ParticleStore {
    pub(crate) positions: Vec<Vec2>,
    pub(crate) velocities: Vec<Vec2>,
    /// Forces of the current step
    pub(crate) forces: Vec<Vec2>,
    /// Forces of the previous step (for the velocity half-kick)
    pub(crate) previous_forces: Vec<Vec2>
}

impl ParticleStore {
    pub fn new(positions: Vec<Vec2>, velocities: Vec<Vec2>) -> Result<Self> {
        if positions.len() != velocities.len() {
            return Err(anyhow!("Got {} positions, but {} velocities", positions.len(), velocities.len()));
        }
        let count = positions.len();
        Ok(Self {
            positions,
            velocities,
            forces: vec![Vec2::ZERO; count],
            previous_forces: vec![Vec2::ZERO; count]
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities
    }

    pub fn forces(&self) -> &[Vec2] {
        &self.forces
    }

    pub fn previous_forces(&self) -> &[Vec2] {
        &self.previous_forces
    }

    /// Direct access to positions. Forces are only refreshed by the next
    /// force update.
    pub fn positions_mut(&mut self) -> &mut [Vec2] {
        &mut self.positions
    }

    pub fn velocities_mut(&mut self) -> &mut [Vec2] {
        &mut self.velocities
    }

    /// Positions as flat array `[x0, y0, x1, y1, ...]`
    pub fn positions_as_f64_slice(&self) -> &[f64] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Velocities as flat array `[vx0, vy0, vx1, vy1, ...]`
    pub fn velocities_as_f64_slice(&self) -> &[f64] {
        bytemuck::cast_slice(&self.velocities)
    }

    pub fn forces_as_f64_slice(&self) -> &[f64] {
        bytemuck::cast_slice(&self.forces)
    }

    /// Get the (approximate) memory used for particle data in bytes
    pub fn get_memory_usage(&self) -> usize {
        std::mem::size_of::<Vec2>() * (self.positions.capacity() + self.velocities.capacity()
            + self.forces.capacity() + self.previous_forces.capacity())
    }

    /// Kinetic energy (unit mass)
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.velocities.iter().map(Vec2::norm_sqr).sum::<f64>()
    }

    /// Total momentum (unit mass)
    pub fn total_momentum(&self) -> Vec2 {
        self.velocities.iter().fold(Vec2::ZERO, |acc, v| acc + *v)
    }

    /// Remember the current forces as previous ones. The current forces are
    /// left stale and must be reinitialised before accumulating.
    pub(crate) fn backup_forces(&mut self) {
        std::mem::swap(&mut self.forces, &mut self.previous_forces);
    }
}

/// Place `count` particles row by row on a `columns x rows` lattice. Columns
/// keep a distance of `margin` from the walls, rows are spread over the
/// periodic axis leaving one row gap at the seam.
pub fn lattice_positions(count: usize, columns: usize, rows: usize, domain: &Domain, margin: f64) -> Result<Vec<Vec2>> {
    if columns == 0 || rows == 0 {
        return Err(anyhow!("Lattice must have at least one column and row (got {}x{})", columns, rows));
    }
    if count > columns * rows {
        return Err(anyhow!("Cannot place {} particles on a {}x{} lattice", count, columns, rows));
    }
    if 2.0 * margin >= domain.width() {
        return Err(anyhow!("Wall margin {} leaves no room in a domain of width {}", margin, domain.width()));
    }
    let usable_width = domain.width() - 2.0 * margin;
    Ok((0..count)
        .map(|i| {
            let (column, row) = (i % columns, i / columns);
            Vec2::new(
                domain.x().low + column as f64 / columns as f64 * usable_width + margin,
                domain.y().low + row as f64 / (rows + 1) as f64 * domain.height())
        })
        .collect())
}

/// Velocities with speeds uniform in `[0, max_speed)` and uniformly random
/// directions
pub fn random_velocities<R: Rng + ?Sized>(count: usize, max_speed: f64, rng: &mut R) -> Vec<Vec2> {
    if max_speed <= 0.0 {
        return vec![Vec2::ZERO; count];
    }
    let speed = Uniform::new(0.0, max_speed);
    let angle = Uniform::new(0.0, 2.0 * std::f64::consts::PI);
    (0..count)
        .map(|_| {
            let (speed, angle) = (speed.sample(rng), angle.sample(rng));
            Vec2::new(speed * angle.sin(), speed * angle.cos())
        })
        .collect()
}
