//! Simulation builder

use anyhow::{Result, anyhow};
use log::warn;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::{force::{ForceLaw, LennardJones}, grid::Grid, utils::Vec2};

use super::{Domain, ParticleStore, Simulation, lattice_positions, random_velocities};

/// Builder for `Simulation` with default values
pub struct SimulationBuilder {
    start_time: f64,
    time_step: f64,
    width: f64,
    height: f64,
    box_size: f64,
    particle_count: usize,
    /// Columns and rows of the initial lattice
    lattice: (usize, usize),
    max_speed: f64,
    seed: u64,
    num_workers: usize,
    law: Box<dyn ForceLaw>,
    /// Explicit positions and velocities (replace the lattice)
    initial_state: Option<(Vec<Vec2>, Vec<Vec2>)>
}

impl SimulationBuilder {
    pub fn new() -> Self {
        Self {
            start_time: 0.0,
            time_step: 1e-4,
            width: 10.0,
            height: 6.0,
            box_size: 1.1225,
            particle_count: 100,
            lattice: (12, 9),
            max_speed: 1.0,
            seed: 0x5eed,
            num_workers: rayon::current_num_threads(),
            law: Box::new(LennardJones::repulsive()),
            initial_state: None
        }
    }

    pub fn with_start_time(mut self, time: f64) -> Self {
        self.start_time = time;
        self
    }

    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_domain(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_box_size(mut self, box_size: f64) -> Self {
        self.box_size = box_size;
        self
    }

    pub fn with_particles(mut self, count: usize) -> Self {
        self.particle_count = count;
        self
    }

    pub fn with_lattice(mut self, columns: usize, rows: usize) -> Self {
        self.lattice = (columns, rows);
        self
    }

    pub fn with_max_speed(mut self, max_speed: f64) -> Self {
        self.max_speed = max_speed;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn with_force_law<L: ForceLaw + 'static>(mut self, law: L) -> Self {
        self.law = Box::new(law);
        self
    }

    /// Start from the given particles instead of the lattice
    pub fn with_initial_state(mut self, positions: Vec<Vec2>, velocities: Vec<Vec2>) -> Self {
        self.initial_state = Some((positions, velocities));
        self
    }

    pub fn build(self) -> Result<Simulation> {
        let cutoff = self.law.cutoff();
        if !(cutoff > 0.0 && cutoff.is_finite()) {
            return Err(anyhow!("Interaction cutoff must be positive and finite (got {})", cutoff));
        }
        if self.box_size < cutoff {
            return Err(anyhow!("Box size {} is smaller than the interaction cutoff {}", self.box_size, cutoff));
        }
        // Minimum image convention needs at least twice the cutoff
        if self.height < 2.0 * cutoff {
            return Err(anyhow!("Domain height {} is less than twice the cutoff {}", self.height, cutoff));
        }
        // A particle may only feel one wall
        if self.width < 2.0 * cutoff {
            return Err(anyhow!("Domain width {} is less than twice the cutoff {}", self.width, cutoff));
        }
        if !(self.time_step > 0.0 && self.time_step.is_finite()) {
            return Err(anyhow!("Time step must be positive and finite (got {})", self.time_step));
        }
        if !(self.max_speed >= 0.0 && self.max_speed.is_finite()) {
            return Err(anyhow!("Maximum initial speed must be non-negative and finite (got {})", self.max_speed));
        }

        if self.box_size >= 2.0 * cutoff {
            warn!("Box size {} is at least twice the cutoff {}, most box pairs will be out of range",
                self.box_size, cutoff);
        }

        let domain = Domain::new(self.width, self.height)?;
        let grid = Grid::from_extent(self.width, self.height, self.box_size)?;
        let particles = match self.initial_state {
            Some((positions, velocities)) => ParticleStore::new(positions, velocities)?,
            None => {
                let (columns, rows) = self.lattice;
                let positions = lattice_positions(self.particle_count, columns, rows, &domain, cutoff)?;
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
                let velocities = random_velocities(self.particle_count, self.max_speed, &mut rng);
                ParticleStore::new(positions, velocities)?
            }
        };
        Simulation::new(domain, grid, self.box_size, particles, self.law, self.num_workers,
            self.start_time, self.time_step)
    }
}

impl Default for SimulationBuilder {
    fn default() -> Self {
        Self::new()
    }
}
