//! All things related to running gas simulations

use anyhow::Result;
use log::{info, trace, warn};
use thiserror::Error;

use crate::{force::{ForceLaw, ForceSweep, SweepInput, wall_forces}, grid::Grid, schedule::Dispatcher};

mod builder;
mod domain;
mod membership;
mod particle_data;

pub use builder::*;
pub use domain::*;
pub use membership::*;
pub use particle_data::*;

/// Failures of the integrator. The simulation state is partially updated when
/// one of these is returned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Position of particle {particle} is not a finite number")]
    NotANumber { particle: usize },
    #[error("Particle {particle} escaped through a wall")]
    Escaped { particle: usize }
}

pub struct Simulation {
    /// Simulation domain
    domain: Domain,
    /// Spatial decomposition of the domain
    grid: Grid,
    /// Edge length of a grid box
    box_size: f64,
    /// Current simulation time
    current_time: f64,
    /// Time step for simulation
    time_step: f64,
    /// Number of completed steps
    step: usize,
    /// Store for particle data
    particles: ParticleStore,
    /// Particles per box
    membership: BoxMembership,
    /// Scheduled pair force evaluation
    sweep: ForceSweep,
    law: Box<dyn ForceLaw>
}

impl Simulation {
    /// Set up the simulation and compute the initial forces
    #[allow(clippy::too_many_arguments)]
    pub fn new(domain: Domain, grid: Grid, box_size: f64, particles: ParticleStore, law: Box<dyn ForceLaw>,
        num_workers: usize, current_time: f64, time_step: f64) -> Result<Self>
    {
        let sweep = ForceSweep::new(&grid, num_workers)?;
        let mut simulation = Self {
            membership: BoxMembership::new(&grid),
            domain, grid, box_size,
            current_time, time_step,
            step: 0,
            particles,
            sweep,
            law
        };
        simulation.update_forces()?;
        let widest_phase = simulation.dispatcher().phases().iter().map(|phase| phase.len()).max().unwrap_or(0);
        if num_workers > widest_phase {
            warn!("{} workers, but no phase has more than {} jobs", num_workers, widest_phase);
        }
        info!("Simulating {} particles in {}x{} domain on {}x{} boxes ({} phases, {} worker(s))",
            simulation.particles.len(), simulation.domain.width(), simulation.domain.height(),
            simulation.grid.num_boxes_x(), simulation.grid.num_boxes_y(),
            simulation.sweep.dispatcher().num_phases(), simulation.sweep.num_workers());
        Ok(simulation)
    }

    /// Recompute all forces from the current positions. The forces of the
    /// last update become the previous forces.
    pub fn update_forces(&mut self) -> Result<()> {
        let particles = &mut self.particles;
        self.membership.rebuild(&self.grid, &self.domain, self.box_size, &particles.positions)?;
        particles.backup_forces();
        wall_forces(self.law.as_ref(), &self.domain, &particles.positions, &mut particles.forces);
        let input = SweepInput {
            law: self.law.as_ref(),
            positions: &particles.positions,
            membership: &self.membership,
            height: self.domain.height()
        };
        self.sweep.run(&input, &mut particles.forces)
    }

    /// Advance by one velocity Verlet step
    pub fn run_step(&mut self) -> Result<()> {
        let dt = self.time_step;
        let particles = &mut self.particles;
        for (particle, ((position, velocity), force)) in particles.positions.iter_mut()
            .zip(particles.velocities.iter())
            .zip(particles.forces.iter())
            .enumerate()
        {
            let moved = *position + dt * *velocity + 0.5 * dt * dt * *force;
            // Infinities would turn into NaN on the periodic axis
            if !moved.is_finite() {
                return Err(SimulationError::NotANumber { particle }.into());
            }
            *position = self.domain.confine(moved)
                .ok_or(SimulationError::Escaped { particle })?;
        }

        self.update_forces()?;

        let particles = &mut self.particles;
        for ((velocity, force), previous) in particles.velocities.iter_mut()
            .zip(particles.forces.iter())
            .zip(particles.previous_forces.iter())
        {
            *velocity += 0.5 * dt * (*force + *previous);
        }
        self.current_time += dt;
        self.step += 1;
        trace!("Step {} done (t = {})", self.step, self.current_time);
        Ok(())
    }

    /// Run a number of steps
    pub fn run(&mut self, steps: usize) -> Result<()> {
        for _ in 0..steps {
            self.run_step()?;
        }
        Ok(())
    }

    /// Get the current simulation time
    pub fn get_time(&self) -> f64 {
        self.current_time
    }

    /// Set the current simulation time
    pub fn set_time(&mut self, time: f64) {
        self.current_time = time
    }

    /// Get the current time step
    pub fn get_time_step(&self) -> f64 {
        self.time_step
    }

    /// Set the current time step
    pub fn set_time_step(&mut self, time_step: f64) {
        self.time_step = time_step
    }

    /// Number of steps completed
    pub fn get_step(&self) -> usize {
        self.step
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn box_size(&self) -> f64 {
        self.box_size
    }

    pub fn particles(&self) -> &ParticleStore {
        &self.particles
    }

    /// Mutable particle access. Call `update_forces()` after moving particles.
    pub fn particles_mut(&mut self) -> &mut ParticleStore {
        &mut self.particles
    }

    pub fn membership(&self) -> &BoxMembership {
        &self.membership
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        self.sweep.dispatcher()
    }

    pub fn force_law(&self) -> &dyn ForceLaw {
        self.law.as_ref()
    }

    /// Get an (estimate) of the memory currently allocated for particle data
    pub fn get_memory_usage(&self) -> usize {
        self.particles.get_memory_usage()
    }
}

#[cfg(test)]
mod test {
    use crate::{force::brute_force_forces, utils::Vec2};

    use super::*;

    fn simulation_error(result: Result<()>) -> SimulationError {
        match result {
            Ok(_) => panic!("Expected a simulation error"),
            Err(error) => *error.downcast_ref::<SimulationError>().unwrap()
        }
    }

    #[test]
    fn test_default_setup() {
        let simulation = SimulationBuilder::new().with_workers(2).build().unwrap();
        assert_eq!(simulation.particles().len(), 100);
        assert_eq!(simulation.grid().num_boxes_x(), 9);
        assert_eq!(simulation.grid().num_boxes_y(), 6);
        for position in simulation.particles().positions() {
            assert!(simulation.domain().contains(*position));
        }
        // Initial forces match the reference
        let mut expected = vec![Vec2::ZERO; 100];
        wall_forces(simulation.force_law(), simulation.domain(), simulation.particles().positions(), &mut expected);
        brute_force_forces(simulation.force_law(), simulation.particles().positions(), 6.0, &mut expected);
        for (force, expected) in simulation.particles().forces().iter().zip(expected.iter()) {
            assert!((*force - *expected).norm() <= 1e-9 * (1.0 + expected.norm()));
        }
    }

    #[test]
    fn test_momentum_along_periodic_axis() {
        let mut simulation = SimulationBuilder::new()
            .with_workers(2)
            .build().unwrap();
        let before = simulation.particles().total_momentum();
        simulation.run(100).unwrap();
        let after = simulation.particles().total_momentum();
        // Walls only push along x
        assert!((after.y - before.y).abs() < 1e-8);
        assert_eq!(simulation.get_step(), 100);
        assert!((simulation.get_time() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_setup() {
        assert!(SimulationBuilder::new().with_box_size(1.0).build().is_err());
        assert!(SimulationBuilder::new().with_domain(10.0, 2.0).build().is_err());
        assert!(SimulationBuilder::new().with_particles(200).build().is_err());
        assert!(SimulationBuilder::new().with_workers(0).build().is_err());
        assert!(SimulationBuilder::new().with_time_step(0.0).build().is_err());
    }

    #[test]
    fn test_not_a_number() {
        let mut simulation = SimulationBuilder::new().with_workers(1).build().unwrap();
        simulation.particles_mut().velocities_mut()[7] = Vec2::new(f64::NAN, 0.0);
        assert_eq!(simulation_error(simulation.run_step()), SimulationError::NotANumber { particle: 7 });
    }

    #[test]
    fn test_infinite_velocity() {
        let mut simulation = SimulationBuilder::new().with_workers(1).build().unwrap();
        simulation.particles_mut().velocities_mut()[3] = Vec2::new(0.0, f64::INFINITY);
        assert_eq!(simulation_error(simulation.run_step()), SimulationError::NotANumber { particle: 3 });
    }

    #[test]
    fn test_escape() {
        let mut simulation = SimulationBuilder::new()
            .with_workers(1)
            .with_initial_state(
                vec![Vec2::new(5.0, 1.0), Vec2::new(9.5, 3.0)],
                vec![Vec2::ZERO, Vec2::new(1e4, 0.0)])
            .build().unwrap();
        assert_eq!(simulation_error(simulation.run_step()), SimulationError::Escaped { particle: 1 });
    }
}
