use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::Parser;
use log::{error, info};
use ndarray::prelude::*;

use gas2d::{force::LennardJones, runtime::{Simulation, SimulationBuilder}};

/// Lennard-Jones gas between two walls
#[derive(Parser, Debug)]
#[command(name = "gas")]
#[command(about = "Simulate a 2D gas and write the trajectory as .npz", long_about = None)]
struct Cli {
    /// Output path
    output: PathBuf,
    /// Number of particles
    #[arg(short = 'n', long, default_value_t = 100)]
    particles: usize,
    #[arg(long, default_value_t = 10.0)]
    width: f64,
    #[arg(long, default_value_t = 6.0)]
    height: f64,
    /// Edge length of the grid boxes (at least the cutoff)
    #[arg(long, default_value_t = 1.1225)]
    box_size: f64,
    /// Initial lattice as COLUMNS,ROWS
    #[arg(long, value_delimiter = ',', num_args = 2, default_values_t = [12, 9])]
    lattice: Vec<usize>,
    /// Maximum initial speed
    #[arg(long, default_value_t = 1.0)]
    max_speed: f64,
    #[arg(long, default_value_t = 1e-4)]
    dt: f64,
    #[arg(long, default_value_t = 10000)]
    steps: usize,
    /// Store every n-th step
    #[arg(long, default_value_t = 100)]
    save_every: usize,
    /// Force workers (defaults to the number of cores)
    #[arg(short, long)]
    workers: Option<usize>,
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,
    /// Use the classic gas force (sigma^6 = 2, epsilon = 1/4) instead of the
    /// unit repulsive Lennard-Jones force
    #[arg(long)]
    classic_law: bool,
}

/// Trajectory storage, one row per stored frame
struct Trajectory {
    x: Array3<f64>,
    v: Array3<f64>,
    t: Array1<f64>,
    ekin: Array1<f64>,
    frames: usize
}

impl Trajectory {
    fn new(num_frames: usize, num_particles: usize) -> Self {
        Self {
            x: Array3::zeros((num_frames, num_particles, 2)),
            v: Array3::zeros((num_frames, num_particles, 2)),
            t: Array1::zeros((num_frames,)),
            ekin: Array1::zeros((num_frames,)),
            frames: 0
        }
    }

    fn record(&mut self, simulation: &Simulation) -> Result<()> {
        let particles = simulation.particles();
        let n = particles.len();
        let x = ArrayView2::from_shape((n, 2), particles.positions_as_f64_slice())?;
        let v = ArrayView2::from_shape((n, 2), particles.velocities_as_f64_slice())?;
        let frame = self.frames;
        self.x.slice_mut(s![frame, .., ..]).assign(&x);
        self.v.slice_mut(s![frame, .., ..]).assign(&v);
        self.t[frame] = simulation.get_time();
        self.ekin[frame] = particles.kinetic_energy();
        self.frames += 1;
        Ok(())
    }

    fn write(&self, path: &Path, simulation: &Simulation) -> Result<()> {
        let frames = self.frames;
        let mut writer = ndarray_npy::NpzWriter::new(std::fs::File::create(path)?);
        writer.add_array("x", &self.x.slice(s![..frames, .., ..]))?;
        writer.add_array("v", &self.v.slice(s![..frames, .., ..]))?;
        writer.add_array("t", &self.t.slice(s![..frames]))?;
        writer.add_array("ekin", &self.ekin.slice(s![..frames]))?;
        writer.add_array("domain", &array![simulation.domain().width(), simulation.domain().height()])?;
        writer.add_array("dt", &array![simulation.get_time_step()])?;
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    if cli.save_every == 0 {
        return Err(anyhow!("--save-every must be at least 1"));
    }

    let mut builder = SimulationBuilder::new()
        .with_particles(cli.particles)
        .with_domain(cli.width, cli.height)
        .with_box_size(cli.box_size)
        .with_lattice(cli.lattice[0], cli.lattice[1])
        .with_max_speed(cli.max_speed)
        .with_time_step(cli.dt)
        .with_seed(cli.seed);
    if let Some(workers) = cli.workers {
        builder = builder.with_workers(workers);
    }
    if cli.classic_law {
        builder = builder.with_force_law(LennardJones::classic_gas());
    }
    let mut simulation = builder.build()?;

    let mut trajectory = Trajectory::new(cli.steps / cli.save_every + 1, cli.particles);
    trajectory.record(&simulation)?;
    let mut outcome = Ok(());
    for step in 1..=cli.steps {
        if let Err(e) = simulation.run_step() {
            error!("Simulation failed in step {}: {}", step, e);
            outcome = Err(e);
            break;
        }
        if step % cli.save_every == 0 {
            trajectory.record(&simulation)?;
            info!("Step {}/{}: t = {:.4}, E_kin = {:.6}", step, cli.steps,
                simulation.get_time(), simulation.particles().kinetic_energy());
        }
    }

    // Keep what was simulated so far, even after a failure
    trajectory.write(&cli.output, &simulation)?;
    info!("Wrote {} frames to {}", trajectory.frames, cli.output.display());
    outcome
}
