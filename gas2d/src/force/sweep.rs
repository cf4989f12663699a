//! Scheduled force sweep over all phases

use std::sync::Mutex;

use anyhow::{Result, anyhow};
use log::{debug, trace};

use crate::{grid::Grid, schedule::{Dispatcher, Partition}, utils::Vec2};

use super::{SweepInput, evaluate_job};

/// Drives workers through the phases of a dispatcher.
///
/// Forces are accumulated per box (one slot per member particle) and only
/// scattered back to the particles once all phases are done. With a single
/// worker the phases are drained on the calling thread.
pub struct ForceSweep {
    dispatcher: Dispatcher,
    /// Worker pool (`None` for a single worker)
    thread_pool: Option<rayon::ThreadPool>,
    num_workers: usize,
    /// Force accumulators by box id
    accumulators: Vec<Mutex<Vec<Vec2>>>
}

impl ForceSweep {
    pub fn new(grid: &Grid, num_workers: usize) -> Result<Self> {
        if num_workers == 0 {
            return Err(anyhow!("Force sweep needs at least one worker"));
        }
        let partition = Partition::build(grid)?;
        if cfg!(debug_assertions) {
            partition.validate(grid)?;
        }
        let thread_pool = if num_workers > 1 {
            Some(rayon::ThreadPoolBuilder::new()
                .num_threads(num_workers)
                .thread_name(|i| format!("force-worker-{}", i))
                .build()?)
        }
        else {
            None
        };
        debug!("Force sweep with {} worker(s) over {} phases", num_workers, partition.num_phases());
        Ok(Self {
            dispatcher: Dispatcher::new(partition.into_phases()),
            thread_pool,
            num_workers,
            accumulators: (0..grid.num_boxes()).map(|_| Mutex::new(vec![])).collect()
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Add the pair forces of all interacting particle pairs to `forces`
    pub fn run(&mut self, input: &SweepInput, forces: &mut [Vec2]) -> Result<()> {
        if input.membership.num_boxes() != self.accumulators.len() {
            return Err(anyhow!("Membership covers {} boxes, but the sweep was built for {}",
                input.membership.num_boxes(), self.accumulators.len()));
        }
        if forces.len() != input.positions.len() {
            return Err(anyhow!("Got {} force slots for {} particles", forces.len(), input.positions.len()));
        }
        for (accumulator, members) in self.accumulators.iter_mut().zip(input.membership.iter()) {
            let accumulator = accumulator.get_mut()
                .map_err(|_| anyhow!("Force accumulator is poisoned"))?;
            accumulator.clear();
            accumulator.resize(members.len(), Vec2::ZERO);
        }

        self.dispatcher.reset();
        loop {
            match &self.thread_pool {
                None => self.drain_phase(input)?,
                Some(thread_pool) => Self::drain_phase_parallel(thread_pool, self.num_workers,
                    &self.dispatcher, &self.accumulators, input)?
            }
            trace!("Phase {} done", self.dispatcher.current_phase());
            if !self.dispatcher.advance_phase()? {
                break;
            }
        }

        for (accumulator, members) in self.accumulators.iter_mut().zip(input.membership.iter()) {
            let accumulator = accumulator.get_mut()
                .map_err(|_| anyhow!("Force accumulator is poisoned"))?;
            for (&particle, force) in members.iter().zip(accumulator.iter()) {
                forces[particle] += *force;
            }
        }
        Ok(())
    }

    fn drain_phase(&self, input: &SweepInput) -> Result<()> {
        while self.dispatcher.jobs_available() {
            let job = self.dispatcher.get_next_job()?;
            evaluate_job(job, input, &self.accumulators)?;
        }
        Ok(())
    }

    fn drain_phase_parallel(thread_pool: &rayon::ThreadPool, num_workers: usize, dispatcher: &Dispatcher,
        accumulators: &[Mutex<Vec<Vec2>>], input: &SweepInput) -> Result<()>
    {
        let first_error: Mutex<Option<anyhow::Error>> = Mutex::new(None);
        // The scope returns only after every worker is done with the phase
        thread_pool.scope(|s| {
            for _ in 0..num_workers {
                s.spawn(|_| {
                    while let Some(job) = dispatcher.try_next_job() {
                        if let Err(error) = evaluate_job(job, input, accumulators) {
                            if let Ok(mut slot) = first_error.lock() {
                                slot.get_or_insert(error);
                            }
                            break;
                        }
                    }
                });
            }
        });
        match first_error.into_inner() {
            Ok(None) => Ok(()),
            Ok(Some(error)) => Err(error),
            Err(_) => Err(anyhow!("Worker error slot is poisoned"))
        }
    }
}
