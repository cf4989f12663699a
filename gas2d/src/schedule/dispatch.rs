//! Phase-by-phase hand-out of jobs

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use crossbeam::utils::CachePadded;
use log::trace;
use thiserror::Error;

use crate::grid::Grid;

use super::{Job, Partition, Phase};

/// Violations of the dispatch protocol. Both indicate a scheduling bug in the
/// caller and must not be retried.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// A job was requested from a phase that has none left
    #[error("No jobs left in phase {phase} (all {number_of_jobs} handed out)")]
    ExhaustedPhase { phase: usize, number_of_jobs: usize },
    /// The phase was advanced before all of its jobs were handed out
    #[error("Cannot advance past phase {phase}: {remaining} job(s) still pending")]
    IncompletePhase { phase: usize, remaining: usize }
}

/// Hands out the jobs of one phase at a time.
///
/// Workers share the dispatcher immutably while draining a phase: claiming a
/// job is a single atomic update of the phase's counter. Resetting and
/// advancing need exclusive access, which makes the end of a phase a barrier.
pub struct Dispatcher {
    /// Phases (immutable after construction)
    phases: Vec<Phase>,
    /// Index of the phase jobs are currently handed out from
    current_phase: usize,
    /// Number of jobs in each phase (cached on reset)
    number_of_jobs: Vec<usize>,
    /// Number of jobs already handed out in each phase
    handed_out_jobs: Vec<CachePadded<AtomicUsize>>
}

impl Dispatcher {
    pub fn new(phases: Vec<Phase>) -> Self {
        let handed_out_jobs = phases.iter()
            .map(|_| CachePadded::new(AtomicUsize::new(0)))
            .collect();
        let mut dispatcher = Self {
            number_of_jobs: vec![0; phases.len()],
            phases,
            current_phase: 0,
            handed_out_jobs
        };
        dispatcher.reset();
        dispatcher
    }

    /// Partition the grid and wrap the result
    pub fn for_grid(grid: &Grid) -> Result<Self> {
        Ok(Self::new(Partition::build(grid)?.into_phases()))
    }

    /// Rewind to the first phase with no jobs handed out. Must be called
    /// before every sweep.
    pub fn reset(&mut self) {
        self.current_phase = 0;
        for ((count, handed_out), phase) in self.number_of_jobs.iter_mut()
            .zip(self.handed_out_jobs.iter_mut())
            .zip(self.phases.iter())
        {
            *count = phase.len();
            *handed_out.get_mut() = 0;
        }
    }

    pub fn jobs_available(&self) -> bool {
        match self.number_of_jobs.get(self.current_phase) {
            Some(count) => self.handed_out_jobs[self.current_phase].load(Ordering::Acquire) < *count,
            None => false
        }
    }

    /// Claim the next job of the current phase, or `None` once it is drained.
    /// The counter never moves past the number of jobs.
    pub fn try_next_job(&self) -> Option<&Job> {
        let phase = self.phases.get(self.current_phase)?;
        let count = self.number_of_jobs[self.current_phase];
        let index = self.handed_out_jobs[self.current_phase]
            .fetch_update(Ordering::AcqRel, Ordering::Acquire,
                |handed_out| if handed_out < count { Some(handed_out + 1) } else { None })
            .ok()?;
        phase.jobs().get(index)
    }

    /// Claim the next job of the current phase. Asking for a job while none
    /// is available is an `ExhaustedPhase` error.
    pub fn get_next_job(&self) -> Result<&Job> {
        match self.try_next_job() {
            Some(job) => Ok(job),
            None => Err(DispatchError::ExhaustedPhase {
                phase: self.current_phase,
                number_of_jobs: self.number_of_jobs.get(self.current_phase).copied().unwrap_or(0)
            }.into())
        }
    }

    /// Move on to the next phase. Fails with `IncompletePhase` if jobs of the
    /// current phase are still pending. Returns `false` (and stays put) when
    /// the current phase is the last one.
    pub fn advance_phase(&mut self) -> Result<bool> {
        if self.jobs_available() {
            let handed_out = self.handed_out_jobs[self.current_phase].load(Ordering::Acquire);
            return Err(DispatchError::IncompletePhase {
                phase: self.current_phase,
                remaining: self.number_of_jobs[self.current_phase] - handed_out
            }.into());
        }
        if self.current_phase + 1 >= self.phases.len() {
            return Ok(false);
        }
        self.current_phase += 1;
        trace!("Advanced to phase {} ({} jobs)", self.current_phase, self.number_of_jobs[self.current_phase]);
        Ok(true)
    }

    pub fn current_phase(&self) -> usize {
        self.current_phase
    }

    pub fn num_phases(&self) -> usize {
        self.phases.len()
    }

    /// Number of jobs of a phase as cached by the last reset
    pub fn number_of_jobs(&self, phase: usize) -> Option<usize> {
        self.number_of_jobs.get(phase).copied()
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }
}
