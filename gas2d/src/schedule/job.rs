//! Units of work handed out by the dispatcher

use crate::grid::BoxId;

/// An origin box together with the boxes its particles are checked against.
///
/// The particles of the origin are always also checked against each other,
/// so a job without neighbors is still meaningful.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    origin: BoxId,
    neighbors: Vec<BoxId>
}

impl Job {
    pub(crate) fn new(origin: BoxId) -> Self {
        Self {
            origin,
            neighbors: vec![]
        }
    }

    /// Append a neighbor box. Returns `false` (and does nothing) for the
    /// origin itself or for a box that is already listed.
    pub(crate) fn add_neighbor(&mut self, id: BoxId) -> bool {
        if id == self.origin || self.neighbors.contains(&id) {
            return false;
        }
        self.neighbors.push(id);
        true
    }

    pub fn origin(&self) -> BoxId {
        self.origin
    }

    pub fn neighbors(&self) -> &[BoxId] {
        &self.neighbors
    }

    /// Every box this job reads or writes, origin first
    pub fn boxes(&self) -> impl Iterator<Item = BoxId> + '_ {
        std::iter::once(self.origin).chain(self.neighbors.iter().copied())
    }

    /// Number of box pairs evaluated by this job (including the self pair)
    pub fn num_box_pairs(&self) -> usize {
        self.neighbors.len() + 1
    }
}

/// Jobs that never touch a common box and can therefore run concurrently
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Phase {
    jobs: Vec<Job>
}

impl Phase {
    pub(crate) fn push(&mut self, job: Job) {
        self.jobs.push(job);
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Job> {
        self.jobs.iter()
    }
}

impl<'a> IntoIterator for &'a Phase {
    type Item = &'a Job;
    type IntoIter = std::slice::Iter<'a, Job>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.iter()
    }
}
