//! Race-free scheduling of box pair evaluations
//!
//! The [`Partition`] splits all interacting box pairs into phases of jobs that
//! do not share boxes, and the [`Dispatcher`] hands those jobs out to workers
//! one phase at a time.

mod dispatch;
mod job;
mod partition;

pub use dispatch::*;
pub use job::*;
pub use partition::*;
