//! Two-dimensional particle gas between two walls, periodic along the walls.
//!
//! Pair forces are evaluated on a grid of boxes. The [`schedule`] module
//! splits all interacting box pairs into phases of jobs without shared boxes,
//! so the jobs of one phase can be evaluated by any number of workers without
//! synchronisation on particle data.

pub mod force;
pub mod grid;
pub mod runtime;
pub mod schedule;

mod utils;

pub use utils::Vec2;
