//! Pair forces and their evaluation over the scheduled jobs

mod evaluator;
mod law;
mod sweep;
mod wall;

pub use evaluator::*;
pub use law::*;
pub use sweep::*;
pub use wall::*;
