//! Small helpers shared across modules

mod vec2;

pub use vec2::*;
