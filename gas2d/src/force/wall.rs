//! Repulsion by the left and right walls

use crate::{runtime::Domain, utils::Vec2};

use super::ForceLaw;

/// Overwrite `forces` with the wall repulsion: a particle closer to a wall
/// than the cutoff is pushed away from it perpendicular to the wall, with the
/// pair force law applied to its wall distance. This initialises the force
/// accumulators for a new sweep.
pub fn wall_forces(law: &dyn ForceLaw, domain: &Domain, positions: &[Vec2], forces: &mut [Vec2]) {
    let cutoff = law.cutoff();
    let (left, right) = (domain.x().low, domain.x().high);
    for (position, force) in positions.iter().zip(forces.iter_mut()) {
        *force = Vec2::ZERO;
        let to_left = position.x - left;
        let to_right = right - position.x;
        if to_left < cutoff {
            force.x = law.force(to_left);
        }
        else if to_right < cutoff {
            force.x = -law.force(to_right);
        }
    }
}
