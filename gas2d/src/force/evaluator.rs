//! Evaluation of single jobs and the all-pairs reference

use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};

use crate::{grid::BoxId, runtime::BoxMembership, schedule::Job, utils::Vec2};

use super::ForceLaw;

/// Read-only inputs shared by all jobs of one sweep
pub struct SweepInput<'a> {
    pub law: &'a dyn ForceLaw,
    pub positions: &'a [Vec2],
    pub membership: &'a BoxMembership,
    /// Length of the periodic axis
    pub height: f64
}

/// Apply the minimum image convention along the periodic axis
#[inline]
pub fn minimum_image(delta: Vec2, height: f64) -> Vec2 {
    let dy = delta.y;
    let y = if (dy - height).abs() < dy.abs() {
        dy - height
    }
    else if (dy + height).abs() < dy.abs() {
        dy + height
    }
    else {
        dy
    };
    Vec2::new(delta.x, y)
}

/// Force on a particle at `p1` exerted by a particle at `p2`, or `None` if the
/// two are not within the cutoff
#[inline]
pub fn pair_force(law: &dyn ForceLaw, p1: Vec2, p2: Vec2, height: f64) -> Option<Vec2> {
    let delta = minimum_image(p1 - p2, height);
    let cutoff = law.cutoff();
    let r_sqr = delta.norm_sqr();
    if r_sqr >= cutoff * cutoff {
        return None;
    }
    let r = r_sqr.sqrt();
    Some(delta * (law.force(r) / r))
}

/// Evaluate all particle pairs of a job and add the forces to the per-box
/// accumulators (indexed like the membership lists of the boxes).
///
/// Concurrent jobs of one phase never share a box, so the locks taken here are
/// never contended.
pub(crate) fn evaluate_job(job: &Job, input: &SweepInput, accumulators: &[Mutex<Vec<Vec2>>]) -> Result<()> {
    let SweepInput { law, positions, membership, height } = *input;
    let origin_particles = membership.particles_in(job.origin());
    if origin_particles.is_empty() {
        return Ok(());
    }
    let mut origin_forces = lock_box(accumulators, job.origin())?;

    for (i, &p1) in origin_particles.iter().enumerate() {
        for (j, &p2) in origin_particles.iter().enumerate().skip(i + 1) {
            if let Some(force) = pair_force(law, positions[p1], positions[p2], height) {
                origin_forces[i] += force;
                origin_forces[j] -= force;
            }
        }
    }

    for &neighbor in job.neighbors() {
        let neighbor_particles = membership.particles_in(neighbor);
        if neighbor_particles.is_empty() {
            continue;
        }
        let mut neighbor_forces = lock_box(accumulators, neighbor)?;
        for (i, &p1) in origin_particles.iter().enumerate() {
            for (j, &p2) in neighbor_particles.iter().enumerate() {
                if let Some(force) = pair_force(law, positions[p1], positions[p2], height) {
                    origin_forces[i] += force;
                    neighbor_forces[j] -= force;
                }
            }
        }
    }
    Ok(())
}

fn lock_box(accumulators: &[Mutex<Vec<Vec2>>], id: BoxId) -> Result<MutexGuard<'_, Vec<Vec2>>> {
    accumulators.get(id.index())
        .ok_or_else(|| anyhow!("Box {} has no force accumulator", id))?
        .lock()
        .map_err(|_| anyhow!("Force accumulator of box {} is poisoned", id))
}

/// Add the pair forces of all particle pairs to `forces` in O(N^2).
/// Reference for the scheduled sweep.
pub fn brute_force_forces(law: &dyn ForceLaw, positions: &[Vec2], height: f64, forces: &mut [Vec2]) {
    for (i, &p1) in positions.iter().enumerate() {
        for (j, &p2) in positions.iter().enumerate().skip(i + 1) {
            if let Some(force) = pair_force(law, p1, p2, height) {
                forces[i] += force;
                forces[j] -= force;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::force::LennardJones;

    use super::*;

    #[test]
    fn test_minimum_image() {
        assert_eq!(minimum_image(Vec2::new(1.0, 5.0), 6.0), Vec2::new(1.0, -1.0));
        assert_eq!(minimum_image(Vec2::new(-1.0, -5.5), 6.0), Vec2::new(-1.0, 0.5));
        assert_eq!(minimum_image(Vec2::new(0.0, 2.0), 6.0), Vec2::new(0.0, 2.0));
        // Exactly half the height is left alone
        assert_eq!(minimum_image(Vec2::new(0.0, 3.0), 6.0), Vec2::new(0.0, 3.0));
    }

    #[test]
    fn test_pair_force_across_seam() {
        let law = LennardJones::repulsive();
        let bottom = Vec2::new(2.0, 0.1);
        let top = Vec2::new(2.0, 5.9);
        // Separated by 0.2 through the seam: bottom is pushed up (away from top)
        let force = pair_force(&law, bottom, top, 6.0).unwrap();
        assert!(force.y > 0.0);
        assert_eq!(force.x, 0.0);
        assert_eq!(pair_force(&law, top, bottom, 6.0).unwrap(), -force);
        assert!(pair_force(&law, Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), 6.0).is_none());
    }

    #[test]
    fn test_brute_force_newton() {
        let law = LennardJones::repulsive();
        let positions = vec![Vec2::new(1.0, 1.0), Vec2::new(1.5, 1.2), Vec2::new(1.2, 1.8)];
        let mut forces = vec![Vec2::ZERO; 3];
        brute_force_forces(&law, &positions, 6.0, &mut forces);
        let total = forces.iter().fold(Vec2::ZERO, |acc, f| acc + *f);
        assert!(total.norm() < 1e-9);
        assert!(forces.iter().all(|f| f.norm() > 0.0));
    }
}
