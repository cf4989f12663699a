//! Radial pair force laws

/// A short-ranged, radially symmetric pair force
pub trait ForceLaw: Send + Sync {
    /// Distance at and beyond which the force vanishes
    fn cutoff(&self) -> f64;

    /// Signed force magnitude at distance `r` (positive = repulsive)
    fn force(&self, r: f64) -> f64;
}

/// Truncated Lennard-Jones force
///
/// The default truncates at the potential minimum `2^(1/6) sigma`, which
/// leaves only the repulsive part.
#[derive(Clone, Debug, PartialEq)]
pub struct LennardJones {
    pub epsilon: f64,
    pub sigma: f64,
    pub cutoff: f64
}

impl LennardJones {
    pub fn new(epsilon: f64, sigma: f64, cutoff: f64) -> Self {
        Self { epsilon, sigma, cutoff }
    }

    /// Purely repulsive variant with unit energy and length scale
    pub fn repulsive() -> Self {
        Self::new(1.0, 1.0, 2f64.powf(1.0 / 6.0))
    }

    /// Force of the classic gas demo, `12 (4 - r^6) / r^13`, cut off at
    /// `2^(1/6)`. That is `sigma^6 = 2` and `epsilon = 1/4`, so the cutoff lies
    /// inside the repulsive core and the force does not vanish there.
    pub fn classic_gas() -> Self {
        let cutoff = 2f64.powf(1.0 / 6.0);
        Self::new(0.25, cutoff, cutoff)
    }

    /// Potential energy at distance `r` (not shifted at the cutoff)
    pub fn potential(&self, r: f64) -> f64 {
        if r >= self.cutoff {
            return 0.0;
        }
        let s6 = (self.sigma / r).powi(6);
        4.0 * self.epsilon * (s6 * s6 - s6)
    }
}

impl Default for LennardJones {
    fn default() -> Self {
        Self::repulsive()
    }
}

impl ForceLaw for LennardJones {
    fn cutoff(&self) -> f64 {
        self.cutoff
    }

    #[inline]
    fn force(&self, r: f64) -> f64 {
        if r >= self.cutoff {
            return 0.0;
        }
        let s6 = (self.sigma / r).powi(6);
        24.0 * self.epsilon / r * (2.0 * s6 * s6 - s6)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lennard_jones() {
        let lj = LennardJones::repulsive();
        // Vanishes at the minimum and beyond
        assert!(lj.force(lj.cutoff * (1.0 - 1e-12)).abs() < 1e-9);
        assert_eq!(lj.force(lj.cutoff), 0.0);
        assert_eq!(lj.force(3.0), 0.0);
        // Repulsive inside
        assert!(lj.force(0.9) > 0.0);
        assert!((lj.potential(1.0)).abs() < 1e-12);
        // Force is the negative derivative of the potential
        let (r, h) = (0.95, 1e-6);
        let numeric = -(lj.potential(r + h) - lj.potential(r - h)) / (2.0 * h);
        assert!((numeric - lj.force(r)).abs() < 1e-4 * lj.force(r).abs());
    }

    #[test]
    fn test_classic_gas() {
        let lj = LennardJones::classic_gas();
        for r in [0.8f64, 0.9, 1.0, 1.1, 1.12] {
            let r6 = r.powi(6);
            let expected = 12.0 * (4.0 - r6) / (r6 * r6 * r);
            assert!((lj.force(r) - expected).abs() < 1e-9 * expected.abs());
        }
        assert!(lj.force(lj.cutoff * (1.0 - 1e-9)) > 1.0);
        assert_eq!(lj.force(lj.cutoff), 0.0);
    }

    #[test]
    fn test_attractive_tail() {
        let lj = LennardJones::new(1.0, 1.0, 2.5);
        assert!(lj.force(1.5) < 0.0);
    }
}
