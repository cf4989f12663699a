//! Structures related to defining the simulation domain

use anyhow::{Result, anyhow};

use crate::utils::Vec2;

/// Rectangular gas container: walls left and right, periodic top to bottom
#[derive(Clone, Debug)]
pub struct Domain {
    x: Axis,
    y: Axis
}

impl Domain {
    /// Domain `[0, width] x [0, height)`
    pub fn new(width: f64, height: f64) -> Result<Self> {
        if !(width > 0.0 && width.is_finite()) || !(height > 0.0 && height.is_finite()) {
            return Err(anyhow!("Domain extent must be positive and finite (got {} x {})", width, height));
        }
        Ok(Self {
            x: Axis { low: 0.0, high: width, oob: OutOfBoundsBehavior::Wall },
            y: Axis { low: 0.0, high: height, oob: OutOfBoundsBehavior::Periodic }
        })
    }

    pub fn x(&self) -> &Axis {
        &self.x
    }

    pub fn y(&self) -> &Axis {
        &self.y
    }

    pub fn width(&self) -> f64 {
        self.x.size()
    }

    pub fn height(&self) -> f64 {
        self.y.size()
    }

    pub fn contains(&self, position: Vec2) -> bool {
        self.x.is_on_axis(position.x) && self.y.is_on_axis(position.y)
    }

    /// Apply the out-of-bounds behavior of both axes. Returns `None` if the
    /// position crossed a wall.
    pub fn confine(&self, position: Vec2) -> Option<Vec2> {
        Some(Vec2::new(self.x.confine(position.x)?, self.y.confine(position.y)?))
    }
}

/// Definition of a single coordinate axis (i.e. bounds and out-of-bounds behavior)
#[derive(Clone, Debug)]
pub struct Axis {
    pub low: f64,
    pub high: f64,
    pub oob: OutOfBoundsBehavior
}

/// Definition of the out-of-bounds behavior
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutOfBoundsBehavior {
    /// Leaving on one side means entering on the other
    Periodic,
    /// Leaving is an error
    Wall
}

impl Axis {
    pub fn size(&self) -> f64 {
        self.high - self.low
    }

    #[inline(always)]
    pub fn is_on_axis(&self, x: f64) -> bool {
        x >= self.low && x <= self.high
    }

    #[inline]
    pub fn confine(&self, x: f64) -> Option<f64> {
        match self.oob {
            OutOfBoundsBehavior::Periodic => Some(self.low + (x - self.low).rem_euclid(self.size())),
            OutOfBoundsBehavior::Wall => self.is_on_axis(x).then(|| x)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_confine() {
        let domain = Domain::new(10.0, 6.0).unwrap();
        assert_eq!(domain.confine(Vec2::new(3.0, 6.5)), Some(Vec2::new(3.0, 0.5)));
        assert_eq!(domain.confine(Vec2::new(3.0, -0.5)), Some(Vec2::new(3.0, 5.5)));
        assert_eq!(domain.confine(Vec2::new(10.0, 1.0)), Some(Vec2::new(10.0, 1.0)));
        assert_eq!(domain.confine(Vec2::new(10.01, 1.0)), None);
        assert_eq!(domain.confine(Vec2::new(-0.01, 1.0)), None);
        assert!(domain.contains(Vec2::new(0.0, 0.0)));
        assert!(!domain.contains(Vec2::new(5.0, 6.1)));
    }

    #[test]
    fn test_invalid_extent() {
        assert!(Domain::new(0.0, 1.0).is_err());
        assert!(Domain::new(1.0, f64::NAN).is_err());
    }
}
