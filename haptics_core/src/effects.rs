//! Force effects computed by the application haptic loop.
//!
//! Positions and forces are in device units; effects are pure functions of
//! the synchronized position plus whatever internal state they advance per
//! update.
use haptics_traits::Vector3;

pub trait ForceEffect: Send {
    /// Force to command for the tool at `position`. Called once per loop update.
    fn force(&mut self, position: Vector3) -> Vector3;

    fn name(&self) -> &'static str;
}

/// No force at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEffect;

impl ForceEffect for NoEffect {
    fn force(&mut self, _position: Vector3) -> Vector3 {
        Vector3::ZERO
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Horizontal wall at `wall_z`; the tool is pushed up while below it.
#[derive(Debug, Clone, Copy)]
pub struct VirtualWall {
    pub wall_z: f64,
    pub stiffness: f64,
}

impl Default for VirtualWall {
    fn default() -> Self {
        Self {
            wall_z: 0.0,
            stiffness: 1000.0,
        }
    }
}

impl ForceEffect for VirtualWall {
    fn force(&mut self, position: Vector3) -> Vector3 {
        if position.z < self.wall_z {
            Vector3::new(0.0, 0.0, self.stiffness * (self.wall_z - position.z))
        } else {
            Vector3::ZERO
        }
    }

    fn name(&self) -> &'static str {
        "wall"
    }
}

/// Solid sphere at the origin; inside it the tool is pushed out radially.
#[derive(Debug, Clone, Copy)]
pub struct VirtualSphere {
    pub radius: f64,
    pub stiffness: f64,
}

impl Default for VirtualSphere {
    fn default() -> Self {
        Self {
            radius: 0.04,
            stiffness: 1000.0,
        }
    }
}

impl ForceEffect for VirtualSphere {
    fn force(&mut self, position: Vector3) -> Vector3 {
        let distance = position.norm();
        // No defined direction at the exact center.
        if distance >= self.radius || distance == 0.0 {
            return Vector3::ZERO;
        }
        position * (self.stiffness * (self.radius - distance) / distance)
    }

    fn name(&self) -> &'static str {
        "sphere"
    }
}

/// Magnet pulling the tool toward a target that orbits the Z axis.
#[derive(Debug, Clone, Copy)]
pub struct TrackingCircle {
    pub radius: f64,
    pub stiffness: f64,
    /// Radians the target advances per update.
    pub angular_step: f64,
    /// Logarithmic pull below this distance.
    pub inner_range: f64,
    /// Constant pull beyond this distance; linear in between.
    pub outer_range: f64,
    pub log_base: f64,
    /// Slope of the transition band.
    pub slope: f64,
    tick: u64,
}

impl Default for TrackingCircle {
    fn default() -> Self {
        Self::new(0.04, 100.0, 0.005)
    }
}

impl TrackingCircle {
    pub fn new(radius: f64, stiffness: f64, angular_step: f64) -> Self {
        Self {
            radius,
            stiffness,
            angular_step,
            inner_range: 0.01,
            outer_range: 0.02,
            log_base: 1.05,
            slope: -1.0,
            tick: 0,
        }
    }

    /// Target position for the next update.
    pub fn target(&self) -> Vector3 {
        let angle = self.angular_step * self.tick as f64;
        Vector3::new(self.radius * angle.cos(), self.radius * angle.sin(), 0.0)
    }

    /// Pull magnitude (before stiffness) at `distance` from the target.
    pub fn magnitude(&self, distance: f64) -> f64 {
        let log = |d: f64| (d + 1.0).ln() / self.log_base.ln();
        let plateau = log(self.inner_range) - self.slope * self.inner_range;
        if distance < self.inner_range {
            log(distance)
        } else if distance < self.outer_range {
            self.slope * distance + plateau
        } else {
            self.slope * self.outer_range + plateau
        }
    }
}

impl ForceEffect for TrackingCircle {
    fn force(&mut self, position: Vector3) -> Vector3 {
        let to_target = self.target() - position;
        self.tick = self.tick.wrapping_add(1);
        let distance = to_target.norm();
        if distance == 0.0 || !distance.is_finite() {
            return Vector3::ZERO;
        }
        to_target * (self.stiffness * self.magnitude(distance) / distance)
    }

    fn name(&self) -> &'static str {
        "tracking"
    }
}
