use core::ops::{Add, Mul, Neg, Sub};

/// Three double-precision components: a tool position or a force.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Build from a slice; `None` unless it holds exactly three components.
    pub fn from_slice(v: &[f64]) -> Option<Self> {
        match v {
            [x, y, z] => Some(Self::new(*x, *y, *z)),
            _ => None,
        }
    }

    #[inline]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Scale down so the norm does not exceed `max`; non-positive `max` yields zero.
    pub fn clamp_norm(self, max: f64) -> Self {
        if max <= 0.0 {
            return Self::ZERO;
        }
        let n = self.norm();
        if n > max { self * (max / n) } else { self }
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vector3> for [f64; 3] {
    fn from(v: Vector3) -> Self {
        v.to_array()
    }
}

impl Add for Vector3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;
    fn mul(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }
}

impl Neg for Vector3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Axis-aligned workspace box in a right-handed frame.
///
/// Extents are ordered `[min_x, min_y, min_z, max_x, max_y, max_z]`, i.e.
/// left, bottom, far, right, top, near.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkspaceBox {
    pub min: Vector3,
    pub max: Vector3,
}

impl WorkspaceBox {
    pub const fn new(min: Vector3, max: Vector3) -> Self {
        Self { min, max }
    }

    pub const fn from_extents(e: [f64; 6]) -> Self {
        Self {
            min: Vector3::new(e[0], e[1], e[2]),
            max: Vector3::new(e[3], e[4], e[5]),
        }
    }

    pub const fn extents(&self) -> [f64; 6] {
        [
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        ]
    }

    pub fn center(&self) -> Vector3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vector3 {
        self.max - self.min
    }

    /// Every bound finite and every axis strictly increasing.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.max.x > self.min.x
            && self.max.y > self.min.y
            && self.max.z > self.min.z
    }

    /// Inclusive containment with an absolute tolerance.
    pub fn contains(&self, p: Vector3, tol: f64) -> bool {
        p.x >= self.min.x - tol
            && p.x <= self.max.x + tol
            && p.y >= self.min.y - tol
            && p.y <= self.max.y + tol
            && p.z >= self.min.z - tol
            && p.z <= self.max.z + tol
    }

    pub fn clamp(&self, p: Vector3) -> Vector3 {
        Vector3::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
            p.z.clamp(self.min.z, self.max.z),
        )
    }
}
