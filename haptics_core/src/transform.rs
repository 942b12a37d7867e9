//! Device-space to application-space mapping.
use crate::error::{HapticsError, Result};
use haptics_traits::{Vector3, WorkspaceBox};

/// Affine 4x4 homogeneous transform, column-major (`m[12..15]` is the translation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    m: [f64; 16],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Map `device` onto `app`: centers coincide and the device volume is scaled
    /// to fill the application box. With `preserve_aspect` all axes share the
    /// smallest per-axis scale, so the device box fits inside `app`.
    pub fn compute(device: &WorkspaceBox, app: &WorkspaceBox, preserve_aspect: bool) -> Result<Self> {
        if !device.is_valid() {
            return Err(HapticsError::InvalidWorkspace(format!(
                "device workspace {:?} is degenerate",
                device.extents()
            )));
        }
        if !app.is_valid() {
            return Err(HapticsError::InvalidWorkspace(format!(
                "application workspace {:?} is degenerate",
                app.extents()
            )));
        }
        let (ds, as_) = (device.size(), app.size());
        let mut scale = Vector3::new(as_.x / ds.x, as_.y / ds.y, as_.z / ds.z);
        if preserve_aspect {
            let s = scale.x.min(scale.y).min(scale.z);
            scale = Vector3::new(s, s, s);
        }
        let dc = device.center();
        let translation = app.center()
            - Vector3::new(scale.x * dc.x, scale.y * dc.y, scale.z * dc.z);
        Ok(Self::from_scale_translation(scale, translation))
    }

    pub fn from_scale_translation(scale: Vector3, translation: Vector3) -> Self {
        let mut m = Self::IDENTITY.m;
        m[0] = scale.x;
        m[5] = scale.y;
        m[10] = scale.z;
        m[12] = translation.x;
        m[13] = translation.y;
        m[14] = translation.z;
        Self { m }
    }

    pub fn from_matrix(m: [f64; 16]) -> Self {
        Self { m }
    }

    pub fn matrix(&self) -> &[f64; 16] {
        &self.m
    }

    #[inline]
    fn at(&self, row: usize, col: usize) -> f64 {
        self.m[col * 4 + row]
    }

    pub fn translation(&self) -> Vector3 {
        Vector3::new(self.m[12], self.m[13], self.m[14])
    }

    /// Diagonal of the linear part.
    pub fn scale(&self) -> Vector3 {
        Vector3::new(self.m[0], self.m[5], self.m[10])
    }

    /// Map a point (translation applied).
    pub fn apply(&self, p: Vector3) -> Vector3 {
        self.apply_direction(p) + self.translation()
    }

    /// Map a direction or force vector (linear part only).
    pub fn apply_direction(&self, v: Vector3) -> Vector3 {
        Vector3::new(
            self.at(0, 0) * v.x + self.at(0, 1) * v.y + self.at(0, 2) * v.z,
            self.at(1, 0) * v.x + self.at(1, 1) * v.y + self.at(1, 2) * v.z,
            self.at(2, 0) * v.x + self.at(2, 1) * v.y + self.at(2, 2) * v.z,
        )
    }

    /// Inverse affine map, `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let a = |r, c| self.at(r, c);
        let c00 = a(1, 1) * a(2, 2) - a(1, 2) * a(2, 1);
        let c01 = a(1, 2) * a(2, 0) - a(1, 0) * a(2, 2);
        let c02 = a(1, 0) * a(2, 1) - a(1, 1) * a(2, 0);
        let det = a(0, 0) * c00 + a(0, 1) * c01 + a(0, 2) * c02;
        if !det.is_finite() || det.abs() < f64::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        // inv[r][c] = cofactor[c][r] / det
        let inv = [
            [
                c00 * inv_det,
                (a(0, 2) * a(2, 1) - a(0, 1) * a(2, 2)) * inv_det,
                (a(0, 1) * a(1, 2) - a(0, 2) * a(1, 1)) * inv_det,
            ],
            [
                c01 * inv_det,
                (a(0, 0) * a(2, 2) - a(0, 2) * a(2, 0)) * inv_det,
                (a(0, 2) * a(1, 0) - a(0, 0) * a(1, 2)) * inv_det,
            ],
            [
                c02 * inv_det,
                (a(0, 1) * a(2, 0) - a(0, 0) * a(2, 1)) * inv_det,
                (a(0, 0) * a(1, 1) - a(0, 1) * a(1, 0)) * inv_det,
            ],
        ];
        let t = self.translation();
        let mut m = Self::IDENTITY.m;
        for r in 0..3 {
            for c in 0..3 {
                m[c * 4 + r] = inv[r][c];
            }
            m[12 + r] = -(inv[r][0] * t.x + inv[r][1] * t.y + inv[r][2] * t.z);
        }
        Some(Self { m })
    }
}
