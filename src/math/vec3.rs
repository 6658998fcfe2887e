use std::ops::{Add, Div, Index, Mul, Neg, Sub};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const ONE: Self = Self {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    };
    pub const X: Self = Self {
        x: 1.0,
        y: 0.0,
        z: 0.0,
    };
    pub const Y: Self = Self {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };
    pub const Z: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: f32) -> Self {
        Self { x: v, y: v, z: v }
    }

    pub fn magnitude(&self) -> f32 {
        self.dot(*self).sqrt()
    }

    pub fn add(&self, other: Self) -> Self {
        *self + other
    }

    pub fn subtract(&self, other: Self) -> Self {
        *self - other
    }

    pub fn scale(&self, scalar: f32) -> Self {
        *self * scalar
    }

    /// Normalizes the vector. Returns `Vec3::ZERO` for a zero-length input
    /// rather than producing NaNs, since callers (tangent frames, hemisphere
    /// directions) generally treat a degenerate normal as "no direction".
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag <= f32::EPSILON {
            Self::ZERO
        } else {
            *self / mag
        }
    }

    pub fn dot(&self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Returns the cross product of two vectors.
    /// The resulting vector is perpendicular to both input vectors.
    pub fn cross(&self, other: Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// Builds an orthonormal basis `(tangent, bitangent)` around `self` as the
    /// shared "up"/z axis, using the Duff et al. branchless construction.
    pub fn coord_system(&self) -> (Self, Self) {
        let sign = if self.z >= 0.0 { 1.0 } else { -1.0 };
        let a = -1.0 / (sign + self.z);
        let b = self.x * self.y * a;
        let tangent = Self::new(1.0 + sign * self.x * self.x * a, sign * b, -sign * self.x);
        let bitangent = Self::new(b, sign + self.y * self.y * a, -self.y);
        (tangent, bitangent)
    }
}

/// Barycentric interpolation of three vectors by weights `(u, v, w)` with `u+v+w == 1`.
pub fn barycentric_interp(a: Vec3, b: Vec3, c: Vec3, u: f32, v: f32, w: f32) -> Vec3 {
    a * u + b * v + c * w
}

/// Component-wise addition of two vectors.
impl Add<Vec3> for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

/// Component-wise subtraction of two vectors.
impl Sub<Vec3> for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

/// Scalar multiplication of a vector.
impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
            z: self.z * rhs,
        }
    }
}

/// Scalar division of a vector.
impl Div<f32> for Vec3 {
    type Output = Vec3;

    fn div(self, rhs: f32) -> Self::Output {
        Self {
            x: self.x / rhs,
            y: self.y / rhs,
            z: self.z / rhs,
        }
    }
}

/// Negation of a vector.
impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

/// Axis-indexed component access, used by the BVH builder which operates
/// generically across the three split axes.
impl Index<usize> for Vec3 {
    type Output = f32;

    fn index(&self, axis: usize) -> &f32 {
        match axis {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Vec3 axis index out of range: {axis}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cross_of_orthogonal_axes_gives_third_axis() {
        assert_eq!(Vec3::X.cross(Vec3::Y), Vec3::Z);
    }

    #[test]
    fn normalize_of_zero_is_zero() {
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);
    }

    #[test]
    fn barycentric_round_trip_recovers_weights() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(0.0, 1.0, 0.0);
        let (u, v, w) = (0.2_f32, 0.3_f32, 0.5_f32);
        let p = barycentric_interp(a, b, c, u, v, w);

        // Recover barycentrics of p in triangle abc via the standard 2D formula
        // (triangle lies in the z=0 plane so this is exact).
        let v0 = b - a;
        let v1 = c - a;
        let v2 = p - a;
        let d00 = v0.dot(v0);
        let d01 = v0.dot(v1);
        let d11 = v1.dot(v1);
        let d20 = v2.dot(v0);
        let d21 = v2.dot(v1);
        let denom = d00 * d11 - d01 * d01;
        let rv = (d11 * d20 - d01 * d21) / denom;
        let rw = (d00 * d21 - d01 * d20) / denom;
        let ru = 1.0 - rv - rw;

        assert_relative_eq!(ru, u, epsilon = 1e-4);
        assert_relative_eq!(rv, v, epsilon = 1e-4);
        assert_relative_eq!(rw, w, epsilon = 1e-4);
    }
}
