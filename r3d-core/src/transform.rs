/// 3D transformation matrices and closed-form rotations
use nalgebra::{Matrix3, Matrix4, Vector3};

use crate::error::{R3dError, Result};

/// Below this sine the two directions are treated as (anti)parallel
const PARALLEL_EPS: f64 = 1e-12;

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    /// Skew-symmetric cross-product matrix `[k]x` of `k`
    pub fn cross_matrix(k: &Vector3<f64>) -> Matrix3<f64> {
        Matrix3::new(0.0, -k.z, k.y, k.z, 0.0, -k.x, -k.y, k.x, 0.0)
    }

    /// Rotation by `angle` radians about a unit `axis` (Rodrigues formula)
    pub fn axis_angle(axis: &Vector3<f64>, angle: f64) -> Matrix3<f64> {
        let k = Self::cross_matrix(axis);
        Matrix3::identity() + k * angle.sin() + (k * k) * (1.0 - angle.cos())
    }

    /// Rotation taking the direction of `from` onto the direction of `to`.
    ///
    /// Parallel inputs give the identity. Antiparallel inputs give a half
    /// turn about +z when `from` is horizontal, otherwise about an axis
    /// perpendicular to `from`.
    pub fn rotation_between(from: &Vector3<f64>, to: &Vector3<f64>) -> Result<Matrix3<f64>> {
        let (a, b) = match (from.try_normalize(0.0), to.try_normalize(0.0)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(R3dError::Degenerate(
                    "cannot rotate between zero-length vectors".to_string(),
                ))
            }
        };

        let cos = a.dot(&b).clamp(-1.0, 1.0);
        // a x b == a x (b -/+ a); the short difference keeps near-(anti)parallel
        // cross products accurate
        let cross = if cos < 0.0 { a.cross(&(b + a)) } else { a.cross(&(b - a)) };
        let sin = cross.norm();

        if sin < PARALLEL_EPS {
            if cos > 0.0 {
                return Ok(Matrix3::identity());
            }
            return Ok(Self::axis_angle(&Self::perpendicular(&a), std::f64::consts::PI));
        }

        let axis = cross / sin;
        Ok(Self::axis_angle(&axis, sin.atan2(cos)))
    }

    /// A unit vector perpendicular to unit `a`, +z for horizontal `a`
    fn perpendicular(a: &Vector3<f64>) -> Vector3<f64> {
        if a.z.abs() < PARALLEL_EPS {
            return Vector3::z();
        }
        // Cross with the basis axis least aligned with `a`
        let basis = if a.x.abs() <= a.y.abs() && a.x.abs() <= a.z.abs() {
            Vector3::x()
        } else if a.y.abs() <= a.z.abs() {
            Vector3::y()
        } else {
            Vector3::z()
        };
        a.cross(&basis).normalize()
    }

    /// Homogeneous rotation about the x axis, in degrees
    pub fn rotation_x_degrees(degrees: f64) -> Matrix4<f64> {
        Self::axis_angle(&Vector3::x(), degrees.to_radians()).to_homogeneous()
    }
}
