//! Handle heuristic for mug-like meshes.
//!
//! Vertices in a horizontal band of the bounding box form the body; within
//! that band, vertices whose radial distance from the body axis is well above
//! the body's mean radius are taken to be the handle. The handle direction is
//! the horizontal component of the vector from the body centroid to the
//! handle centroid.

use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{R3dError, Result};
use crate::geometry::Mesh;

/// Thresholds for the handle heuristic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleConfig {
    /// Fraction of the height excluded at the bottom of the body band
    pub body_bottom_fraction: f64,
    /// Fraction of the height excluded at the top of the body band
    pub body_top_fraction: f64,
    /// Handle vertices lie beyond `mean + radius_k * std` of the body radius
    pub radius_k: f64,
    /// Only accept handle vertices with `x > 0`
    pub positive_x_only: bool,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            body_bottom_fraction: 0.1,
            body_top_fraction: 0.2,
            radius_k: 1.5,
            positive_x_only: false,
        }
    }
}

/// Result of running the heuristic on one mesh
#[derive(Debug, Clone, Copy)]
pub struct HandleEstimate {
    pub body_centroid: Point3<f64>,
    pub handle_centroid: Point3<f64>,
    /// Unit vector in the xy plane pointing from the body towards the handle
    pub direction: Vector3<f64>,
    pub mean_radius: f64,
    pub radius_std: f64,
    pub body_vertices: usize,
    pub handle_vertices: usize,
}

pub fn estimate_handle(mesh: &Mesh, config: &HandleConfig) -> Result<HandleEstimate> {
    let bounds = mesh.bounds()?;
    let (z_min, z_max) = (bounds.min.z, bounds.max.z);
    let height = z_max - z_min;
    let low = z_min + config.body_bottom_fraction * height;
    let high = z_max - config.body_top_fraction * height;
    let in_band = |p: &Point3<f64>| p.z > low && p.z < high;

    let body: Vec<&Point3<f64>> = mesh.vertices.iter().filter(|p| in_band(*p)).collect();
    if body.is_empty() {
        return Err(R3dError::HandleNotFound(format!(
            "no vertices between z={low:.4} and z={high:.4}"
        )));
    }

    let n = body.len() as f64;
    let body_centroid = Point3::from(body.iter().map(|p| p.coords).sum::<Vector3<f64>>() / n);
    let axis = Point2::new(body_centroid.x, body_centroid.y);
    let radial = |p: &Point3<f64>| (p.xy() - axis).norm();

    let radii: Vec<f64> = body.iter().map(|p| radial(*p)).collect();
    let mean_radius = radii.iter().sum::<f64>() / n;
    let radius_std = (radii.iter().map(|r| (r - mean_radius).powi(2)).sum::<f64>() / n).sqrt();
    let threshold = mean_radius + config.radius_k * radius_std;

    let handle: Vec<&Point3<f64>> = mesh
        .vertices
        .iter()
        .filter(|p| in_band(*p) && radial(*p) > threshold)
        .filter(|p| !config.positive_x_only || p.x > 0.0)
        .collect();
    if handle.is_empty() {
        return Err(R3dError::HandleNotFound(format!(
            "no vertices beyond radius {threshold:.4} (mean {mean_radius:.4}, std {radius_std:.4})"
        )));
    }

    let handle_centroid = Point3::from(
        handle.iter().map(|p| p.coords).sum::<Vector3<f64>>() / handle.len() as f64,
    );
    let offset = handle_centroid - body_centroid;
    let planar = Vector3::new(offset.x, offset.y, 0.0);
    let direction = planar.try_normalize(0.0).ok_or_else(|| {
        R3dError::HandleNotFound("handle centroid lies on the body axis".to_string())
    })?;

    log::debug!(
        "handle: {} of {} body-band vertices, direction ({:.4}, {:.4})",
        handle.len(),
        body.len(),
        direction.x,
        direction.y
    );

    Ok(HandleEstimate {
        body_centroid,
        handle_centroid,
        direction,
        mean_radius,
        radius_std,
        body_vertices: body.len(),
        handle_vertices: handle.len(),
    })
}

/// Horizontal unit direction from the body to the handle
pub fn planar_direction(mesh: &Mesh, config: &HandleConfig) -> Result<Vector3<f64>> {
    estimate_handle(mesh, config).map(|e| e.direction)
}

pub fn handle_centroid(mesh: &Mesh, config: &HandleConfig) -> Result<Point3<f64>> {
    estimate_handle(mesh, config).map(|e| e.handle_centroid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_handle_on_positive_x() {
        let mug = fixtures::mug(0.0);
        let estimate = estimate_handle(&mug, &HandleConfig::default()).unwrap();
        assert!((estimate.direction - Vector3::x()).norm() < 1e-6);
        assert_eq!(estimate.handle_vertices, 8);
        assert!((estimate.mean_radius - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_handle_follows_rotation() {
        let mug = fixtures::mug(std::f64::consts::FRAC_PI_2);
        let dir = planar_direction(&mug, &HandleConfig::default()).unwrap();
        assert!((dir - Vector3::y()).norm() < 1e-6);
        assert_eq!(dir.z, 0.0);
    }

    #[test]
    fn test_positive_x_filter_rejects_handle_on_negative_side() {
        let mug = fixtures::mug(std::f64::consts::PI);
        let config = HandleConfig {
            positive_x_only: true,
            ..HandleConfig::default()
        };
        assert!(matches!(
            estimate_handle(&mug, &config),
            Err(R3dError::HandleNotFound(_))
        ));
        let dir = planar_direction(&mug, &HandleConfig::default()).unwrap();
        assert!((dir + Vector3::x()).norm() < 1e-6);
    }

    #[test]
    fn test_handle_centroid_height() {
        let mug = fixtures::mug(0.0);
        let c = handle_centroid(&mug, &HandleConfig::default()).unwrap();
        assert!((c.z - 1.0).abs() < 1e-9);
        assert!(c.x > 1.2);
    }
}
