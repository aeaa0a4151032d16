/// Camera and projection utilities for mesh previews
use nalgebra::{Matrix4, Point3, Vector3};

use crate::geometry::Aabb;

/// Projection mode for rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionMode {
    Orthographic,
    Perspective,
}

/// Camera configuration for 3D rendering
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub mode: ProjectionMode,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 5.0),
            target: Point3::new(0.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            fov: std::f32::consts::PI / 4.0, // 45 degrees
            aspect: width as f32 / height.max(1) as f32,
            near: 0.1,
            far: 100.0,
            mode: ProjectionMode::Perspective,
        }
    }

    /// Look at the centre of `bounds` from far enough away to see all of it.
    ///
    /// The camera sits on -y looking towards +y with z up, the way dataset
    /// objects stand.
    pub fn framing(bounds: &Aabb, width: u32, height: u32) -> Self {
        let mut camera = Self::new(width, height);
        let center = bounds.center();
        let radius = (bounds.diagonal() / 2.0).max(1e-6) as f32;
        let distance = radius / (camera.fov / 2.0).sin();

        camera.target = Point3::new(center.x as f32, center.y as f32, center.z as f32);
        camera.position = camera.target + Vector3::new(0.0, -distance, 0.0);
        camera.up = Vector3::z();
        camera.near = (distance - radius).max(distance * 0.01);
        camera.far = distance + radius * 2.0;
        camera
    }

    /// Create the view matrix (camera transformation)
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Create the projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        match self.mode {
            ProjectionMode::Perspective => {
                Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
            }
            ProjectionMode::Orthographic => {
                let height = (self.position - self.target).norm();
                let width = height * self.aspect;
                Matrix4::new_orthographic(
                    -width / 2.0,
                    width / 2.0,
                    -height / 2.0,
                    height / 2.0,
                    self.near,
                    self.far,
                )
            }
        }
    }

    /// Project a 3D point to 2D screen space, `None` when it falls outside the view
    pub fn project_to_screen(
        &self,
        point: &Point3<f32>,
        model_matrix: &Matrix4<f32>,
        width: u32,
        height: u32,
    ) -> Option<(f32, f32, f32)> {
        let mvp = self.projection_matrix() * self.view_matrix() * model_matrix;
        let clip = mvp * point.to_homogeneous();

        // Behind the camera or at the eye
        if clip.w.abs() < 1e-6 {
            return None;
        }
        let ndc = clip.xyz() / clip.w;

        if !(-1.0..=1.0).contains(&ndc.x) || !(-1.0..=1.0).contains(&ndc.y) || !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }

        let screen_x = (ndc.x + 1.0) * 0.5 * width as f32;
        let screen_y = (1.0 - ndc.y) * 0.5 * height as f32;

        Some((screen_x, screen_y, ndc.z))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_creation() {
        let camera = Camera::new(800, 600);
        assert_eq!(camera.mode, ProjectionMode::Perspective);
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn test_framed_center_projects_to_screen_center() {
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, 0.0), Point3::new(1.0, 1.0, 2.0));
        let camera = Camera::framing(&bounds, 80, 40);
        let (x, y, depth) = camera
            .project_to_screen(&Point3::new(0.0, 0.0, 1.0), &Matrix4::identity(), 80, 40)
            .unwrap();
        assert!((x - 40.0).abs() < 1e-3);
        assert!((y - 20.0).abs() < 1e-3);
        assert!((-1.0..=1.0).contains(&depth));
    }

    #[test]
    fn test_orthographic_keeps_center() {
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, 0.0), Point3::new(1.0, 1.0, 2.0));
        let mut camera = Camera::framing(&bounds, 80, 40);
        camera.mode = ProjectionMode::Orthographic;
        let (x, y, _) = camera
            .project_to_screen(&Point3::new(0.0, 0.0, 1.0), &Matrix4::identity(), 80, 40)
            .unwrap();
        assert!((x - 40.0).abs() < 1e-3);
        assert!((y - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_point_behind_camera_is_clipped() {
        let camera = Camera::new(80, 40);
        let behind = Point3::new(0.0, 0.0, 10.0);
        assert!(camera
            .project_to_screen(&behind, &Matrix4::identity(), 80, 40)
            .is_none());
    }

    #[test]
    fn test_higher_points_are_higher_on_screen() {
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, 0.0), Point3::new(1.0, 1.0, 2.0));
        let camera = Camera::framing(&bounds, 80, 40);
        let model = Matrix4::identity();
        let (_, low, _) = camera.project_to_screen(&Point3::new(0.0, 0.0, 0.5), &model, 80, 40).unwrap();
        let (_, high, _) = camera.project_to_screen(&Point3::new(0.0, 0.0, 1.5), &model, 80, 40).unwrap();
        assert!(high < low);
    }
}
