//! Synthetic meshes for tests and demos.

use std::f64::consts::TAU;

use nalgebra::{Point3, Vector3};

use crate::geometry::Mesh;

/// Closed cylinder standing on z = 0 around the z axis, outward winding
pub fn cylinder(radius: f64, height: f64, segments: usize, rings: usize) -> Mesh {
    let mut mesh = Mesh::new();
    for i in 0..=rings {
        let z = height * i as f64 / rings as f64;
        for k in 0..segments {
            let phi = TAU * k as f64 / segments as f64;
            mesh.vertices
                .push(Point3::new(radius * phi.cos(), radius * phi.sin(), z));
        }
    }
    let at = |ring: usize, k: usize| ring * segments + k % segments;

    for i in 0..rings {
        for k in 0..segments {
            mesh.faces.push([at(i, k), at(i, k + 1), at(i + 1, k + 1)]);
            mesh.faces.push([at(i, k), at(i + 1, k + 1), at(i + 1, k)]);
        }
    }

    let bottom = mesh.vertices.len();
    mesh.vertices.push(Point3::new(0.0, 0.0, 0.0));
    let top = mesh.vertices.len();
    mesh.vertices.push(Point3::new(0.0, 0.0, height));
    for k in 0..segments {
        mesh.faces.push([bottom, at(0, k + 1), at(0, k)]);
        mesh.faces.push([top, at(rings, k), at(rings, k + 1)]);
    }
    mesh
}

/// Axis-aligned closed box
pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> Mesh {
    let mut mesh = Mesh::cube(1.0);
    let size = max - min;
    for v in &mut mesh.vertices {
        let unit = v.coords.add_scalar(0.5);
        *v = min + unit.component_mul(&size);
    }
    mesh
}

/// A mug of radius 1 and height 2 with a box handle at `handle_angle`
/// radians around the z axis (0 puts the handle on +x).
pub fn mug(handle_angle: f64) -> Mesh {
    let mut mesh = cylinder(1.0, 2.0, 32, 12);
    let mut handle = cuboid(Point3::new(1.3, -0.1, 0.6), Point3::new(1.6, 0.1, 1.4));
    let (sin, cos) = handle_angle.sin_cos();
    for v in &mut handle.vertices {
        *v = Point3::new(cos * v.x - sin * v.y, sin * v.x + cos * v.y, v.z);
    }
    mesh.append(&handle);
    mesh
}

/// A mug lying on its side the way generated objects arrive: y is up and
/// the handle points along +x before the upright rotation.
pub fn lying_mug(handle_angle: f64, scale: f64) -> Mesh {
    let mut mesh = mug(handle_angle);
    mesh.translate(&Vector3::new(0.0, 0.0, -1.0));
    // Inverse of a +90 degree turn about x: z goes to y
    for v in &mut mesh.vertices {
        *v = Point3::new(v.x, v.z, -v.y);
    }
    mesh.scale(scale);
    mesh
}
