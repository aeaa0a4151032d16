/// Geometry primitives: indexed triangle meshes and their bounds
use std::collections::{HashMap, VecDeque};

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

use crate::error::{R3dError, Result};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all points, `None` when there are none.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<f64>>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut aabb = Self::new(first, first);
        for p in iter {
            aabb.grow(p);
        }
        Some(aabb)
    }

    pub fn grow(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    pub fn extents(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Length of the box diagonal
    pub fn diagonal(&self) -> f64 {
        self.extents().norm()
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Squared distance from `p` to the box, zero inside
    pub fn distance_squared(&self, p: &Point3<f64>) -> f64 {
        let mut d = 0.0;
        for i in 0..3 {
            let v = p[i];
            if v < self.min[i] {
                d += (self.min[i] - v).powi(2);
            } else if v > self.max[i] {
                d += (v - self.max[i]).powi(2);
            }
        }
        d
    }
}

/// A triangle given by its three corner positions
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub vertices: [Point3<f64>; 3],
}

impl Triangle {
    pub fn new(a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    /// Unnormalized face normal; its length is twice the area
    pub fn cross(&self) -> Vector3<f64> {
        let [a, b, c] = self.vertices;
        (b - a).cross(&(c - a))
    }

    pub fn area(&self) -> f64 {
        0.5 * self.cross().norm()
    }

    pub fn centroid(&self) -> Point3<f64> {
        let [a, b, c] = self.vertices;
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    pub fn bounds(&self) -> Aabb {
        let [a, b, c] = self.vertices;
        Aabb::new(a.inf(&b).inf(&c), a.sup(&b).sup(&c))
    }

    /// Closest point on the triangle to `p` (Voronoi region walk)
    pub fn closest_point(&self, p: &Point3<f64>) -> Point3<f64> {
        let [a, b, c] = self.vertices;
        let ab = b - a;
        let ac = c - a;
        let ap = *p - a;
        let d1 = ab.dot(&ap);
        let d2 = ac.dot(&ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = *p - b;
        let d3 = ab.dot(&bp);
        let d4 = ac.dot(&bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return a + ab * v;
        }

        let cp = *p - c;
        let d5 = ab.dot(&cp);
        let d6 = ac.dot(&cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return a + ac * w;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return b + (c - b) * w;
        }

        let denom = 1.0 / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        a + ab * v + ac * w
    }
}

/// An indexed triangle mesh with optional per-vertex colors
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<[usize; 3]>,
    /// RGBA per vertex, same length as `vertices` when present
    pub colors: Option<Vec<[u8; 4]>>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mesh, checking that every face index is in range
    pub fn from_parts(vertices: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Result<Self> {
        let count = vertices.len();
        for (face, indices) in faces.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i >= count) {
                return Err(R3dError::BadIndex { face, index, count });
            }
        }
        Ok(Self {
            vertices,
            faces,
            colors: None,
        })
    }

    pub fn triangle(&self, face: usize) -> Triangle {
        let [a, b, c] = self.faces[face];
        Triangle::new(self.vertices[a], self.vertices[b], self.vertices[c])
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.faces.len()).map(move |i| self.triangle(i))
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn bounds(&self) -> Result<Aabb> {
        Aabb::from_points(&self.vertices).ok_or(R3dError::EmptyMesh)
    }

    /// Total surface area
    pub fn area(&self) -> f64 {
        self.triangles().map(|t| t.area()).sum()
    }

    /// Area-weighted surface centroid, or the vertex mean when the mesh has no area
    pub fn centroid(&self) -> Result<Point3<f64>> {
        if self.vertices.is_empty() {
            return Err(R3dError::EmptyMesh);
        }
        let mut weighted = Vector3::zeros();
        let mut total = 0.0;
        for tri in self.triangles() {
            let area = tri.area();
            weighted += tri.centroid().coords * area;
            total += area;
        }
        if total > 0.0 {
            return Ok(Point3::from(weighted / total));
        }
        let sum: Vector3<f64> = self.vertices.iter().map(|v| v.coords).sum();
        Ok(Point3::from(sum / self.vertices.len() as f64))
    }

    /// Append another mesh's vertices and faces, reindexing its faces
    pub fn append(&mut self, other: &Mesh) {
        let base = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);
        self.faces
            .extend(other.faces.iter().map(|f| f.map(|i| i + base)));
        self.colors = None;
    }

    pub fn translate(&mut self, offset: &Vector3<f64>) {
        for v in &mut self.vertices {
            *v += *offset;
        }
    }

    /// Uniform scale about the origin
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.vertices {
            v.coords *= factor;
        }
    }

    /// Apply a linear map to every vertex (`v' = m * v`)
    pub fn apply_matrix3(&mut self, m: &Matrix3<f64>) {
        for v in &mut self.vertices {
            *v = Point3::from(m * v.coords);
        }
    }

    /// Apply a homogeneous transform to every vertex
    pub fn apply_homogeneous(&mut self, m: &Matrix4<f64>) {
        for v in &mut self.vertices {
            *v = m.transform_point(v);
        }
    }

    /// Signed volume enclosed by the faces; positive for outward winding
    pub fn signed_volume(&self) -> f64 {
        signed_volume_of(self, 0..self.faces.len())
    }

    /// Make face winding consistent and outward facing.
    ///
    /// Orientation is propagated across shared edges within each connected
    /// component, then a component with negative signed volume is flipped
    /// as a whole. Returns the number of faces whose winding changed.
    pub fn fix_normals(&mut self) -> usize {
        let face_count = self.faces.len();
        let mut edge_faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (f, face) in self.faces.iter().enumerate() {
            for (a, b) in face_edges(face) {
                edge_faces.entry((a.min(b), a.max(b))).or_default().push(f);
            }
        }

        let mut flipped = vec![false; face_count];
        let mut visited = vec![false; face_count];
        let mut queue = VecDeque::new();

        for seed in 0..face_count {
            if visited[seed] {
                continue;
            }
            visited[seed] = true;
            queue.push_back(seed);
            let mut component = vec![seed];

            while let Some(current) = queue.pop_front() {
                let face = self.faces[current];
                for (a, b) in face_edges(&face) {
                    let Some(neighbours) = edge_faces.get(&(a.min(b), a.max(b))) else {
                        continue;
                    };
                    for &n in neighbours {
                        if visited[n] {
                            continue;
                        }
                        visited[n] = true;
                        // Consistent neighbours traverse a shared edge in the opposite direction
                        if face_edges(&self.faces[n]).any(|e| e == (a, b)) {
                            self.faces[n].swap(1, 2);
                            flipped[n] = !flipped[n];
                        }
                        component.push(n);
                        queue.push_back(n);
                    }
                }
            }

            if signed_volume_of(self, component.iter().copied()) < 0.0 {
                for &f in &component {
                    self.faces[f].swap(1, 2);
                    flipped[f] = !flipped[f];
                }
            }
        }

        let count = flipped.iter().filter(|&&f| f).count();
        log::debug!("fix_normals flipped {count} of {face_count} faces");
        count
    }

    /// Create a simple cube mesh for testing, outward winding
    pub fn cube(size: f64) -> Self {
        let h = size / 2.0;
        let vertices = vec![
            Point3::new(-h, -h, -h),
            Point3::new(h, -h, -h),
            Point3::new(h, h, -h),
            Point3::new(-h, h, -h),
            Point3::new(-h, -h, h),
            Point3::new(h, -h, h),
            Point3::new(h, h, h),
            Point3::new(-h, h, h),
        ];
        let faces = vec![
            // Bottom
            [0, 2, 1],
            [0, 3, 2],
            // Top
            [4, 5, 6],
            [4, 6, 7],
            // Front
            [0, 1, 5],
            [0, 5, 4],
            // Back
            [3, 7, 6],
            [3, 6, 2],
            // Left
            [0, 4, 7],
            [0, 7, 3],
            // Right
            [1, 2, 6],
            [1, 6, 5],
        ];
        Self {
            vertices,
            faces,
            colors: None,
        }
    }
}

fn face_edges(face: &[usize; 3]) -> impl Iterator<Item = (usize, usize)> {
    let [a, b, c] = *face;
    [(a, b), (b, c), (c, a)].into_iter()
}

fn signed_volume_of(mesh: &Mesh, faces: impl IntoIterator<Item = usize>) -> f64 {
    faces
        .into_iter()
        .map(|f| {
            let [a, b, c] = mesh.triangle(f).vertices;
            a.coords.dot(&b.coords.cross(&c.coords))
        })
        .sum::<f64>()
        / 6.0
}
