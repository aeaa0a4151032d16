//! Signed distance queries and the SDF error metric between two meshes.
//!
//! Distances follow the usual dataset convention: points inside the
//! reference surface are positive, points outside are negative. Inside is
//! decided by the generalised winding number, which tolerates small holes in
//! generated meshes.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use nalgebra::Point3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::align::obj_files;
use crate::error::{R3dError, Result};
use crate::geometry::{Aabb, Mesh};
use crate::io::load_mesh;
use crate::score_log::ScoreLog;

const LEAF_SIZE: usize = 4;

/// How two meshes are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SdfMode {
    /// Center both meshes, then average mean |sdf| in both directions
    Symmetric,
    /// Mean signed sdf of candidate samples against the reference only
    OneSided,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdfOptions {
    pub samples: usize,
    pub seed: u64,
    pub mode: SdfMode,
}

impl Default for SdfOptions {
    fn default() -> Self {
        Self {
            samples: 10_000,
            seed: 0,
            mode: SdfMode::Symmetric,
        }
    }
}

/// Uniform random points on the surface, triangles weighted by area
pub fn sample_surface<R: Rng>(mesh: &Mesh, count: usize, rng: &mut R) -> Result<Vec<Point3<f64>>> {
    let mut cumulative = Vec::with_capacity(mesh.faces.len());
    let mut total = 0.0;
    for tri in mesh.triangles() {
        total += tri.area();
        cumulative.push(total);
    }
    if total <= 0.0 {
        return Err(R3dError::Degenerate("mesh has no surface area".to_string()));
    }

    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let target = rng.random::<f64>() * total;
        let face = cumulative
            .partition_point(|&c| c <= target)
            .min(cumulative.len() - 1);
        let [a, b, c] = mesh.triangle(face).vertices;
        let (mut u, mut v) = (rng.random::<f64>(), rng.random::<f64>());
        if u + v > 1.0 {
            u = 1.0 - u;
            v = 1.0 - v;
        }
        points.push(a + (b - a) * u + (c - a) * v);
    }
    Ok(points)
}

enum Node {
    Leaf {
        bounds: Aabb,
        faces: Vec<usize>,
    },
    Branch {
        bounds: Aabb,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn bounds(&self) -> &Aabb {
        match self {
            Node::Leaf { bounds, .. } | Node::Branch { bounds, .. } => bounds,
        }
    }
}

/// Closest-point and signed-distance queries against one mesh
pub struct SurfaceQuery<'a> {
    mesh: &'a Mesh,
    root: Node,
}

/// Nearest surface point for a query
#[derive(Debug, Clone, Copy)]
pub struct Nearest {
    pub point: Point3<f64>,
    pub distance: f64,
}

impl<'a> SurfaceQuery<'a> {
    pub fn new(mesh: &'a Mesh) -> Result<Self> {
        if mesh.faces.is_empty() {
            return Err(R3dError::EmptyMesh);
        }
        let mut faces: Vec<usize> = (0..mesh.faces.len()).collect();
        let centroids: Vec<Point3<f64>> = mesh.triangles().map(|t| t.centroid()).collect();
        let root = build(mesh, &centroids, &mut faces);
        Ok(Self { mesh, root })
    }

    pub fn nearest(&self, p: &Point3<f64>) -> Nearest {
        let mut best = Nearest {
            point: *p,
            distance: f64::INFINITY,
        };
        let mut best_sq = f64::INFINITY;
        let mut stack = vec![&self.root];

        while let Some(node) = stack.pop() {
            if node.bounds().distance_squared(p) >= best_sq {
                continue;
            }
            match node {
                Node::Leaf { faces, .. } => {
                    for &f in faces {
                        let q = self.mesh.triangle(f).closest_point(p);
                        let d = (q - *p).norm_squared();
                        if d < best_sq {
                            best_sq = d;
                            best = Nearest {
                                point: q,
                                distance: 0.0,
                            };
                        }
                    }
                }
                Node::Branch { left, right, .. } => {
                    // Visit the nearer child first
                    let (near, far) = if left.bounds().distance_squared(p)
                        <= right.bounds().distance_squared(p)
                    {
                        (left.as_ref(), right.as_ref())
                    } else {
                        (right.as_ref(), left.as_ref())
                    };
                    stack.push(far);
                    stack.push(near);
                }
            }
        }
        best.distance = best_sq.sqrt();
        best
    }

    /// Generalised winding number of the surface around `p`
    pub fn winding_number(&self, p: &Point3<f64>) -> f64 {
        let mut total = 0.0;
        for tri in self.mesh.triangles() {
            let [a, b, c] = tri.vertices.map(|v| v - *p);
            let (la, lb, lc) = (a.norm(), b.norm(), c.norm());
            let det = a.dot(&b.cross(&c));
            let denom = la * lb * lc + a.dot(&b) * lc + b.dot(&c) * la + c.dot(&a) * lb;
            total += 2.0 * det.atan2(denom);
        }
        total / (4.0 * PI)
    }

    /// Whether `p` is enclosed by the surface, regardless of winding direction
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        self.winding_number(p).abs() >= 0.5
    }

    /// Distance to the surface, positive inside and negative outside
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        self.signed_nearest(p).1
    }

    /// Nearest surface point together with the signed distance to it
    pub fn signed_nearest(&self, p: &Point3<f64>) -> (Point3<f64>, f64) {
        let nearest = self.nearest(p);
        let sign = if self.contains(p) { 1.0 } else { -1.0 };
        (nearest.point, sign * nearest.distance)
    }
}

fn build(mesh: &Mesh, centroids: &[Point3<f64>], faces: &mut [usize]) -> Node {
    let bounds = faces
        .iter()
        .map(|&f| mesh.triangle(f).bounds())
        .reduce(|a, b| a.merge(&b))
        .unwrap_or_else(|| Aabb::new(Point3::origin(), Point3::origin()));

    if faces.len() <= LEAF_SIZE {
        return Node::Leaf {
            bounds,
            faces: faces.to_vec(),
        };
    }

    let extents = bounds.extents();
    let axis = extents.imax();
    faces.sort_unstable_by(|&a, &b| centroids[a][axis].total_cmp(&centroids[b][axis]));
    let (lo, hi) = faces.split_at_mut(faces.len() / 2);
    Node::Branch {
        bounds,
        left: Box::new(build(mesh, centroids, lo)),
        right: Box::new(build(mesh, centroids, hi)),
    }
}

/// Move the mesh so its centroid is at the origin
pub fn center_mesh(mesh: &mut Mesh) -> Result<()> {
    let centroid = mesh.centroid()?;
    mesh.translate(&-centroid.coords);
    Ok(())
}

/// Scale `mesh` so its largest bounding-box extent matches the reference's
pub fn scale_to_match_bounding_box(mesh: &mut Mesh, reference: &Mesh) -> Result<f64> {
    let current = mesh.bounds()?.extents().max();
    let target = reference.bounds()?.extents().max();
    if current <= 0.0 {
        return Err(R3dError::Degenerate("mesh has zero extent".to_string()));
    }
    let factor = target / current;
    mesh.scale(factor);
    Ok(factor)
}

/// Outcome of comparing a candidate against a ground-truth mesh
#[derive(Debug, Clone)]
pub struct SdfComparison {
    /// Error in the ground truth's units
    pub raw_error: f64,
    /// `raw_error` divided by the ground-truth bounding-box diagonal
    pub normalized_error: f64,
    pub bbox_diagonal: f64,
    /// Candidate after centering and scaling
    pub candidate: Mesh,
    /// Ground truth after centering (symmetric mode)
    pub ground_truth: Mesh,
    /// Candidate surface samples (one-sided mode)
    pub samples: Vec<Point3<f64>>,
    /// Closest ground-truth surface points to `samples`
    pub closest: Vec<Point3<f64>>,
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    values.sum::<f64>() / n as f64
}

/// Mean absolute distance from points sampled on `from` to the surface of `to`
fn mean_abs_distance(from: &Mesh, to: &Mesh, samples: usize, rng: &mut StdRng) -> Result<f64> {
    let points = sample_surface(from, samples, rng)?;
    let query = SurfaceQuery::new(to)?;
    Ok(mean(points.iter().map(|p| query.nearest(p).distance)))
}

pub fn compare_meshes(candidate: &Mesh, ground_truth: &Mesh, options: &SdfOptions) -> Result<SdfComparison> {
    if options.samples == 0 {
        return Err(R3dError::Degenerate("sample count must be positive".to_string()));
    }
    let bbox_diagonal = ground_truth.bounds()?.diagonal();
    if bbox_diagonal <= 0.0 {
        return Err(R3dError::Degenerate("ground truth has zero extent".to_string()));
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut candidate = candidate.clone();
    let mut ground_truth = ground_truth.clone();
    let mut samples = Vec::new();
    let mut closest = Vec::new();

    let raw_error = match options.mode {
        SdfMode::Symmetric => {
            center_mesh(&mut candidate)?;
            center_mesh(&mut ground_truth)?;
            scale_to_match_bounding_box(&mut candidate, &ground_truth)?;
            // The sign is discarded, so plain nearest-surface distances suffice
            let forward = mean_abs_distance(&candidate, &ground_truth, options.samples, &mut rng)?;
            let backward = mean_abs_distance(&ground_truth, &candidate, options.samples, &mut rng)?;
            (forward + backward) / 2.0
        }
        SdfMode::OneSided => {
            scale_to_match_bounding_box(&mut candidate, &ground_truth)?;
            samples = sample_surface(&candidate, options.samples, &mut rng)?;
            let query = SurfaceQuery::new(&ground_truth)?;
            let mut signed = Vec::with_capacity(samples.len());
            for p in &samples {
                let (point, distance) = query.signed_nearest(p);
                closest.push(point);
                signed.push(distance);
            }
            mean(signed.into_iter())
        }
    };

    Ok(SdfComparison {
        raw_error,
        normalized_error: raw_error / bbox_diagonal,
        bbox_diagonal,
        candidate,
        ground_truth,
        samples,
        closest,
    })
}

/// Outcome of scoring every mesh in a folder
#[derive(Debug, Default)]
pub struct FolderScores {
    /// Files already present in the score log
    pub skipped: Vec<PathBuf>,
    pub scored: Vec<(String, f64)>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Score every `.obj` in `dir` against `ground_truth`, skipping files
/// already in the log and appending new scores as they are computed.
///
/// `on_scored` sees each new comparison after its score is logged; a failure
/// there is reported but keeps the score.
pub fn score_folder<F>(
    ground_truth: &Path,
    dir: &Path,
    log: &mut ScoreLog,
    options: &SdfOptions,
    mut on_scored: F,
) -> Result<FolderScores>
where
    F: FnMut(&Path, &SdfComparison) -> Result<()>,
{
    let gt = load_mesh(ground_truth)?;
    let mut report = FolderScores::default();

    for path in obj_files(dir)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // Log lines are `<name> <error>`, so the name must be a single field
        if name.chars().any(char::is_whitespace) {
            log::warn!("not scoring {}: file name contains whitespace", path.display());
            report
                .failed
                .push((path, "file name contains whitespace".to_string()));
            continue;
        }
        if log.contains(&name) {
            log::debug!("already scored {name}");
            report.skipped.push(path);
            continue;
        }

        let result = load_mesh(&path)
            .and_then(|mesh| compare_meshes(&mesh, &gt, options))
            .and_then(|cmp| {
                log.append(&name, cmp.normalized_error)?;
                Ok(cmp)
            });
        match result {
            Ok(cmp) => {
                log::info!("{name}: normalized SDF error {}", cmp.normalized_error);
                if let Err(e) = on_scored(&path, &cmp) {
                    log::warn!("scored {name} but could not save its comparison: {e}");
                }
                report.scored.push((name, cmp.normalized_error));
            }
            Err(e) => {
                log::warn!("error processing {}: {e}", path.display());
                report.failed.push((path, e.to_string()));
            }
        }
    }

    log::info!(
        "{} already scored, {} newly scored, {} failed",
        report.skipped.len(),
        report.scored.len(),
        report.failed.len()
    );
    Ok(report)
}
