//! Align a candidate mesh's handle with a reference mesh's handle.

use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{R3dError, Result};
use crate::geometry::Mesh;
use crate::handle::{planar_direction, HandleConfig};
use crate::io::{is_obj, load_mesh, save_mesh};
use crate::transform::Transform;

/// Suffix appended to output stems
pub const ROTATED_SUFFIX: &str = "Rotated.obj";

/// Which steps of the alignment pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignOptions {
    /// Scale uniformly so the y extent matches the reference
    pub scale_to_reference: bool,
    /// Turn the candidate +90 degrees about x (y-up to z-up)
    pub reorient_x90: bool,
    /// After rotating, move the mesh so its largest y is 0
    pub shift_handle_to_origin: bool,
    pub handle: HandleConfig,
}

impl AlignOptions {
    /// Scale, stand upright, rotate and shift; handles expected on +x
    pub fn full() -> Self {
        Self {
            scale_to_reference: true,
            reorient_x90: true,
            shift_handle_to_origin: true,
            handle: HandleConfig {
                positive_x_only: true,
                ..HandleConfig::default()
            },
        }
    }

    /// Only drop to the floor and rotate the handle into place
    pub fn rotate_only() -> Self {
        Self {
            scale_to_reference: false,
            reorient_x90: false,
            shift_handle_to_origin: false,
            handle: HandleConfig::default(),
        }
    }
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self::full()
    }
}

/// The aligned mesh and the quantities that produced it
#[derive(Debug, Clone)]
pub struct Alignment {
    pub mesh: Mesh,
    pub scale: f64,
    pub reference_direction: Vector3<f64>,
    pub candidate_direction: Vector3<f64>,
    pub rotation: Matrix3<f64>,
}

/// Scale `mesh` uniformly so its y extent equals the reference's; returns the factor
pub fn scale_to_match_height(mesh: &mut Mesh, reference: &Mesh) -> Result<f64> {
    let target = reference.bounds()?.extents().y;
    let current = mesh.bounds()?.extents().y;
    if current <= 0.0 {
        return Err(R3dError::Degenerate("mesh has zero y extent".to_string()));
    }
    let factor = target / current;
    mesh.scale(factor);
    log::debug!("scale factor y: {factor}");
    Ok(factor)
}

/// Translate along z so the lowest vertex sits on z = 0
pub fn drop_to_floor(mesh: &mut Mesh) -> Result<()> {
    let z_min = mesh.bounds()?.min.z;
    mesh.translate(&Vector3::new(0.0, 0.0, -z_min));
    Ok(())
}

pub fn align_meshes(reference: &Mesh, candidate: &Mesh, options: &AlignOptions) -> Result<Alignment> {
    let mut mesh = candidate.clone();

    let scale = if options.scale_to_reference {
        scale_to_match_height(&mut mesh, reference)?
    } else {
        1.0
    };

    if options.reorient_x90 {
        mesh.apply_homogeneous(&Transform::rotation_x_degrees(90.0));
    }

    drop_to_floor(&mut mesh)?;

    let reference_direction = planar_direction(reference, &options.handle)?;
    let candidate_direction = planar_direction(&mesh, &options.handle)?;
    let rotation = Transform::rotation_between(&candidate_direction, &reference_direction)?;
    mesh.apply_matrix3(&rotation);

    if options.shift_handle_to_origin {
        let y_max = mesh.bounds()?.max.y;
        mesh.translate(&Vector3::new(0.0, -y_max, 0.0));
        drop_to_floor(&mut mesh)?;
    }

    Ok(Alignment {
        mesh,
        scale,
        reference_direction,
        candidate_direction,
        rotation,
    })
}

/// `mug.obj` is used as is; a stem like `out/mug` becomes `out/mugRotated.obj`
pub fn output_path_for(output: &Path) -> PathBuf {
    if is_obj(output) {
        return output.to_path_buf();
    }
    let mut name = output.as_os_str().to_os_string();
    name.push(ROTATED_SUFFIX);
    PathBuf::from(name)
}

/// Align one file pair and write the result; returns the written path
pub fn align_files(
    reference: &Path,
    candidate: &Path,
    output: &Path,
    options: &AlignOptions,
) -> Result<PathBuf> {
    let reference_mesh = load_mesh(reference)?;
    let candidate_mesh = load_mesh(candidate)?;
    let alignment = align_meshes(&reference_mesh, &candidate_mesh, options)?;
    let path = output_path_for(output);
    save_mesh(&alignment.mesh, &path)?;
    log::info!(
        "aligned {} -> {} (scale {:.4})",
        candidate.display(),
        path.display(),
        alignment.scale
    );
    Ok(path)
}

/// Outcome of aligning every mesh in a folder
#[derive(Debug, Default)]
pub struct FolderReport {
    pub aligned: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Sorted list of `.obj` files directly inside `dir`
pub fn obj_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(R3dError::at(dir))? {
        let path = entry.map_err(R3dError::at(dir))?.path();
        if path.is_file() && is_obj(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Align every `.obj` in `input_dir` against `reference` into `output_dir`.
///
/// A mesh that fails to align is logged and recorded; the rest still run.
pub fn align_folder(
    reference: &Path,
    input_dir: &Path,
    output_dir: &Path,
    options: &AlignOptions,
) -> Result<FolderReport> {
    let reference_mesh = load_mesh(reference)?;
    fs::create_dir_all(output_dir).map_err(R3dError::at(output_dir))?;

    let mut report = FolderReport::default();
    for path in obj_files(input_dir)? {
        let stem = path.file_stem().unwrap_or_default().to_os_string();
        let output = output_path_for(&output_dir.join(stem));
        let result = load_mesh(&path)
            .and_then(|mesh| align_meshes(&reference_mesh, &mesh, options))
            .and_then(|alignment| save_mesh(&alignment.mesh, &output));
        match result {
            Ok(()) => {
                log::info!("aligned {}", path.display());
                report.aligned.push(output);
            }
            Err(e) => {
                log::warn!("failed to align {}: {e}", path.display());
                report.failed.push((path, e.to_string()));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::handle::estimate_handle;

    #[test]
    fn test_height_scaling_is_exact() {
        let reference = fixtures::mug(0.0);
        let mut candidate = fixtures::lying_mug(0.3, 0.37);
        scale_to_match_height(&mut candidate, &reference).unwrap();
        let got = candidate.bounds().unwrap().extents().y;
        let want = reference.bounds().unwrap().extents().y;
        assert!((got - want).abs() < 1e-12);
    }

    #[test]
    fn test_flat_mesh_cannot_be_scaled() {
        let reference = fixtures::mug(0.0);
        let mut flat = Mesh::from_parts(
            vec![
                nalgebra::Point3::new(0.0, 0.0, 0.0),
                nalgebra::Point3::new(1.0, 0.0, 0.0),
                nalgebra::Point3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        assert!(matches!(
            scale_to_match_height(&mut flat, &reference),
            Err(R3dError::Degenerate(_))
        ));
    }

    #[test]
    fn test_rotate_only_turns_handle_to_reference() {
        let reference = fixtures::mug(0.0);
        let mut candidate = fixtures::mug(2.4);
        candidate.translate(&Vector3::new(0.0, 0.0, 5.0));

        let alignment = align_meshes(&reference, &candidate, &AlignOptions::rotate_only()).unwrap();
        let bounds = alignment.mesh.bounds().unwrap();
        assert!(bounds.min.z.abs() < 1e-12);

        let dir = estimate_handle(&alignment.mesh, &HandleConfig::default())
            .unwrap()
            .direction;
        assert!((dir - Vector3::x()).norm() < 1e-6);
        assert_eq!(alignment.scale, 1.0);
    }

    #[test]
    fn test_full_alignment_of_lying_mug() {
        let reference = fixtures::mug(0.0);
        let candidate = fixtures::lying_mug(1.0, 0.5);

        let alignment = align_meshes(&reference, &candidate, &AlignOptions::full()).unwrap();
        assert!((alignment.scale - 2.0).abs() < 1e-9);

        let bounds = alignment.mesh.bounds().unwrap();
        assert!(bounds.min.z.abs() < 1e-12);
        assert!(bounds.max.y.abs() < 1e-12);
        assert!((bounds.extents().z - 2.0).abs() < 1e-9);

        let dir = estimate_handle(&alignment.mesh, &HandleConfig::default())
            .unwrap()
            .direction;
        assert!((dir - Vector3::x()).norm() < 1e-6);
    }

    #[test]
    fn test_output_path_for_stem_and_file() {
        assert_eq!(
            output_path_for(Path::new("out/kettle")),
            PathBuf::from("out/kettleRotated.obj")
        );
        assert_eq!(
            output_path_for(Path::new("out/kettle.obj")),
            PathBuf::from("out/kettle.obj")
        );
    }

    #[test]
    fn test_align_folder_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("gen");
        let output = dir.path().join("aligned");
        fs::create_dir(&input).unwrap();

        let reference = dir.path().join("mug.obj");
        save_mesh(&fixtures::mug(0.0), &reference).unwrap();
        save_mesh(&fixtures::lying_mug(0.5, 1.5), &input.join("mug1.obj")).unwrap();
        fs::write(input.join("broken.obj"), "v 0 0\n").unwrap();
        fs::write(input.join("notes.txt"), "ignored").unwrap();

        let report = align_folder(&reference, &input, &output, &AlignOptions::full()).unwrap();
        assert_eq!(report.aligned, vec![output.join("mug1Rotated.obj")]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("broken.obj"));
        assert!(output.join("mug1Rotated.obj").is_file());
    }
}
