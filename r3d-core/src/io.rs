/// Mesh loading and saving by file extension
use std::fs;
use std::path::Path;

use crate::error::{R3dError, Result};
use crate::geometry::Mesh;
use crate::{obj, stl};

/// Load an `.obj` or `.stl` mesh
pub fn load_mesh(path: &Path) -> Result<Mesh> {
    let ext = extension(path);
    let mesh = match ext.as_str() {
        "obj" => obj::load_obj(path)?,
        "stl" => {
            let data = fs::read(path).map_err(R3dError::at(path))?;
            stl::parse_stl(&data)?
        }
        _ => return Err(R3dError::UnsupportedFormat(path.display().to_string())),
    };
    log::debug!(
        "loaded {} ({} vertices, {} faces)",
        path.display(),
        mesh.vertices.len(),
        mesh.faces.len()
    );
    Ok(mesh)
}

/// Save a mesh; only OBJ output is supported
pub fn save_mesh(mesh: &Mesh, path: &Path) -> Result<()> {
    match extension(path).as_str() {
        "obj" => obj::save_obj(mesh, path),
        _ => Err(R3dError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Whether a path names a Wavefront OBJ file (case-insensitive)
pub fn is_obj(path: &Path) -> bool {
    extension(path) == "obj"
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_obj() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.OBJ");
        save_mesh(&Mesh::cube(1.0), &path).unwrap();
        let mesh = load_mesh(&path).unwrap();
        assert_eq!(mesh.faces.len(), 12);
        assert!(is_obj(&path));
    }

    #[test]
    fn test_unknown_extension() {
        let err = load_mesh(Path::new("mug.ply")).unwrap_err();
        assert!(matches!(err, R3dError::UnsupportedFormat(_)));
    }
}
