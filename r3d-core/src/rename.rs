/// Prefixing every file in a folder
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{R3dError, Result};

/// Rename each regular file `name` in `dir` to `<prefix><name>`.
///
/// Directories are left alone. A rename that would replace an existing file
/// stops the run with an error. Returns the new paths in name order.
pub fn add_prefix(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(R3dError::at(dir))? {
        let entry = entry.map_err(R3dError::at(dir))?;
        if entry.file_type().map_err(R3dError::at(entry.path()))?.is_file() {
            files.push(entry.file_name());
        }
    }
    files.sort();

    let mut renamed = Vec::with_capacity(files.len());
    for name in files {
        let old_path = dir.join(&name);
        let mut target = std::ffi::OsString::from(prefix);
        target.push(&name);
        let new_path = dir.join(target);
        if new_path.exists() {
            return Err(R3dError::TargetExists(new_path));
        }
        fs::rename(&old_path, &new_path).map_err(R3dError::at(&old_path))?;
        log::debug!("{} -> {}", old_path.display(), new_path.display());
        renamed.push(new_path);
    }
    log::info!("renamed {} files in {}", renamed.len(), dir.display());
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("demo.hdf5"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"y").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let renamed = add_prefix(dir.path(), "5_").unwrap();
        assert_eq!(
            renamed,
            vec![dir.path().join("5_demo.hdf5"), dir.path().join("5_notes.txt")]
        );
        assert!(dir.path().join("5_demo.hdf5").is_file());
        assert!(!dir.path().join("demo.hdf5").exists());
        assert!(dir.path().join("sub").is_dir());
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"1").unwrap();
        fs::write(dir.path().join("x_a"), b"2").unwrap();
        let err = add_prefix(dir.path(), "x_").unwrap_err();
        assert!(matches!(err, R3dError::TargetExists(_)));
        assert_eq!(fs::read(dir.path().join("x_a")).unwrap(), b"2");
    }
}
