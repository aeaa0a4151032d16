//! Editing HDF5 demonstration archives.
//!
//! Archives keep one group per demonstration under `data` (`data/demo_0`,
//! `data/demo_1`, ...). Deleting a demonstration cannot be undone.

use std::ffi::CString;
use std::path::Path;

use hdf5::{File, Group};

use crate::error::{R3dError, Result};

/// Group holding the demonstrations
pub const DATA_GROUP: &str = "data";

/// Whether every component of a `/`-separated path exists below `group`
fn path_exists(group: &Group, path: &str) -> bool {
    let mut prefix = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(part);
        if !group.link_exists(&prefix) {
            return false;
        }
    }
    !prefix.is_empty()
}

/// Names of the demonstrations in an archive, sorted
pub fn list_demos(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let mut names = file.group(DATA_GROUP)?.member_names()?;
    names.sort();
    Ok(names)
}

/// Delete `data/<key>`; returns `false` when there was nothing to delete
pub fn delete_demo(path: &Path, key: &str) -> Result<bool> {
    let file = File::open_rw(path)?;
    let data = file.group(DATA_GROUP)?;
    if !path_exists(&data, key) {
        log::warn!("{key} does not exist in {}", path.display());
        return Ok(false);
    }
    data.unlink(key)?;
    log::info!("{key} has been deleted from {}", path.display());
    Ok(true)
}

/// Copy the object at `key` in `input` to `dest` in a new file `output`,
/// creating the intermediate groups of `dest`.
pub fn extract_key(input: &Path, output: &Path, key: &str, dest: &str) -> Result<()> {
    let source = File::open(input)?;
    if !path_exists(&source, key) {
        return Err(R3dError::KeyNotFound(key.to_string()));
    }

    let target = File::create(output)?;
    let mut parent: Group = target.as_group()?;
    let parts: Vec<&str> = dest.split('/').filter(|p| !p.is_empty()).collect();
    let Some((name, groups)) = parts.split_last() else {
        return Err(R3dError::KeyNotFound(dest.to_string()));
    };
    for part in groups {
        parent = if parent.link_exists(part) {
            parent.group(part)?
        } else {
            parent.create_group(part)?
        };
    }

    let src_name = CString::new(key).map_err(|_| R3dError::KeyNotFound(key.to_string()))?;
    let dst_name = CString::new(*name).map_err(|_| R3dError::KeyNotFound(dest.to_string()))?;
    // SAFETY: both ids are live handles owned by `source` and `parent`, and the
    // names are NUL-terminated strings that outlive the call.
    let status = unsafe {
        hdf5_sys::h5o::H5Ocopy(
            source.id(),
            src_name.as_ptr(),
            parent.id(),
            dst_name.as_ptr(),
            hdf5_sys::h5p::H5P_DEFAULT,
            hdf5_sys::h5p::H5P_DEFAULT,
        )
    };
    if status < 0 {
        return Err(R3dError::CopyFailed {
            key: key.to_string(),
            dest: dest.to_string(),
        });
    }
    log::info!(
        "key '{key}' extracted to '{dest}' in '{}'",
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_with_demos(path: &Path, count: usize) {
        let file = File::create(path).unwrap();
        let data = file.create_group(DATA_GROUP).unwrap();
        for i in 0..count {
            let demo = data.create_group(&format!("demo_{i}")).unwrap();
            demo.new_dataset::<f64>()
                .shape(3)
                .create("actions")
                .unwrap()
                .write_raw(&[0.1, 0.2, f64::from(i as u32)])
                .unwrap();
        }
    }

    #[test]
    fn test_delete_demo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demos.hdf5");
        archive_with_demos(&path, 3);

        assert!(delete_demo(&path, "demo_1").unwrap());
        assert!(!delete_demo(&path, "demo_8").unwrap());
        assert_eq!(list_demos(&path).unwrap(), vec!["demo_0", "demo_2"]);
    }

    #[test]
    fn test_extract_key() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("demo.hdf5");
        let output = dir.path().join("extracted.h5");
        archive_with_demos(&input, 2);

        extract_key(&input, &output, "data/demo_1", "data/demo_0").unwrap();
        let file = File::open(&output).unwrap();
        let actions: Vec<f64> = file.dataset("data/demo_0/actions").unwrap().read_raw().unwrap();
        assert_eq!(actions, vec![0.1, 0.2, 1.0]);

        let missing = extract_key(&input, &output, "data/demo_9", "data/demo_0").unwrap_err();
        assert!(matches!(missing, R3dError::KeyNotFound(_)));
    }

    #[test]
    fn test_copy_failure_names_both_paths() {
        let err = R3dError::CopyFailed {
            key: "data/demo_1".to_string(),
            dest: "data/demo_0".to_string(),
        };
        assert_eq!(err.to_string(), "failed to copy 'data/demo_1' to 'data/demo_0'");
        assert!(!matches!(err, R3dError::KeyNotFound(_)));
    }
}
