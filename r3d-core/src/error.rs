//! Error types for r3d-core.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for r3d-core operations.
#[derive(Error, Debug)]
pub enum R3dError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error on a known path.
    #[error("{path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed mesh file.
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Malformed STL data.
    #[error("STL error: {0}")]
    Stl(String),

    /// Mesh file with an extension we cannot read.
    #[error("unsupported mesh format: {0}")]
    UnsupportedFormat(String),

    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {index}, mesh has {count} vertices")]
    BadIndex {
        face: usize,
        index: usize,
        count: usize,
    },

    /// Operation needs at least one vertex or face.
    #[error("mesh is empty")]
    EmptyMesh,

    /// Geometry too degenerate for the requested operation.
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    /// The handle heuristic could not classify any vertices.
    #[error("handle detection failed: {0}")]
    HandleNotFound(String),

    /// Malformed statistics input.
    #[error("invalid score data: {0}")]
    InvalidScores(String),

    /// A rename would overwrite an existing file.
    #[error("refusing to overwrite existing file {0}")]
    TargetExists(PathBuf),

    /// Image decoding or encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON (de)serialisation error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Archive key not present.
    #[error("key '{0}' not found in archive")]
    KeyNotFound(String),

    /// The archive holds the key but HDF5 refused to copy it.
    #[cfg(feature = "hdf5")]
    #[error("failed to copy '{key}' to '{dest}'")]
    CopyFailed { key: String, dest: String },

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}

impl R3dError {
    /// Attach a path to an I/O error.
    pub fn at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::PathIo { path, source }
    }
}

/// A specialized Result type for r3d-core operations.
pub type Result<T> = std::result::Result<T, R3dError>;
