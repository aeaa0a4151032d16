/// r3d Core Library - mesh and dataset tooling for manipulation datasets
///
/// This library provides the stateless core of the `r3d` tools: OBJ/STL
/// codecs, the handle heuristic and mesh alignment, the SDF error metric,
/// score statistics, and small dataset maintenance helpers.

pub mod align;
pub mod crop;
pub mod error;
pub mod fixtures;
pub mod geometry;
pub mod handle;
pub mod io;
pub mod lines;
pub mod obj;
pub mod projection;
pub mod rename;
pub mod score_log;
pub mod sdf;
pub mod stats;
pub mod stl;
pub mod transform;

#[cfg(feature = "hdf5")]
pub mod archive;

// Re-export commonly used types
pub use align::{AlignOptions, Alignment};
pub use error::{R3dError, Result};
pub use geometry::{Aabb, Mesh, Triangle};
pub use handle::HandleConfig;
pub use projection::{Camera, ProjectionMode};
pub use sdf::{SdfComparison, SdfMode, SdfOptions};
pub use transform::Transform;

use serde::{Deserialize, Serialize};

/// Settings shared by the command line tools, loadable from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub align: AlignOptions,
    pub sdf: SdfOptions,
    pub crop: crop::CropOptions,
}

impl ToolConfig {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(R3dError::at(path))?;
        Ok(serde_json::from_str(&text)?)
    }
}
