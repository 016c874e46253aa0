use basalt_core::MAX_FACES_PER_MESH;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Tunables of the meshing and culling pipeline.
///
/// Invalid tunables are fatal at construction: every loader runs
/// [`MesherConfig::validate`] before handing the config out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MesherConfig {
    /// Horizontal extent of one mesh tile, the region that becomes one
    /// directional-mesh family. Performs best as a multiple of 64.
    #[serde(default = "default_max_horizontal_size")]
    pub max_horizontal_size: u32,

    /// Horizontal extent of one parallel job. `None` meshes the whole world
    /// as a single job. Best as a multiple of `max_horizontal_size`.
    #[serde(default)]
    pub job_horizontal_size: Option<u32>,

    /// Tiles whose total face count stays below this collapse their six
    /// directional meshes into a single any-normal mesh.
    #[serde(default = "default_merge_normals_threshold")]
    pub merge_normals_threshold: u32,

    /// Terrain generators that guarantee the camera stays above the surface
    /// set this to skip bottom faces and sides below every neighboring
    /// surface.
    #[serde(default)]
    pub seen_from_above: bool,

    /// Scale of the distance-proportional quad inflation that hides 1-pixel
    /// seams between abutting quads.
    #[serde(default = "default_quads_interleaving")]
    pub quads_interleaving: f32,
}

fn default_max_horizontal_size() -> u32 {
    64
}
fn default_merge_normals_threshold() -> u32 {
    256
}
fn default_quads_interleaving() -> f32 {
    1.0
}

impl Default for MesherConfig {
    fn default() -> Self {
        Self {
            max_horizontal_size: default_max_horizontal_size(),
            job_horizontal_size: None,
            merge_normals_threshold: default_merge_normals_threshold(),
            seen_from_above: false,
            quads_interleaving: default_quads_interleaving(),
        }
    }
}

impl MesherConfig {
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: MesherConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_horizontal_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_horizontal_size must be greater than 0".to_string(),
            ));
        }

        if self.job_horizontal_size == Some(0) {
            return Err(ConfigError::ValidationError(
                "job_horizontal_size must be greater than 0 or absent for unlimited".to_string(),
            ));
        }

        if self.merge_normals_threshold > MAX_FACES_PER_MESH {
            return Err(ConfigError::ValidationError(format!(
                "merge_normals_threshold must not exceed the per-mesh face cap of {}",
                MAX_FACES_PER_MESH
            )));
        }

        if !self.quads_interleaving.is_finite() || self.quads_interleaving < 0.0 {
            return Err(ConfigError::ValidationError(
                "quads_interleaving must be finite and non-negative".to_string(),
            ));
        }

        Ok(())
    }
}
