//! Job configuration: the on-disk JSON record describing one bake.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum JobError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::Io(e) => write!(f, "failed to read job file: {e}"),
            JobError::Parse(e) => write!(f, "failed to parse job file: {e}"),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JobError::Io(e) => Some(e),
            JobError::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for JobError {
    fn from(e: std::io::Error) -> Self {
        JobError::Io(e)
    }
}

impl From<serde_json::Error> for JobError {
    fn from(e: serde_json::Error) -> Self {
        JobError::Parse(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalImportMode {
    /// Use whatever normals the loader produced from the file.
    Import,
    ComputePerFace,
    ComputePerVertex,
}

impl Default for NormalImportMode {
    fn default() -> Self {
        NormalImportMode::Import
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMethod {
    Smooth,
    LowPolyNormals,
    Hybrid,
}

impl Default for MappingMethod {
    fn default() -> Self {
        MappingMethod::LowPolyNormals
    }
}

fn default_sample_count() -> usize {
    64
}

fn default_max_distance() -> f32 {
    1.0
}

fn default_max_triangles_per_leaf() -> usize {
    4
}

fn default_bvh_max_depth() -> usize {
    32
}

/// One solver's options bundle. Not every field is meaningful for every
/// solver (height/position only use `enabled`/`output_path`); unused fields
/// are simply ignored in favor of one flat, explicit config type over a
/// hierarchy of per-solver structs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub output_path: String,
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    #[serde(default)]
    pub min_distance: f32,
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
    #[serde(default)]
    pub tangent_space: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_path: String::new(),
            sample_count: default_sample_count(),
            min_distance: 0.0,
            max_distance: default_max_distance(),
            tangent_space: false,
        }
    }
}

/// The full description of one bake, deserialized from the job file named on
/// the command line.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BakeJob {
    pub low_poly_mesh: String,
    /// Empty means: reuse the low-poly mesh as the high-poly reference too.
    #[serde(default)]
    pub high_poly_mesh: String,
    #[serde(default)]
    pub low_poly_normal_mode: NormalImportMode,
    #[serde(default)]
    pub high_poly_normal_mode: NormalImportMode,

    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub dilation: usize,

    #[serde(default)]
    pub mapping_method: MappingMethod,
    #[serde(default)]
    pub hybrid_edge_distance: f32,
    #[serde(default)]
    pub ignore_backfaces: bool,

    #[serde(default = "default_max_triangles_per_leaf")]
    pub bvh_max_triangles_per_leaf: usize,
    #[serde(default = "default_bvh_max_depth")]
    pub bvh_max_depth: usize,

    #[serde(default)]
    pub height_solver: SolverConfig,
    #[serde(default)]
    pub position_solver: SolverConfig,
    #[serde(default)]
    pub normal_solver: SolverConfig,
    #[serde(default)]
    pub ao_solver: SolverConfig,
    #[serde(default)]
    pub bent_normals_solver: SolverConfig,
    #[serde(default)]
    pub thickness_solver: SolverConfig,

    /// Exposes the legacy-vs-direct thickness convention as an option rather
    /// than hard-coding either.
    #[serde(default)]
    pub thickness_invert: bool,
    #[serde(default)]
    pub ao_cull_backfaces: bool,
    #[serde(default)]
    pub bent_normals_cull_backfaces: bool,
    #[serde(default)]
    pub thickness_cull_backfaces: bool,
}

impl BakeJob {
    pub fn load(path: &str) -> Result<Self, JobError> {
        let text = std::fs::read_to_string(path)?;
        let job: BakeJob = serde_json::from_str(&text)?;
        Ok(job)
    }

    /// Path of the high-poly mesh, defaulting to the low-poly mesh when unset.
    pub fn high_poly_mesh_path(&self) -> &str {
        if self.high_poly_mesh.is_empty() {
            &self.low_poly_mesh
        } else {
            &self.high_poly_mesh
        }
    }
}
