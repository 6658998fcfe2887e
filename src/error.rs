//! Crate-wide error type returned by the runner.
//!
//! A plain enum, manual `Display`, manual `std::error::Error::source`, `From`
//! conversions from each stage's own error type. `EmptyBVHSplit` and
//! `RayMiss` have no variant here — they are sentinels recorded in data,
//! never raised as errors.

use std::fmt;

use crate::image_writer::WriteError;
use crate::job::JobError;
use crate::mesh::LoadError;

#[derive(Debug)]
pub enum BakeError {
    Mesh(LoadError),
    Job(JobError),
    Write(WriteError),
}

impl BakeError {
    /// Image-writer failures are recoverable per solver: skip that output
    /// and continue the others, unlike mesh/job errors which abort the
    /// whole bake.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BakeError::Write(_))
    }
}

impl fmt::Display for BakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BakeError::Mesh(e) => write!(f, "mesh error: {e}"),
            BakeError::Job(e) => write!(f, "job configuration error: {e}"),
            BakeError::Write(e) => write!(f, "image write error: {e}"),
        }
    }
}

impl std::error::Error for BakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BakeError::Mesh(e) => Some(e),
            BakeError::Job(e) => Some(e),
            BakeError::Write(e) => Some(e),
        }
    }
}

impl From<LoadError> for BakeError {
    fn from(e: LoadError) -> Self {
        BakeError::Mesh(e)
    }
}

impl From<JobError> for BakeError {
    fn from(e: JobError) -> Self {
        BakeError::Job(e)
    }
}

impl From<WriteError> for BakeError {
    fn from(e: WriteError) -> Self {
        BakeError::Write(e)
    }
}
