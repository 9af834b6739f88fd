use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy of the scene pipeline
// ---------------------------------------------------------------------------

/// Every failure the pipeline can report.  Errors are raised where they are
/// detected and never retried: a defect in source data is not transient.
#[derive(Debug, Error)]
pub enum SceneError {
    /// The dataset name is not in the registry.
    #[error("{0} dataset is unknown")]
    UnknownDataset(String),

    /// No decoder is registered for the file extension.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Structural mismatch or undecodable content.
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// Degenerate or non-monotonic wavelength axis.
    #[error("invalid wavelength axis: {0}")]
    InvalidAxis(String),

    /// Non-physical input to the radiance model.
    #[error("domain error: {0}")]
    Domain(String),

    /// The background loader could not start or exited without reporting.
    #[error("background load of {0} failed to report a result")]
    Worker(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SceneError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        SceneError::CorruptData(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SceneError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = SceneError> = std::result::Result<T, E>;
