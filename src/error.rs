//! Error taxonomy for data factories.
//!
//! Single-file failures during a walk or a bulk save are collected into an
//! [`ErrorBatch`] and handed back to the caller after the operation finished;
//! failures of a single targeted operation come back as a plain [`DataError`].

use crate::resource::ResourceId;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why no writable data folder could be resolved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WritableDirError {
    #[error("no writable data folder is configured")]
    NotConfigured,
    #[error(
        "a writable data folder is configured, but it is not part of the data search path"
    )]
    NotInSearchPath,
    #[error(
        "a writable data folder is configured ({}), but this folder does not exist",
        .0.display()
    )]
    Missing(PathBuf),
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("could not open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load data from '{}': {source:#}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to save '{name}' to '{}': {source:#}", path.display())]
    Write {
        name: String,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("'{name}' cannot be saved: this kind of data does not implement saving")]
    SaveUnsupported { name: String },
    #[error("'{name}' is not writable")]
    NotWritable { name: String },
    #[error("could not delete '{}': {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{}' is shared with other data or lives outside the writable folders", path.display())]
    NotDeletable { path: PathBuf },
    #[error("'{name}' is built in and cannot be deleted")]
    Internal { name: String },
    #[error("no resource {id} in this collection")]
    NotFound { id: ResourceId },
    #[error("cannot expand ${{{token}}}")]
    Expand { token: String },
    #[error("failed to save data: {0}")]
    WritableDir(#[from] WritableDirError),
    #[error("failed to read configuration '{}': {source:#}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl DataError {
    pub(crate) fn open(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Open {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn load(path: impl AsRef<Path>, source: anyhow::Error) -> Self {
        Self::Load {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Outcome of a resource's own save routine.
///
/// `Unsupported` is kept apart from real failures so kinds that are read-only
/// by design do not show up as errors in bulk saves.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("saving is not implemented for this kind of data")]
    Unsupported,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Errors collected by a best-effort operation.
#[derive(Debug, Default)]
pub struct ErrorBatch {
    errors: Vec<DataError>,
}

impl ErrorBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: DataError) {
        tracing::warn!("{error}");
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: ErrorBatch) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[DataError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<DataError> {
        self.errors
    }

    /// `Ok(())` when nothing was collected, otherwise the batch itself.
    pub fn into_result(self) -> Result<(), ErrorBatch> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ErrorBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no errors"),
            1 => write!(f, "{}", self.errors[0]),
            n => {
                write!(f, "{n} errors:")?;
                for error in &self.errors {
                    write!(f, "\n  {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ErrorBatch {}

impl From<DataError> for ErrorBatch {
    fn from(error: DataError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}
