use std::path::Path;

/// Errors while reading a saved project.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("unknown file format: {0}")]
    UnknownFormat(String),

    #[error("file version {file_version} is newer than supported version {supported_version}")]
    FutureVersion {
        file_version: u32,
        supported_version: u32,
    },

    #[error("migration failed from version {from} to {to}: {reason}")]
    MigrationFailed { from: u32, to: u32, reason: String },

    #[error("document {0} is referenced but missing from the manifest")]
    MissingDocument(String),

    #[error("manifest lists {found} as first document, expected {expected}")]
    BadRoot { found: String, expected: String },
}

impl LoadError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn parse(path: &Path, err: serde_json::Error) -> Self {
        Self::ParseError {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Errors while writing a project.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SaveError {
    #[error("cannot write {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("serialization failed: {0}")]
    Serialize(String),

    #[error("cannot save while an operation is open")]
    OperationOpen,
}

impl SaveError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}
