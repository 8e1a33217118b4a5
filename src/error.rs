use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ImportError {
    #[error("unexpected RO-Crate profile: {found}; only {expected} is supported")]
    UnsupportedProfile { found: String, expected: String },

    #[error("no valid RepositoryObject found in crate")]
    RepositoryObjectNotFound,

    #[error(
        "ambiguous RepositoryObject hierarchy: bases [{}], children [{}]",
        .bases.join(", "),
        .children.join(", ")
    )]
    AmbiguousRepositoryObject {
        bases: Vec<String>,
        children: Vec<String>,
    },

    #[error("no parent RepositoryObject usable for lookup: {0:?}")]
    MissingParentLink(String),

    #[error("parent RepositoryObject with ID {0} not found in datalab")]
    RemoteItemNotFound(String),

    #[error("datalab request failed: {0}")]
    RemoteHttp(String),

    #[error("datalab returned status {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("missing ro-crate-metadata.json in {0}")]
    MissingMetadata(PathBuf),

    #[error("invalid RO-Crate: {0}")]
    InvalidArchive(String),

    #[error("file listed in crate not found: {0}")]
    MissingFile(PathBuf),

    #[error("file entity id cannot be mapped into the crate: {0}")]
    InvalidFilePath(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
