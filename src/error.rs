//! Error types for zbx-migrate

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for zbx-migrate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for zbx-migrate
#[derive(Error, Debug)]
pub enum Error {
    // -------------------------------------------------------------------------
    // Remote API Errors
    // -------------------------------------------------------------------------
    /// Connectivity, HTTP or authentication failure. Aborts the kind in progress.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server reported that the object already exists.
    #[error("Object already exists: {0}")]
    DuplicateObject(String),

    /// Any other error reported by the server, kept verbatim.
    #[error("API error {code}: {message} {data}")]
    Remote {
        code: i64,
        message: String,
        data: String,
    },

    /// The server answered, but not with something we can use.
    #[error("Unexpected API response for '{method}': {reason}")]
    UnexpectedResponse { method: String, reason: String },

    // -------------------------------------------------------------------------
    // Reference Errors
    // -------------------------------------------------------------------------
    /// A cross-reference has no counterpart in the referenced collection.
    #[error("No {collection} named '{name}' on the target server")]
    ReferenceResolution { collection: String, name: String },

    /// A cross-reference id has no counterpart on the source server.
    #[error("No {collection} with id '{id}' on the source server")]
    DanglingReference { collection: String, id: String },

    // -------------------------------------------------------------------------
    // Artifact Errors
    // -------------------------------------------------------------------------
    #[error("Malformed artifact '{path}': {source}")]
    MalformedArtifact {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory '{path}': {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete file '{path}': {source}")]
    FileDelete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Failed to serialize data: {0}")]
    Serialize(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}

impl Error {
    /// Check if this error means the server is unreachable or refused the session
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Check if this is a duplicate-object report
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::DuplicateObject(_))
    }

    /// Check if this error only concerns a single record or artifact file,
    /// so processing of the remaining records can go on
    #[must_use]
    pub fn is_per_record(&self) -> bool {
        matches!(
            self,
            Error::DuplicateObject(_)
                | Error::Remote { .. }
                | Error::ReferenceResolution { .. }
                | Error::DanglingReference { .. }
                | Error::MalformedArtifact { .. }
        )
    }
}

// =============================================================================
// Filesystem Helper Functions
// =============================================================================
// These reduce repetitive map_err patterns in the artifact code.

/// Create a directory (and parents) with proper error handling
pub fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::DirectoryCreate {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read a whole file to a string with proper error handling
pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write content to a file with proper error handling
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Delete a file with proper error handling
pub fn remove_file(path: &Path) -> Result<()> {
    std::fs::remove_file(path).map_err(|e| Error::FileDelete {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read directory entries with proper error handling
pub fn read_dir(path: &Path) -> Result<std::fs::ReadDir> {
    std::fs::read_dir(path).map_err(|e| Error::DirectoryRead {
        path: path.to_path_buf(),
        source: e,
    })
}
