//! Artifact storage under the backup root

use crate::error::{self, Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// JSON artifact tree rooted at one directory
///
/// Paths passed to the methods are relative to the root. Writes are atomic
/// and create parent directories on demand. Serialization is deterministic:
/// object keys come out sorted, so unchanged data gives byte-identical files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    /// Pretty print JSON output
    pretty: bool,
}

impl ArtifactStore {
    /// Create a store writing compact JSON
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pretty: false,
        }
    }

    /// Switch pretty printing on or off
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Absolute path of an artifact
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Serialize data to a string using this store's formatting
    pub fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(data).map_err(Error::from)
        } else {
            serde_json::to_string(data).map_err(Error::from)
        }
    }

    /// Serialize and write an artifact, returning its absolute path
    pub fn write_json<T: Serialize>(&self, relative: impl AsRef<Path>, data: &T) -> Result<PathBuf> {
        let content = self.serialize(data)?;
        self.write_raw(relative, &content)
    }

    /// Write an artifact verbatim, returning its absolute path
    ///
    /// Uses atomic write: writes to temp file then renames to prevent corruption.
    pub fn write_raw(&self, relative: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let path = self.path(relative);

        if let Some(parent) = path.parent() {
            error::create_dir(parent)?;
        }

        let file_name = path.file_name().ok_or_else(|| {
            Error::Config(format!(
                "Invalid path '{}': must have a filename",
                path.display()
            ))
        })?;
        let mut temp_filename = file_name.to_os_string();
        temp_filename.push(".tmp");
        let temp_path = path.with_file_name(temp_filename);

        error::write_file(&temp_path, content)?;
        std::fs::rename(&temp_path, &path).map_err(|e| Error::FileWrite {
            path: path.clone(),
            source: e,
        })?;

        Ok(path)
    }

    /// Read an artifact verbatim; `None` if it does not exist
    pub fn read_raw(&self, relative: impl AsRef<Path>) -> Result<Option<String>> {
        let path = self.path(relative);
        if !path.is_file() {
            return Ok(None);
        }
        error::read_file(&path).map(Some)
    }

    /// Read and parse an artifact; `None` if it does not exist
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedArtifact`] if the file is not valid JSON of
    /// the expected shape.
    pub fn read_json<T: DeserializeOwned>(&self, relative: impl AsRef<Path>) -> Result<Option<T>> {
        let relative = relative.as_ref();
        let path = self.path(relative);
        match self.read_raw(relative)? {
            Some(content) => parse_artifact(&path, &content).map(Some),
            None => Ok(None),
        }
    }

    /// `*.json` files directly inside a directory, sorted by name
    ///
    /// A missing directory yields an empty list.
    pub fn list_json(&self, relative_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = self.path(relative_dir);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = error::read_dir(&dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        files.sort();
        Ok(files)
    }
}

/// Parse artifact content, tagging failures with the file path
pub fn parse_artifact<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    serde_json::from_str(content).map_err(|e| Error::MalformedArtifact {
        path: path.to_path_buf(),
        source: e,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Macro {
        r#macro: String,
        value: String,
    }

    #[test]
    fn test_compact_by_default() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let json = store.serialize(&json!({"b": 1, "a": 2})).unwrap();
        assert_eq!(json, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_pretty() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).pretty(true);

        let json = store.serialize(&json!({"name": "test"})).unwrap();
        assert!(json.contains('\n'));
        assert!(json.contains("\"name\": \"test\""));
    }

    #[test]
    fn test_roundtrip_creates_directories() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("backup"));

        let data = vec![Macro {
            r#macro: "{$SNMP_COMMUNITY}".into(),
            value: "public".into(),
        }];
        let path = store.write_json("nested/global_macros.json", &data).unwrap();
        assert!(path.is_file());
        assert!(!path.with_file_name("global_macros.json.tmp").exists());

        let loaded: Vec<Macro> = store.read_json("nested/global_macros.json").unwrap().unwrap();
        assert_eq!(data, loaded);
    }

    #[test]
    fn test_missing_artifact_is_none() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let loaded: Option<Vec<String>> = store.read_json("host_groups.json").unwrap();
        assert!(loaded.is_none());
        assert!(store.list_json("images").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_artifact() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_raw("users.json", "[{\"username\": ").unwrap();

        let result: Result<Option<Vec<serde_json::Value>>> = store.read_json("users.json");
        assert!(matches!(result.unwrap_err(), Error::MalformedArtifact { .. }));
    }

    #[test]
    fn test_list_json_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_raw("hosts/zeta.json", "{}").unwrap();
        store.write_raw("hosts/alpha.json", "{}").unwrap();
        store.write_raw("hosts/notes.txt", "x").unwrap();

        let names: Vec<String> = store
            .list_json("hosts")
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["alpha.json", "zeta.json"]);
    }
}
