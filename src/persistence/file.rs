use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::persistence::SelectionPersistence;

/// Errors that can occur when reading or writing the selections file.
#[derive(Debug)]
pub enum PersistenceError {
    /// Failed to read the selections file from disk.
    Read {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the selections file as valid TOML.
    Parse {
        /// Path to the file with invalid TOML.
        path: PathBuf,
        /// The TOML deserialization error.
        source: toml::de::Error,
    },

    /// Failed to write the selections file to disk.
    Write {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying serialization or I/O error.
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Read { path, source } => {
                write!(f, "Failed to read selections at {}: {}", path.display(), source)
            }
            PersistenceError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse selections at {}: {}",
                    path.display(),
                    source
                )
            }
            PersistenceError::Write { path, source } => {
                write!(
                    f,
                    "Failed to write selections at {}: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl StdError for PersistenceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PersistenceError::Read { source, .. } => Some(source),
            PersistenceError::Parse { source, .. } => Some(source),
            PersistenceError::Write { source, .. } => Some(source.as_ref()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SelectionsDocument {
    #[serde(default)]
    selections: BTreeMap<String, Vec<String>>,
}

/// TOML-file-backed selection persistence.
///
/// All conversations share one document; keys are namespaced so unrelated
/// pickers can share the file. Saves rewrite the document atomically through
/// a temp file. A save failure is logged and dropped, matching the
/// fire-and-forget contract; callers that need to observe write failures can
/// call [`FilePersistence::flush`].
pub struct FilePersistence {
    path: PathBuf,
    namespace: String,
    document: SelectionsDocument,
}

impl FilePersistence {
    /// Open the document at the default per-user location.
    pub fn open(namespace: &str) -> Self {
        Self::open_at(Self::default_path(), namespace)
    }

    /// Open the document at an explicit path.
    ///
    /// A missing file starts empty; an unreadable or malformed file is
    /// logged and treated as empty rather than failing the picker.
    pub fn open_at(path: PathBuf, namespace: &str) -> Self {
        let document = match Self::read_document(&path) {
            Ok(document) => document,
            Err(err) => {
                warn!(error = %err, "ignoring unreadable selections file");
                SelectionsDocument::default()
            }
        };
        Self {
            path,
            namespace: namespace.to_string(),
            document,
        }
    }

    /// Write the current document to disk, surfacing any failure.
    pub fn flush(&self) -> Result<(), PersistenceError> {
        self.write_document()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_path() -> PathBuf {
        let proj_dirs = ProjectDirs::from("org", "permacommons", "toolpick")
            .expect("Failed to determine config directory");
        proj_dirs.config_dir().join("selections.toml")
    }

    fn key(&self, context_key: &str) -> String {
        format!("{}{}", self.namespace, context_key)
    }

    fn read_document(path: &Path) -> Result<SelectionsDocument, PersistenceError> {
        if !path.exists() {
            return Ok(SelectionsDocument::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| PersistenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| PersistenceError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_document(&self) -> Result<(), PersistenceError> {
        let write_err = |source: Box<dyn StdError + Send + Sync>| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };

        let parent = self.path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(|source| write_err(Box::new(source)))?;
        }

        let contents =
            toml::to_string_pretty(&self.document).map_err(|source| write_err(Box::new(source)))?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(|source| write_err(Box::new(source)))?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|source| write_err(Box::new(source)))?;
        temp_file
            .as_file_mut()
            .sync_all()
            .map_err(|source| write_err(Box::new(source)))?;
        temp_file
            .persist(&self.path)
            .map_err(|source| write_err(Box::new(source)))?;
        Ok(())
    }
}

impl SelectionPersistence for FilePersistence {
    fn load(&self, context_key: &str) -> Option<Vec<String>> {
        self.document.selections.get(&self.key(context_key)).cloned()
    }

    fn save(&mut self, context_key: &str, selected: &[String]) {
        self.document
            .selections
            .insert(self.key(context_key), selected.to_vec());
        if let Err(err) = self.write_document() {
            warn!(error = %err, "failed to persist selection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn missing_file_loads_as_absent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let persistence =
            FilePersistence::open_at(temp_dir.path().join("selections.toml"), "mcp-servers:");
        assert_eq!(persistence.load("c1"), None);
    }

    #[test]
    fn save_survives_reopen() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("selections.toml");

        let mut persistence = FilePersistence::open_at(path.clone(), "mcp-servers:");
        persistence.save("c1", &ids(&["time", "web"]));

        let reopened = FilePersistence::open_at(path, "mcp-servers:");
        assert_eq!(reopened.load("c1"), Some(ids(&["time", "web"])));
    }

    #[test]
    fn empty_selection_is_a_real_snapshot() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("selections.toml");

        let mut persistence = FilePersistence::open_at(path.clone(), "mcp-servers:");
        persistence.save("c1", &[]);

        let reopened = FilePersistence::open_at(path, "mcp-servers:");
        assert_eq!(reopened.load("c1"), Some(Vec::new()));
    }

    #[test]
    fn namespaces_do_not_collide() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("selections.toml");

        let mut persistence = FilePersistence::open_at(path.clone(), "mcp-servers:");
        persistence.save("c1", &ids(&["time"]));

        let other = FilePersistence::open_at(path, "prompts:");
        assert_eq!(other.load("c1"), None);
    }

    #[test]
    fn malformed_file_degrades_to_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("selections.toml");
        fs::write(&path, "not [valid toml").expect("Failed to write file");

        let persistence = FilePersistence::open_at(path, "mcp-servers:");
        assert_eq!(persistence.load("c1"), None);
    }

    #[test]
    fn flush_reports_write_failures() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        // A directory at the target path makes the atomic rename fail.
        let path = temp_dir.path().join("selections.toml");
        fs::create_dir(&path).expect("Failed to create directory");

        let mut persistence = FilePersistence::open_at(path, "mcp-servers:");
        persistence.save("c1", &ids(&["time"]));
        assert!(persistence.flush().is_err());
    }
}
