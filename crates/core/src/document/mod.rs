//! The consolidated metadata document persisted once per media kind.
//!
//! Layout on disk is `{metadata_dir}/{kind}_metadata.yml`:
//!
//! ```yaml
//! metadata:
//!   Alien (1979):
//!     title: Alien
//!     year: 1979
//! ```
//!
//! Entries are merged field by field. Entries a run never touches are carried
//! over exactly as loaded.

mod handle;

pub use handle::DocumentHandle;

use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::catalog::MediaKind;

const METADATA_KEY: &str = "metadata";

/// Errors reading or writing a consolidated document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Failed to read the document file.
    #[error("Failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML.
    #[error("Failed to parse document: {0}")]
    Parse(String),

    /// Valid YAML, wrong shape.
    #[error("Malformed document: {0}")]
    Malformed(String),

    /// Failed to create the output directory.
    #[error("Failed to create directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize the document.
    #[error("Failed to serialize document: {0}")]
    Serialize(String),

    /// Failed to write the document file.
    #[error("Failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the document for `kind` lives under `metadata_dir`.
pub fn output_path(metadata_dir: &Path, kind: MediaKind) -> PathBuf {
    metadata_dir.join(format!("{}_metadata.yml", kind.as_str()))
}

/// Document key for an item: `"{title} ({year})"`.
pub fn entry_key(title: &str, year: Option<i32>) -> String {
    match year {
        Some(year) => format!("{} ({})", title, year),
        None => format!("{} (Unknown)", title),
    }
}

/// The consolidated metadata document.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedDocument {
    root: Mapping,
}

impl Default for ConsolidatedDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolidatedDocument {
    /// An empty document: `{metadata: {}}`.
    pub fn new() -> Self {
        let mut root = Mapping::new();
        root.insert(metadata_key(), Value::Mapping(Mapping::new()));
        Self { root }
    }

    /// Parse a document. Empty input yields an empty document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DocumentError> {
        let value: Value =
            serde_yaml::from_str(yaml).map_err(|e| DocumentError::Parse(e.to_string()))?;

        let mut root = match value {
            Value::Null => return Ok(Self::new()),
            Value::Mapping(root) if root.is_empty() => return Ok(Self::new()),
            Value::Mapping(root) => root,
            _ => {
                return Err(DocumentError::Malformed(
                    "top level is not a mapping".to_string(),
                ))
            }
        };

        match root.get(METADATA_KEY) {
            None | Some(Value::Null) => {
                root.insert(metadata_key(), Value::Mapping(Mapping::new()));
            }
            Some(Value::Mapping(_)) => {}
            Some(_) => {
                return Err(DocumentError::Malformed(
                    "`metadata` is not a mapping".to_string(),
                ))
            }
        }

        Ok(Self { root })
    }

    /// Load the document at `path`, or `None` when no file exists yet.
    pub async fn load(path: &Path) -> Result<Option<Self>, DocumentError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(DocumentError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_yaml_str(&raw).map(Some)
    }

    pub fn to_yaml_string(&self) -> Result<String, DocumentError> {
        serde_yaml::to_string(&self.root).map_err(|e| DocumentError::Serialize(e.to_string()))
    }

    /// Write the document, creating parent directories as needed.
    ///
    /// The file is written next to its destination and renamed into place, so
    /// a failed write never leaves a truncated document behind.
    pub async fn save(&self, path: &Path) -> Result<(), DocumentError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| DocumentError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let yaml = self.to_yaml_string()?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, yaml)
            .await
            .map_err(|source| DocumentError::Write {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|source| DocumentError::Write {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(())
    }

    fn metadata(&self) -> Option<&Mapping> {
        self.root.get(METADATA_KEY).and_then(Value::as_mapping)
    }

    fn metadata_mut(&mut self) -> &mut Mapping {
        let needs_reset = !matches!(self.root.get(METADATA_KEY), Some(Value::Mapping(_)));
        if needs_reset {
            self.root
                .insert(metadata_key(), Value::Mapping(Mapping::new()));
        }
        match self.root.get_mut(METADATA_KEY) {
            Some(Value::Mapping(metadata)) => metadata,
            _ => unreachable!("metadata mapping inserted above"),
        }
    }

    /// Merge `fields` into the entry at `key`.
    ///
    /// Fields already on the entry but absent from `fields` are kept.
    pub fn merge_entry(&mut self, key: &str, fields: Mapping) {
        let metadata = self.metadata_mut();
        let key = Value::String(key.to_string());
        match metadata.get_mut(&key) {
            Some(Value::Mapping(existing)) => {
                for (field, value) in fields {
                    existing.insert(field, value);
                }
            }
            _ => {
                metadata.insert(key, Value::Mapping(fields));
            }
        }
    }

    pub fn entry(&self, key: &str) -> Option<&Mapping> {
        self.metadata()
            .and_then(|m| m.get(key))
            .and_then(Value::as_mapping)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.metadata().is_some_and(|m| m.contains_key(key))
    }

    /// Entry keys in document order.
    pub fn keys(&self) -> Vec<String> {
        self.metadata()
            .map(|m| {
                m.keys()
                    .filter_map(|k| k.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of entries under `metadata`.
    pub fn len(&self) -> usize {
        self.metadata().map_or(0, Mapping::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole document, including any top-level keys besides `metadata`.
    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }
}

fn metadata_key() -> Value {
    Value::String(METADATA_KEY.to_string())
}
