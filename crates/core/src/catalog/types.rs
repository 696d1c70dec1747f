//! Types for catalog items and their resolved metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Library name a catalog reports when it cannot name a section.
pub const UNKNOWN_LIBRARY: &str = "Unknown";

/// Whether `name` is the unknown-library placeholder. Case is ignored.
pub fn is_unknown_library(name: &str) -> bool {
    name.eq_ignore_ascii_case(UNKNOWN_LIBRARY)
}

/// Media kind reported by an item's metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MediaKind {
    Movie,
    /// TV shows. Catalogs also report these as `show`.
    Tv,
    #[default]
    Unknown,
}

impl MediaKind {
    /// Parse a catalog type label, folding the `show` synonym into `Tv`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "movie" => Self::Movie,
            "tv" | "show" => Self::Tv,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for MediaKind {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<MediaKind> for String {
    fn from(kind: MediaKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to one catalog entry.
///
/// Cheap to clone; only the metadata source knows what the key points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemHandle {
    rating_key: Arc<str>,
}

impl ItemHandle {
    pub fn new(rating_key: impl Into<String>) -> Self {
        Self {
            rating_key: Arc::from(rating_key.into()),
        }
    }

    pub fn rating_key(&self) -> &str {
        &self.rating_key
    }
}

/// An episode inside a season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub index: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// A season of a show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonRecord {
    pub index: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub episodes: Vec<EpisodeRecord>,
}

/// Resolved metadata for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub rating_key: String,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub library_name: String,
    #[serde(default)]
    pub media_kind: MediaKind,
    /// Kind-specific fields, opaque to the pipeline.
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Seasons (tv only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<SeasonRecord>,
}

impl MetadataRecord {
    /// `"{title} ({year})"`, with `Unknown` standing in for a missing year.
    pub fn full_title(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({})", self.title, year),
            None => format!("{} (Unknown)", self.title),
        }
    }

    /// Identity used to classify items within one library run.
    pub fn classification_key(&self) -> ClassificationKey {
        ClassificationKey {
            title: self.title.clone(),
            year: self.year,
            kind: self.media_kind,
        }
    }
}

/// `(title, year, kind)` identity of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassificationKey {
    pub title: String,
    pub year: Option<i32>,
    pub kind: MediaKind,
}

/// Errors enumerating a library.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog snapshot {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse catalog snapshot: {0}")]
    Parse(String),

    #[error("library not found: {0}")]
    LibraryNotFound(String),

    #[error("enumeration failed: {0}")]
    Enumeration(String),
}

/// Errors resolving an item's metadata.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("item not found: {0}")]
    NotFound(String),

    #[error("malformed metadata for {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("metadata source unavailable: {0}")]
    Unavailable(String),
}
