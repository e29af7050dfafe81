//! Per-output cook metadata and its JSON sidecar

use crate::content::FilePath;
use crate::error::CookResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

/// A source or sibling dependency with the timestamp it had when committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimestampedSource {
    pub source: FilePath,
    pub timestamp: u64,
}

/// A directory dependency with its recursive file count when committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectorySource {
    pub file_count: u64,
    pub source: FilePath,
}

/// Freshness record of one cooked output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CookMetadata {
    /// Modification time of the output when the record was committed
    pub cooked_timestamp: u64,
    /// Modification time of the sidecar itself, never serialized
    #[serde(skip)]
    pub metadata_timestamp: u64,
    pub cooker_version: u32,
    pub data_version: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directory_sources: Vec<DirectorySource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub siblings: Vec<TimestampedSource>,
    #[serde(default)]
    pub sources: Vec<TimestampedSource>,
}

impl CookMetadata {
    /// Read a sidecar. A missing file yields `Ok(None)`.
    pub fn load(path: &Path) -> CookResult<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let metadata = serde_json::from_str(&contents)?;
        Ok(Some(metadata))
    }

    /// Write the sidecar. The record is serialized before anything touches
    /// the disk and lands through a rename, so a failure at any point leaves
    /// the previous record in place.
    pub fn save(&self, path: &Path) -> CookResult<()> {
        let json = serde_json::to_string_pretty(self)?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(json.as_bytes())?;
        temp.flush()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Dependency descriptor reported by a cook task when committing metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookSource {
    pub path: FilePath,
    pub is_directory: bool,
    pub is_debug_only: bool,
    pub is_sibling: bool,
}

impl CookSource {
    /// A regular source file
    pub fn file(path: FilePath) -> Self {
        Self {
            path,
            is_directory: false,
            is_debug_only: false,
            is_sibling: false,
        }
    }

    /// A directory whose recursive file count is tracked. The directory's
    /// type filters which files are counted (`Unknown` counts everything).
    pub fn directory(path: FilePath) -> Self {
        Self {
            is_directory: true,
            ..Self::file(path)
        }
    }

    /// Another cooked output produced alongside the primary one
    pub fn sibling(path: FilePath) -> Self {
        Self {
            is_sibling: true,
            ..Self::file(path)
        }
    }

    pub fn debug_only(mut self) -> Self {
        self.is_debug_only = true;
        self
    }
}
