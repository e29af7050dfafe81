//! Mapping between `FilePath`s and the on-disk source and content trees

use super::file_path::FilePath;
use super::file_type::{FileType, Platform};
use std::path::{Path, PathBuf};

const LOCK_FILE_NAME: &str = "CookerLock.txt";
const VERSION_DATA_NAME: &str = "version_data.json";
const METADATA_EXTENSION: &str = ".json";

/// Directory layout of a game project
///
/// ```text
/// <base>/Source/...                    authored sources
/// <base>/Data/Content/<Platform>/...   cooked outputs and metadata
/// ```
#[derive(Debug, Clone)]
pub struct ContentPaths {
    base_dir: PathBuf,
    source_dir: PathBuf,
    content_dir: PathBuf,
    platform: Platform,
}

impl ContentPaths {
    pub fn new(base_dir: impl Into<PathBuf>, platform: Platform) -> Self {
        let base_dir = base_dir.into();
        Self {
            source_dir: base_dir.join("Source"),
            content_dir: Self::expected_content_dir(&base_dir, platform),
            base_dir,
            platform,
        }
    }

    /// Override the cooked content directory
    pub fn with_content_dir(mut self, content_dir: impl Into<PathBuf>) -> Self {
        self.content_dir = content_dir.into();
        self
    }

    /// Where cooked content for a platform is expected to live
    pub fn expected_content_dir(base_dir: &Path, platform: Platform) -> PathBuf {
        base_dir.join("Data").join("Content").join(platform.name())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Whether the configured content directory is the platform's own
    pub fn content_dir_matches_platform(&self) -> bool {
        self.content_dir == Self::expected_content_dir(&self.base_dir, self.platform)
    }

    pub fn default_tools_dir(&self) -> PathBuf {
        self.base_dir.join("Tools")
    }

    pub fn lock_file_path(&self) -> PathBuf {
        self.source_dir.join(LOCK_FILE_NAME)
    }

    pub fn version_data_path(&self) -> PathBuf {
        self.content_dir.join(VERSION_DATA_NAME)
    }

    pub fn source_path(&self, path: &FilePath) -> PathBuf {
        self.source_dir.join(path.relative_source_filename())
    }

    pub fn cooked_path(&self, path: &FilePath) -> PathBuf {
        self.content_dir.join(path.relative_cooked_filename())
    }

    /// Sidecar holding the cook metadata of an output
    pub fn metadata_path(&self, path: &FilePath) -> PathBuf {
        let mut name = self.cooked_path(path).into_os_string();
        name.push(METADATA_EXTENSION);
        PathBuf::from(name)
    }

    /// Source directory named by a directory `FilePath`
    pub fn source_directory(&self, path: &FilePath) -> PathBuf {
        if path.relative().is_empty() {
            self.source_dir.clone()
        } else {
            self.source_dir.join(path.relative())
        }
    }

    /// Map a file under the source tree back to its `FilePath`
    pub fn file_path_from_source(&self, path: &Path) -> Option<FilePath> {
        let relative = path.strip_prefix(&self.source_dir).ok()?;
        FilePath::from_relative_filename(&relative.to_string_lossy())
    }

    /// Map a cooked file back to its `FilePath`
    pub fn file_path_from_cooked(&self, path: &Path) -> Option<FilePath> {
        let relative = path.strip_prefix(&self.content_dir).ok()?;
        let relative = relative.to_string_lossy().replace('\\', "/");
        let name_start = relative.rfind('/').map_or(0, |i| i + 1);
        let dot = relative[name_start..].rfind('.')? + name_start;
        let file_type = FileType::from_cooked_extension(&relative[dot..])?;
        Some(FilePath::new(&relative[..dot], file_type))
    }

    /// Whether a source path is owned by this platform's session.
    ///
    /// Files under `Generated<X>/` belong to platform X; `GeneratedLocal`
    /// is shared by every platform.
    pub fn is_owned_by_platform(&self, path: &FilePath) -> bool {
        let first = path.relative().split('/').next().unwrap_or("");
        match first.strip_prefix("Generated") {
            Some(suffix) if !suffix.is_empty() => {
                suffix.eq_ignore_ascii_case(self.platform.name())
                    || suffix.eq_ignore_ascii_case("Local")
            }
            _ => true,
        }
    }
}
