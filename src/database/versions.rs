//! Cooker and data versions, and the one-to-one version table

use crate::content::{ContentPaths, FileType, COOKER_VERSION};
use crate::error::CookResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Versions the current session cooks with
#[derive(Debug, Clone)]
pub struct CookVersions {
    cooker: u32,
    data_overrides: HashMap<FileType, u32>,
}

impl CookVersions {
    /// Built-in versions of this cooker
    pub fn current() -> Self {
        Self {
            cooker: COOKER_VERSION,
            data_overrides: HashMap::new(),
        }
    }

    pub fn with_cooker_version(mut self, version: u32) -> Self {
        self.cooker = version;
        self
    }

    pub fn with_data_version(mut self, file_type: FileType, version: u32) -> Self {
        self.data_overrides.insert(file_type, version);
        self
    }

    pub fn cooker_version(&self) -> u32 {
        self.cooker
    }

    pub fn data_version(&self, file_type: FileType) -> u32 {
        self.data_overrides
            .get(&file_type)
            .copied()
            .unwrap_or_else(|| file_type.data_version())
    }
}

impl Default for CookVersions {
    fn default() -> Self {
        Self::current()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeVersion {
    pub data: u32,
    pub cooker: u32,
}

/// Versions that the one-to-one outputs on disk were cooked with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTable {
    pub types: BTreeMap<FileType, TypeVersion>,
}

impl VersionTable {
    /// Table describing outputs cooked by this session
    pub fn from_versions(versions: &CookVersions) -> Self {
        let types = FileType::ALL
            .into_iter()
            .filter(|t| t.needs_cooking() && t.is_one_to_one())
            .map(|t| {
                (
                    t,
                    TypeVersion {
                        data: versions.data_version(t),
                        cooker: versions.cooker_version(),
                    },
                )
            })
            .collect();
        Self { types }
    }

    pub fn load(path: &Path) -> CookResult<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> CookResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, json)?;
        fs::rename(&temp, path)?;
        Ok(())
    }

    /// Types whose recorded version differs from `current`
    pub fn mismatched(&self, current: &VersionTable) -> HashSet<FileType> {
        current
            .types
            .iter()
            .filter(|(t, v)| self.types.get(t) != Some(v))
            .map(|(t, _)| *t)
            .collect()
    }
}

/// Reconcile the one-to-one outputs on disk with the current versions.
///
/// Returns the types that must be treated as stale for the rest of the
/// session. That set is only non-empty when stale outputs could not be
/// removed, in which case the table on disk is left untouched so the next
/// session retries.
pub fn process_one_to_one_versions(
    paths: &ContentPaths,
    versions: &CookVersions,
) -> HashSet<FileType> {
    let table_path = paths.version_data_path();
    let current = VersionTable::from_versions(versions);

    let on_disk = match VersionTable::load(&table_path) {
        Ok(table) => table,
        Err(e) => {
            // Nothing to compare against, assume the content is current.
            debug!("No usable version table at {}: {}", table_path.display(), e);
            if let Err(e) = current.save(&table_path) {
                warn!("Failed saving version table {}: {}", table_path.display(), e);
            }
            return HashSet::new();
        }
    };

    let stale = on_disk.mismatched(&current);
    if stale.is_empty() {
        return stale;
    }

    let mut names: Vec<_> = stale.iter().map(|t| t.name()).collect();
    names.sort_unstable();
    info!("Version change for one-to-one types: {}", names.join(", "));

    if delete_cooked_outputs(paths.content_dir(), &stale) {
        if let Err(e) = current.save(&table_path) {
            warn!("Failed saving version table {}: {}", table_path.display(), e);
        }
        HashSet::new()
    } else {
        stale
    }
}

fn delete_cooked_outputs(content_dir: &Path, types: &HashSet<FileType>) -> bool {
    let mut ok = true;
    for entry in WalkDir::new(content_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let matches = FileType::from_cooked_extension(&format!(".{ext}"))
            .is_some_and(|t| types.contains(&t));
        if matches {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed deleting stale output {}: {}", path.display(), e);
                ok = false;
            }
        }
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Platform;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ContentPaths) {
        let temp = TempDir::new().unwrap();
        let paths = ContentPaths::new(temp.path(), Platform::PC);
        fs::create_dir_all(paths.content_dir()).unwrap();
        (temp, paths)
    }

    #[test]
    fn test_missing_table_is_created() {
        let (_temp, paths) = setup();
        let stale = process_one_to_one_versions(&paths, &CookVersions::current());
        assert!(stale.is_empty());
        let table = VersionTable::load(&paths.version_data_path()).unwrap();
        assert_eq!(table, VersionTable::from_versions(&CookVersions::current()));
    }

    #[test]
    fn test_mismatch_deletes_outputs_of_that_type() {
        let (_temp, paths) = setup();
        VersionTable::from_versions(&CookVersions::current())
            .save(&paths.version_data_path())
            .unwrap();
        let json_out = paths.content_dir().join("a.sjz");
        let csv_out = paths.content_dir().join("b.csz");
        fs::write(&json_out, "x").unwrap();
        fs::write(&csv_out, "y").unwrap();

        let bumped = CookVersions::current().with_data_version(FileType::Json, 99);
        let stale = process_one_to_one_versions(&paths, &bumped);

        assert!(stale.is_empty());
        assert!(!json_out.exists());
        assert!(csv_out.exists());
        let table = VersionTable::load(&paths.version_data_path()).unwrap();
        assert_eq!(table.types[&FileType::Json].data, 99);
    }

    #[test]
    fn test_corrupt_table_assumes_current() {
        let (_temp, paths) = setup();
        fs::write(paths.version_data_path(), "garbage").unwrap();
        let out = paths.content_dir().join("a.sjz");
        fs::write(&out, "x").unwrap();

        let stale = process_one_to_one_versions(&paths, &CookVersions::current());
        assert!(stale.is_empty());
        assert!(out.exists());
    }

    #[test]
    fn test_mismatched_only_reports_changed_types() {
        let old = VersionTable::from_versions(&CookVersions::current());
        let new = VersionTable::from_versions(&CookVersions::current().with_cooker_version(2));
        assert_eq!(old.mismatched(&new).len(), new.types.len());
        assert!(old.mismatched(&old).is_empty());
    }
}
