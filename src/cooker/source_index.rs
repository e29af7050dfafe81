//! Index of the source files a session knows about, by type

use crate::content::{is_valid_content_path, ContentPaths, FilePath, FileType};
use crate::error::{CookError, CookResult};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, trace};
use walkdir::WalkDir;

const CANCEL_CHECK_EVERY: usize = 256;

/// Source files grouped by type, each group sorted.
///
/// A texture source is listed under every texture level.
#[derive(Debug, Default)]
pub struct SourceIndex {
    by_type: HashMap<FileType, Vec<FilePath>>,
    known: HashSet<FilePath>,
}

fn expand(path: FilePath) -> Vec<FilePath> {
    if path.file_type().is_texture() {
        FileType::TEXTURES.iter().map(|t| path.with_type(*t)).collect()
    } else {
        vec![path]
    }
}

impl SourceIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Walk the source directory once. Files with an unknown extension are
    /// ignored; a known file at an invalid content path fails the build.
    pub fn build(paths: &ContentPaths, cancel: &AtomicBool) -> CookResult<Self> {
        let mut index = Self::empty();
        let lock_file = paths.lock_file_path();
        let mut invalid = Vec::new();

        for (n, entry) in WalkDir::new(paths.source_dir())
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .enumerate()
        {
            if n % CANCEL_CHECK_EVERY == 0 && cancel.load(Ordering::Acquire) {
                return Err(CookError::Cancelled);
            }
            if entry.path() == lock_file {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(paths.source_dir()) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            let Some(path) = FilePath::from_relative_filename(&relative) else {
                trace!("Ignoring {}", relative);
                continue;
            };
            if !is_valid_content_path(&relative) {
                error!("Invalid content path: {}", relative);
                invalid.push(entry.path().to_path_buf());
                continue;
            }
            index.insert(path);
        }

        if let Some(first) = invalid.first() {
            if invalid.len() > 1 {
                error!("{} source files have invalid paths", invalid.len());
            }
            return Err(CookError::InvalidPath(first.clone()));
        }

        debug!("Indexed {} source files", index.known.len());
        Ok(index)
    }

    fn insert(&mut self, path: FilePath) {
        for path in expand(path) {
            if !self.known.insert(path.clone()) {
                continue;
            }
            let list = self.by_type.entry(path.file_type()).or_default();
            if let Err(at) = list.binary_search(&path) {
                list.insert(at, path);
            }
        }
    }

    fn remove(&mut self, path: FilePath) {
        for path in expand(path) {
            if !self.known.remove(&path) {
                continue;
            }
            if let Some(list) = self.by_type.get_mut(&path.file_type()) {
                if let Ok(at) = list.binary_search(&path) {
                    list.remove(at);
                }
            }
        }
    }

    pub fn files_of_type(&self, file_type: FileType) -> Vec<FilePath> {
        self.by_type.get(&file_type).cloned().unwrap_or_default()
    }

    pub fn contains(&self, path: &FilePath) -> bool {
        self.known.contains(path)
    }

    /// Entries, counting each texture level
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Add files generated during a cook
    pub fn amend(&mut self, paths: &ContentPaths, files: &[PathBuf]) -> CookResult<()> {
        for file in files {
            let path = paths
                .file_path_from_source(file)
                .ok_or_else(|| CookError::InvalidPath(file.clone()))?;
            self.insert(path);
        }
        Ok(())
    }

    /// Forget files deleted during a cook; unknown files are ignored
    pub fn remove_files(&mut self, paths: &ContentPaths, files: &[PathBuf]) {
        for file in files {
            if let Some(path) = paths.file_path_from_source(file) {
                self.remove(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Platform;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> (TempDir, ContentPaths) {
        let temp = TempDir::new().unwrap();
        let paths = ContentPaths::new(temp.path(), Platform::PC);
        let source = paths.source_dir().to_path_buf();
        for file in [
            "UI/menu.json",
            "UI/atlas.png",
            "Scripts/b.lua",
            "Scripts/a.lua",
            "notes.unknown",
            "CookerLock.txt",
        ] {
            let path = source.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }
        (temp, paths)
    }

    #[test]
    fn test_build_groups_and_sorts() {
        let (_temp, paths) = tree();
        let index = SourceIndex::build(&paths, &AtomicBool::new(false)).unwrap();

        assert_eq!(
            index.files_of_type(FileType::Script),
            vec![
                FilePath::new("Scripts/a", FileType::Script),
                FilePath::new("Scripts/b", FileType::Script)
            ]
        );
        for level in FileType::TEXTURES {
            assert_eq!(index.files_of_type(level), vec![FilePath::new("UI/atlas", level)]);
        }
        // The lock file is not a text source.
        assert!(index.files_of_type(FileType::Text).is_empty());
        assert_eq!(index.len(), 1 + 5 + 2);
    }

    #[test]
    fn test_invalid_path_fails_build() {
        let (_temp, paths) = tree();
        fs::write(paths.source_dir().join("UI/bad name .json"), "x").unwrap();
        let err = SourceIndex::build(&paths, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, CookError::InvalidPath(_)));
    }

    #[test]
    fn test_cancelled_build() {
        let (_temp, paths) = tree();
        let err = SourceIndex::build(&paths, &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, CookError::Cancelled));
    }

    #[test]
    fn test_amend_and_remove() {
        let (_temp, paths) = tree();
        let mut index = SourceIndex::build(&paths, &AtomicBool::new(false)).unwrap();
        let generated = paths.source_dir().join("GeneratedPC/Scripts/gen.lua");

        index.amend(&paths, &[generated.clone(), generated.clone()]).unwrap();
        let scripts = index.files_of_type(FileType::Script);
        assert_eq!(scripts.len(), 3);
        assert_eq!(scripts[0], FilePath::new("GeneratedPC/Scripts/gen", FileType::Script));

        index.remove_files(&paths, &[generated, paths.source_dir().join("UI/atlas.png")]);
        assert_eq!(index.files_of_type(FileType::Script).len(), 2);
        assert!(index.files_of_type(FileType::Texture4).is_empty());

        let outside = PathBuf::from("/elsewhere/a.lua");
        assert!(index.amend(&paths, &[outside]).is_err());
    }
}
