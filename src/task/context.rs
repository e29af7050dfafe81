//! Session facade handed to every cook task

use crate::config::{CookerSettings, PackageCookConfig};
use crate::content::{ContentPaths, FilePath, FileType, Platform};
use crate::database::CookDatabase;
use crate::error::CookResult;
use crate::scc::{FileTypeOptions, SourceControlClient};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Snapshot of a running batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// `<platform>-<task>`
    pub name: String,
    /// Claimed but not yet finished items
    pub active: usize,
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

/// Services a cook task may use during a session
pub trait CookContext: Send + Sync {
    fn database(&self) -> &CookDatabase;

    fn platform(&self) -> Platform;

    fn paths(&self) -> &ContentPaths {
        self.database().paths()
    }

    fn settings(&self) -> &CookerSettings;

    /// Whether this session also cooks debug-only content
    fn cook_debug_only(&self) -> bool {
        self.settings().debug_only
    }

    fn source_control(&self) -> &dyn SourceControlClient;

    fn source_control_file_type_options(
        &self,
        needs_exclusive_lock: bool,
        long_life: bool,
    ) -> FileTypeOptions {
        FileTypeOptions::cooked(needs_exclusive_lock, long_life)
    }

    /// Known source files of a type, sorted
    fn source_files_of_type(&self, file_type: FileType) -> Vec<FilePath>;

    fn tools_dir(&self) -> &Path;

    fn package_cook_config(&self) -> Option<&PackageCookConfig>;

    /// Helper threads for parallel batches (the calling thread also works)
    fn worker_count(&self) -> usize;

    /// Register source files a task generated during its cook
    fn amend_source_files(&self, files: &[PathBuf]) -> CookResult<()>;

    /// Forget source files a task deleted during its cook
    fn remove_source_files(&self, files: &[PathBuf]) -> CookResult<()>;

    fn advance_progress(&self, update: &ProgressUpdate);

    fn complete_progress(&self, name: &str, elapsed: Duration, success: bool);

    /// Progress key for a task in this session
    fn progress_name(&self, task_name: &str) -> String {
        format!("{}-{}", self.platform(), task_name)
    }
}
