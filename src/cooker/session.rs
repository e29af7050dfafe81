//! A constructed cook session: everything tasks need, plus the lock

use super::lock::CookerLock;
use super::progress::ProgressReporter;
use super::source_index::SourceIndex;
use crate::config::{CookerSettings, PackageCookConfig};
use crate::content::{FilePath, FileType, Platform};
use crate::database::{CookDatabase, CookVersions};
use crate::error::{CookError, CookResult};
use crate::scc::{NullSourceControlClient, PerforceClient, SourceControlClient};
use crate::task::parallel::host_parallelism;
use crate::task::{CookContext, CookTask, ProgressUpdate};
use crate::tasks::TaskRegistry;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Inputs of session construction besides the settings
pub struct SessionOptions {
    pub registry: TaskRegistry,
    pub versions: CookVersions,
    /// Overrides the client chosen from the settings
    pub source_control: Option<Arc<dyn SourceControlClient>>,
    pub progress: bool,
    /// Forward source changes to the database while the session lives
    pub watch_sources: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            registry: TaskRegistry::builtin(),
            versions: CookVersions::current(),
            source_control: None,
            progress: false,
            watch_sources: false,
        }
    }
}

pub struct CookerSession {
    settings: CookerSettings,
    database: Arc<CookDatabase>,
    index: RwLock<SourceIndex>,
    source_control: Arc<dyn SourceControlClient>,
    package_config: Option<PackageCookConfig>,
    tasks: Vec<Box<dyn CookTask>>,
    progress: ProgressReporter,
    tools_dir: PathBuf,
    workers: usize,
    // Declared last so it is released after everything else.
    _lock: CookerLock,
}

fn check_cancel(cancel: &AtomicBool) -> CookResult<()> {
    if cancel.load(Ordering::Acquire) {
        Err(CookError::Cancelled)
    } else {
        Ok(())
    }
}

impl CookerSession {
    /// Build a session step by step, failing at the first step that fails.
    /// `cancel` is checked between steps and while waiting for the lock;
    /// anything built so far is released on failure.
    pub fn construct(
        settings: CookerSettings,
        options: SessionOptions,
        cancel: &AtomicBool,
    ) -> CookResult<Self> {
        let paths = settings.content_paths();
        let single = settings.is_single_file();

        let lock = CookerLock::acquire(&paths.lock_file_path(), &settings.lock, cancel)?;
        check_cancel(cancel)?;

        let package_config = settings
            .package_cook_config
            .as_deref()
            .map(PackageCookConfig::load)
            .transpose()?;
        check_cancel(cancel)?;

        let source_control: Arc<dyn SourceControlClient> = match options.source_control {
            Some(client) => client,
            None => match settings.active_p4() {
                Some(p4) => Arc::new(PerforceClient::new(p4.clone())),
                None => Arc::new(NullSourceControlClient),
            },
        };
        debug!("Using {} source control", source_control.name());
        check_cancel(cancel)?;

        let database = Arc::new(CookDatabase::new(paths.clone(), options.versions, !single));
        if options.watch_sources {
            if let Err(e) = database.watch_sources() {
                warn!("Source changes will not be tracked: {}", e);
            }
        }
        check_cancel(cancel)?;

        let index = if single {
            SourceIndex::empty()
        } else {
            SourceIndex::build(&paths, cancel)?
        };
        check_cancel(cancel)?;

        let tasks = options.registry.instantiate();
        info!(
            "{} session ready: {} source files, {} tasks",
            settings.platform,
            index.len(),
            tasks.len()
        );

        Ok(Self {
            tools_dir: settings.tools_dir(),
            workers: settings.workers.unwrap_or_else(host_parallelism),
            settings,
            database,
            index: RwLock::new(index),
            source_control,
            package_config,
            tasks,
            progress: ProgressReporter::new(options.progress),
            _lock: lock,
        })
    }

    pub fn tasks(&self) -> &[Box<dyn CookTask>] {
        &self.tasks
    }

    pub fn database_handle(&self) -> Arc<CookDatabase> {
        self.database.clone()
    }

    fn read_index(&self) -> RwLockReadGuard<'_, SourceIndex> {
        self.index.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, SourceIndex> {
        self.index.write().unwrap_or_else(|e| e.into_inner())
    }

    fn validate_content_dir(&self) -> CookResult<()> {
        let paths = self.paths();
        if paths.content_dir_matches_platform() {
            return Ok(());
        }
        Err(CookError::environment(format!(
            "Content directory {} is not the {} content directory {}",
            paths.content_dir().display(),
            self.platform(),
            crate::content::ContentPaths::expected_content_dir(paths.base_dir(), self.platform())
                .display()
        )))
    }

    /// Validate the environment for every task, then run every task in
    /// priority order, stopping at the first failure.
    pub fn cook_all(&self) -> CookResult<()> {
        self.validate_content_dir()?;

        for task in &self.tasks {
            if let Err(e) = task.validate_content_environment(self) {
                error!("{}: invalid content environment: {}", self.progress_name(task.name()), e);
                return Err(e);
            }
        }

        for task in &self.tasks {
            debug!("Running {}", self.progress_name(task.name()));
            if let Err(e) = task.cook_all_out_of_date_content(self) {
                error!("{}: {}", self.progress_name(task.name()), e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Map a source file, absolute or relative to the source directory,
    /// to its `FilePath`
    pub fn resolve_source(&self, source: &Path) -> CookResult<FilePath> {
        let absolute = if source.is_absolute() {
            source.to_path_buf()
        } else {
            self.paths().source_dir().join(source)
        };
        self.paths()
            .file_path_from_source(&absolute)
            .ok_or_else(|| CookError::InvalidPath(source.to_path_buf()))
    }

    /// Hand one file to the first task, in priority order, that accepts it
    pub fn cook_single(&self, source: &Path) -> CookResult<()> {
        self.validate_content_dir()?;
        let path = self.resolve_source(source)?;

        let task = self
            .tasks
            .iter()
            .find(|t| t.can_cook(&path))
            .ok_or_else(|| CookError::NoTaskForFile(path.to_string()))?;
        info!("{}: cooking {}", self.progress_name(task.name()), path);
        task.cook_single(self, &path)
    }
}

impl CookContext for CookerSession {
    fn database(&self) -> &CookDatabase {
        &self.database
    }

    fn platform(&self) -> Platform {
        self.settings.platform
    }

    fn settings(&self) -> &CookerSettings {
        &self.settings
    }

    fn source_control(&self) -> &dyn SourceControlClient {
        self.source_control.as_ref()
    }

    fn source_files_of_type(&self, file_type: FileType) -> Vec<FilePath> {
        self.read_index().files_of_type(file_type)
    }

    fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    fn package_cook_config(&self) -> Option<&PackageCookConfig> {
        self.package_config.as_ref()
    }

    fn worker_count(&self) -> usize {
        self.workers
    }

    fn amend_source_files(&self, files: &[PathBuf]) -> CookResult<()> {
        let paths = self.database.paths();
        self.write_index().amend(paths, files)?;
        for file in files {
            if let Some(path) = paths.file_path_from_source(file) {
                self.database.manual_on_file_change(&path);
            }
        }
        Ok(())
    }

    fn remove_source_files(&self, files: &[PathBuf]) -> CookResult<()> {
        let paths = self.database.paths();
        self.write_index().remove_files(paths, files);
        for file in files {
            if let Some(path) = paths.file_path_from_source(file) {
                self.database.manual_on_file_change(&path);
            }
        }
        Ok(())
    }

    fn advance_progress(&self, update: &ProgressUpdate) {
        self.progress.advance(update);
    }

    fn complete_progress(&self, name: &str, elapsed: Duration, success: bool) {
        self.progress.complete(name, elapsed, success);
    }
}
