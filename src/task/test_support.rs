//! In-crate fixtures for exercising cook tasks without a full cooker

use super::context::{CookContext, ProgressUpdate};
use super::{default_out_of_date_cook, CookPriority, CookTask};
use crate::config::{CookerSettings, PackageCookConfig};
use crate::content::{ContentPaths, FilePath, FileType, Platform};
use crate::database::{CookDatabase, CookSource, CookVersions};
use crate::error::{CookError, CookResult};
use crate::scc::{NullSourceControlClient, SourceControlClient};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub(crate) struct TestContext {
    _temp: TempDir,
    settings: CookerSettings,
    database: CookDatabase,
    tools_dir: PathBuf,
    sources: Mutex<HashMap<FileType, Vec<FilePath>>>,
    progress: Mutex<Vec<ProgressUpdate>>,
    completed: Mutex<Vec<(String, bool)>>,
    scc: Arc<dyn SourceControlClient>,
    package_config: Option<PackageCookConfig>,
    workers: usize,
}

impl TestContext {
    pub(crate) fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let settings = CookerSettings::new(temp.path(), Platform::PC);
        let paths = ContentPaths::new(temp.path(), Platform::PC);
        fs::create_dir_all(paths.source_dir()).unwrap();
        fs::create_dir_all(paths.content_dir()).unwrap();
        let tools_dir = paths.default_tools_dir();
        Self {
            database: CookDatabase::new(paths, CookVersions::current(), false),
            _temp: temp,
            settings,
            tools_dir,
            sources: Mutex::new(HashMap::new()),
            progress: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            scc: Arc::new(NullSourceControlClient),
            package_config: None,
            workers: 2,
        }
    }

    pub(crate) fn with_source_control(mut self, client: Arc<dyn SourceControlClient>) -> Self {
        self.scc = client;
        self
    }

    pub(crate) fn with_package_cook_config(mut self, config: PackageCookConfig) -> Self {
        self.package_config = Some(config);
        self
    }

    pub(crate) fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub(crate) fn settings_mut(&mut self) -> &mut CookerSettings {
        &mut self.settings
    }

    /// Write a source file and register it in the index
    pub(crate) fn add_source(&self, relative: &str, file_type: FileType) -> FilePath {
        let path = FilePath::new(relative, file_type);
        self.write_source(&path, &format!("source {relative}"));
        let mut sources = self.sources.lock().unwrap();
        let list = sources.entry(file_type).or_default();
        if !list.contains(&path) {
            list.push(path.clone());
            list.sort();
        }
        path
    }

    pub(crate) fn write_source(&self, path: &FilePath, contents: &str) {
        let file = self.paths().source_path(path);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, contents).unwrap();
    }

    pub(crate) fn last_progress(&self) -> Option<ProgressUpdate> {
        self.progress.lock().unwrap().last().cloned()
    }

    pub(crate) fn completed_progress(&self) -> Vec<(String, bool)> {
        self.completed.lock().unwrap().clone()
    }
}

impl CookContext for TestContext {
    fn database(&self) -> &CookDatabase {
        &self.database
    }

    fn platform(&self) -> Platform {
        Platform::PC
    }

    fn settings(&self) -> &CookerSettings {
        &self.settings
    }

    fn source_control(&self) -> &dyn SourceControlClient {
        self.scc.as_ref()
    }

    fn source_files_of_type(&self, file_type: FileType) -> Vec<FilePath> {
        self.sources
            .lock()
            .unwrap()
            .get(&file_type)
            .cloned()
            .unwrap_or_default()
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
        let mut sources = self.sources.lock().unwrap();
        for file in files {
            let path = self
                .paths()
                .file_path_from_source(file)
                .ok_or_else(|| CookError::InvalidPath(file.clone()))?;
            let list = sources.entry(path.file_type()).or_default();
            if !list.contains(&path) {
                list.push(path);
                list.sort();
            }
        }
        Ok(())
    }

    fn remove_source_files(&self, files: &[PathBuf]) -> CookResult<()> {
        let mut sources = self.sources.lock().unwrap();
        for file in files {
            if let Some(path) = self.paths().file_path_from_source(file) {
                if let Some(list) = sources.get_mut(&path.file_type()) {
                    list.retain(|p| p != &path);
                }
            }
        }
        Ok(())
    }

    fn advance_progress(&self, update: &ProgressUpdate) {
        self.progress.lock().unwrap().push(update.clone());
    }

    fn complete_progress(&self, name: &str, _elapsed: Duration, success: bool) {
        self.completed.lock().unwrap().push((name.to_string(), success));
    }
}

/// Task that writes a marker output per file and records what it cooked
pub(crate) struct RecordingTask {
    file_type: FileType,
    parallel: bool,
    fail_on: Option<FilePath>,
    extra_sources: Vec<CookSource>,
    cooked: Mutex<Vec<FilePath>>,
    groups: Mutex<Vec<Vec<FilePath>>>,
}

impl RecordingTask {
    pub(crate) fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            parallel: false,
            fail_on: None,
            extra_sources: Vec::new(),
            cooked: Mutex::new(Vec::new()),
            groups: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub(crate) fn failing_on(mut self, path: FilePath) -> Self {
        self.fail_on = Some(path);
        self
    }

    pub(crate) fn with_extra_source(mut self, source: CookSource) -> Self {
        self.extra_sources.push(source);
        self
    }

    pub(crate) fn cooked(&self) -> Vec<FilePath> {
        self.cooked.lock().unwrap().clone()
    }

    pub(crate) fn groups(&self) -> Vec<Vec<FilePath>> {
        self.groups.lock().unwrap().clone()
    }
}

impl CookTask for RecordingTask {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn priority(&self) -> i32 {
        CookPriority::DEFAULT
    }

    fn can_cook(&self, path: &FilePath) -> bool {
        path.file_type() == self.file_type
    }

    fn cook_all_out_of_date_content(&self, ctx: &dyn CookContext) -> CookResult<()> {
        default_out_of_date_cook(self, ctx, self.file_type, self.parallel)
    }

    fn get_sources(&self, _ctx: &dyn CookContext, path: &FilePath) -> CookResult<Vec<CookSource>> {
        let mut sources = vec![CookSource::file(path.clone())];
        sources.extend(self.extra_sources.iter().cloned());
        Ok(sources)
    }

    fn internal_cook(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<()> {
        if self.fail_on.as_ref() == Some(path) {
            return Err(CookError::task(path, "injected failure"));
        }
        let output = ctx.paths().cooked_path(path);
        fs::create_dir_all(output.parent().unwrap())?;
        fs::write(&output, format!("cooked {}", path))?;
        self.cooked.lock().unwrap().push(path.clone());
        Ok(())
    }

    fn internal_cook_multi(&self, ctx: &dyn CookContext, paths: &[FilePath]) -> CookResult<()> {
        self.groups.lock().unwrap().push(paths.to_vec());
        for path in paths {
            self.internal_cook(ctx, path)?;
        }
        Ok(())
    }
}
