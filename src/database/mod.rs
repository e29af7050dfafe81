//! Cook database
//!
//! Answers "is this output current?" and "what depends on this file?".
//! Metadata-tracked outputs carry a JSON sidecar next to the cooked file;
//! one-to-one outputs are checked by timestamp against their single source
//! plus a global per-type version.

pub mod metadata;
pub mod versions;
pub mod watcher;

pub use metadata::{CookMetadata, CookSource, DirectorySource, TimestampedSource};
pub use versions::{CookVersions, VersionTable};

use crate::content::{modified_time, ContentPaths, FilePath, FileType};
use crate::error::{CookError, CookResult};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use walkdir::WalkDir;
use watcher::SourceWatcher;

/// Result of a detailed freshness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    UpToDate,
    /// A global condition fired (versions, tampered output or metadata,
    /// missing record); every dependency must be treated as stale.
    StaleGlobal,
    /// The listed sources, siblings or directories changed
    Stale(Vec<FilePath>),
}

impl Freshness {
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Freshness::UpToDate)
    }

    /// Changed dependencies; empty for up-to-date and global staleness
    pub fn changed(&self) -> &[FilePath] {
        match self {
            Freshness::Stale(changed) => changed,
            _ => &[],
        }
    }
}

#[derive(Default)]
struct DatabaseState {
    /// Outputs last seen up to date; stale results are never memoized
    up_to_date: HashSet<FilePath>,
    /// Bumped on every invalidation
    generation: u64,
    metadata: HashMap<FilePath, CookMetadata>,
    /// source -> outputs that list it in `sources`
    dependents: HashMap<FilePath, HashSet<FilePath>>,
    /// directory -> outputs that list it in `directory_sources`
    directory_dependents: HashMap<FilePath, HashSet<FilePath>>,
}

impl DatabaseState {
    fn add_dependents(&mut self, output: &FilePath, metadata: &CookMetadata) {
        for source in &metadata.sources {
            self.dependents
                .entry(normalized(&source.source))
                .or_default()
                .insert(output.clone());
        }
        for dir in &metadata.directory_sources {
            self.directory_dependents
                .entry(dir.source.clone())
                .or_default()
                .insert(output.clone());
        }
    }

    fn remove_dependents(&mut self, output: &FilePath, metadata: &CookMetadata) {
        for source in &metadata.sources {
            let key = normalized(&source.source);
            if let Some(set) = self.dependents.get_mut(&key) {
                set.remove(output);
                if set.is_empty() {
                    self.dependents.remove(&key);
                }
            }
        }
        for dir in &metadata.directory_sources {
            if let Some(set) = self.directory_dependents.get_mut(&dir.source) {
                set.remove(output);
                if set.is_empty() {
                    self.directory_dependents.remove(&dir.source);
                }
            }
        }
    }

    fn invalidate(&mut self, path: &FilePath) {
        self.generation += 1;
        self.up_to_date.remove(path);
        if let Some(old) = self.metadata.remove(path) {
            self.remove_dependents(path, &old);
        }
    }
}

fn normalized(path: &FilePath) -> FilePath {
    path.with_type(path.file_type().normalized())
}

/// Persisted dependency and freshness store for one platform's content
pub struct CookDatabase {
    paths: ContentPaths,
    versions: CookVersions,
    /// One-to-one types whose outputs could not be reconciled this session
    stale_types: HashSet<FileType>,
    state: Mutex<DatabaseState>,
    watcher: Mutex<Option<SourceWatcher>>,
}

impl CookDatabase {
    /// Create the database. When `process_one_to_one_versions` is set the
    /// one-to-one version table is reconciled first, which may delete
    /// stale cooked outputs.
    pub fn new(paths: ContentPaths, versions: CookVersions, process_one_to_one: bool) -> Self {
        let stale_types = if process_one_to_one {
            versions::process_one_to_one_versions(&paths, &versions)
        } else {
            HashSet::new()
        };

        Self {
            paths,
            versions,
            stale_types,
            state: Mutex::new(DatabaseState::default()),
            watcher: Mutex::new(None),
        }
    }

    pub fn paths(&self) -> &ContentPaths {
        &self.paths
    }

    pub fn versions(&self) -> &CookVersions {
        &self.versions
    }

    fn lock(&self) -> MutexGuard<'_, DatabaseState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start forwarding filesystem changes under the source directory to
    /// [`CookDatabase::on_file_change`].
    pub fn watch_sources(self: &Arc<Self>) -> CookResult<()> {
        let watcher = SourceWatcher::start(Arc::downgrade(self), self.paths.source_dir())?;
        *self.watcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(watcher);
        Ok(())
    }

    pub fn check_up_to_date(&self, path: &FilePath) -> bool {
        if self.lock().up_to_date.contains(path) {
            return true;
        }
        self.check_up_to_date_with_details(path).is_up_to_date()
    }

    /// Full freshness check that also reports which dependencies changed
    pub fn check_up_to_date_with_details(&self, path: &FilePath) -> Freshness {
        let generation = self.lock().generation;
        let freshness = if path.file_type().is_one_to_one() {
            self.check_one_to_one(path)
        } else {
            self.check_metadata(path)
        };

        self.memoize(path, &freshness, generation);
        freshness
    }

    /// Remember an up-to-date result unless something was invalidated
    /// while it was being computed.
    fn memoize(&self, path: &FilePath, freshness: &Freshness, generation: u64) {
        let mut state = self.lock();
        if freshness.is_up_to_date() && state.generation == generation {
            state.up_to_date.insert(path.clone());
        }
    }

    fn check_one_to_one(&self, path: &FilePath) -> Freshness {
        if self.stale_types.contains(&path.file_type()) {
            return Freshness::Stale(vec![path.clone()]);
        }

        let source = modified_time(&self.paths.source_path(path));
        let output = modified_time(&self.paths.cooked_path(path));
        if output == 0 || source > output {
            Freshness::Stale(vec![path.clone()])
        } else {
            Freshness::UpToDate
        }
    }

    fn check_metadata(&self, path: &FilePath) -> Freshness {
        let metadata = self.resolve_metadata(path);
        let file_type = path.file_type();

        if metadata.cooker_version != self.versions.cooker_version()
            || metadata.data_version != self.versions.data_version(file_type)
            || metadata.sources.is_empty()
        {
            return Freshness::StaleGlobal;
        }

        if modified_time(&self.paths.cooked_path(path)) != metadata.cooked_timestamp {
            return Freshness::StaleGlobal;
        }

        if modified_time(&self.paths.metadata_path(path)) != metadata.metadata_timestamp {
            // Edited behind our back, force a re-read next time.
            self.lock().invalidate(path);
            return Freshness::StaleGlobal;
        }

        let mut changed = Vec::new();
        for source in &metadata.sources {
            if modified_time(&self.paths.source_path(&source.source)) != source.timestamp {
                changed.push(source.source.clone());
            }
        }
        for sibling in &metadata.siblings {
            let current = modified_time(&self.paths.cooked_path(&sibling.source));
            if current == 0 || current != sibling.timestamp {
                changed.push(sibling.source.clone());
            }
        }
        for dir in &metadata.directory_sources {
            if self.directory_file_count(&dir.source) != dir.file_count {
                changed.push(dir.source.clone());
            }
        }

        if changed.is_empty() {
            Freshness::UpToDate
        } else {
            Freshness::Stale(changed)
        }
    }

    /// Cached metadata for an output, read from disk on first use.
    ///
    /// The disk read happens outside the lock; two threads resolving the
    /// same path may both read it.
    pub fn resolve_metadata(&self, path: &FilePath) -> CookMetadata {
        if let Some(metadata) = self.lock().metadata.get(path) {
            return metadata.clone();
        }

        let metadata = self.read_metadata(path);

        let mut state = self.lock();
        if !state.metadata.contains_key(path) {
            state.add_dependents(path, &metadata);
            state.metadata.insert(path.clone(), metadata.clone());
        }
        metadata
    }

    fn read_metadata(&self, path: &FilePath) -> CookMetadata {
        let sidecar = self.paths.metadata_path(path);
        let metadata_timestamp = modified_time(&sidecar);
        match CookMetadata::load(&sidecar) {
            Ok(Some(metadata)) => CookMetadata {
                metadata_timestamp,
                ..metadata
            },
            Ok(None) => CookMetadata::default(),
            Err(e) => {
                warn!("Discarding unreadable metadata {}: {}", sidecar.display(), e);
                CookMetadata::default()
            }
        }
    }

    /// Replace the stored record of `output` with one built from `sources`.
    ///
    /// One-to-one outputs keep no record and return immediately. On success
    /// the output is considered up to date and the dependency indices point
    /// at the new source set.
    pub fn update_metadata(
        &self,
        output: &FilePath,
        cooked_timestamp: u64,
        sources: &[CookSource],
    ) -> CookResult<()> {
        if output.file_type().is_one_to_one() {
            return Ok(());
        }

        let mut metadata = CookMetadata {
            cooked_timestamp,
            metadata_timestamp: 0,
            cooker_version: self.versions.cooker_version(),
            data_version: self.versions.data_version(output.file_type()),
            ..CookMetadata::default()
        };

        for source in sources {
            let path = normalized(&source.path);
            if source.is_directory {
                metadata.directory_sources.push(DirectorySource {
                    file_count: self.directory_file_count(&path),
                    source: path,
                });
            } else if source.is_sibling {
                metadata.siblings.push(TimestampedSource {
                    timestamp: modified_time(&self.paths.cooked_path(&path)),
                    source: path,
                });
            } else {
                metadata.sources.push(TimestampedSource {
                    timestamp: modified_time(&self.paths.source_path(&path)),
                    source: path,
                });
            }
        }

        if metadata.sources.is_empty() {
            return Err(CookError::bug(format!(
                "{} committed metadata without any sources",
                output
            )));
        }

        let sidecar = self.paths.metadata_path(output);
        let mut state = self.lock();
        metadata.save(&sidecar)?;
        metadata.metadata_timestamp = modified_time(&sidecar);

        if let Some(old) = state.metadata.remove(output) {
            state.remove_dependents(output, &old);
        }
        state.add_dependents(output, &metadata);
        state.metadata.insert(output.clone(), metadata);
        state.up_to_date.insert(output.clone());
        Ok(())
    }

    /// Drop cached state for a path the caller just changed
    pub fn manual_on_file_change(&self, path: &FilePath) {
        self.on_file_change(path);
    }

    /// Change notification: invalidate the path and its direct dependents
    pub fn on_file_change(&self, path: &FilePath) {
        let changed: Vec<FilePath> = if path.file_type().is_texture() {
            FileType::TEXTURES.iter().map(|t| path.with_type(*t)).collect()
        } else {
            vec![path.clone()]
        };

        let mut state = self.lock();
        let mut dependents = Vec::new();
        if let Some(set) = state.dependents.get(&normalized(path)) {
            dependents.extend(set.iter().cloned());
        }
        for changed_path in changed.iter().chain(dependents.iter()) {
            state.invalidate(changed_path);
        }
        debug!(
            "Invalidated {} and {} dependents",
            path,
            dependents.len()
        );
    }

    /// Outputs that directly declared `source`, or a directory containing
    /// it, as a dependency.
    pub fn get_dependents(&self, source: &FilePath) -> Vec<FilePath> {
        let key = normalized(source);
        let state = self.lock();

        let mut out: HashSet<FilePath> = state
            .dependents
            .get(&key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();

        for (dir, outputs) in &state.directory_dependents {
            let type_matches = dir.file_type() == FileType::Unknown
                || dir.file_type() == source.file_type();
            if type_matches && source.is_under_directory(dir.relative()) {
                out.extend(outputs.iter().cloned());
            }
        }

        out.remove(source);
        let mut out: Vec<FilePath> = out.into_iter().collect();
        out.sort();
        out
    }

    /// Recursive count of files under a directory source
    pub fn directory_file_count(&self, dir: &FilePath) -> u64 {
        count_files(&self.paths.source_directory(dir), dir.file_type())
    }
}

fn count_files(dir: &Path, filter: FileType) -> u64 {
    let ext = filter.source_extension();
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            filter == FileType::Unknown
                || e.file_name()
                    .to_string_lossy()
                    .to_ascii_lowercase()
                    .ends_with(ext)
        })
        .count() as u64
}
