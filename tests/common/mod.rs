//! Common test utilities and helpers
#![allow(dead_code)]

use anyhow::Result;
use assetcook::config::{CookerSettings, LockSettings};
use assetcook::content::{set_modified_time, ContentPaths, Platform};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// 2020-09-13, a fixed time older than anything a test writes
pub const T0: u64 = 1_600_000_000_000_000_000;
pub const SECOND: u64 = 1_000_000_000;

/// Builder for a project tree with `Source/` and platform content
pub struct TestProjectBuilder {
    temp_dir: TempDir,
    platform: Platform,
    sources: Vec<(PathBuf, String)>,
}

impl TestProjectBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            platform: Platform::PC,
            sources: Vec::new(),
        })
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Add a source file, relative to `Source/`
    pub fn with_source(mut self, path: impl AsRef<Path>, content: &str) -> Self {
        self.sources
            .push((path.as_ref().to_path_buf(), content.to_string()));
        self
    }

    pub fn build(self) -> Result<TestProject> {
        let project = TestProject {
            temp_dir: self.temp_dir,
            platform: self.platform,
        };
        fs::create_dir_all(project.paths().source_dir())?;
        fs::create_dir_all(project.paths().content_dir())?;
        for (path, content) in self.sources {
            project.write_source(path, &content)?;
        }
        Ok(project)
    }
}

/// A project tree in a temporary directory
pub struct TestProject {
    temp_dir: TempDir,
    platform: Platform,
}

impl TestProject {
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn paths(&self) -> ContentPaths {
        ContentPaths::new(self.path(), self.platform)
    }

    /// Settings for a local session with quick lock polling
    pub fn settings(&self) -> CookerSettings {
        let mut settings = CookerSettings::new(self.path(), self.platform);
        settings.lock = fast_lock();
        settings.workers = Some(2);
        settings
    }

    pub fn source(&self, path: impl AsRef<Path>) -> PathBuf {
        self.paths().source_dir().join(path)
    }

    pub fn content(&self, path: impl AsRef<Path>) -> PathBuf {
        self.paths().content_dir().join(path)
    }

    pub fn write_source(&self, path: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let full_path = self.source(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, content)?;
        Ok(full_path)
    }

    pub fn read_content(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        Ok(fs::read(self.content(path))?)
    }

    pub fn content_exists(&self, path: impl AsRef<Path>) -> bool {
        self.content(path).exists()
    }

    /// Set a source file's modification time
    pub fn touch_source(&self, path: impl AsRef<Path>, timestamp: u64) -> Result<()> {
        set_modified_time(&self.source(path), timestamp)?;
        Ok(())
    }
}

pub fn fast_lock() -> LockSettings {
    LockSettings {
        poll_interval: Duration::from_millis(10),
        max_wait: Duration::from_millis(200),
        log_every: 5,
    }
}
