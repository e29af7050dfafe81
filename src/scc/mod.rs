//! Source control abstraction
//!
//! Cook tasks and the cooker binary talk to version control through
//! [`SourceControlClient`] so sessions without version control, and tests,
//! can substitute a no-op or recording client.

pub mod mock;
pub mod perforce;

pub use mock::{MockSourceControlClient, SccCall};
pub use perforce::{P4Parameters, PerforceClient};

use crate::error::CookResult;
use std::path::PathBuf;

/// Storage class of a file in the depot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Binary,
    Text,
}

/// File-type options applied when opening files for add or edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTypeOptions {
    pub kind: ContentKind,
    pub always_writeable: bool,
    pub exclusive_lock: bool,
    pub preserve_mod_time: bool,
    /// Number of stored revisions, 0 keeps all
    pub revisions: u32,
}

const COOKED_REVISIONS: u32 = 4;
const LONG_LIFE_REVISIONS: u32 = 128;

impl FileTypeOptions {
    /// Options for cooked content checked into version control
    pub fn cooked(needs_exclusive_lock: bool, long_life: bool) -> Self {
        Self {
            kind: ContentKind::Binary,
            always_writeable: true,
            exclusive_lock: needs_exclusive_lock,
            preserve_mod_time: true,
            revisions: if long_life {
                LONG_LIFE_REVISIONS
            } else {
                COOKED_REVISIONS
            },
        }
    }

    /// Options for generated text sources (e.g. generated scripts)
    pub fn generated_text() -> Self {
        Self {
            kind: ContentKind::Text,
            always_writeable: true,
            exclusive_lock: false,
            preserve_mod_time: true,
            revisions: COOKED_REVISIONS,
        }
    }
}

impl Default for FileTypeOptions {
    fn default() -> Self {
        Self {
            kind: ContentKind::Binary,
            always_writeable: false,
            exclusive_lock: false,
            preserve_mod_time: false,
            revisions: 0,
        }
    }
}

/// Callback receiving error output lines of a source control operation
pub type ErrorOutput<'a> = &'a mut dyn FnMut(&str);

/// Version control operations used by the cooking pipeline
pub trait SourceControlClient: Send + Sync {
    fn open_for_add(
        &self,
        files: &[PathBuf],
        options: &FileTypeOptions,
        on_error: ErrorOutput<'_>,
    ) -> CookResult<()>;

    fn open_for_edit(
        &self,
        files: &[PathBuf],
        options: &FileTypeOptions,
        on_error: ErrorOutput<'_>,
    ) -> CookResult<()>;

    fn delete(&self, files: &[PathBuf], on_error: ErrorOutput<'_>) -> CookResult<()>;

    fn revert_unchanged(&self, files: &[PathBuf], on_error: ErrorOutput<'_>) -> CookResult<()>;

    fn submit(&self, description: &str, on_error: ErrorOutput<'_>) -> CookResult<()>;

    /// Sync depot paths (which may carry wildcards such as `...`) to head
    fn sync(&self, paths: &[String], on_error: ErrorOutput<'_>) -> CookResult<()>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Client used when version control is disabled; every call succeeds
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSourceControlClient;

impl SourceControlClient for NullSourceControlClient {
    fn open_for_add(&self, _: &[PathBuf], _: &FileTypeOptions, _: ErrorOutput<'_>) -> CookResult<()> {
        Ok(())
    }

    fn open_for_edit(&self, _: &[PathBuf], _: &FileTypeOptions, _: ErrorOutput<'_>) -> CookResult<()> {
        Ok(())
    }

    fn delete(&self, _: &[PathBuf], _: ErrorOutput<'_>) -> CookResult<()> {
        Ok(())
    }

    fn revert_unchanged(&self, _: &[PathBuf], _: ErrorOutput<'_>) -> CookResult<()> {
        Ok(())
    }

    fn submit(&self, _: &str, _: ErrorOutput<'_>) -> CookResult<()> {
        Ok(())
    }

    fn sync(&self, _: &[String], _: ErrorOutput<'_>) -> CookResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
