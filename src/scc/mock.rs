//! Recording source control client for tests

use super::{ErrorOutput, FileTypeOptions, SourceControlClient};
use crate::error::{CookError, CookResult};
use std::path::PathBuf;
use std::sync::Mutex;

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SccCall {
    OpenForAdd(Vec<PathBuf>, FileTypeOptions),
    OpenForEdit(Vec<PathBuf>, FileTypeOptions),
    Delete(Vec<PathBuf>),
    RevertUnchanged(Vec<PathBuf>),
    Submit(String),
    Sync(Vec<String>),
}

/// Records every call and optionally fails them
#[derive(Default)]
pub struct MockSourceControlClient {
    calls: Mutex<Vec<SccCall>>,
    fail_with: Option<String>,
}

impl MockSourceControlClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails, writing `message` to the error output
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    pub fn calls(&self) -> Vec<SccCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, call: SccCall, on_error: ErrorOutput<'_>) -> CookResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        match &self.fail_with {
            Some(message) => {
                on_error(message);
                Err(CookError::source_control(message))
            }
            None => Ok(()),
        }
    }
}

impl SourceControlClient for MockSourceControlClient {
    fn open_for_add(
        &self,
        files: &[PathBuf],
        options: &FileTypeOptions,
        on_error: ErrorOutput<'_>,
    ) -> CookResult<()> {
        self.record(SccCall::OpenForAdd(files.to_vec(), options.clone()), on_error)
    }

    fn open_for_edit(
        &self,
        files: &[PathBuf],
        options: &FileTypeOptions,
        on_error: ErrorOutput<'_>,
    ) -> CookResult<()> {
        self.record(SccCall::OpenForEdit(files.to_vec(), options.clone()), on_error)
    }

    fn delete(&self, files: &[PathBuf], on_error: ErrorOutput<'_>) -> CookResult<()> {
        self.record(SccCall::Delete(files.to_vec()), on_error)
    }

    fn revert_unchanged(&self, files: &[PathBuf], on_error: ErrorOutput<'_>) -> CookResult<()> {
        self.record(SccCall::RevertUnchanged(files.to_vec()), on_error)
    }

    fn submit(&self, description: &str, on_error: ErrorOutput<'_>) -> CookResult<()> {
        self.record(SccCall::Submit(description.to_string()), on_error)
    }

    fn sync(&self, paths: &[String], on_error: ErrorOutput<'_>) -> CookResult<()> {
        self.record(SccCall::Sync(paths.to_vec()), on_error)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_fails() {
        let client = MockSourceControlClient::failing("no such file");
        let mut errors = Vec::new();
        let mut on_error = |line: &str| errors.push(line.to_string());
        assert!(client.delete(&[PathBuf::from("a")], &mut on_error).is_err());
        assert_eq!(errors, vec!["no such file"]);
        assert_eq!(client.calls(), vec![SccCall::Delete(vec![PathBuf::from("a")])]);
    }
}
