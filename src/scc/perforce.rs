//! Perforce command-line client

use super::{ContentKind, ErrorOutput, FileTypeOptions, SourceControlClient};
use crate::error::{CookError, CookResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Mutex;
use tracing::debug;

/// Files passed per `p4` invocation
const BATCH_SIZE: usize = 64;

/// Connection parameters for `p4`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct P4Parameters {
    pub client_workspace: String,
    pub user: String,
    pub port: String,
    pub password: Option<String>,
    /// Pending changelist to open files in, default changelist when unset
    pub changelist: Option<u32>,
    /// Executable, `p4` on the PATH by default
    pub executable: Option<PathBuf>,
}

impl P4Parameters {
    /// Parameters are usable once the workspace, user and port are known
    pub fn is_valid(&self) -> bool {
        !self.client_workspace.is_empty() && !self.user.is_empty() && !self.port.is_empty()
    }

    fn standard_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c".to_string(),
            self.client_workspace.clone(),
            "-u".to_string(),
            self.user.clone(),
            "-p".to_string(),
            self.port.clone(),
        ];
        if let Some(password) = &self.password {
            args.push("-P".to_string());
            args.push(password.clone());
        }
        args
    }
}

/// Perforce file type string, e.g. `binary+wlmS4`
pub fn p4_file_type(options: &FileTypeOptions) -> String {
    let mut file_type = match options.kind {
        ContentKind::Binary => "binary",
        ContentKind::Text => "text",
    }
    .to_string();

    let mut modifiers = String::new();
    if options.always_writeable {
        modifiers.push('w');
    }
    if options.exclusive_lock {
        modifiers.push('l');
    }
    if options.preserve_mod_time {
        modifiers.push('m');
    }
    match options.revisions {
        0 => {}
        1 => modifiers.push('S'),
        n => modifiers.push_str(&format!("S{n}")),
    }

    if !modifiers.is_empty() {
        file_type.push('+');
        file_type.push_str(&modifiers);
    }
    file_type
}

/// Runs `p4` commands one at a time
pub struct PerforceClient {
    params: P4Parameters,
    p4_mutex: Mutex<()>,
}

impl PerforceClient {
    pub fn new(params: P4Parameters) -> Self {
        Self {
            params,
            p4_mutex: Mutex::new(()),
        }
    }

    fn executable(&self) -> PathBuf {
        self.params
            .executable
            .clone()
            .unwrap_or_else(|| PathBuf::from("p4"))
    }

    fn changelist_args(&self) -> Vec<String> {
        match self.params.changelist {
            Some(cl) => vec!["-c".to_string(), cl.to_string()],
            None => Vec::new(),
        }
    }

    fn run(&self, command: &str, args: &[String], on_error: ErrorOutput<'_>) -> CookResult<()> {
        let _guard = self.p4_mutex.lock().unwrap_or_else(|e| e.into_inner());

        debug!("p4 {} {}", command, args.join(" "));
        let output = Command::new(self.executable())
            .args(self.params.standard_args())
            .arg(command)
            .args(args)
            .output()
            .map_err(|e| CookError::source_control(format!("Failed to execute p4 {command}: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            on_error(line);
        }

        if !output.status.success() {
            return Err(CookError::source_control(format!(
                "p4 {} failed: {}",
                command,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn run_batched(
        &self,
        command: &str,
        leading: &[String],
        files: &[PathBuf],
        on_error: ErrorOutput<'_>,
    ) -> CookResult<()> {
        for chunk in files.chunks(BATCH_SIZE) {
            let mut args = leading.to_vec();
            args.extend(chunk.iter().map(|f| f.to_string_lossy().into_owned()));
            self.run(command, &args, &mut *on_error)?;
        }
        Ok(())
    }

    fn open_args(&self, options: &FileTypeOptions) -> Vec<String> {
        let mut args = self.changelist_args();
        args.push("-t".to_string());
        args.push(p4_file_type(options));
        args
    }
}

impl SourceControlClient for PerforceClient {
    fn open_for_add(
        &self,
        files: &[PathBuf],
        options: &FileTypeOptions,
        on_error: ErrorOutput<'_>,
    ) -> CookResult<()> {
        self.run_batched("add", &self.open_args(options), files, on_error)
    }

    fn open_for_edit(
        &self,
        files: &[PathBuf],
        options: &FileTypeOptions,
        on_error: ErrorOutput<'_>,
    ) -> CookResult<()> {
        self.run_batched("edit", &self.open_args(options), files, on_error)
    }

    fn delete(&self, files: &[PathBuf], on_error: ErrorOutput<'_>) -> CookResult<()> {
        self.run_batched("delete", &self.changelist_args(), files, on_error)
    }

    fn revert_unchanged(&self, files: &[PathBuf], on_error: ErrorOutput<'_>) -> CookResult<()> {
        let mut leading = vec!["-a".to_string()];
        leading.extend(self.changelist_args());
        self.run_batched("revert", &leading, files, on_error)
    }

    fn submit(&self, description: &str, on_error: ErrorOutput<'_>) -> CookResult<()> {
        let args = match self.params.changelist {
            Some(cl) => vec!["-c".to_string(), cl.to_string()],
            None => vec!["-d".to_string(), description.to_string()],
        };
        self.run("submit", &args, on_error)
    }

    fn sync(&self, paths: &[String], on_error: ErrorOutput<'_>) -> CookResult<()> {
        self.run("sync", paths, on_error)
    }

    fn name(&self) -> &'static str {
        "perforce"
    }
}
