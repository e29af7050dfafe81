//! External tool invocation for cook tasks

use crate::error::{CookError, CookResult};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const WAIT_POLL: Duration = Duration::from_millis(10);

/// A command line tool run to completion
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn display_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Run the tool and capture its output. A tool that cannot be started
    /// is an environment error; a non-zero exit or a timeout is a task
    /// error for `subject`.
    pub fn run(&self, subject: &dyn std::fmt::Display) -> CookResult<ProcessOutput> {
        debug!("Running {} {}", self.program.display(), self.args.join(" "));

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let start = Instant::now();
        let mut child = command.spawn().map_err(|e| {
            CookError::environment(format!("Cannot run {}: {}", self.program.display(), e))
        })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if self.timeout.is_some_and(|t| start.elapsed() > t) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CookError::task(
                    subject,
                    format!("{} timed out after {:?}", self.display_name(), start.elapsed()),
                ));
            }
            thread::sleep(WAIT_POLL);
        };

        let output = ProcessOutput {
            status,
            stdout: join_drain(stdout),
            stderr: join_drain(stderr),
            duration: start.elapsed(),
        };

        if !output.status.success() {
            for line in output.stderr.lines().chain(output.stdout.lines()) {
                warn!("{}: {}", self.display_name(), line);
            }
            return Err(CookError::task(
                subject,
                format!("{} failed with {}", self.display_name(), output.status),
            ));
        }
        Ok(output)
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_drain(handle: Option<thread::JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Resolve a tool path relative to the tools directory
pub fn tool_path(tools_dir: &Path, tool: &Path) -> PathBuf {
    if tool.is_absolute() {
        tool.to_path_buf()
    } else {
        tools_dir.join(tool)
    }
}
