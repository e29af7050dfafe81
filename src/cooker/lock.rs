//! Inter-process exclusivity lock over a content tree
//!
//! The lock is a file in the source directory created with create-new
//! semantics. Its presence is the mutex. The recorded owner is used for
//! log messages while another process waits, and to recover a lock left
//! behind by a crashed cooker on this host.

use crate::config::LockSettings;
use crate::error::{CookError, CookResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Who holds the lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockOwner {
    pub process_id: u32,
    pub hostname: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockOwner {
    fn current() -> Self {
        Self {
            process_id: std::process::id(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
            acquired_at: Utc::now(),
        }
    }

    fn read(path: &Path) -> Option<Self> {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
    }

    fn describe(path: &Path) -> String {
        Self::read(path)
            .map(|o| {
                format!(
                    "PID {} on {} (since {})",
                    o.process_id,
                    o.hostname,
                    o.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
                )
            })
            .unwrap_or_else(|| "unknown process".to_string())
    }
}

/// Held lock; the file is removed on drop
#[derive(Debug)]
pub struct CookerLock {
    path: PathBuf,
}

impl CookerLock {
    /// Try once to take the lock
    pub fn try_acquire(path: &Path) -> CookResult<Option<Self>> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let owner = serde_json::to_string_pretty(&LockOwner::current())?;
                // Content is informational, a failed write still holds the lock.
                if let Err(e) = file.write_all(owner.as_bytes()) {
                    warn!("Failed writing lock owner to {}: {}", path.display(), e);
                }
                debug!("Acquired cooker lock {}", path.display());
                Ok(Some(Self {
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a lock left behind by a process on this host that is no
    /// longer running. Locks of other hosts, or without a readable owner,
    /// are never touched.
    fn remove_if_stale(path: &Path) -> CookResult<bool> {
        let Some(owner) = LockOwner::read(path) else {
            return Ok(false);
        };
        if owner.hostname != LockOwner::current().hostname || is_process_running(owner.process_id) {
            return Ok(false);
        }

        warn!(
            "Removing stale cooker lock {} (PID {} no longer running)",
            path.display(),
            owner.process_id
        );
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            // Someone else cleaned it up first.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Poll for the lock until it is taken, `cancel` is set, or the
    /// maximum wait elapses.
    pub fn acquire(path: &Path, settings: &LockSettings, cancel: &AtomicBool) -> CookResult<Self> {
        let start = Instant::now();
        let mut attempts: u32 = 0;
        loop {
            if cancel.load(Ordering::Acquire) {
                return Err(CookError::Cancelled);
            }
            if let Some(lock) = Self::try_acquire(path)? {
                if attempts > 0 {
                    info!("Acquired cooker lock after {:.1}s", start.elapsed().as_secs_f64());
                }
                return Ok(lock);
            }
            if Self::remove_if_stale(path)? {
                continue;
            }

            attempts += 1;
            if start.elapsed() >= settings.max_wait {
                return Err(CookError::LockTimeout(settings.max_wait));
            }
            if settings.log_every > 0 && attempts % settings.log_every == 1 {
                info!(
                    "Waiting for cooker lock {} held by {}",
                    path.display(),
                    LockOwner::describe(path)
                );
            }
            thread::sleep(settings.poll_interval);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether a process with the given PID exists on this host
pub fn is_process_running(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }

    #[cfg(target_os = "linux")]
    {
        Path::new("/proc").join(pid.to_string()).exists()
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    {
        use std::process::{Command, Stdio};

        // kill -0 checks existence without signalling
        Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    {
        use std::process::{Command, Stdio};

        Command::new("tasklist")
            .args(&["/FI", &format!("PID eq {pid}"), "/NH"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .ok()
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .map(|s| s.contains(&pid.to_string()))
            .unwrap_or(false)
    }

    #[cfg(not(any(unix, windows)))]
    {
        warn!("Process detection not supported on this platform");
        true
    }
}

impl Drop for CookerLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release cooker lock {}: {}", self.path.display(), e);
        } else {
            debug!("Released cooker lock {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fast() -> LockSettings {
        LockSettings {
            poll_interval: Duration::from_millis(10),
            max_wait: Duration::from_millis(100),
            log_every: 5,
        }
    }

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Source").join("CookerLock.txt");
        let cancel = AtomicBool::new(false);

        let lock = CookerLock::acquire(&path, &fast(), &cancel).unwrap();
        assert!(path.exists());
        assert!(CookerLock::try_acquire(&path).unwrap().is_none());
        let owner: LockOwner = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(owner.process_id, std::process::id());

        drop(lock);
        assert!(!path.exists());
        assert!(CookerLock::try_acquire(&path).unwrap().is_some());
    }

    fn write_owner(path: &Path, owner: &LockOwner) {
        fs::write(path, serde_json::to_string(owner).unwrap()).unwrap();
    }

    #[test]
    fn test_lock_of_dead_process_is_reclaimed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("CookerLock.txt");
        let crashed = LockOwner {
            process_id: u32::MAX - 1,
            ..LockOwner::current()
        };
        assert!(!is_process_running(crashed.process_id));
        write_owner(&path, &crashed);

        let lock = CookerLock::acquire(&path, &fast(), &AtomicBool::new(false)).unwrap();
        let owner = LockOwner::read(lock.path()).unwrap();
        assert_eq!(owner.process_id, std::process::id());
    }

    #[test]
    fn test_lock_of_other_host_is_kept() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("CookerLock.txt");
        write_owner(
            &path,
            &LockOwner {
                process_id: u32::MAX - 1,
                hostname: "build-agent-that-is-not-us".to_string(),
                acquired_at: Utc::now(),
            },
        );

        let err = CookerLock::acquire(&path, &fast(), &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, CookError::LockTimeout(_)));
        assert!(path.exists());
    }

    #[test]
    fn test_running_process_is_detected() {
        assert!(is_process_running(std::process::id()));
    }

    #[test]
    fn test_times_out() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("CookerLock.txt");
        let _held = CookerLock::try_acquire(&path).unwrap().unwrap();

        let err = CookerLock::acquire(&path, &fast(), &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, CookError::LockTimeout(_)));
    }

    #[test]
    fn test_cancel_stops_waiting() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("CookerLock.txt");
        let _held = CookerLock::try_acquire(&path).unwrap().unwrap();

        let cancel = Arc::new(AtomicBool::new(false));
        let settings = LockSettings {
            max_wait: Duration::from_secs(30),
            ..fast()
        };
        let waiter = {
            let cancel = cancel.clone();
            let path = path.clone();
            thread::spawn(move || CookerLock::acquire(&path, &settings, &cancel))
        };
        thread::sleep(Duration::from_millis(50));
        cancel.store(true, Ordering::Release);
        assert!(matches!(waiter.join().unwrap(), Err(CookError::Cancelled)));
    }

    #[test]
    fn test_waits_for_release() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("CookerLock.txt");
        let held = CookerLock::try_acquire(&path).unwrap().unwrap();

        let settings = LockSettings {
            max_wait: Duration::from_secs(5),
            ..fast()
        };
        let waiter = {
            let path = path.clone();
            thread::spawn(move || CookerLock::acquire(&path, &settings, &AtomicBool::new(false)))
        };
        thread::sleep(Duration::from_millis(50));
        drop(held);
        assert!(waiter.join().unwrap().is_ok());
    }
}
