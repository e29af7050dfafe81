//! Crash-safe replacement of cooked outputs
//!
//! The previous output is moved aside before the new one is written and
//! only deleted once the write succeeded; on failure it is moved back.

use crate::error::CookResult;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Write `data` to `output`
pub fn atomic_write_final_output(output: &Path, data: &[u8]) -> CookResult<()> {
    atomic_write_final_output_with(output, |file| file.write_all(data))
}

/// Write `output` through `write`, keeping the previous output if it fails
pub fn atomic_write_final_output_with<F>(output: &Path, write: F) -> CookResult<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    replace_output(output, |output| {
        let mut file = File::create(output)?;
        write(&mut file)?;
        file.sync_all()
    })
}

/// Move an already written temporary file into place as `output`
pub fn atomic_move_final_output(temp: &Path, output: &Path) -> CookResult<()> {
    replace_output(output, |output| match fs::rename(temp, output) {
        Ok(()) => Ok(()),
        // Different filesystem, fall back to copy + delete.
        Err(_) => {
            fs::copy(temp, output)?;
            fs::remove_file(temp)
        }
    })
}

fn backup_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!(".{}.{}.old", name, Uuid::new_v4().simple()))
}

fn replace_output<F>(output: &Path, produce: F) -> CookResult<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    if let Some(dir) = output.parent() {
        fs::create_dir_all(dir)?;
    }

    let backup = if output.exists() {
        let backup = backup_path(output);
        fs::rename(output, &backup)?;
        Some(backup)
    } else {
        None
    };

    match produce(output) {
        Ok(()) => {
            if let Some(backup) = backup {
                if let Err(e) = fs::remove_file(&backup) {
                    warn!("Failed removing {}: {}", backup.display(), e);
                }
            }
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(output);
            if let Some(backup) = backup {
                if let Err(restore) = fs::rename(&backup, output) {
                    warn!(
                        "Failed restoring {} from {}: {}",
                        output.display(),
                        backup.display(),
                        restore
                    );
                }
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_write_creates_and_replaces() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("sub").join("a.sjz");

        atomic_write_final_output(&output, b"one").unwrap();
        atomic_write_final_output(&output, b"two").unwrap();
        assert_eq!(fs::read(&output).unwrap(), b"two");
        // No leftover backups.
        assert_eq!(entries(output.parent().unwrap()), 1);
    }

    #[test]
    fn test_failed_write_keeps_previous_output() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("a.sjz");
        fs::write(&output, b"previous").unwrap();

        let result = atomic_write_final_output_with(&output, |file| {
            file.write_all(b"half")?;
            Err(io::Error::other("disk full"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(&output).unwrap(), b"previous");
        assert_eq!(entries(temp.path()), 1);
    }

    #[test]
    fn test_failed_first_write_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("a.sjz");
        let result = atomic_write_final_output_with(&output, |_| Err(io::Error::other("nope")));
        assert!(result.is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_move_into_place() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("staged.tmp");
        let output = temp.path().join("a.fxc");
        fs::write(&output, b"old").unwrap();
        fs::write(&staged, b"new").unwrap();

        atomic_move_final_output(&staged, &output).unwrap();
        assert_eq!(fs::read(&output).unwrap(), b"new");
        assert!(!staged.exists());

        let missing = temp.path().join("missing.tmp");
        assert!(atomic_move_final_output(&missing, &output).is_err());
        assert_eq!(fs::read(&output).unwrap(), b"new");
    }
}
