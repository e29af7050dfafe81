//! Content model: file types, asset paths and on-disk layout

pub mod file_path;
pub mod file_type;
pub mod paths;

pub use file_path::{is_valid_content_path, FilePath};
pub use file_type::{FileType, Platform, COOKER_VERSION};
pub use paths::ContentPaths;

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Modification time of a file in nanoseconds since the Unix epoch, 0 if
/// the file does not exist or cannot be queried.
pub fn modified_time(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

/// Stamp a file with a modification time produced by [`modified_time`]
pub fn set_modified_time(path: &Path, timestamp: u64) -> io::Result<()> {
    let time = SystemTime::UNIX_EPOCH + Duration::from_nanos(timestamp);
    let file = fs::OpenOptions::new().write(true).open(path)?;
    file.set_modified(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_modified_time_round_trip() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        assert_eq!(modified_time(&file), 0);

        fs::write(&file, "x").unwrap();
        let stamp = 1_600_000_000_000_000_000;
        set_modified_time(&file, stamp).unwrap();
        assert_eq!(modified_time(&file), stamp);
    }
}
