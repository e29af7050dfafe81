//! Filesystem change notifier feeding the cook database

use super::CookDatabase;
use crate::error::CookResult;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Weak;
use tracing::{trace, warn};

/// Keeps a recursive watch on the source tree alive
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Watch `source_dir`, forwarding every change that maps to a content
    /// path to the database. The database is held weakly so the watcher
    /// never keeps it alive.
    pub fn start(database: Weak<CookDatabase>, source_dir: &Path) -> CookResult<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!("Source watcher error: {}", e);
                    return;
                }
            };
            if !is_content_change(&event.kind) {
                return;
            }
            let Some(database) = database.upgrade() else {
                return;
            };
            for path in &event.paths {
                if let Some(file_path) = database.paths().file_path_from_source(path) {
                    trace!("Source changed: {}", file_path);
                    database.on_file_change(&file_path);
                }
            }
        })?;

        watcher.watch(source_dir, RecursiveMode::Recursive)?;
        Ok(Self { _watcher: watcher })
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentPaths, FilePath, FileType, Platform};
    use crate::database::CookVersions;
    use std::fs;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    #[test]
    fn test_watcher_invalidates_cached_result() {
        let temp = TempDir::new().unwrap();
        let paths = ContentPaths::new(temp.path(), Platform::PC);
        fs::create_dir_all(paths.source_dir()).unwrap();
        fs::create_dir_all(paths.content_dir()).unwrap();

        let json = FilePath::new("data", FileType::Json);
        fs::write(paths.cooked_path(&json), "cooked").unwrap();

        let db = Arc::new(CookDatabase::new(paths.clone(), CookVersions::current(), false));
        db.watch_sources().unwrap();
        // No source at all: 0 <= output time.
        assert!(db.check_up_to_date(&json));

        std::thread::sleep(Duration::from_millis(50));
        fs::write(paths.source_path(&json), "newer").unwrap();
        crate::content::set_modified_time(
            &paths.source_path(&json),
            crate::content::modified_time(&paths.cooked_path(&json)) + 1_000_000_000,
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while db.check_up_to_date(&json) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(!db.check_up_to_date(&json));
    }
}
