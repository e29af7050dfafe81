//! Work-claiming parallel executor for cook batches

use super::context::{CookContext, ProgressUpdate};
use crate::content::FilePath;
use crate::error::{CookError, CookResult};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const PROGRESS_POLL: Duration = Duration::from_millis(50);

/// Create the output directories of every item up front, so workers never
/// race on directory creation.
pub fn create_output_dirs(ctx: &dyn CookContext, groups: &[Vec<FilePath>]) -> CookResult<()> {
    let dirs: BTreeSet<PathBuf> = groups
        .iter()
        .flatten()
        .filter_map(|p| ctx.paths().cooked_path(p).parent().map(PathBuf::from))
        .collect();
    for dir in dirs {
        fs::create_dir_all(&dir)?;
    }
    Ok(())
}

/// Runs a batch on helper threads plus the calling thread.
///
/// Items are claimed through an atomic counter; each result slot is
/// written exactly once by the worker that claimed its index. A failing
/// item does not stop items other workers already claimed.
pub struct ParallelRunner {
    workers: usize,
}

impl ParallelRunner {
    /// `workers` helper threads in addition to the caller
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }

    /// One helper per available hardware thread
    pub fn with_host_parallelism() -> Self {
        Self::new(host_parallelism())
    }

    pub fn run<F>(
        &self,
        ctx: &dyn CookContext,
        name: &str,
        groups: &[Vec<FilePath>],
        cook: F,
    ) -> CookResult<()>
    where
        F: Fn(&[FilePath]) -> CookResult<()> + Sync,
    {
        create_output_dirs(ctx, groups)?;

        let total = groups.len();
        let next = AtomicUsize::new(0);
        let finished = AtomicUsize::new(0);
        let results: Vec<OnceLock<CookResult<()>>> = (0..total).map(|_| OnceLock::new()).collect();
        let start = Instant::now();

        let work = || loop {
            let index = next.fetch_add(1, Ordering::AcqRel);
            if index >= total {
                break;
            }
            let _ = results[index].set(cook(&groups[index]));
            finished.fetch_add(1, Ordering::AcqRel);
        };

        let report = || {
            let done = finished.load(Ordering::Acquire);
            let claimed = next.load(Ordering::Acquire).min(total);
            ctx.advance_progress(&ProgressUpdate {
                name: name.to_string(),
                active: claimed.saturating_sub(done),
                completed: done,
                total,
                elapsed: start.elapsed(),
            });
        };

        let helpers = self.workers.min(total.saturating_sub(1));
        thread::scope(|scope| {
            for _ in 0..helpers {
                scope.spawn(&work);
            }

            // The calling thread claims work too, reporting between items.
            loop {
                let index = next.fetch_add(1, Ordering::AcqRel);
                if index >= total {
                    break;
                }
                let _ = results[index].set(cook(&groups[index]));
                finished.fetch_add(1, Ordering::AcqRel);
                report();
            }

            while finished.load(Ordering::Acquire) < total {
                thread::sleep(PROGRESS_POLL);
                report();
            }
        });
        report();
        debug!("{}: {} item(s) on {} helper thread(s)", name, total, helpers);

        let mut first_error: Option<CookError> = None;
        for slot in results {
            match slot.into_inner() {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                None => {
                    if first_error.is_none() {
                        first_error = Some(CookError::bug(format!("{name}: batch item never ran")));
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Available hardware threads, 1 when unknown
pub fn host_parallelism() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}
