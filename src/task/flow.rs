//! Default out-of-date discovery, batch execution and metadata commit

use super::context::{CookContext, ProgressUpdate};
use super::parallel::{create_output_dirs, ParallelRunner};
use super::CookTask;
use crate::content::{modified_time, set_modified_time, FilePath, FileType};
use crate::database::CookSource;
use crate::error::{CookError, CookResult};
use std::time::Instant;
use tracing::{error, info};

/// Stale source files of a type that this platform owns, in index order
pub fn gather_out_of_date(ctx: &dyn CookContext, file_type: FileType) -> Vec<FilePath> {
    let paths = ctx.paths();
    let database = ctx.database();
    ctx.source_files_of_type(file_type)
        .into_iter()
        .filter(|p| paths.is_owned_by_platform(p))
        .filter(|p| !database.check_up_to_date(p))
        .collect()
}

/// Cook every stale file of `file_type`, one `internal_cook` per file.
///
/// Fails fast: the first failing file aborts the batch and no metadata
/// is committed for any file of the batch.
pub fn default_out_of_date_cook<T: CookTask + ?Sized>(
    task: &T,
    ctx: &dyn CookContext,
    file_type: FileType,
    parallel: bool,
) -> CookResult<()> {
    let stale = gather_out_of_date(ctx, file_type);
    if stale.is_empty() {
        return Ok(());
    }

    let groups: Vec<Vec<FilePath>> = stale.iter().cloned().map(|p| vec![p]).collect();
    cook_groups(task, ctx, &groups, parallel, false)?;
    post_cook_update_metadata(task, ctx, &stale)
}

/// Like [`default_out_of_date_cook`] over several types, with stale files
/// that share a relative path handed together to `internal_cook_multi`.
/// A file with no stale companions goes through `internal_cook`.
pub fn default_out_of_date_cook_multi<T: CookTask + ?Sized>(
    task: &T,
    ctx: &dyn CookContext,
    file_types: &[FileType],
    parallel: bool,
) -> CookResult<()> {
    let mut stale: Vec<FilePath> = file_types
        .iter()
        .flat_map(|t| gather_out_of_date(ctx, *t))
        .collect();
    if stale.is_empty() {
        return Ok(());
    }

    // FilePath orders by relative path, then type.
    stale.sort();
    let groups = group_by_base_name(&stale);
    cook_groups(task, ctx, &groups, parallel, true)?;
    post_cook_update_metadata(task, ctx, &stale)
}

fn group_by_base_name(sorted: &[FilePath]) -> Vec<Vec<FilePath>> {
    let mut groups: Vec<Vec<FilePath>> = Vec::new();
    for path in sorted {
        match groups.last_mut() {
            Some(group) if group[0].relative() == path.relative() => group.push(path.clone()),
            _ => groups.push(vec![path.clone()]),
        }
    }
    groups
}

fn cook_groups<T: CookTask + ?Sized>(
    task: &T,
    ctx: &dyn CookContext,
    groups: &[Vec<FilePath>],
    parallel: bool,
    multi: bool,
) -> CookResult<()> {
    let name = ctx.progress_name(task.name());
    let total: usize = groups.iter().map(Vec::len).sum();
    info!("{}: cooking {} out of date file(s)", name, total);

    let cook_one = |group: &[FilePath]| -> CookResult<()> {
        let result = if multi && group.len() > 1 {
            task.internal_cook_multi(ctx, group)
        } else {
            group
                .iter()
                .try_for_each(|path| task.internal_cook(ctx, path))
        };
        if let Err(e) = &result {
            error!("{}: failed cooking {}: {}", name, group[0], e);
        }
        result
    };

    let start = Instant::now();
    let result = if parallel {
        ParallelRunner::new(ctx.worker_count()).run(ctx, &name, groups, cook_one)
    } else {
        create_output_dirs(ctx, groups)?;
        let mut completed = 0;
        groups.iter().try_for_each(|group| -> CookResult<()> {
            cook_one(group.as_slice())?;
            completed += 1;
            ctx.advance_progress(&ProgressUpdate {
                name: name.clone(),
                active: 0,
                completed,
                total: groups.len(),
                elapsed: start.elapsed(),
            });
            Ok(())
        })
    };

    ctx.complete_progress(&name, start.elapsed(), result.is_ok());
    result
}

/// Stamp outputs and commit their metadata after a successful batch.
///
/// Each output gets its source's modification time (or keeps its own for
/// placeholder sources), then the task's declared sources are checked and
/// committed. A declared source or sibling that does not exist is a task
/// bug, reported distinctly from data errors.
pub fn post_cook_update_metadata<T: CookTask + ?Sized>(
    task: &T,
    ctx: &dyn CookContext,
    outputs: &[FilePath],
) -> CookResult<()> {
    let paths = ctx.paths();
    let database = ctx.database();

    for path in outputs {
        let cooked = paths.cooked_path(path);
        let stamp = if task.uses_output_timestamp(path) {
            modified_time(&cooked)
        } else {
            modified_time(&paths.source_path(path))
        };
        if stamp != 0 {
            set_modified_time(&cooked, stamp)
                .map_err(|e| CookError::task(path, format!("cannot stamp output: {e}")))?;
        }
        // Re-read so the committed value has the filesystem's precision.
        let cooked_timestamp = modified_time(&cooked);

        database.manual_on_file_change(path);

        let sources = task.get_sources(ctx, path)?;
        check_declared_sources(ctx, path, &sources)?;
        database.update_metadata(path, cooked_timestamp, &sources)?;
    }
    Ok(())
}

fn check_declared_sources(
    ctx: &dyn CookContext,
    output: &FilePath,
    sources: &[CookSource],
) -> CookResult<()> {
    let paths = ctx.paths();
    for source in sources {
        if source.is_directory || source.is_debug_only {
            continue;
        }
        let (kind, file) = if source.is_sibling {
            ("sibling", paths.cooked_path(&source.path))
        } else {
            ("source", paths.source_path(&source.path))
        };
        if modified_time(&file) == 0 {
            let message = format!(
                "{} declares {} {} which does not exist after cooking",
                output, kind, source.path
            );
            error!("Cooker bug: {}", message);
            return Err(CookError::bug(message));
        }
    }
    Ok(())
}
