//! Cook task contract
//!
//! A cook task owns one asset family. Batch cooking usually delegates to
//! [`flow::default_out_of_date_cook`] or [`flow::default_out_of_date_cook_multi`],
//! which discover stale outputs, cook them serially or through the
//! [`parallel::ParallelRunner`], and commit metadata for the whole batch at
//! the end.

pub mod context;
pub mod flow;
pub mod output;
pub mod parallel;
pub mod process;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{CookContext, ProgressUpdate};
pub use flow::{default_out_of_date_cook, default_out_of_date_cook_multi, post_cook_update_metadata};
pub use output::{atomic_move_final_output, atomic_write_final_output, atomic_write_final_output_with};
pub use parallel::ParallelRunner;
pub use process::{ProcessCommand, ProcessOutput};

use crate::content::FilePath;
use crate::database::CookSource;
use crate::error::CookResult;

/// Relative ordering of task families; lower runs first
pub struct CookPriority;

impl CookPriority {
    pub const UI: i32 = 0;
    pub const SCRIPT_PROJECT: i32 = 10;
    pub const ANIMATION_2D: i32 = 20;
    pub const AUDIO: i32 = 30;
    pub const EFFECT: i32 = 40;
    pub const FX_BANK: i32 = 50;
    pub const FONT: i32 = 60;
    pub const PROTOBUF: i32 = 70;
    pub const SCENE_ASSET: i32 = 80;
    pub const SCENE_PREFAB: i32 = 90;
    /// After script projects, which may generate scripts
    pub const SCRIPT: i32 = 100;
    pub const TEXTURE: i32 = 110;
    pub const DEFAULT: i32 = 200;
    /// Packaging consumes every other output
    pub const PACKAGE: i32 = 1000;
}

/// One asset family's transform and dependency declaration
pub trait CookTask: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32;

    /// Whether `path` can be cooked on its own
    fn can_cook(&self, _path: &FilePath) -> bool {
        false
    }

    /// Cook one file and commit its metadata. Never touches version control.
    fn cook_single(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<()> {
        self.internal_cook(ctx, path)?;
        post_cook_update_metadata(self, ctx, std::slice::from_ref(path))
    }

    /// Batch entry point of a full session
    fn cook_all_out_of_date_content(&self, ctx: &dyn CookContext) -> CookResult<()>;

    /// Dependencies of an output; just the output's own source by default
    fn get_sources(&self, _ctx: &dyn CookContext, path: &FilePath) -> CookResult<Vec<CookSource>> {
        Ok(vec![CookSource::file(path.clone())])
    }

    /// Session precondition, checked for every task before any task cooks
    fn validate_content_environment(&self, _ctx: &dyn CookContext) -> CookResult<()> {
        Ok(())
    }

    fn internal_cook(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<()>;

    /// Cook several outputs sharing one base name in one go
    fn internal_cook_multi(&self, ctx: &dyn CookContext, paths: &[FilePath]) -> CookResult<()> {
        for path in paths {
            self.internal_cook(ctx, path)?;
        }
        Ok(())
    }

    /// Whether the output's own timestamp, not the source's, stamps the
    /// output after cooking (inert placeholder sources)
    fn uses_output_timestamp(&self, _path: &FilePath) -> bool {
        false
    }
}
