//! Lua scripts, compiled by an external tool when one is configured

use super::write_compressed;
use crate::content::{FilePath, FileType};
use crate::error::{CookError, CookResult};
use crate::task::process::tool_path;
use crate::task::{
    atomic_move_final_output, default_out_of_date_cook, CookContext, CookPriority, CookTask,
    ProcessCommand,
};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::Builder;

const COMPILE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ScriptCookTask;

impl ScriptCookTask {
    fn compiler(ctx: &dyn CookContext) -> Option<PathBuf> {
        ctx.settings()
            .script_compiler
            .as_deref()
            .map(|tool| tool_path(ctx.tools_dir(), tool))
    }
}

impl CookTask for ScriptCookTask {
    fn name(&self) -> &'static str {
        "script"
    }

    fn priority(&self) -> i32 {
        CookPriority::SCRIPT
    }

    fn can_cook(&self, path: &FilePath) -> bool {
        path.file_type() == FileType::Script
    }

    fn cook_all_out_of_date_content(&self, ctx: &dyn CookContext) -> CookResult<()> {
        default_out_of_date_cook(self, ctx, FileType::Script, true)
    }

    fn validate_content_environment(&self, ctx: &dyn CookContext) -> CookResult<()> {
        match Self::compiler(ctx) {
            Some(compiler) if !compiler.is_file() => Err(CookError::environment(format!(
                "Script compiler {} does not exist",
                compiler.display()
            ))),
            _ => Ok(()),
        }
    }

    fn internal_cook(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<()> {
        let source = ctx.paths().source_path(path);
        let output = ctx.paths().cooked_path(path);

        let Some(compiler) = Self::compiler(ctx) else {
            let data = fs::read(&source)?;
            return write_compressed(&output, &data);
        };

        let dir = output
            .parent()
            .ok_or_else(|| CookError::InvalidPath(output.clone()))?;
        fs::create_dir_all(dir)?;
        let staged = Builder::new()
            .prefix(".script")
            .suffix(".tmp")
            .tempfile_in(dir)?
            .into_temp_path();

        let mut command = ProcessCommand::new(compiler);
        // Debug sessions keep symbols for the script debugger.
        if !ctx.cook_debug_only() {
            command = command.arg("-s");
        }
        command
            .arg("-o")
            .arg(staged.to_string_lossy())
            .arg(source.to_string_lossy())
            .timeout(COMPILE_TIMEOUT)
            .run(path)?;

        atomic_move_final_output(&staged, &output)
    }
}
