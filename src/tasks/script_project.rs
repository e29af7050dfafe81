//! C# script projects, cooked into a manifest of their compilation units

use crate::content::{FilePath, FileType};
use crate::database::CookSource;
use crate::error::{CookError, CookResult};
use crate::task::{
    atomic_write_final_output, default_out_of_date_cook, CookContext, CookPriority, CookTask,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use walkdir::WalkDir;

pub struct ScriptProjectCookTask;

/// Cooked form of a script project
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptProjectManifest {
    pub project: String,
    pub files: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestEntry {
    pub path: String,
    pub sha256: String,
}

/// Directory holding a project's `.cs` files, typed so only they count
fn code_directory(project: &FilePath) -> FilePath {
    FilePath::new(project.parent(), FileType::Cs)
}

/// Code under a `Debug` folder of the project only ships in debug-only
/// sessions.
fn is_debug_code(project: &FilePath, file: &FilePath) -> bool {
    let dir = project.parent();
    let relative = file
        .relative()
        .strip_prefix(dir)
        .map(|rest| rest.trim_start_matches('/'))
        .unwrap_or_else(|| file.relative());
    relative
        .split('/')
        .rev()
        .skip(1)
        .any(|component| component.eq_ignore_ascii_case(DEBUG_FOLDER))
}

const DEBUG_FOLDER: &str = "Debug";

/// `.cs` files under the project's directory, sorted; debug code only
/// when the session cooks it.
fn code_files(ctx: &dyn CookContext, project: &FilePath) -> Vec<FilePath> {
    let paths = ctx.paths();
    let dir = paths.source_directory(&code_directory(project));
    let mut files: Vec<FilePath> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| paths.file_path_from_source(e.path()))
        .filter(|p| p.file_type() == FileType::Cs)
        .filter(|p| ctx.cook_debug_only() || !is_debug_code(project, p))
        .collect();
    files.sort();
    files
}

impl CookTask for ScriptProjectCookTask {
    fn name(&self) -> &'static str {
        "script-project"
    }

    fn priority(&self) -> i32 {
        CookPriority::SCRIPT_PROJECT
    }

    fn can_cook(&self, path: &FilePath) -> bool {
        path.file_type() == FileType::ScriptProject
    }

    fn cook_all_out_of_date_content(&self, ctx: &dyn CookContext) -> CookResult<()> {
        default_out_of_date_cook(self, ctx, FileType::ScriptProject, false)
    }

    fn get_sources(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<Vec<CookSource>> {
        let mut sources = vec![CookSource::file(path.clone())];
        sources.extend(code_files(ctx, path).into_iter().map(|file| {
            if is_debug_code(path, &file) {
                CookSource::file(file).debug_only()
            } else {
                CookSource::file(file)
            }
        }));
        // Catches files added to the directory after this cook.
        sources.push(CookSource::directory(code_directory(path)));
        Ok(sources)
    }

    fn internal_cook(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<()> {
        let project = ctx.paths().source_path(path);
        if !project.is_file() {
            return Err(CookError::task(path, "project file does not exist"));
        }

        let mut files = Vec::new();
        for file in code_files(ctx, path) {
            let data = fs::read(ctx.paths().source_path(&file))?;
            files.push(ManifestEntry {
                path: file.relative_source_filename(),
                sha256: format!("{:x}", Sha256::digest(&data)),
            });
        }

        let manifest = ScriptProjectManifest {
            project: path.relative_source_filename(),
            files,
        };
        let json = serde_json::to_vec_pretty(&manifest)?;
        atomic_write_final_output(&ctx.paths().cooked_path(path), &json)
    }
}
