//! Sound projects and the banks they emit
//!
//! A project source is a line-based listing:
//!
//! ```text
//! # comment
//! bank Music
//! sample music/theme
//! bank Sfx
//! sample ui/click.wav
//! ```
//!
//! Samples are `.wav` files relative to the project's directory and belong
//! to the bank declared above them. Cooking writes the project output and
//! one `.bank` sibling per bank next to it, plus a generated JSON source
//! listing the bank names for game code, which the JSON task then cooks.

use crate::content::{FilePath, FileType};
use crate::database::CookSource;
use crate::error::{CookError, CookResult};
use crate::task::{
    atomic_write_final_output, default_out_of_date_cook, CookContext, CookPriority, CookTask,
};
use serde::Serialize;
use std::fs;
use std::io::Write;

pub struct SoundProjectCookTask;

#[derive(Debug, Default, PartialEq, Eq)]
struct Bank {
    name: String,
    samples: Vec<FilePath>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ProjectOutput<'a> {
    project: String,
    banks: Vec<&'a str>,
}

fn join_relative(dir: &str, path: &str) -> String {
    if dir.is_empty() {
        path.to_string()
    } else {
        format!("{dir}/{path}")
    }
}

fn parse_project(project: &FilePath, text: &str) -> CookResult<Vec<Bank>> {
    let mut banks: Vec<Bank> = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (keyword, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let value = value.trim();
        match keyword {
            "bank" if !value.is_empty() => banks.push(Bank {
                name: value.to_string(),
                samples: Vec::new(),
            }),
            "sample" if !value.is_empty() => {
                let bank = banks.last_mut().ok_or_else(|| {
                    CookError::task(project, format!("line {}: sample outside of a bank", number + 1))
                })?;
                let stem = value
                    .strip_suffix(FileType::Wav.source_extension())
                    .unwrap_or(value);
                bank.samples
                    .push(FilePath::new(join_relative(project.parent(), stem), FileType::Wav));
            }
            _ => {
                return Err(CookError::task(
                    project,
                    format!("line {}: cannot parse '{}'", number + 1, line),
                ))
            }
        }
    }
    Ok(banks)
}

fn bank_path(project: &FilePath, bank: &str) -> FilePath {
    FilePath::new(join_relative(project.parent(), bank), FileType::SoundBank)
}

/// Generated source listing a project's banks
fn bank_listing_path(ctx: &dyn CookContext, project: &FilePath) -> FilePath {
    let dir = join_relative(&ctx.platform().generated_dir_name(), project.parent());
    FilePath::new(
        join_relative(&dir, &format!("{}Banks", project.base_name())),
        FileType::Json,
    )
}

fn update_bank_listing(ctx: &dyn CookContext, project: &FilePath, banks: &[Bank]) -> CookResult<()> {
    let file = ctx.paths().source_path(&bank_listing_path(ctx, project));
    if banks.is_empty() {
        if file.exists() {
            fs::remove_file(&file)?;
            ctx.remove_source_files(&[file])?;
        }
        return Ok(());
    }

    let names: Vec<&str> = banks.iter().map(|b| b.name.as_str()).collect();
    let json = serde_json::to_vec_pretty(&names)?;
    if fs::read(&file).is_ok_and(|current| current == json) {
        return Ok(());
    }
    atomic_write_final_output(&file, &json)?;
    ctx.amend_source_files(&[file])
}

fn read_banks(ctx: &dyn CookContext, project: &FilePath) -> CookResult<Vec<Bank>> {
    let text = fs::read_to_string(ctx.paths().source_path(project))
        .map_err(|e| CookError::task(project, format!("cannot read project: {e}")))?;
    parse_project(project, &text)
}

impl CookTask for SoundProjectCookTask {
    fn name(&self) -> &'static str {
        "sound"
    }

    fn priority(&self) -> i32 {
        CookPriority::AUDIO
    }

    fn can_cook(&self, path: &FilePath) -> bool {
        path.file_type() == FileType::SoundProject
    }

    fn cook_all_out_of_date_content(&self, ctx: &dyn CookContext) -> CookResult<()> {
        default_out_of_date_cook(self, ctx, FileType::SoundProject, false)
    }

    fn get_sources(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<Vec<CookSource>> {
        let banks = read_banks(ctx, path)?;
        let mut sources = vec![CookSource::file(path.clone())];
        for bank in &banks {
            sources.push(CookSource::sibling(bank_path(path, &bank.name)));
            sources.extend(bank.samples.iter().cloned().map(CookSource::file));
        }
        Ok(sources)
    }

    fn internal_cook(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<()> {
        let banks = read_banks(ctx, path)?;

        for bank in &banks {
            let mut data = Vec::new();
            for sample in &bank.samples {
                let bytes = fs::read(ctx.paths().source_path(sample)).map_err(|e| {
                    CookError::task(path, format!("bank {}: cannot read {}: {}", bank.name, sample, e))
                })?;
                let name = sample.relative().as_bytes();
                data.write_all(&(name.len() as u32).to_le_bytes())?;
                data.write_all(name)?;
                data.write_all(&(bytes.len() as u64).to_le_bytes())?;
                data.write_all(&bytes)?;
            }
            let output = ctx.paths().cooked_path(&bank_path(path, &bank.name));
            atomic_write_final_output(&output, &data)?;
        }

        update_bank_listing(ctx, path, &banks)?;

        let output = ProjectOutput {
            project: path.relative_source_filename(),
            banks: banks.iter().map(|b| b.name.as_str()).collect(),
        };
        atomic_write_final_output(
            &ctx.paths().cooked_path(path),
            &serde_json::to_vec_pretty(&output)?,
        )
    }

    /// The project file only names the banks; the built output carries the
    /// timestamp.
    fn uses_output_timestamp(&self, path: &FilePath) -> bool {
        path.file_type() == FileType::SoundProject
    }
}
