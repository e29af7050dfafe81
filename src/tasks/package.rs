//! Package manifests over cooked content
//!
//! Runs after every other task. Each package configured in the package
//! cook config lists the cooked files under its root directories, with
//! sizes and digests, in `Packages/<name>.pkg`. A manifest is only
//! rewritten when its content changes.

use super::write_compressed;
use crate::config::PackageDefinition;
use crate::content::FilePath;
use crate::error::CookResult;
use crate::task::{atomic_write_final_output, CookContext, CookPriority, CookTask};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const PACKAGES_DIR: &str = "Packages";
const PACKAGE_EXTENSION: &str = "pkg";

pub struct PackageCookTask;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PackageManifest {
    pub name: String,
    pub files: Vec<PackageEntry>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PackageEntry {
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

/// Location of a package's manifest in the content directory
pub fn package_path(content_dir: &Path, name: &str) -> PathBuf {
    content_dir
        .join(PACKAGES_DIR)
        .join(format!("{name}.{PACKAGE_EXTENSION}"))
}

fn is_packaged(relative: &str) -> bool {
    let name = relative.rsplit('/').next().unwrap_or(relative);
    !name.starts_with('.')
        && !name.ends_with(".json")
        && !relative.starts_with(&format!("{PACKAGES_DIR}/"))
}

fn build_manifest(content_dir: &Path, package: &PackageDefinition) -> CookResult<PackageManifest> {
    let mut files = Vec::new();
    for root in &package.roots {
        let dir = content_dir.join(root.trim_matches('/'));
        for entry in WalkDir::new(&dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(content_dir) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if !is_packaged(&relative) {
                continue;
            }
            let data = fs::read(entry.path())?;
            files.push(PackageEntry {
                path: relative,
                size: data.len() as u64,
                sha256: format!("{:x}", Sha256::digest(&data)),
            });
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup_by(|a, b| a.path == b.path);
    Ok(PackageManifest {
        name: package.name.clone(),
        files,
    })
}

/// Files are opened for edit before being replaced and added once they
/// exist.
struct SourceControlOpen {
    added: Vec<PathBuf>,
}

impl SourceControlOpen {
    fn before_write(ctx: &dyn CookContext, files: &[PathBuf]) -> CookResult<Self> {
        let (existing, added): (Vec<PathBuf>, Vec<PathBuf>) =
            files.iter().cloned().partition(|f| f.exists());
        if !existing.is_empty() {
            let client = ctx.source_control();
            client.open_for_edit(
                &existing,
                &ctx.source_control_file_type_options(false, true),
                &mut |line| warn!("{}: {}", client.name(), line),
            )?;
        }
        Ok(Self { added })
    }

    fn after_write(self, ctx: &dyn CookContext) -> CookResult<()> {
        if self.added.is_empty() {
            return Ok(());
        }
        let client = ctx.source_control();
        client.open_for_add(
            &self.added,
            &ctx.source_control_file_type_options(false, true),
            &mut |line| warn!("{}: {}", client.name(), line),
        )
    }
}

impl CookTask for PackageCookTask {
    fn name(&self) -> &'static str {
        "package"
    }

    fn priority(&self) -> i32 {
        CookPriority::PACKAGE
    }

    fn cook_all_out_of_date_content(&self, ctx: &dyn CookContext) -> CookResult<()> {
        let Some(config) = ctx.package_cook_config() else {
            return Ok(());
        };
        let content_dir = ctx.paths().content_dir();

        for package in &config.packages {
            let manifest = build_manifest(content_dir, package)?;
            let json = serde_json::to_vec_pretty(&manifest)?;
            let output = package_path(content_dir, &package.name);

            let stamp = output.with_extension(format!("{PACKAGE_EXTENSION}.sha256"));
            let digest = format!("{:x}", Sha256::digest(&json));
            if fs::read_to_string(&stamp).is_ok_and(|d| d == digest) && output.exists() {
                debug!("{}: package {} unchanged", ctx.progress_name(self.name()), package.name);
                continue;
            }

            let open = if package.include_in_source_control {
                Some(SourceControlOpen::before_write(ctx, &[output.clone(), stamp.clone()])?)
            } else {
                None
            };

            if package.compress {
                write_compressed(&output, &json)?;
            } else {
                atomic_write_final_output(&output, &json)?;
            }
            atomic_write_final_output(&stamp, digest.as_bytes())?;

            if let Some(open) = open {
                open.after_write(ctx)?;
            }
            info!(
                "{}: wrote package {} ({} files)",
                ctx.progress_name(self.name()),
                package.name,
                manifest.files.len()
            );
        }
        Ok(())
    }

    fn internal_cook(&self, _ctx: &dyn CookContext, _path: &FilePath) -> CookResult<()> {
        Ok(())
    }
}
