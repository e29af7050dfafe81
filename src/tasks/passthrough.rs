//! Data files cooked as compressed copies of their source

use super::write_compressed;
use crate::content::{FilePath, FileType};
use crate::error::CookResult;
use crate::task::{default_out_of_date_cook, CookContext, CookPriority, CookTask};
use std::fs;

const PASSTHROUGH_TYPES: [FileType; 5] = [
    FileType::Json,
    FileType::Csv,
    FileType::Text,
    FileType::Xml,
    FileType::Protobuf,
];

pub struct PassthroughCookTask;

impl CookTask for PassthroughCookTask {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn priority(&self) -> i32 {
        CookPriority::DEFAULT
    }

    fn can_cook(&self, path: &FilePath) -> bool {
        PASSTHROUGH_TYPES.contains(&path.file_type())
    }

    fn cook_all_out_of_date_content(&self, ctx: &dyn CookContext) -> CookResult<()> {
        for file_type in PASSTHROUGH_TYPES {
            default_out_of_date_cook(self, ctx, file_type, true)?;
        }
        Ok(())
    }

    fn internal_cook(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<()> {
        let data = fs::read(ctx.paths().source_path(path))?;
        write_compressed(&ctx.paths().cooked_path(path), &data)
    }
}
