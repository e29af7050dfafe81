//! Textures, converted once into every mip level

use crate::content::{FilePath, FileType};
use crate::error::{CookError, CookResult};
use crate::task::{
    atomic_write_final_output_with, default_out_of_date_cook_multi, post_cook_update_metadata,
    CookContext, CookPriority, CookTask,
};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;

const MAGIC: &[u8; 3] = b"SIF";

pub struct TextureCookTask;

fn level_of(file_type: FileType) -> Option<u8> {
    FileType::TEXTURES
        .iter()
        .position(|t| *t == file_type)
        .map(|i| i as u8)
}

/// Level `n` keeps every `2^n`-th byte of the source image
fn encode_level(source: &[u8], level: u8) -> Vec<u8> {
    source.iter().step_by(1 << level).copied().collect()
}

impl TextureCookTask {
    /// All levels of the texture, whichever level was requested
    fn all_levels(path: &FilePath) -> Vec<FilePath> {
        FileType::TEXTURES.iter().map(|t| path.with_type(*t)).collect()
    }

    fn convert(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<()> {
        let source = fs::read(ctx.paths().source_path(path))
            .map_err(|e| CookError::task(path, format!("cannot read image: {e}")))?;

        for level_path in Self::all_levels(path) {
            let level = level_of(level_path.file_type())
                .ok_or_else(|| CookError::bug(format!("{level_path} is not a texture")))?;
            let pixels = encode_level(&source, level);
            atomic_write_final_output_with(&ctx.paths().cooked_path(&level_path), |file| {
                file.write_all(MAGIC)?;
                file.write_all(&[level])?;
                file.write_all(&(source.len() as u64).to_le_bytes())?;
                let mut encoder = ZlibEncoder::new(file, Compression::fast());
                encoder.write_all(&pixels)?;
                encoder.finish()?;
                Ok(())
            })?;
        }
        Ok(())
    }
}

impl CookTask for TextureCookTask {
    fn name(&self) -> &'static str {
        "texture"
    }

    fn priority(&self) -> i32 {
        CookPriority::TEXTURE
    }

    fn can_cook(&self, path: &FilePath) -> bool {
        path.file_type().is_texture()
    }

    /// A single level cannot be produced on its own; every level is cooked
    /// and committed.
    fn cook_single(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<()> {
        self.convert(ctx, path)?;
        post_cook_update_metadata(self, ctx, &Self::all_levels(path))
    }

    fn cook_all_out_of_date_content(&self, ctx: &dyn CookContext) -> CookResult<()> {
        default_out_of_date_cook_multi(self, ctx, &FileType::TEXTURES, true)
    }

    fn internal_cook(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<()> {
        self.convert(ctx, path)
    }

    fn internal_cook_multi(&self, ctx: &dyn CookContext, paths: &[FilePath]) -> CookResult<()> {
        match paths.first() {
            Some(first) => self.convert(ctx, first),
            None => Ok(()),
        }
    }
}
