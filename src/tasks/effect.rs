//! Shader effects, flattened with their `#include`d headers

use crate::content::{FilePath, FileType};
use crate::database::CookSource;
use crate::error::{CookError, CookResult};
use crate::task::{
    atomic_write_final_output, default_out_of_date_cook, CookContext, CookPriority, CookTask,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;

static INCLUDE_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*#\s*include\s+"([^"]+)"\s*$"#).expect("Invalid include pattern")
});

pub struct EffectCookTask;

/// Result of flattening an effect
#[derive(Debug, Default)]
struct Preprocessed {
    text: String,
    /// Headers in first-inclusion order
    headers: Vec<FilePath>,
}

/// Resolve an include against the including file's directory.
/// Only `.fxh` headers are followed.
fn resolve_include(including: &FilePath, include: &str) -> Option<FilePath> {
    let include = include.replace('\\', "/");
    let ext = FileType::EffectHeader.source_extension();
    let stem_len = include.len().checked_sub(ext.len())?;
    if !include.is_char_boundary(stem_len) || !include[stem_len..].eq_ignore_ascii_case(ext) {
        return None;
    }

    let mut parts: Vec<&str> = including
        .parent()
        .split('/')
        .filter(|p| !p.is_empty())
        .collect();
    for part in include[..stem_len].split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(FilePath::new(parts.join("/"), FileType::EffectHeader))
}

fn preprocess(ctx: &dyn CookContext, effect: &FilePath) -> CookResult<Preprocessed> {
    let mut out = Preprocessed::default();
    let mut seen = BTreeSet::new();
    expand(ctx, effect, effect, &mut seen, &mut out)?;
    Ok(out)
}

fn expand(
    ctx: &dyn CookContext,
    effect: &FilePath,
    file: &FilePath,
    seen: &mut BTreeSet<FilePath>,
    out: &mut Preprocessed,
) -> CookResult<()> {
    let source = ctx.paths().source_path(file);
    let text = fs::read_to_string(&source)
        .map_err(|e| CookError::task(effect, format!("cannot read {}: {}", file, e)))?;

    for line in text.lines() {
        let Some(captures) = INCLUDE_DIRECTIVE.captures(line) else {
            out.text.push_str(line);
            out.text.push('\n');
            continue;
        };
        let header = resolve_include(file, &captures[1]).ok_or_else(|| {
            CookError::task(effect, format!("{}: unsupported include {}", file, &captures[1]))
        })?;
        // Each header is inlined once.
        if seen.insert(header.clone()) {
            out.headers.push(header.clone());
            expand(ctx, effect, &header, seen, out)?;
        }
    }
    Ok(())
}

impl CookTask for EffectCookTask {
    fn name(&self) -> &'static str {
        "effect"
    }

    fn priority(&self) -> i32 {
        CookPriority::EFFECT
    }

    fn can_cook(&self, path: &FilePath) -> bool {
        path.file_type() == FileType::Effect
    }

    fn cook_all_out_of_date_content(&self, ctx: &dyn CookContext) -> CookResult<()> {
        default_out_of_date_cook(self, ctx, FileType::Effect, true)
    }

    fn get_sources(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<Vec<CookSource>> {
        let preprocessed = preprocess(ctx, path)?;
        let mut sources = vec![CookSource::file(path.clone())];
        sources.extend(preprocessed.headers.into_iter().map(CookSource::file));
        Ok(sources)
    }

    fn internal_cook(&self, ctx: &dyn CookContext, path: &FilePath) -> CookResult<()> {
        let preprocessed = preprocess(ctx, path)?;
        atomic_write_final_output(&ctx.paths().cooked_path(path), preprocessed.text.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::set_modified_time;
    use crate::task::test_support::TestContext;

    #[test]
    fn test_resolve_include() {
        let effect = FilePath::new("Fx/Lit/water", FileType::Effect);
        assert_eq!(
            resolve_include(&effect, "common.fxh"),
            Some(FilePath::new("Fx/Lit/common", FileType::EffectHeader))
        );
        assert_eq!(
            resolve_include(&effect, "../Shared/light.FXH"),
            Some(FilePath::new("Fx/Shared/light", FileType::EffectHeader))
        );
        assert_eq!(resolve_include(&effect, "common.h"), None);
        assert_eq!(resolve_include(&effect, "../../../x.fxh"), None);
    }

    fn effect_tree(ctx: &TestContext) -> FilePath {
        let effect = ctx.add_source("Fx/water", FileType::Effect);
        ctx.write_source(&effect, "#include \"common.fxh\"\nfloat4 main();\n");
        let common = FilePath::new("Fx/common", FileType::EffectHeader);
        ctx.write_source(&common, "#include \"Shared/light.fxh\"\nfloat4 tint;\n");
        let light = FilePath::new("Fx/Shared/light", FileType::EffectHeader);
        // Cycle back to common is ignored.
        ctx.write_source(&light, "#include \"../common.fxh\"\nfloat3 sun;\n");
        effect
    }

    #[test]
    fn test_transitive_headers_are_sources() {
        let ctx = TestContext::new();
        let effect = effect_tree(&ctx);

        let sources: Vec<FilePath> = EffectCookTask
            .get_sources(&ctx, &effect)
            .unwrap()
            .into_iter()
            .map(|s| s.path)
            .collect();
        assert_eq!(
            sources,
            vec![
                effect.clone(),
                FilePath::new("Fx/common", FileType::EffectHeader),
                FilePath::new("Fx/Shared/light", FileType::EffectHeader),
            ]
        );
    }

    #[test]
    fn test_header_change_makes_effect_stale() {
        let ctx = TestContext::new();
        let effect = effect_tree(&ctx);
        EffectCookTask.cook_all_out_of_date_content(&ctx).unwrap();

        let cooked = fs::read_to_string(ctx.paths().cooked_path(&effect)).unwrap();
        assert_eq!(cooked, "float3 sun;\nfloat4 tint;\nfloat4 main();\n");
        assert!(ctx.database().check_up_to_date(&effect));

        let light = FilePath::new("Fx/Shared/light", FileType::EffectHeader);
        assert_eq!(ctx.database().get_dependents(&light), vec![effect.clone()]);

        let header = ctx.paths().source_path(&light);
        set_modified_time(&header, 1_000_000_000).unwrap();
        ctx.database().on_file_change(&light);
        let freshness = ctx.database().check_up_to_date_with_details(&effect);
        assert_eq!(freshness.changed(), &[light]);
    }

    #[test]
    fn test_missing_header_is_a_task_error() {
        let ctx = TestContext::new();
        let effect = ctx.add_source("Fx/broken", FileType::Effect);
        ctx.write_source(&effect, "#include \"nope.fxh\"\n");
        let err = EffectCookTask.cook_single(&ctx, &effect).unwrap_err();
        assert!(matches!(err, CookError::Task { .. }));
    }
}
