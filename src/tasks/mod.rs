//! Built-in cook tasks and the registry the cooker instantiates them from

pub mod effect;
pub mod package;
pub mod passthrough;
pub mod script;
pub mod script_project;
pub mod sound;
pub mod texture;

pub use effect::EffectCookTask;
pub use package::PackageCookTask;
pub use passthrough::PassthroughCookTask;
pub use script::ScriptCookTask;
pub use script_project::ScriptProjectCookTask;
pub use sound::SoundProjectCookTask;
pub use texture::TextureCookTask;

use crate::error::CookResult;
use crate::task::{atomic_write_final_output_with, CookTask};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;

type TaskFactory = Box<dyn Fn() -> Box<dyn CookTask> + Send + Sync>;

/// Statically registered task constructors.
///
/// Every session instantiates each registered task once and runs them in
/// ascending priority order.
#[derive(Default)]
pub struct TaskRegistry {
    factories: Vec<TaskFactory>,
}

impl TaskRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every task shipped with the crate
    pub fn builtin() -> Self {
        Self::empty()
            .register(|| Box::new(PassthroughCookTask))
            .register(|| Box::new(ScriptCookTask))
            .register(|| Box::new(EffectCookTask))
            .register(|| Box::new(ScriptProjectCookTask))
            .register(|| Box::new(SoundProjectCookTask))
            .register(|| Box::new(TextureCookTask))
            .register(|| Box::new(PackageCookTask))
    }

    pub fn register<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn CookTask> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(factory));
        self
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// One instance of every task, sorted by priority. Registration order
    /// breaks ties.
    pub fn instantiate(&self) -> Vec<Box<dyn CookTask>> {
        let mut tasks: Vec<Box<dyn CookTask>> = self.factories.iter().map(|f| f()).collect();
        tasks.sort_by_key(|t| t.priority());
        tasks
    }
}

/// Write `data` zlib-compressed as the final output
pub(crate) fn write_compressed(output: &Path, data: &[u8]) -> CookResult<()> {
    atomic_write_final_output_with(output, |file| {
        let mut encoder = ZlibEncoder::new(file, Compression::default());
        encoder.write_all(data)?;
        encoder.finish()?;
        Ok(())
    })
}
