//! Cooker configuration
//!
//! Settings come from a TOML file, then `ASSETCOOK_*` environment
//! variables, then command-line overrides applied by the binary.

pub mod package;

pub use package::{PackageCookConfig, PackageDefinition};

use crate::content::{ContentPaths, Platform};
use crate::error::{CookError, CookResult};
use crate::scc::P4Parameters;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the user's config directory
const USER_CONFIG_FILE: &str = "config.toml";

/// Location of the per-user settings file, if a home directory exists
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "assetcook", "assetcook")
        .map(|dirs| dirs.config_dir().join(USER_CONFIG_FILE))
}

/// Exclusivity lock polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub max_wait: Duration,
    /// Log a waiting message every this many failed attempts
    pub log_every: u32,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(120),
            log_every: 5,
        }
    }
}

/// Everything a cook session needs to know up front
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookerSettings {
    pub platform: Platform,
    /// Project root containing `Source/` and `Data/Content/`
    pub base_dir: PathBuf,
    /// Cooked output directory, the platform's own directory when unset
    pub content_dir: Option<PathBuf>,
    pub tools_dir: Option<PathBuf>,
    pub package_cook_config: Option<PathBuf>,
    /// Source file to cook on its own instead of a full session
    pub single_cook_path: Option<PathBuf>,
    pub debug_only: bool,
    /// Local sessions never touch version control
    pub local: bool,
    pub p4: Option<P4Parameters>,
    /// External compiler for `.lua` scripts; scripts are packed as-is without one
    pub script_compiler: Option<PathBuf>,
    pub lock: LockSettings,
    /// Worker threads for parallel batches, host parallelism when unset
    pub workers: Option<usize>,
}

impl Default for CookerSettings {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            base_dir: PathBuf::from("."),
            content_dir: None,
            tools_dir: None,
            package_cook_config: None,
            single_cook_path: None,
            debug_only: false,
            local: true,
            p4: None,
            script_compiler: None,
            lock: LockSettings::default(),
            workers: None,
        }
    }
}

impl CookerSettings {
    pub fn new(base_dir: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            base_dir: base_dir.into(),
            platform,
            ..Self::default()
        }
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> CookResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CookError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load from `path`, or from the user config file when it exists,
    /// then apply environment overrides.
    pub fn load_or_default(path: Option<&Path>) -> CookResult<Self> {
        let mut settings = match path {
            Some(path) => Self::load(path)?,
            None => match user_config_path().filter(|p| p.exists()) {
                Some(user) => Self::load(&user)?,
                None => Self::default(),
            },
        };
        settings.merge_env_vars();
        Ok(settings)
    }

    pub fn merge_env_vars(&mut self) {
        if let Ok(platform) = std::env::var("ASSETCOOK_PLATFORM") {
            if let Ok(platform) = platform.parse() {
                self.platform = platform;
            }
        }

        if let Ok(base_dir) = std::env::var("ASSETCOOK_BASE_DIR") {
            self.base_dir = PathBuf::from(base_dir);
        }

        if let Ok(tools_dir) = std::env::var("ASSETCOOK_TOOLS_DIR") {
            self.tools_dir = Some(PathBuf::from(tools_dir));
        }

        if let Ok(local) = std::env::var("ASSETCOOK_LOCAL") {
            if let Ok(value) = local.parse::<bool>() {
                self.local = value;
            }
        }

        if let Ok(password) = std::env::var("ASSETCOOK_P4_PASSWORD") {
            if let Some(p4) = self.p4.as_mut() {
                p4.password = Some(password);
            }
        }
    }

    /// Directory layout this session cooks into
    pub fn content_paths(&self) -> ContentPaths {
        let paths = ContentPaths::new(&self.base_dir, self.platform);
        match &self.content_dir {
            Some(dir) => paths.with_content_dir(dir),
            None => paths,
        }
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.tools_dir
            .clone()
            .unwrap_or_else(|| self.content_paths().default_tools_dir())
    }

    /// Perforce parameters when version control applies to this session
    pub fn active_p4(&self) -> Option<&P4Parameters> {
        self.p4.as_ref().filter(|p| !self.local && p.is_valid())
    }

    pub fn is_single_file(&self) -> bool {
        self.single_cook_path.is_some()
    }
}
