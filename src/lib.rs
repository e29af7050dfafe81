//! # Assetcook
//!
//! Incremental asset cooking: converts authored source files into
//! platform-specific cooked content, re-cooking only what changed.
//!
//! ## Usage
//!
//! ```bash
//! assetcook --platform PC --base-dir path/to/project [--single Source/UI/menu.json]
//! ```
//!
//! ## Modules
//!
//! - `content` - File types, canonical asset paths and the on-disk layout
//! - `database` - Cook metadata, freshness checks and the dependency index
//! - `task` - The cook task contract, default batch flows and the parallel runner
//! - `tasks` - Built-in cook tasks and the task registry
//! - `cooker` - Session construction, exclusivity lock and orchestration
//! - `scc` - Source control clients
//! - `config` - Cooker settings and package cook configuration
//! - `app` - Logging and fatal error handling for the binary
pub mod app;
pub mod config;
pub mod content;
pub mod cooker;
pub mod database;
pub mod error;
pub mod scc;
pub mod task;
pub mod tasks;

pub use cooker::{Cooker, CookerState};
pub use error::{CookError, CookResult};
