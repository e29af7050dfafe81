//! Cook session orchestration
//!
//! A [`Cooker`] constructs its session on the blocking pool as soon as it
//! is created; cooking waits for that construction to finish. One cooker
//! runs one cook. A failed session is not retried; create a new cooker,
//! which also takes the exclusivity lock again.

pub mod lock;
pub mod progress;
pub mod session;
pub mod source_index;

pub use lock::CookerLock;
pub use progress::ProgressReporter;
pub use session::{CookerSession, SessionOptions};
pub use source_index::SourceIndex;

use crate::config::CookerSettings;
use crate::content::Platform;
use crate::error::{CookError, CookResult};
use crate::scc::SourceControlClient;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookerState {
    Constructing,
    Ready,
    ConstructFailed,
    Cooking,
    Done,
    Failed,
}

impl fmt::Display for CookerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CookerState::Constructing => "constructing",
            CookerState::Ready => "ready",
            CookerState::ConstructFailed => "construction failed",
            CookerState::Cooking => "cooking",
            CookerState::Done => "done",
            CookerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub struct Cooker {
    platform: Platform,
    state: CookerState,
    construction: Option<JoinHandle<CookResult<CookerSession>>>,
    session: Option<Arc<CookerSession>>,
    cancel: Arc<AtomicBool>,
}

impl Cooker {
    /// Start constructing a session with the built-in tasks.
    /// Must be called from within a tokio runtime.
    pub fn new(settings: CookerSettings) -> Self {
        Self::with_options(settings, SessionOptions::default())
    }

    pub fn with_options(settings: CookerSettings, options: SessionOptions) -> Self {
        let platform = settings.platform;
        let cancel = Arc::new(AtomicBool::new(false));
        let construction = {
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                CookerSession::construct(settings, options, &cancel)
            })
        };

        Self {
            platform,
            state: CookerState::Constructing,
            construction: Some(construction),
            session: None,
            cancel,
        }
    }

    pub fn state(&self) -> CookerState {
        self.state
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Ask an in-progress construction to stop at its next check
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// The constructed session, once construction has been awaited
    pub fn session(&self) -> Option<&Arc<CookerSession>> {
        self.session.as_ref()
    }

    /// Wait for construction to finish
    pub async fn wait_for_construction(&mut self) -> CookResult<()> {
        if let Some(handle) = self.construction.take() {
            let result = handle.await.map_err(|e| {
                CookError::Other(anyhow::anyhow!("cooker construction did not complete: {e}"))
            })?;
            match result {
                Ok(session) => {
                    self.session = Some(Arc::new(session));
                    self.state = CookerState::Ready;
                }
                Err(e) => {
                    error!("{}: cooker construction failed: {}", self.platform, e);
                    self.state = CookerState::ConstructFailed;
                    return Err(e);
                }
            }
        }

        match self.state {
            CookerState::ConstructFailed => {
                Err(CookError::invalid_state("cooker construction failed"))
            }
            _ => Ok(()),
        }
    }

    /// Full session: every task's out-of-date content, in priority order
    pub async fn cook_all_out_of_date_content(&mut self) -> CookResult<()> {
        self.run(|session| session.cook_all()).await
    }

    /// Cook one source file, given absolute or relative to the source
    /// directory
    pub async fn cook_single(&mut self, source: impl Into<PathBuf>) -> CookResult<()> {
        let source = source.into();
        self.run(move |session| session.cook_single(&source)).await
    }

    async fn run<F>(&mut self, cook: F) -> CookResult<()>
    where
        F: FnOnce(&CookerSession) -> CookResult<()> + Send + 'static,
    {
        self.wait_for_construction().await?;
        if self.state != CookerState::Ready {
            return Err(CookError::invalid_state(format!(
                "cannot cook, cooker is {}",
                self.state
            )));
        }
        let session = self
            .session
            .clone()
            .ok_or_else(|| CookError::bug("ready cooker without a session"))?;

        self.state = CookerState::Cooking;
        let start = Instant::now();
        let result = tokio::task::spawn_blocking(move || cook(&session))
            .await
            .map_err(|e| CookError::Other(anyhow::anyhow!("cook did not complete: {e}")))
            .and_then(|r| r);

        self.state = if result.is_ok() {
            CookerState::Done
        } else {
            CookerState::Failed
        };
        info!(
            "{}-Cooking: {} ({:.2} s)",
            self.platform,
            if result.is_ok() { "OK" } else { "FAIL" },
            start.elapsed().as_secs_f64()
        );
        result
    }
}

/// Bring the platform's generated sources to head before a full cook.
///
/// Single-file sessions never sync.
pub fn sync_generated_sources(
    settings: &CookerSettings,
    client: &dyn SourceControlClient,
) -> CookResult<()> {
    if settings.is_single_file() {
        return Ok(());
    }
    let generated = settings
        .content_paths()
        .source_dir()
        .join(settings.platform.generated_dir_name())
        .join("...");
    let depot_path = generated.to_string_lossy().replace('\\', "/");
    info!("Syncing {}", depot_path);
    client.sync(&[depot_path], &mut |line| warn!("{}: {}", client.name(), line))
}

impl Drop for Cooker {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scc::{MockSourceControlClient, SccCall};

    #[test]
    fn test_sync_generated_sources() {
        let settings = CookerSettings::new("/project", Platform::IOS);
        let client = MockSourceControlClient::new();
        sync_generated_sources(&settings, &client).unwrap();
        assert_eq!(
            client.calls(),
            vec![SccCall::Sync(vec!["/project/Source/GeneratedIOS/...".to_string()])]
        );

        let single = CookerSettings {
            single_cook_path: Some(PathBuf::from("UI/menu.json")),
            ..settings
        };
        let client = MockSourceControlClient::new();
        sync_generated_sources(&single, &client).unwrap();
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CookerState::ConstructFailed.to_string(), "construction failed");
        assert_eq!(CookerState::Done.to_string(), "done");
    }
}
