//! Terminal progress bars for cook batches

use crate::task::ProgressUpdate;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

const BAR_TEMPLATE: &str =
    "{spinner:.green} {prefix:>20} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";

/// One bar per `<platform>-<task>` key
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new(enabled: bool) -> Self {
        let target = if enabled {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn create_bar(&self, name: &str, total: usize) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new(total as u64));
        match ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("##-")),
            Err(e) => warn!("Invalid progress template: {}", e),
        }
        bar.set_prefix(name.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }

    pub fn advance(&self, update: &ProgressUpdate) {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        let bar = bars
            .entry(update.name.clone())
            .or_insert_with(|| self.create_bar(&update.name, update.total));
        bar.set_length(update.total as u64);
        bar.set_position(update.completed as u64);
        if update.active > 0 {
            bar.set_message(format!("{} active", update.active));
        } else {
            bar.set_message("");
        }
    }

    /// Close the bar of a batch and log its outcome
    pub fn complete(&self, name: &str, elapsed: Duration, success: bool) {
        let bar = self
            .bars
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        let outcome = if success { "OK" } else { "FAIL" };
        if let Some(bar) = bar {
            bar.finish_with_message(outcome);
        }
        info!("{}: {} ({:.2} s)", name, outcome, elapsed.as_secs_f64());
    }

    /// Batches that have reported progress but not completed
    pub fn active_batches(&self) -> usize {
        self.bars.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
