//! Terminal progress bars for tracked render jobs.

use std::sync::{Arc, Mutex, PoisonError};

use indicatif::{ProgressBar, ProgressStyle};
use reelbatch_render_engine::runner::{ProgressCallback, RenderProgress, RenderStage};

/// One bar per running job, replaced when the next job starts.
#[derive(Default)]
pub struct ProgressBars {
    current: Mutex<Option<ProgressBar>>,
}

impl ProgressBars {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn callback(self: &Arc<Self>) -> ProgressCallback {
        let bars = Arc::clone(self);
        Arc::new(move |progress: &RenderProgress| bars.update(progress))
    }

    fn update(&self, progress: &RenderProgress) {
        let mut slot = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let position = to_millis(progress.state.current_secs);

        match progress.stage {
            RenderStage::Started => {
                if let Some(stale) = slot.take() {
                    stale.abandon();
                }
                let bar = ProgressBar::new(to_millis(progress.state.total_secs));
                bar.set_style(bar_style());
                bar.set_prefix(progress.label.clone());
                *slot = Some(bar);
            }
            RenderStage::Running => {
                if let Some(bar) = slot.as_ref() {
                    bar.set_position(position);
                }
            }
            RenderStage::Complete => {
                if let Some(bar) = slot.take() {
                    bar.set_position(position);
                    bar.finish();
                }
            }
            RenderStage::Failed => {
                if let Some(bar) = slot.take() {
                    bar.abandon_with_message("failed");
                }
            }
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:>12} [{bar:40.cyan/blue}] {percent:>3}% [{elapsed_precise}<{eta_precise}] {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ")
}

fn to_millis(secs: f64) -> u64 {
    (secs.max(0.0) * 1000.0).round() as u64
}
