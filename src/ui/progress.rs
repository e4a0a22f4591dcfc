use crate::extractor::{RunEvent, RunOutcome};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct ProgressManager {
    multi_progress: MultiProgress,
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            enabled,
        }
    }

    /// Folder percentage bar; its message carries the ETA label.
    pub fn create_run_progress(&self) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new(100));
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        pb.set_message("Scanning folders...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new_spinner());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        pb.set_message(message.to_string());
        pb
    }

    pub fn suspend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if self.enabled {
            self.multi_progress.suspend(f)
        } else {
            f()
        }
    }

    pub fn clear(&self) {
        if self.enabled {
            self.multi_progress.clear().ok();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new(true)
    }
}

/// The two bars shown while a run is in flight.
pub struct RunProgress {
    folders: ProgressBar,
    status: ProgressBar,
}

impl RunProgress {
    pub fn new(manager: &ProgressManager) -> Self {
        Self {
            folders: manager.create_run_progress(),
            status: manager.create_spinner("Starting..."),
        }
    }

    pub fn handle(&self, event: &RunEvent) {
        match event {
            RunEvent::Progress { percent, label } => {
                self.folders.set_position(u64::from(*percent));
                self.folders.set_message(label.clone());
            }
            RunEvent::Status(message) => self.status.set_message(message.clone()),
            RunEvent::Done(outcome) => self.finish(outcome),
        }
    }

    pub fn finish(&self, outcome: &RunOutcome) {
        let message = if outcome.is_cancelled() {
            format!("cancelled after {}", format_duration(outcome.elapsed))
        } else {
            format!("completed in {}", format_duration(outcome.elapsed))
        };

        if outcome.is_cancelled() {
            self.folders.abandon_with_message(message);
        } else {
            self.folders.finish_with_message(message);
        }
        self.status.finish_and_clear();
    }

    pub fn position(&self) -> u64 {
        self.folders.position()
    }

    pub fn status_message(&self) -> String {
        self.status.message()
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
