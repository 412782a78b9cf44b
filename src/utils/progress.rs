//! Progress indicators for superbuild runs
//!
//! One overall bar counts finished dependencies; each running dependency
//! gets its own spinner showing the phase it is in. Everything is hidden
//! when progress is disabled, either with `--no-progress` or by setting
//! `SUPERBUILD_NO_PROGRESS`, so scripted runs and CI logs stay clean.
//!
//! ```rust,no_run
//! use superbuild_cli::utils::progress::BuildProgress;
//!
//! let progress = BuildProgress::new(2, true);
//! let spinner = progress.start_task("zlib");
//! spinner.set_message("configure");
//! progress.finish_task(&spinner, "zlib installed");
//! progress.finish();
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

use crate::constants::NO_PROGRESS_ENV;

/// Returns whether progress output has been turned off through the environment.
#[must_use]
pub fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).is_ok()
}

/// Spinner or bar handle, hidden when progress is disabled.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// A bar counting `len` units of work.
    #[must_use]
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(default_style());
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// A ticking spinner for work of unknown length.
    #[must_use]
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// A handle that never draws.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.inner.set_prefix(prefix.into());
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn default_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

/// Multi-line progress display for one superbuild run.
pub struct BuildProgress {
    multi: Option<indicatif::MultiProgress>,
    overall: ProgressBar,
}

impl BuildProgress {
    /// Create the display for `total` dependencies.
    ///
    /// `enabled = false` (or `SUPERBUILD_NO_PROGRESS`) produces a display
    /// where every handle is hidden.
    #[must_use]
    pub fn new(total: usize, enabled: bool) -> Self {
        if !enabled || is_progress_disabled() {
            return Self {
                multi: None,
                overall: ProgressBar::hidden(),
            };
        }

        let multi = indicatif::MultiProgress::new();
        let overall = ProgressBar {
            inner: multi.add(ProgressBar::new(total as u64).inner),
        };
        overall.set_prefix("superbuild");
        Self {
            multi: Some(multi),
            overall,
        }
    }

    /// Add a spinner for a dependency that just started.
    #[must_use]
    pub fn start_task(&self, name: &str) -> ProgressBar {
        let Some(multi) = &self.multi else {
            return ProgressBar::hidden();
        };
        let spinner = ProgressBar {
            inner: multi.add(ProgressBar::new_spinner().inner),
        };
        spinner.set_prefix(name.to_string());
        spinner
    }

    /// Retire a dependency's spinner and advance the overall bar.
    pub fn finish_task(&self, spinner: &ProgressBar, msg: impl Into<String>) {
        spinner.finish_with_message(msg);
        self.overall.inc(1);
    }

    /// Clear the display.
    pub fn finish(&self) {
        self.overall.finish_and_clear();
    }
}
