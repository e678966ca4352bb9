//! Progress surface for the terminal front end

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Shows the progress of a running job
pub trait ProgressSurface {
    fn show_progress(&mut self);
    fn set_progress(&mut self, percent: u8);
    fn set_status(&mut self, message: &str);
    fn hide_progress(&mut self);
}

/// indicatif progress bar on stderr
pub struct TerminalSurface {
    bar: Option<ProgressBar>,
    visible: bool,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self {
            bar: None,
            visible: true,
        }
    }

    /// Surface that never draws
    pub fn hidden() -> Self {
        Self {
            bar: None,
            visible: false,
        }
    }
}

#[cfg(test)]
impl TerminalSurface {
    pub fn is_shown(&self) -> bool {
        self.bar.is_some()
    }

    pub fn position(&self) -> Option<u64> {
        self.bar.as_ref().map(|b| b.position())
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSurface for TerminalSurface {
    fn show_progress(&mut self) {
        let target = if self.visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(Some(100), target);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        self.bar = Some(bar);
    }

    fn set_progress(&mut self, percent: u8) {
        if let Some(bar) = &self.bar {
            bar.set_position(percent.min(100) as u64);
        }
    }

    fn set_status(&mut self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    fn hide_progress(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
