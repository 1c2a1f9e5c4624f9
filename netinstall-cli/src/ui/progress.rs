//! Progress rendering for install sessions.
//!
//! Indeterminate progress shows a spinner; determinate progress switches to
//! a percentage bar. The message next to it is the latest status line, or a
//! task label derived from the fraction while bytes are flowing.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use netinstall::ProgressEvent;

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const BAR_TEMPLATE: &str = "[{bar:40.cyan/blue}] {pos:>3}%  {msg}";

/// Label describing roughly where the installation is.
pub fn task_label(fraction: f64) -> &'static str {
    if fraction < 0.3 {
        "Downloading components..."
    } else if fraction < 0.6 {
        "Extracting files..."
    } else if fraction < 0.9 {
        "Configuring application..."
    } else {
        "Finalizing installation..."
    }
}

/// Percentage shown on the bar, clamped to 0..=100.
pub fn percent(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u64
}

/// A spinner that turns into a bar once progress becomes determinate.
pub struct ProgressView {
    bar: ProgressBar,
    determinate: bool,
}

impl ProgressView {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(spinner_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self {
            bar,
            determinate: false,
        }
    }

    /// Render a progress event.
    pub fn progress(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Indeterminate => {
                if self.determinate {
                    self.bar.set_style(spinner_style());
                    self.determinate = false;
                }
            }
            ProgressEvent::Determinate(fraction) => {
                if !self.determinate {
                    self.bar.set_style(bar_style());
                    self.determinate = true;
                }
                self.bar.set_position(percent(fraction));
                self.bar.set_message(task_label(fraction));
            }
        }
    }

    /// Render a status line.
    pub fn status(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Print a line above the bar without disturbing it.
    pub fn println(&self, line: impl AsRef<str>) {
        self.bar.println(line);
    }

    /// Stop rendering, leaving `message` as the final line.
    pub fn finish(&self, message: String) {
        self.bar.disable_steady_tick();
        if self.determinate {
            self.bar.finish_with_message(message);
        } else {
            self.bar.finish_and_clear();
            println!("{}", message);
        }
    }
}

impl Default for ProgressView {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_label_thresholds() {
        assert_eq!(task_label(0.0), "Downloading components...");
        assert_eq!(task_label(0.29), "Downloading components...");
        assert_eq!(task_label(0.3), "Extracting files...");
        assert_eq!(task_label(0.59), "Extracting files...");
        assert_eq!(task_label(0.6), "Configuring application...");
        assert_eq!(task_label(0.89), "Configuring application...");
        assert_eq!(task_label(0.9), "Finalizing installation...");
        assert_eq!(task_label(1.0), "Finalizing installation...");
    }

    #[test]
    fn test_percent_is_clamped() {
        assert_eq!(percent(-0.5), 0);
        assert_eq!(percent(0.456), 46);
        assert_eq!(percent(1.0), 100);
        assert_eq!(percent(3.0), 100);
    }

    #[test]
    fn test_println_keeps_bar_running() {
        let mut view = ProgressView::new();
        view.progress(ProgressEvent::Determinate(0.2));
        view.println("Primary download failed. Trying backup source...");

        assert!(!view.bar.is_finished());
        assert_eq!(view.bar.position(), 20);
        view.finish("done".to_string());
    }

    #[test]
    fn test_view_switches_to_bar() {
        let mut view = ProgressView::new();
        view.progress(ProgressEvent::Indeterminate);
        assert!(!view.determinate);

        view.progress(ProgressEvent::Determinate(0.5));
        assert!(view.determinate);
        assert_eq!(view.bar.position(), 50);
        assert_eq!(view.bar.message(), "Extracting files...");

        view.finish("done".to_string());
        assert!(view.bar.is_finished());
    }
}
