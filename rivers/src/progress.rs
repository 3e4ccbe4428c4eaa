use std::fmt;
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Stamps pipeline log lines with the time elapsed since the pipeline started.
///
/// Lines look like `  12.34s Merging 1200 unique HUC8s`. The reporter only holds
/// the start instant and is cheap to copy into every component.
#[derive(Debug, Clone, Copy)]
pub struct ProgressReporter {
    started_at: Instant,
}

impl ProgressReporter {
    /// Starts measuring from now.
    pub fn start() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Measures from `started_at`.
    pub fn starting_at(started_at: Instant) -> Self {
        Self { started_at }
    }

    /// Returns the time elapsed since the pipeline started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Formats `message` with the elapsed seconds prefix.
    pub fn format_line(&self, message: impl fmt::Display) -> String {
        format_elapsed(self.elapsed(), message)
    }

    /// Logs a progress line.
    pub fn log(&self, message: impl fmt::Display) {
        info!("{}", self.format_line(message));
    }

    /// Logs a progress line about work that was given up on.
    pub fn warn(&self, message: impl fmt::Display) {
        warn!("{}", self.format_line(message));
    }

    /// Returns whether a progress line is due with `remaining` keys left.
    pub fn should_report(remaining: u64, interval: u64) -> bool {
        interval != 0 && remaining % interval == 0
    }
}

fn format_elapsed(elapsed: Duration, message: impl fmt::Display) -> String {
    format!("{:>7.2}s {message}", elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_prefix_is_right_aligned() {
        assert_eq!(
            format_elapsed(Duration::from_millis(1_500), "Table created"),
            "   1.50s Table created"
        );
        assert_eq!(
            format_elapsed(Duration::from_secs(12_345), "All done!"),
            "12345.00s All done!"
        );
    }

    #[test]
    fn reports_on_interval_boundaries() {
        assert!(ProgressReporter::should_report(20_000, 10_000));
        assert!(ProgressReporter::should_report(0, 100));
        assert!(!ProgressReporter::should_report(99, 100));
        assert!(!ProgressReporter::should_report(5, 0));
    }

    #[test]
    fn elapsed_grows_from_start() {
        let started_at = Instant::now() - Duration::from_secs(2);
        let progress = ProgressReporter::starting_at(started_at);

        assert!(progress.elapsed() >= Duration::from_secs(2));
    }
}
