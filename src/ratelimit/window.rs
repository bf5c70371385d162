//! Time windows and the fixed window set enforced by the limiter.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::{MayflyError, Result};

/// Standard time window lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    /// Per-minute rate limiting
    Minute,
    /// Per-hour rate limiting
    Hour,
    /// Per-day rate limiting
    Day,
}

impl TimeWindow {
    /// Get the duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Minute => Duration::from_secs(60),
            TimeWindow::Hour => Duration::from_secs(3600),
            TimeWindow::Day => Duration::from_secs(86400),
        }
    }

    /// Name used when reporting quota for this window.
    pub fn name(&self) -> &'static str {
        match self {
            TimeWindow::Minute => "minute",
            TimeWindow::Hour => "hour",
            TimeWindow::Day => "day",
        }
    }
}

/// A single named sliding window with its request ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitWindow {
    name: String,
    duration: Duration,
    max_count: usize,
}

impl LimitWindow {
    pub fn new(name: impl Into<String>, duration: Duration, max_count: usize) -> Self {
        Self {
            name: name.into(),
            duration,
            max_count,
        }
    }

    /// Build a window from one of the standard lengths.
    pub fn standard(window: TimeWindow, max_count: usize) -> Self {
        Self::new(window.name(), window.duration(), max_count)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Oldest timestamp still inside this window at `now`.
    ///
    /// The bound is inclusive. Early clocks saturate at zero.
    pub fn cutoff(&self, now: Duration) -> Duration {
        now.saturating_sub(self.duration)
    }
}

/// The ordered, immutable set of windows checked on every admission.
///
/// Windows are evaluated in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    windows: Vec<LimitWindow>,
    log_cap: usize,
    longest: Duration,
}

impl WindowSpec {
    /// Create a window set. Names must be unique and the set non-empty.
    pub fn new(windows: Vec<LimitWindow>) -> Result<Self> {
        if windows.is_empty() {
            return Err(MayflyError::InvalidWindows(
                "at least one window is required".to_string(),
            ));
        }

        {
            let mut seen = HashSet::new();
            if let Some(dup) = windows.iter().find(|w| !seen.insert(w.name())) {
                return Err(MayflyError::InvalidWindows(format!(
                    "duplicate window name: {}",
                    dup.name()
                )));
            }
        }

        // Both are non-empty by the check above.
        let log_cap = windows.iter().map(LimitWindow::max_count).max().unwrap_or(0);
        let longest = windows
            .iter()
            .map(LimitWindow::duration)
            .max()
            .unwrap_or(Duration::ZERO);

        Ok(Self {
            windows,
            log_cap,
            longest,
        })
    }

    /// The service's fixed limits: 10/minute, 100/hour, 1000/day.
    pub fn standard() -> Self {
        Self {
            windows: vec![
                LimitWindow::standard(TimeWindow::Minute, 10),
                LimitWindow::standard(TimeWindow::Hour, 100),
                LimitWindow::standard(TimeWindow::Day, 1000),
            ],
            log_cap: 1000,
            longest: TimeWindow::Day.duration(),
        }
    }

    pub fn windows(&self) -> &[LimitWindow] {
        &self.windows
    }

    /// Largest `max_count` across all windows; the per-client log never
    /// holds more entries than this.
    pub fn log_cap(&self) -> usize {
        self.log_cap
    }

    /// Duration of the longest window.
    pub fn longest(&self) -> Duration {
        self.longest
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_duration() {
        assert_eq!(TimeWindow::Minute.duration(), Duration::from_secs(60));
        assert_eq!(TimeWindow::Hour.duration(), Duration::from_secs(3600));
        assert_eq!(TimeWindow::Day.duration(), Duration::from_secs(86400));
    }

    #[test]
    fn test_standard_windows() {
        let windows = WindowSpec::standard();
        let names: Vec<&str> = windows.windows().iter().map(LimitWindow::name).collect();
        assert_eq!(names, vec!["minute", "hour", "day"]);
        let limits: Vec<usize> = windows.windows().iter().map(LimitWindow::max_count).collect();
        assert_eq!(limits, vec![10, 100, 1000]);
        assert_eq!(windows.log_cap(), 1000);
        assert_eq!(windows.longest(), Duration::from_secs(86400));
    }

    #[test]
    fn test_standard_matches_constructor() {
        let built = WindowSpec::new(vec![
            LimitWindow::standard(TimeWindow::Minute, 10),
            LimitWindow::standard(TimeWindow::Hour, 100),
            LimitWindow::standard(TimeWindow::Day, 1000),
        ])
        .unwrap();
        assert_eq!(built, WindowSpec::standard());
    }

    #[test]
    fn test_empty_window_set_rejected() {
        assert!(matches!(
            WindowSpec::new(Vec::new()),
            Err(MayflyError::InvalidWindows(_))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = WindowSpec::new(vec![
            LimitWindow::new("burst", Duration::from_secs(1), 2),
            LimitWindow::new("burst", Duration::from_secs(10), 5),
        ]);
        assert!(matches!(result, Err(MayflyError::InvalidWindows(_))));
    }

    #[test]
    fn test_cutoff_saturates() {
        let window = LimitWindow::new("minute", Duration::from_secs(60), 2);
        assert_eq!(window.cutoff(Duration::from_secs(10)), Duration::ZERO);
        assert_eq!(window.cutoff(Duration::from_secs(61)), Duration::from_secs(1));
    }
}
