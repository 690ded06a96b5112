//! Console reporting for check results

use console::{style, Term};
use std::time::Duration;

/// Kind of a reported line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Check passed
    Success,
    /// Check failed
    Failure,
    /// Something worth a look, not a failure
    Warning,
    /// Plain information
    Info,
}

impl LineKind {
    fn prefix(self, use_color: bool) -> String {
        match (self, use_color) {
            (Self::Success, true) => style("✓").green().bold().to_string(),
            (Self::Failure, true) => style("✗").red().bold().to_string(),
            (Self::Warning, true) => style("⚠").yellow().bold().to_string(),
            (Self::Info, true) => style("ℹ").blue().bold().to_string(),
            (Self::Success, false) => "PASS".to_string(),
            (Self::Failure, false) => "FAIL".to_string(),
            (Self::Warning, false) => "WARN".to_string(),
            (Self::Info, false) => "INFO".to_string(),
        }
    }
}

/// Writes check results to stdout
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            use_color,
            quiet,
        }
    }

    /// Format a line without printing it
    #[must_use]
    pub fn format_line(&self, kind: LineKind, message: &str) -> String {
        format!("{} {message}", kind.prefix(self.use_color))
    }

    /// Whether a line of this kind is printed
    #[must_use]
    pub const fn shows(&self, kind: LineKind) -> bool {
        !self.quiet || matches!(kind, LineKind::Failure)
    }

    fn emit(&self, kind: LineKind, message: &str) {
        if self.shows(kind) {
            let _ = self.term.write_line(&self.format_line(kind, message));
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        self.emit(LineKind::Success, message);
    }

    /// Print a failure message, even in quiet mode
    pub fn failure(&self, message: &str) {
        self.emit(LineKind::Failure, message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        self.emit(LineKind::Warning, message);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        self.emit(LineKind::Info, message);
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        let _ = self.term.write_line(&styled);
    }
}

/// `1234ms` below ten seconds, `12.3s` above
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(10) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod reporter_tests {
        use super::*;

        #[test]
        fn test_plain_prefixes() {
            let reporter = Reporter::new(false, false);
            assert_eq!(reporter.format_line(LineKind::Success, "ok"), "PASS ok");
            assert_eq!(reporter.format_line(LineKind::Failure, "no"), "FAIL no");
            assert_eq!(reporter.format_line(LineKind::Warning, "hm"), "WARN hm");
            assert_eq!(reporter.format_line(LineKind::Info, "fyi"), "INFO fyi");
        }

        #[test]
        fn test_quiet_keeps_failures_only() {
            let reporter = Reporter::new(false, true);
            assert!(reporter.shows(LineKind::Failure));
            assert!(!reporter.shows(LineKind::Success));
            assert!(!reporter.shows(LineKind::Info));
        }

        #[test]
        fn test_colored_line_ends_with_message() {
            let reporter = Reporter::new(true, false);
            assert!(reporter
                .format_line(LineKind::Success, "landmark visible")
                .ends_with(" landmark visible"));
        }
    }

    mod elapsed_tests {
        use super::*;

        #[test]
        fn test_short_in_millis() {
            assert_eq!(format_elapsed(Duration::from_millis(1500)), "1500ms");
        }

        #[test]
        fn test_long_in_seconds() {
            assert_eq!(format_elapsed(Duration::from_millis(12_340)), "12.3s");
        }
    }
}
