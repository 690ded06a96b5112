//! Fill-with-retry for inputs that re-render under the cursor.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::driver::Driver;
use crate::result::{ProbeError, ProbeResult};
use crate::signal::Signal;

/// Default number of fill attempts
pub const DEFAULT_FILL_ATTEMPTS: u32 = 3;

/// Default pause between attempts (1s)
pub const DEFAULT_FILL_BACKOFF_MS: u64 = 1_000;

/// Retry settings for [`fill_field`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOptions {
    /// Attempts before giving up (must be at least 1)
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds
    pub backoff_ms: u64,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_FILL_ATTEMPTS,
            backoff_ms: DEFAULT_FILL_BACKOFF_MS,
        }
    }
}

impl FillOptions {
    /// Set attempt count
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set backoff in milliseconds
    #[must_use]
    pub const fn with_backoff(mut self, backoff_ms: u64) -> Self {
        self.backoff_ms = backoff_ms;
        self
    }

    /// Get backoff as Duration
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Clear, fill and read back a field until the value sticks
///
/// Success means the read-back equals `value` exactly. A driver error or a
/// mismatching read-back consumes an attempt; after `max_attempts` the last
/// one is reported as [`ProbeError::WriteVerificationFailed`].
#[tracing::instrument(skip(driver, value, options), fields(signal = %signal))]
pub async fn fill_field<D: Driver + ?Sized>(
    driver: &D,
    signal: &Signal,
    value: &str,
    options: FillOptions,
) -> ProbeResult<()> {
    if options.max_attempts == 0 {
        return Err(ProbeError::invalid_argument("max_attempts must be at least 1"));
    }

    let element = driver.first(signal);
    let mut last = String::new();
    for attempt in 1..=options.max_attempts {
        let outcome = async {
            driver.clear(&element).await?;
            driver.fill(&element, value).await?;
            driver.input_value(&element).await
        }
        .await;

        match outcome {
            Ok(read) if read == value => {
                debug!(attempt, "value verified");
                return Ok(());
            }
            Ok(read) => last = format!("read back `{read}`"),
            Err(e) => last = e.to_string(),
        }
        debug!(attempt, last = %last, "fill attempt failed");

        if attempt < options.max_attempts {
            sleep(options.backoff()).await;
        }
    }

    warn!(attempts = options.max_attempts, last = %last, "giving up on field");
    Err(ProbeError::WriteVerificationFailed {
        signal: signal.to_string(),
        attempts: options.max_attempts,
        last,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{ElementHandle, MockDriver, MockElement, WriteMode};
    use tokio::time::Instant;

    fn email() -> Signal {
        Signal::css("input[type=\"email\"]")
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_read_back_stable() {
        let driver = MockDriver::new().with_element(MockElement::new(email()).with_value("stale"));
        fill_field(&driver, &email(), "user@example.com", FillOptions::default())
            .await
            .unwrap();

        let again = driver
            .input_value(&ElementHandle::first(email()))
            .await
            .unwrap();
        assert_eq!(again, "user@example.com");
        assert_eq!(driver.call_count("fill:"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejecting_field_exhausts_attempts() {
        let driver = MockDriver::new().with_element(
            MockElement::new(email())
                .with_write_mode(WriteMode::Reject("element is read-only".to_string())),
        );

        let start = Instant::now();
        let err = fill_field(&driver, &email(), "x", FillOptions::default())
            .await
            .unwrap_err();

        assert_eq!(driver.call_count("fill:"), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(2 * DEFAULT_FILL_BACKOFF_MS));
        match err {
            ProbeError::WriteVerificationFailed { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(last.contains("element is read-only"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flaky_field_recovers() {
        let driver = MockDriver::new()
            .with_element(MockElement::new(email()).with_write_mode(WriteMode::Flaky(2)));
        fill_field(&driver, &email(), "ok@example.com", FillOptions::default())
            .await
            .unwrap();
        assert_eq!(driver.call_count("fill:"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatch_is_retried_and_reported() {
        let driver = MockDriver::new().with_element(
            MockElement::new(email())
                .with_value("masked")
                .with_write_mode(WriteMode::Drop),
        );
        let options = FillOptions::default().with_max_attempts(2).with_backoff(10);
        let err = fill_field(&driver, &email(), "typed", options)
            .await
            .unwrap_err();
        assert_eq!(driver.call_count("fill:"), 2);
        assert!(err.to_string().contains("read back `masked`"));
    }

    #[tokio::test]
    async fn test_zero_attempts_rejected() {
        let driver = MockDriver::new().with_element(MockElement::new(email()));
        let err = fill_field(&driver, &email(), "x", FillOptions::default().with_max_attempts(0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::InvalidArgument { .. }));
        assert!(!driver.was_called("fill:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_field_reports_driver_error() {
        let driver = MockDriver::new();
        let err = fill_field(&driver, &email(), "x", FillOptions::default().with_backoff(0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no element matches"));
    }
}
