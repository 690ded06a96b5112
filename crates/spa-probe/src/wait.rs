//! Readiness polling.
//!
//! A client-rendered page has no single "ready" event. The poller takes an
//! ordered list of [`Signal`]s and a time budget and reports the first signal
//! whose first match is visible, or that none appeared in time.
//!
//! ```text
//!   t0 ──┬── sweep signals in order ── visible? ──► Found
//!        │        (count, then capped visibility check)
//!        ├── elapsed >= budget? ─────────────────► TimedOut
//!        └── sleep min(poll, remaining) ── repeat
//! ```
//!
//! Query failures inside a sweep (a malformed selector, a page mid-reload)
//! are logged at `debug` and count as "no match". Only navigation failures in
//! [`ReadinessPoller::await_page_ready`] propagate.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::SuiteConfig;
use crate::driver::{Driver, ElementHandle};
use crate::result::{ProbeError, ProbeResult};
use crate::signal::Signal;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default sleep between poll sweeps (500ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default cap on a single visibility check inside the poll loop (500ms)
pub const DEFAULT_VISIBILITY_TIMEOUT_MS: u64 = 500;

/// Visibility cap used by the single-pass strategy search (2s)
pub const STRATEGY_VISIBILITY_TIMEOUT_MS: u64 = 2_000;

/// Default settle delay after network idle (2s)
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;

/// Default cap on the landmark wait (10s)
pub const DEFAULT_LANDMARK_CAP_MS: u64 = 10_000;

/// Default timeout for single-element waits (15s)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 15_000;

/// Network idle threshold (500ms without new resources)
pub const NETWORK_IDLE_THRESHOLD_MS: u64 = 500;

// =============================================================================
// LOAD STATE
// =============================================================================

/// Page load states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoadState {
    /// Wait for the `load` event to fire
    #[default]
    Load,
    /// Wait for `DOMContentLoaded` event
    DomContentLoaded,
    /// Wait for network to be idle (no new resources for 500ms)
    NetworkIdle,
}

impl LoadState {
    /// Get the event name for this load state
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::NetworkIdle => "networkidle",
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Timing for the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Sleep between sweeps in milliseconds
    pub poll_interval_ms: u64,
    /// Cap on one visibility check in milliseconds
    pub visibility_timeout_ms: u64,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            visibility_timeout_ms: DEFAULT_VISIBILITY_TIMEOUT_MS,
        }
    }
}

impl PollOptions {
    /// Create new poll options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set visibility cap in milliseconds
    #[must_use]
    pub const fn with_visibility_timeout(mut self, visibility_timeout_ms: u64) -> Self {
        self.visibility_timeout_ms = visibility_timeout_ms;
        self
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Get visibility cap as Duration
    #[must_use]
    pub const fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.visibility_timeout_ms)
    }
}

/// Settings for [`ReadinessPoller::await_page_ready`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReadyOptions {
    /// Delay after network idle in milliseconds
    pub settle_delay_ms: u64,
    /// Cap on the landmark wait in milliseconds
    pub landmark_cap_ms: u64,
    /// Landmark signals; empty skips the landmark wait
    pub landmarks: Vec<Signal>,
}

impl Default for PageReadyOptions {
    fn default() -> Self {
        let readiness = crate::config::ReadinessConfig::default();
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            landmark_cap_ms: DEFAULT_LANDMARK_CAP_MS,
            landmarks: readiness.landmarks,
        }
    }
}

impl PageReadyOptions {
    /// Set settle delay in milliseconds
    #[must_use]
    pub const fn with_settle_delay(mut self, settle_delay_ms: u64) -> Self {
        self.settle_delay_ms = settle_delay_ms;
        self
    }

    /// Set landmark cap in milliseconds
    #[must_use]
    pub const fn with_landmark_cap(mut self, landmark_cap_ms: u64) -> Self {
        self.landmark_cap_ms = landmark_cap_ms;
        self
    }

    /// Replace the landmark signals
    #[must_use]
    pub fn with_landmarks(mut self, landmarks: Vec<Signal>) -> Self {
        self.landmarks = landmarks;
        self
    }

    /// Get settle delay as Duration
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Get landmark cap as Duration
    #[must_use]
    pub const fn landmark_cap(&self) -> Duration {
        Duration::from_millis(self.landmark_cap_ms)
    }
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Outcome of a readiness poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// A signal's first match was visible
    Found {
        /// The winning signal
        signal: Signal,
        /// Handle to its first match
        element: ElementHandle,
        /// Time from start to detection
        elapsed: Duration,
    },
    /// The budget ran out
    TimedOut {
        /// Every signal that was polled, in order
        attempted: Vec<Signal>,
        /// Time spent polling
        elapsed: Duration,
        /// Budget the poll ran against
        budget: Duration,
    },
}

impl Readiness {
    /// Whether a signal was found
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// Time spent polling
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Found { elapsed, .. } | Self::TimedOut { elapsed, .. } => *elapsed,
        }
    }

    /// The winning signal, if any
    #[must_use]
    pub const fn signal(&self) -> Option<&Signal> {
        match self {
            Self::Found { signal, .. } => Some(signal),
            Self::TimedOut { .. } => None,
        }
    }

    /// Treat a timeout as a hard failure
    pub fn into_result(self) -> ProbeResult<ElementHandle> {
        match self {
            Self::Found { element, .. } => Ok(element),
            Self::TimedOut {
                attempted, budget, ..
            } => Err(ProbeError::NoSignalVisible {
                attempted: attempted.iter().map(ToString::to_string).collect(),
                budget_ms: duration_ms(budget),
            }),
        }
    }
}

/// Outcome of [`ReadinessPoller::await_page_ready`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReady {
    /// URL after navigation
    pub url: String,
    /// Document HTTP status, if observed
    pub status: Option<u16>,
    /// Landmark that rendered, if any
    pub landmark: Option<Signal>,
    /// Total time spent
    pub elapsed: Duration,
}

/// A named way to locate an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    /// Strategy name reported on success
    pub name: String,
    /// Signal to try
    pub signal: Signal,
}

impl Strategy {
    /// Create a strategy
    #[must_use]
    pub fn new(name: impl Into<String>, signal: impl Into<Signal>) -> Self {
        Self {
            name: name.into(),
            signal: signal.into(),
        }
    }
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn join_signals(signals: &[Signal]) -> String {
    signals
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// POLLER
// =============================================================================

/// Stateless readiness poller; holds only timing settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessPoller {
    poll: PollOptions,
    page: PageReadyOptions,
}

impl ReadinessPoller {
    /// Create a poller with default timings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Poller using the readiness settings of a suite
    #[must_use]
    pub fn from_config(config: &SuiteConfig) -> Self {
        let r = &config.readiness;
        Self {
            poll: PollOptions {
                poll_interval_ms: r.poll_interval_ms,
                visibility_timeout_ms: r.visibility_timeout_ms,
            },
            page: PageReadyOptions {
                settle_delay_ms: r.settle_delay_ms,
                landmark_cap_ms: r.landmark_cap_ms,
                landmarks: r.landmarks.clone(),
            },
        }
    }

    /// Replace poll timings
    #[must_use]
    pub const fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    /// Replace page-readiness settings
    #[must_use]
    pub fn with_page_options(mut self, page: PageReadyOptions) -> Self {
        self.page = page;
        self
    }

    /// Poll timings
    #[must_use]
    pub const fn poll_options(&self) -> &PollOptions {
        &self.poll
    }

    /// Page-readiness settings
    #[must_use]
    pub const fn page_options(&self) -> &PageReadyOptions {
        &self.page
    }

    /// Wait until any signal's first match is visible, or the budget expires
    ///
    /// A zero budget polls exactly once. The first sweep checks every
    /// signal; later checks are capped by the remaining budget, and at most
    /// one starts after the deadline. Returns
    /// [`ProbeError::InvalidArgument`] for an empty signal list.
    #[tracing::instrument(
        skip_all,
        fields(signals = signals.len(), budget_ms = duration_ms(budget))
    )]
    pub async fn await_any<D: Driver + ?Sized>(
        &self,
        driver: &D,
        signals: &[Signal],
        budget: Duration,
    ) -> ProbeResult<Readiness> {
        let outcome = self.poll_until(driver, signals, budget).await?;
        if let Readiness::TimedOut { elapsed, .. } = &outcome {
            warn!(
                attempted = %join_signals(signals),
                elapsed_ms = duration_ms(*elapsed),
                "no signal became visible"
            );
        }
        Ok(outcome)
    }

    async fn poll_until<D: Driver + ?Sized>(
        &self,
        driver: &D,
        signals: &[Signal],
        budget: Duration,
    ) -> ProbeResult<Readiness> {
        if signals.is_empty() {
            return Err(ProbeError::invalid_argument(
                "at least one signal is required",
            ));
        }

        let visibility = self.poll.visibility_timeout();
        let start = Instant::now();
        let mut first_sweep = true;
        loop {
            // After the first sweep, checks are capped by the remaining budget
            // and at most one check starts once the deadline has passed.
            let mut overtime_used = false;
            for signal in signals {
                let cap = if first_sweep {
                    visibility
                } else {
                    let elapsed = start.elapsed();
                    if elapsed < budget {
                        visibility.min(budget - elapsed)
                    } else if overtime_used {
                        break;
                    } else {
                        overtime_used = true;
                        visibility
                    }
                };
                if let Some(element) = visible_match(driver, signal, cap).await {
                    let elapsed = start.elapsed();
                    debug!(%signal, elapsed_ms = duration_ms(elapsed), "signal visible");
                    return Ok(Readiness::Found {
                        signal: signal.clone(),
                        element,
                        elapsed,
                    });
                }
            }
            first_sweep = false;

            let elapsed = start.elapsed();
            if elapsed >= budget {
                return Ok(Readiness::TimedOut {
                    attempted: signals.to_vec(),
                    elapsed,
                    budget,
                });
            }
            sleep(self.poll.poll_interval().min(budget - elapsed)).await;
        }
    }

    /// Navigate and wait until the app has plausibly rendered
    ///
    /// Navigation errors and non-2xx documents fail the call. A network-idle
    /// timeout and a missing landmark are logged and tolerated.
    #[tracing::instrument(skip(self, driver, budget), fields(budget_ms = duration_ms(budget)))]
    pub async fn await_page_ready<D: Driver + ?Sized>(
        &self,
        driver: &D,
        url: &str,
        budget: Duration,
    ) -> ProbeResult<PageReady> {
        let start = Instant::now();

        let response = driver
            .navigate(url, LoadState::DomContentLoaded, budget)
            .await?;
        if !response.is_success() {
            let status = response.status.unwrap_or_default();
            return Err(ProbeError::navigation(url, format!("HTTP {status}")));
        }
        info!(url = %response.url, status = ?response.status, "navigated");

        if let Err(e) = wait_for_network_idle(driver, budget).await {
            warn!(error = %e, "network did not go idle; continuing");
        }

        sleep(self.page.settle_delay()).await;

        let landmark = if self.page.landmarks.is_empty() {
            None
        } else {
            let sub_budget = budget.min(self.page.landmark_cap());
            match self
                .poll_until(driver, &self.page.landmarks, sub_budget)
                .await?
            {
                Readiness::Found { signal, .. } => {
                    info!(landmark = %signal, "landmark rendered");
                    Some(signal)
                }
                Readiness::TimedOut { .. } => {
                    info!(
                        attempted = %join_signals(&self.page.landmarks),
                        "no landmark rendered; page may still be usable"
                    );
                    None
                }
            }
        };

        Ok(PageReady {
            url: response.url,
            status: response.status,
            landmark,
            elapsed: start.elapsed(),
        })
    }
}

/// Count, then check visibility of the first match under a hard cap
async fn visible_match<D: Driver + ?Sized>(
    driver: &D,
    signal: &Signal,
    cap: Duration,
) -> Option<ElementHandle> {
    match driver.count(signal).await {
        Ok(0) => None,
        Ok(_) => {
            let element = driver.first(signal);
            match timeout(cap, driver.is_visible(&element, cap)).await {
                Ok(Ok(true)) => Some(element),
                Ok(Ok(false)) => None,
                Ok(Err(e)) => {
                    debug!(%signal, error = %e, "visibility check failed");
                    None
                }
                Err(_) => {
                    debug!(%signal, cap_ms = duration_ms(cap), "visibility check timed out");
                    None
                }
            }
        }
        Err(e) => {
            debug!(%signal, error = %e, "query failed; treating as no match");
            None
        }
    }
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// [`ReadinessPoller::await_any`] with default timings
pub async fn await_any<D: Driver + ?Sized>(
    driver: &D,
    signals: &[Signal],
    budget: Duration,
) -> ProbeResult<Readiness> {
    ReadinessPoller::default()
        .await_any(driver, signals, budget)
        .await
}

/// [`ReadinessPoller::await_page_ready`] with default timings and landmarks
pub async fn await_page_ready<D: Driver + ?Sized>(
    driver: &D,
    url: &str,
    budget: Duration,
) -> ProbeResult<PageReady> {
    ReadinessPoller::default()
        .await_page_ready(driver, url, budget)
        .await
}

/// Try each strategy once, in order; first visible match wins
///
/// Errors are absorbed per strategy. Each visibility check is capped at
/// [`STRATEGY_VISIBILITY_TIMEOUT_MS`].
pub async fn find_with_strategies<D: Driver + ?Sized>(
    driver: &D,
    strategies: &[Strategy],
) -> Option<(String, ElementHandle)> {
    let cap = Duration::from_millis(STRATEGY_VISIBILITY_TIMEOUT_MS);
    for strategy in strategies {
        if let Some(element) = visible_match(driver, &strategy.signal, cap).await {
            debug!(strategy = %strategy.name, "strategy matched");
            return Some((strategy.name.clone(), element));
        }
    }
    None
}

/// Wait for one signal to become visible
pub async fn wait_for_element<D: Driver + ?Sized>(
    driver: &D,
    signal: &Signal,
    wait: Duration,
) -> ProbeResult<ElementHandle> {
    let outcome = ReadinessPoller::default()
        .poll_until(driver, std::slice::from_ref(signal), wait)
        .await?;
    match outcome {
        Readiness::Found { element, .. } => Ok(element),
        Readiness::TimedOut { .. } => Err(ProbeError::Timeout {
            ms: duration_ms(wait),
        }),
    }
}

/// Wait for the network to go idle on the current page
pub async fn wait_for_network_idle<D: Driver + ?Sized>(
    driver: &D,
    wait: Duration,
) -> ProbeResult<()> {
    driver
        .wait_for_load_state(LoadState::NetworkIdle, wait)
        .await
}
