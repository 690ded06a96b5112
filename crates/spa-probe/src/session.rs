//! A driver bound to a suite configuration.
//!
//! [`Session`] is the main entry point for test code: it resolves paths
//! against the base URL, picks budgets from the timeout tiers, and forwards
//! to the readiness, discovery and fill helpers.
//!
//! ```ignore
//! let config = Arc::new(SuiteConfig::from_yaml_file("suite.yaml")?.apply_env()?);
//! let session = Session::new(ChromiumDriver::launch(&config.browser).await?, config);
//!
//! let mut errors = session.watch_errors();
//! session.goto_landing().await?;
//! session.await_any(&Signal::parse_all(["text=Entrar", "a[href*=login]"])?, Tier::Medium).await?;
//! assert!(errors.errors().is_empty());
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{SuiteConfig, Tier, Viewport};
use crate::driver::{Driver, ElementHandle};
use crate::event::{EventKind, Subscription};
use crate::fill::{fill_field, FillOptions};
use crate::result::ProbeResult;
use crate::signal::Signal;
use crate::wait::{find_with_strategies, PageReady, Readiness, ReadinessPoller, Strategy};

/// Pause after scrolling so lazy content can render (300ms)
pub const SCROLL_SETTLE_MS: u64 = 300;

/// Viewport preset names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewportPreset {
    /// Phone
    Mobile,
    /// Tablet
    Tablet,
    /// Desktop
    Desktop,
}

/// `<dir>/<name>-<timestamp>.png`, with `:` and `.` in the timestamp replaced by `-`
#[must_use]
pub fn screenshot_path(dir: impl AsRef<Path>, name: &str, now: DateTime<Utc>) -> PathBuf {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    dir.as_ref().join(format!("{name}-{stamp}.png"))
}

/// Capture a screenshot into `dir` and return the written path
pub async fn capture_screenshot<D: Driver + ?Sized>(
    driver: &D,
    dir: impl AsRef<Path>,
    name: &str,
    full_page: bool,
) -> ProbeResult<PathBuf> {
    let png = driver.screenshot(full_page).await?;
    let path = screenshot_path(dir.as_ref(), name, Utc::now());
    tokio::fs::create_dir_all(dir.as_ref()).await?;
    tokio::fs::write(&path, png).await?;
    tracing::debug!(path = %path.display(), "screenshot saved");
    Ok(path)
}

/// Scroll the first match of `signal` into view, then let it settle
pub async fn scroll_to_element<D: Driver + ?Sized>(
    driver: &D,
    signal: &Signal,
) -> ProbeResult<ElementHandle> {
    let element = driver.first(signal);
    driver.scroll_into_view(&element).await?;
    tokio::time::sleep(Duration::from_millis(SCROLL_SETTLE_MS)).await;
    Ok(element)
}

/// Driver plus shared configuration
#[derive(Debug)]
pub struct Session<D: Driver> {
    driver: D,
    config: Arc<SuiteConfig>,
    poller: ReadinessPoller,
}

impl<D: Driver> Session<D> {
    /// Bind a driver to a configuration
    pub fn new(driver: D, config: Arc<SuiteConfig>) -> Self {
        let poller = ReadinessPoller::from_config(&config);
        Self {
            driver,
            config,
            poller,
        }
    }

    /// Underlying driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Shared configuration
    #[must_use]
    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Poller built from the configuration
    #[must_use]
    pub const fn poller(&self) -> &ReadinessPoller {
        &self.poller
    }

    /// Navigate to a path (or absolute URL) and wait for readiness, long tier
    pub async fn goto_ready(&self, path: &str) -> ProbeResult<PageReady> {
        let url = self.config.url_for(path);
        self.poller
            .await_page_ready(&self.driver, &url, self.config.timeout(Tier::Long))
            .await
    }

    /// Open the landing page
    pub async fn goto_landing(&self) -> ProbeResult<PageReady> {
        self.goto_ready(&self.config.landing_path).await
    }

    /// Open the login page
    pub async fn goto_login(&self) -> ProbeResult<PageReady> {
        self.goto_ready(&self.config.login_path).await
    }

    /// Poll for any signal with a tier budget
    pub async fn await_any(&self, signals: &[Signal], tier: Tier) -> ProbeResult<Readiness> {
        self.poller
            .await_any(&self.driver, signals, self.config.timeout(tier))
            .await
    }

    /// Single-pass strategy search
    pub async fn find(&self, strategies: &[Strategy]) -> Option<(String, ElementHandle)> {
        find_with_strategies(&self.driver, strategies).await
    }

    /// Wait for one signal with the medium tier
    pub async fn wait_for(&self, signal: &Signal) -> ProbeResult<ElementHandle> {
        crate::wait::wait_for_element(&self.driver, signal, self.config.timeout(Tier::Medium)).await
    }

    /// Fill a field with default retry settings
    pub async fn fill(&self, signal: &Signal, value: &str) -> ProbeResult<()> {
        fill_field(&self.driver, signal, value, FillOptions::default()).await
    }

    /// Collect console and page errors until the handle is dropped
    #[must_use]
    pub fn watch_errors(&self) -> Subscription {
        self.driver
            .subscribe(&[EventKind::Console, EventKind::PageError])
    }

    /// Collect responses until the handle is dropped
    #[must_use]
    pub fn watch_responses(&self) -> Subscription {
        self.driver.subscribe(&[EventKind::Response])
    }

    /// Save a screenshot under the configured directory
    pub async fn screenshot(&self, name: &str, full_page: bool) -> ProbeResult<PathBuf> {
        capture_screenshot(&self.driver, &self.config.screenshot_dir, name, full_page).await
    }

    /// Scroll to an element
    pub async fn scroll_to(&self, signal: &Signal) -> ProbeResult<ElementHandle> {
        scroll_to_element(&self.driver, signal).await
    }

    /// Resize to a configured preset
    pub async fn set_viewport(&self, preset: ViewportPreset) -> ProbeResult<Viewport> {
        let presets = &self.config.viewports;
        let viewport = match preset {
            ViewportPreset::Mobile => presets.mobile,
            ViewportPreset::Tablet => presets.tablet,
            ViewportPreset::Desktop => presets.desktop,
        };
        self.driver.set_viewport(viewport).await?;
        Ok(viewport)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};
    use crate::event::PageEvent;
    use chrono::TimeZone;

    fn session(driver: MockDriver) -> Session<MockDriver> {
        let config = SuiteConfig::default().with_base_url("https://app.test");
        Session::new(driver, Arc::new(config))
    }

    mod screenshot_tests {
        use super::*;

        #[test]
        fn test_screenshot_path_format() {
            let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
                + chrono::Duration::milliseconds(589);
            let path = screenshot_path("shots", "landing", now);
            assert_eq!(
                path,
                PathBuf::from("shots").join("landing-2026-03-14T09-26-53-589Z.png")
            );
        }

        #[tokio::test]
        async fn test_capture_writes_png() {
            let dir = tempfile::tempdir().unwrap();
            let driver = MockDriver::new();
            let path = capture_screenshot(&driver, dir.path().join("nested"), "home", true)
                .await
                .unwrap();
            let bytes = std::fs::read(&path).unwrap();
            assert_eq!(&bytes[1..4], b"PNG");
            assert!(driver.was_called("screenshot:full_page=true"));
        }
    }

    mod session_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_goto_landing_resolves_url() {
            let s = session(MockDriver::new().with_element(MockElement::new("img[src*=\"logo\"]")));
            let ready = s.goto_landing().await.unwrap();
            assert_eq!(ready.url, "https://app.test/#/landing");
            assert!(ready.landmark.is_some());
        }

        #[tokio::test(start_paused = true)]
        async fn test_await_any_uses_tier_budget() {
            let s = session(MockDriver::new());
            let start = tokio::time::Instant::now();
            let outcome = s.await_any(&[Signal::css("#never")], Tier::Short).await.unwrap();
            assert!(!outcome.is_found());
            assert_eq!(start.elapsed(), Duration::from_secs(5));
        }

        #[tokio::test(start_paused = true)]
        async fn test_scroll_settles() {
            let s = session(MockDriver::new().with_element(MockElement::new("#footer")));
            let start = tokio::time::Instant::now();
            s.scroll_to(&Signal::css("#footer")).await.unwrap();
            assert_eq!(start.elapsed(), Duration::from_millis(SCROLL_SETTLE_MS));
            assert!(s.driver().was_called("scroll_into_view:#footer"));
        }

        #[tokio::test]
        async fn test_viewport_presets() {
            let s = session(MockDriver::new());
            let vp = s.set_viewport(ViewportPreset::Mobile).await.unwrap();
            assert_eq!(vp, Viewport::MOBILE);
            assert_eq!(s.driver().viewport(), Viewport::MOBILE);
        }

        #[tokio::test]
        async fn test_watch_errors_scoped() {
            let s = session(MockDriver::new());
            {
                let mut errors = s.watch_errors();
                s.driver().emit(&PageEvent::console_error("Uncaught TypeError"));
                s.driver().emit(&PageEvent::response("https://app.test/api", 500, "GET"));
                assert_eq!(errors.errors(), vec!["Uncaught TypeError".to_string()]);
            }
            let mut responses = s.watch_responses();
            s.driver().emit(&PageEvent::response("https://app.test/api", 502, "GET"));
            assert_eq!(responses.failed_responses().len(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_fill_and_find() {
            let s = session(
                MockDriver::new()
                    .with_element(MockElement::new("input[type=\"password\"]"))
                    .with_element(MockElement::new(Signal::css("button").with_text("Entrar"))),
            );
            s.fill(&Signal::css("input[type=\"password\"]"), "secret")
                .await
                .unwrap();
            let (name, _) = s
                .find(&[Strategy::new(
                    "submit",
                    Signal::css("button").with_text("Entrar"),
                )])
                .await
                .unwrap();
            assert_eq!(name, "submit");
        }
    }
}
