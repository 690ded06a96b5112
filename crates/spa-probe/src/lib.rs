//! spa-probe: Flexible Element Discovery for Client-Rendered Apps
//!
//! End-to-end tests against a deployed single-page application cannot rely on
//! a stable DOM: the markup arrives after the document, selectors drift
//! between releases, and a logo may be an `<img alt>` today and an SVG
//! tomorrow. spa-probe answers one question under a hard time budget: has
//! the page reached a usable state, and which of the expected signals showed
//! up?
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │   ┌────────────┐    ┌──────────────────┐    ┌────────────────┐    │
//! │   │ Signals    │    │ ReadinessPoller  │    │ Driver         │    │
//! │   │ css= text= │───►│ await_any        │───►│ ChromiumDriver │    │
//! │   │ role= alt= │    │ await_page_ready │    │ MockDriver     │    │
//! │   └────────────┘    └──────────────────┘    └────────────────┘    │
//! │          SuiteConfig (tiers, viewports, landmarks) ── Session     │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use spa_probe::{await_any, MockDriver, MockElement, Signal};
//! use std::time::Duration;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! # rt.block_on(async {
//! let driver = MockDriver::new().with_element(MockElement::new("#real"));
//! let signals = Signal::parse_all(["#missing", "#real"]).unwrap();
//!
//! let outcome = await_any(&driver, &signals, Duration::from_secs(5)).await.unwrap();
//! assert_eq!(outcome.signal(), Some(&Signal::css("#real")));
//! # });
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::cast_precision_loss,
    clippy::doc_markdown
)]
mod accessibility;
#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
mod cdp;
#[allow(clippy::missing_errors_doc, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
mod config;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
mod driver;
mod event;
#[allow(clippy::missing_errors_doc)]
mod fill;
mod logging;
mod result;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod session;
#[allow(clippy::missing_errors_doc)]
mod signal;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
mod wait;

pub use accessibility::{
    alt_text_coverage, missing_alt_ratio, AltTextCoverage, AuditReport, Auditor, AxeAuditor,
    Impact, RuleResult, Violation, ViolationNode, DEFAULT_MAX_MISSING_ALT_RATIO,
};
#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;
pub use config::{
    BrowserSettings, ReadinessConfig, SuiteConfig, Tier, TimeoutTiers, Viewport, ViewportPresets,
    ENV_BASE_URL, ENV_TIMEOUT_SCALE,
};
pub use driver::{Driver, ElementHandle, MockDriver, MockElement, NavigationResponse, WriteMode};
pub use event::{ConsoleLevel, EventBus, EventKind, PageEvent, Subscription};
pub use fill::{fill_field, FillOptions, DEFAULT_FILL_ATTEMPTS, DEFAULT_FILL_BACKOFF_MS};
pub use logging::{filter_directive, init_tracing, init_tracing_json};
pub use result::{ProbeError, ProbeResult};
pub use session::{
    capture_screenshot, screenshot_path, scroll_to_element, Session, ViewportPreset,
    SCROLL_SETTLE_MS,
};
pub use signal::Signal;
pub use wait::{
    await_any, await_page_ready, find_with_strategies, wait_for_element, wait_for_network_idle,
    LoadState, PageReady, PageReadyOptions, PollOptions, Readiness, ReadinessPoller, Strategy,
    DEFAULT_LANDMARK_CAP_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SETTLE_DELAY_MS,
    DEFAULT_VISIBILITY_TIMEOUT_MS, DEFAULT_WAIT_TIMEOUT_MS, NETWORK_IDLE_THRESHOLD_MS,
    STRATEGY_VISIBILITY_TIMEOUT_MS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        await_any, await_page_ready, fill_field, find_with_strategies, wait_for_element, Driver,
        ElementHandle, EventKind, FillOptions, MockDriver, MockElement, ProbeError, ProbeResult,
        Readiness, Session, Signal, Strategy, SuiteConfig, Tier,
    };
    #[cfg(feature = "browser")]
    pub use super::ChromiumDriver;
}
