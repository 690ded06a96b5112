//! Driver - Abstract Page Automation Trait
//!
//! Everything the poller needs from a browser goes through [`Driver`]. The
//! trait is deliberately narrow: counts and visibility checks keyed by
//! [`Signal`], a handful of element interactions, navigation, and event
//! subscription. `ChromiumDriver` implements it over CDP;
//! [`MockDriver`] implements it in memory for deterministic tests.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Driver (async trait, Send + Sync, &self everywhere)         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────────┐   ┌───────────────────────────┐  │
//! │  │  ChromiumDriver        │   │  MockDriver               │  │
//! │  │  chromiumoxide / CDP   │   │  scheduled elements,      │  │
//! │  │  (feature `browser`)   │   │  injected failures        │  │
//! │  └────────────────────────┘   └───────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::Viewport;
use crate::event::{EventBus, EventKind, PageEvent, Subscription};
use crate::result::{ProbeError, ProbeResult};
use crate::signal::Signal;
use crate::wait::LoadState;

/// A lazily re-resolved reference to the `index`-th match of a signal
///
/// Handles carry no live DOM reference, so they never go stale: every
/// operation re-queries the page. An element that has since disappeared
/// surfaces as a driver error on use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Signal the element was found by
    pub signal: Signal,
    /// Zero-based index among the signal's matches
    pub index: usize,
}

impl ElementHandle {
    /// First match of a signal
    #[must_use]
    pub const fn first(signal: Signal) -> Self {
        Self::nth(signal, 0)
    }

    /// `index`-th match of a signal
    #[must_use]
    pub const fn nth(signal: Signal, index: usize) -> Self {
        Self { signal, index }
    }

    /// JavaScript expression resolving to the element (or `undefined`)
    #[must_use]
    pub fn to_js(&self) -> String {
        format!("({})[{}]", self.signal.to_elements_query(), self.index)
    }
}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.index == 0 {
            write!(f, "{}", self.signal)
        } else {
            write!(f, "{} (#{})", self.signal, self.index)
        }
    }
}

/// Result of a top-level navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationResponse {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status of the document, when the driver could observe it
    pub status: Option<u16>,
}

impl NavigationResponse {
    /// Create a navigation response
    #[must_use]
    pub fn new(url: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            url: url.into(),
            status,
        }
    }

    /// 2xx, or unknown status (file URLs, cached documents)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.map_or(true, |s| (200..300).contains(&s))
    }
}

/// Abstract driver trait for page automation
///
/// All methods take `&self`; implementations serialise access internally so
/// one driver can be shared by reference across helpers.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigate and wait until `wait_until` or `timeout`
    async fn navigate(
        &self,
        url: &str,
        wait_until: LoadState,
        timeout: Duration,
    ) -> ProbeResult<NavigationResponse>;

    /// Wait for a load state on the current page
    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> ProbeResult<()>;

    /// Number of elements currently matching a signal
    async fn count(&self, signal: &Signal) -> ProbeResult<usize>;

    /// Handle to the first match of a signal
    ///
    /// Handles are re-resolved on use, so this never touches the page.
    fn first(&self, signal: &Signal) -> ElementHandle {
        ElementHandle::first(signal.clone())
    }

    /// Whether the element is rendered and visible
    async fn is_visible(&self, element: &ElementHandle, timeout: Duration) -> ProbeResult<bool>;

    /// Text content of the element
    async fn text_content(&self, element: &ElementHandle) -> ProbeResult<Option<String>>;

    /// Attribute value of the element
    async fn attribute(&self, element: &ElementHandle, name: &str)
        -> ProbeResult<Option<String>>;

    /// Click the element
    async fn click(&self, element: &ElementHandle) -> ProbeResult<()>;

    /// Clear an input
    async fn clear(&self, element: &ElementHandle) -> ProbeResult<()>;

    /// Type a value into an input
    async fn fill(&self, element: &ElementHandle, value: &str) -> ProbeResult<()>;

    /// Current value of an input
    async fn input_value(&self, element: &ElementHandle) -> ProbeResult<String>;

    /// Scroll the element into view
    async fn scroll_into_view(&self, element: &ElementHandle) -> ProbeResult<()>;

    /// Evaluate JavaScript and return the JSON result
    async fn evaluate(&self, script: &str) -> ProbeResult<serde_json::Value>;

    /// Press a key on the focused element
    async fn press_key(&self, key: &str) -> ProbeResult<()>;

    /// Resize the viewport
    async fn set_viewport(&self, viewport: Viewport) -> ProbeResult<()>;

    /// Capture a PNG screenshot
    async fn screenshot(&self, full_page: bool) -> ProbeResult<Vec<u8>>;

    /// Current page URL
    async fn current_url(&self) -> ProbeResult<String>;

    /// Subscribe to page events; dropping the handle unsubscribes
    fn subscribe(&self, kinds: &[EventKind]) -> Subscription;
}

/// How a mock input reacts to `fill`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Store the value
    Accept,
    /// Fail every fill with this message
    Reject(String),
    /// Report success but keep the old value
    Drop,
    /// Fail the first `n` fills, then accept
    Flaky(u32),
}

/// A scripted element for [`MockDriver`]
#[derive(Debug, Clone)]
pub struct MockElement {
    signal: Signal,
    appears_after: Duration,
    visible: bool,
    text: Option<String>,
    attributes: HashMap<String, String>,
    value: String,
    write_mode: WriteMode,
    fills: u32,
}

impl MockElement {
    /// Element present and visible from the start
    #[must_use]
    pub fn new(signal: impl Into<Signal>) -> Self {
        Self {
            signal: signal.into(),
            appears_after: Duration::ZERO,
            visible: true,
            text: None,
            attributes: HashMap::new(),
            value: String::new(),
            write_mode: WriteMode::Accept,
            fills: 0,
        }
    }

    /// Attach to the DOM only after `delay` (measured from driver creation)
    #[must_use]
    pub const fn appears_after(mut self, delay: Duration) -> Self {
        self.appears_after = delay;
        self
    }

    /// Present in the DOM but not visible
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the initial input value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Set how the element reacts to fills
    #[must_use]
    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }
}

#[derive(Debug)]
struct MockState {
    current_url: String,
    elements: Vec<MockElement>,
    query_errors: HashMap<Signal, String>,
    navigation_error: Option<String>,
    navigation_status: Option<u16>,
    network_idle_error: bool,
    visibility_delay: Duration,
    js_results: VecDeque<serde_json::Value>,
    screenshot: Vec<u8>,
    viewport: Viewport,
    call_history: Vec<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            current_url: "about:blank".to_string(),
            elements: Vec::new(),
            query_errors: HashMap::new(),
            navigation_error: None,
            navigation_status: Some(200),
            network_idle_error: false,
            visibility_delay: Duration::ZERO,
            js_results: VecDeque::new(),
            screenshot: PNG_SIGNATURE.to_vec(),
            viewport: Viewport::DESKTOP,
            call_history: Vec::new(),
        }
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// In-memory driver for unit tests
///
/// Time is measured from construction with tokio's clock, so under
/// `#[tokio::test(start_paused = true)]` element schedules are exact.
#[derive(Debug)]
pub struct MockDriver {
    start: Instant,
    state: Mutex<MockState>,
    events: EventBus,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            state: Mutex::new(MockState::default()),
            events: EventBus::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // Test double: a poisoned lock means a previous assertion already panicked.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Add a scripted element
    #[must_use]
    pub fn with_element(self, element: MockElement) -> Self {
        self.add_element(element);
        self
    }

    /// Make every query for `signal` fail
    #[must_use]
    pub fn with_query_error(self, signal: impl Into<Signal>, message: impl Into<String>) -> Self {
        self.state()
            .query_errors
            .insert(signal.into(), message.into());
        self
    }

    /// Make navigation fail with this message
    #[must_use]
    pub fn with_navigation_error(self, message: impl Into<String>) -> Self {
        self.state().navigation_error = Some(message.into());
        self
    }

    /// HTTP status reported for navigations (default 200)
    #[must_use]
    pub fn with_navigation_status(self, status: Option<u16>) -> Self {
        self.state().navigation_status = status;
        self
    }

    /// Make network-idle waits time out
    #[must_use]
    pub fn with_network_idle_timeout(self) -> Self {
        self.state().network_idle_error = true;
        self
    }

    /// Delay every visibility check, ignoring the driver-side timeout
    #[must_use]
    pub fn with_visibility_delay(self, delay: Duration) -> Self {
        self.state().visibility_delay = delay;
        self
    }

    /// Queue a result for the next `evaluate` call
    #[must_use]
    pub fn with_js_result(self, result: serde_json::Value) -> Self {
        self.state().js_results.push_back(result);
        self
    }

    /// Add a scripted element to a running mock
    pub fn add_element(&self, element: MockElement) {
        self.state().elements.push(element);
    }

    /// Publish a page event to subscribers
    pub fn emit(&self, event: &PageEvent) {
        self.events.publish(event);
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().call_history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.state()
            .call_history
            .iter()
            .any(|c| c.starts_with(method))
    }

    /// Number of recorded calls starting with `prefix`
    #[must_use]
    pub fn call_count(&self, prefix: &str) -> usize {
        self.state()
            .call_history
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Last viewport set
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.state().viewport
    }

    fn record(&self, call: String) {
        self.state().call_history.push(call);
    }

    fn attached(&self, element: &MockElement) -> bool {
        self.start.elapsed() >= element.appears_after
    }

    /// Index into `state.elements` of the handle's target
    fn resolve(&self, state: &MockState, handle: &ElementHandle) -> ProbeResult<usize> {
        if let Some(message) = state.query_errors.get(&handle.signal) {
            return Err(ProbeError::query(&handle.signal, message.clone()));
        }
        state
            .elements
            .iter()
            .enumerate()
            .filter(|(_, el)| el.signal == handle.signal && self.attached(el))
            .map(|(i, _)| i)
            .nth(handle.index)
            .ok_or_else(|| ProbeError::driver(format!("no element matches `{handle}`")))
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn navigate(
        &self,
        url: &str,
        _wait_until: LoadState,
        _timeout: Duration,
    ) -> ProbeResult<NavigationResponse> {
        let mut state = self.state();
        state.call_history.push(format!("navigate:{url}"));
        if let Some(message) = &state.navigation_error {
            return Err(ProbeError::navigation(url, message.clone()));
        }
        state.current_url = url.to_string();
        Ok(NavigationResponse::new(url, state.navigation_status))
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> ProbeResult<()> {
        let mut inner = self.state();
        inner.call_history.push(format!("wait_for_load_state:{state}"));
        if state == LoadState::NetworkIdle && inner.network_idle_error {
            return Err(ProbeError::Timeout {
                ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }

    async fn count(&self, signal: &Signal) -> ProbeResult<usize> {
        let mut state = self.state();
        state.call_history.push(format!("count:{signal}"));
        if let Some(message) = state.query_errors.get(signal) {
            return Err(ProbeError::query(signal, message.clone()));
        }
        Ok(state
            .elements
            .iter()
            .filter(|el| &el.signal == signal && self.attached(el))
            .count())
    }

    async fn is_visible(&self, element: &ElementHandle, _timeout: Duration) -> ProbeResult<bool> {
        let delay = {
            let mut state = self.state();
            state.call_history.push(format!("is_visible:{element}"));
            state.visibility_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let state = self.state();
        Ok(self
            .resolve(&state, element)
            .map(|i| state.elements[i].visible)
            .unwrap_or(false))
    }

    async fn text_content(&self, element: &ElementHandle) -> ProbeResult<Option<String>> {
        let state = self.state();
        let i = self.resolve(&state, element)?;
        Ok(state.elements[i].text.clone())
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> ProbeResult<Option<String>> {
        let state = self.state();
        let i = self.resolve(&state, element)?;
        Ok(state.elements[i].attributes.get(name).cloned())
    }

    async fn click(&self, element: &ElementHandle) -> ProbeResult<()> {
        let mut state = self.state();
        state.call_history.push(format!("click:{element}"));
        self.resolve(&state, element).map(|_| ())
    }

    async fn clear(&self, element: &ElementHandle) -> ProbeResult<()> {
        let mut state = self.state();
        state.call_history.push(format!("clear:{element}"));
        let i = self.resolve(&state, element)?;
        if state.elements[i].write_mode != WriteMode::Drop {
            state.elements[i].value.clear();
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> ProbeResult<()> {
        let mut state = self.state();
        state.call_history.push(format!("fill:{element}"));
        let i = self.resolve(&state, element)?;
        let target = &mut state.elements[i];
        target.fills += 1;
        match &target.write_mode {
            WriteMode::Accept => target.value = value.to_string(),
            WriteMode::Reject(message) => return Err(ProbeError::driver(message.clone())),
            WriteMode::Drop => {}
            WriteMode::Flaky(failures) => {
                if target.fills <= *failures {
                    return Err(ProbeError::driver(format!(
                        "element `{element}` is detached (attempt {})",
                        target.fills
                    )));
                }
                target.value = value.to_string();
            }
        }
        Ok(())
    }

    async fn input_value(&self, element: &ElementHandle) -> ProbeResult<String> {
        let mut state = self.state();
        state.call_history.push(format!("input_value:{element}"));
        let i = self.resolve(&state, element)?;
        Ok(state.elements[i].value.clone())
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> ProbeResult<()> {
        let mut state = self.state();
        state.call_history.push(format!("scroll_into_view:{element}"));
        self.resolve(&state, element).map(|_| ())
    }

    async fn evaluate(&self, script: &str) -> ProbeResult<serde_json::Value> {
        let mut state = self.state();
        let preview: String = script.chars().take(40).collect();
        state.call_history.push(format!("evaluate:{preview}"));
        Ok(state
            .js_results
            .pop_front()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn press_key(&self, key: &str) -> ProbeResult<()> {
        self.record(format!("press_key:{key}"));
        Ok(())
    }

    async fn set_viewport(&self, viewport: Viewport) -> ProbeResult<()> {
        let mut state = self.state();
        state.call_history.push(format!("set_viewport:{viewport}"));
        state.viewport = viewport;
        Ok(())
    }

    async fn screenshot(&self, full_page: bool) -> ProbeResult<Vec<u8>> {
        let mut state = self.state();
        state
            .call_history
            .push(format!("screenshot:full_page={full_page}"));
        Ok(state.screenshot.clone())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        Ok(self.state().current_url.clone())
    }

    fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        self.events.subscribe(kinds)
    }
}
