//! Chromium driver over the Chrome `DevTools` Protocol.
//!
//! Signals are evaluated in the page as JavaScript (see
//! [`Signal::to_elements_query`]), so text and role signals work the same way
//! as CSS ones. Page access is serialised behind a `tokio::sync::Mutex`.

#![allow(
    clippy::significant_drop_tightening,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::network::{EventRequestWillBeSent, EventResponseReceived};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, NavigateParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EvaluateParams, EventConsoleApiCalled, EventExceptionThrown,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

use crate::config::{BrowserSettings, Viewport};
use crate::driver::{Driver, ElementHandle, NavigationResponse};
use crate::event::{ConsoleLevel, EventBus, EventKind, PageEvent, Subscription};
use crate::result::{ProbeError, ProbeResult};
use crate::signal::Signal;
use crate::wait::{duration_ms, LoadState, NETWORK_IDLE_THRESHOLD_MS};

/// Interval between `document.readyState` / resource-count samples
const LOAD_POLL_MS: u64 = 100;

/// Real browser driver
pub struct ChromiumDriver {
    browser: Mutex<Browser>,
    page: Arc<Mutex<Page>>,
    events: EventBus,
    handler: JoinHandle<()>,
    forwarder: JoinHandle<()>,
}

impl std::fmt::Debug for ChromiumDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumDriver")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

fn launch_error(e: impl std::fmt::Display) -> ProbeError {
    ProbeError::BrowserLaunch {
        message: e.to_string(),
    }
}

impl ChromiumDriver {
    /// Launch Chromium and open a blank page
    pub async fn launch(settings: &BrowserSettings) -> ProbeResult<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport.width, settings.viewport.height);
        if !settings.headless {
            builder = builder.with_head();
        }
        if !settings.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = settings.executable_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(launch_error)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(launch_error)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler error");
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(launch_error)?;
        let events = EventBus::new();
        let forwarder = forward_events(&page, events.clone()).await?;

        let driver = Self {
            browser: Mutex::new(browser),
            page: Arc::new(Mutex::new(page)),
            events,
            handler,
            forwarder,
        };
        driver.set_viewport(settings.viewport).await?;
        tracing::info!(
            headless = settings.headless,
            viewport = %settings.viewport,
            "browser launched"
        );
        Ok(driver)
    }

    /// Close the browser
    pub async fn close(&self) -> ProbeResult<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(launch_error)?;
        Ok(())
    }

    async fn eval(&self, script: &str) -> ProbeResult<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(ProbeError::driver)?;
        let page = self.page.lock().await;
        let result = page
            .evaluate_expression(params)
            .await
            .map_err(|e| ProbeError::driver(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Run `body` with `el` bound to the element; throws when it is gone
    async fn on_element(
        &self,
        element: &ElementHandle,
        body: &str,
    ) -> ProbeResult<serde_json::Value> {
        let name = serde_json::Value::String(element.to_string());
        let script = format!(
            "(() => {{ const el = {}; \
             if (!el) throw new Error('no element matches ' + {name}); {body} }})()",
            element.to_js()
        );
        self.eval(&script).await
    }

    async fn ready_state(&self) -> ProbeResult<(String, u64)> {
        let value = self
            .eval("[document.readyState, performance.getEntriesByType('resource').length]")
            .await?;
        let state = value
            .get(0)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let resources = value.get(1).and_then(serde_json::Value::as_u64).unwrap_or(0);
        Ok((state, resources))
    }

    /// Poll until `ready` accepts the page state; network idle also requires a
    /// stable resource count for [`NETWORK_IDLE_THRESHOLD_MS`]
    async fn poll_load_state(&self, state: LoadState) -> ProbeResult<()> {
        let quiet = Duration::from_millis(NETWORK_IDLE_THRESHOLD_MS);
        let mut last_count = None;
        let mut stable_since = Instant::now();
        loop {
            let (ready, resources) = self.ready_state().await?;
            let reached = match state {
                LoadState::DomContentLoaded => ready == "interactive" || ready == "complete",
                LoadState::Load => ready == "complete",
                LoadState::NetworkIdle => {
                    if last_count != Some(resources) {
                        last_count = Some(resources);
                        stable_since = Instant::now();
                    }
                    ready == "complete" && stable_since.elapsed() >= quiet
                }
            };
            if reached {
                return Ok(());
            }
            sleep(Duration::from_millis(LOAD_POLL_MS)).await;
        }
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        self.forwarder.abort();
        self.handler.abort();
    }
}

/// Forward console, exception and network events from the page to `bus`
async fn forward_events(page: &Page, bus: EventBus) -> ProbeResult<JoinHandle<()>> {
    let mut console = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(launch_error)?;
    let mut exceptions = page
        .event_listener::<EventExceptionThrown>()
        .await
        .map_err(launch_error)?;
    let mut requests = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(launch_error)?;
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(launch_error)?;

    Ok(tokio::spawn(async move {
        let mut methods: HashMap<String, String> = HashMap::new();
        loop {
            tokio::select! {
                Some(event) = console.next() => {
                    let level = match event.r#type {
                        ConsoleApiCalledType::Error | ConsoleApiCalledType::Assert => {
                            ConsoleLevel::Error
                        }
                        ConsoleApiCalledType::Warning => ConsoleLevel::Warning,
                        ConsoleApiCalledType::Info => ConsoleLevel::Info,
                        ConsoleApiCalledType::Debug => ConsoleLevel::Debug,
                        _ => ConsoleLevel::Log,
                    };
                    let text = event
                        .args
                        .iter()
                        .map(|arg| match (&arg.value, &arg.description) {
                            (Some(serde_json::Value::String(s)), _) => s.clone(),
                            (Some(v), _) => v.to_string(),
                            (None, Some(d)) => d.clone(),
                            (None, None) => String::new(),
                        })
                        .collect::<Vec<_>>()
                        .join(" ");
                    bus.publish(&PageEvent::Console { level, text });
                }
                Some(event) = exceptions.next() => {
                    let details = &event.exception_details;
                    let message = details
                        .exception
                        .as_ref()
                        .and_then(|e| e.description.clone())
                        .unwrap_or_else(|| details.text.clone());
                    bus.publish(&PageEvent::page_error(message));
                }
                Some(event) = requests.next() => {
                    let headers = serde_json::to_value(&event.request.headers)
                        .ok()
                        .and_then(|v| v.as_object().cloned())
                        .map(|map| {
                            map.into_iter()
                                .map(|(k, v)| (k, v.as_str().unwrap_or_default().to_string()))
                                .collect()
                        })
                        .unwrap_or_default();
                    methods.insert(event.request_id.inner().clone(), event.request.method.clone());
                    bus.publish(&PageEvent::Request {
                        url: event.request.url.clone(),
                        method: event.request.method.clone(),
                        headers,
                    });
                }
                Some(event) = responses.next() => {
                    let method = methods
                        .remove(event.request_id.inner())
                        .unwrap_or_default();
                    let status = u16::try_from(event.response.status).unwrap_or(0);
                    bus.publish(&PageEvent::response(event.response.url.clone(), status, method));
                }
                else => break,
            }
        }
    }))
}

#[async_trait]
impl Driver for ChromiumDriver {
    async fn navigate(
        &self,
        url: &str,
        wait_until: LoadState,
        wait: Duration,
    ) -> ProbeResult<NavigationResponse> {
        let attempt = async {
            let reply = {
                let page = self.page.lock().await;
                page.execute(NavigateParams::new(url))
                    .await
                    .map_err(|e| ProbeError::navigation(url, e.to_string()))?
            };
            if let Some(error) = reply.result.error_text.clone() {
                return Err(ProbeError::navigation(url, error));
            }
            self.poll_load_state(wait_until).await?;

            let status = self
                .eval("(performance.getEntriesByType('navigation')[0] || {}).responseStatus")
                .await?
                .as_u64()
                .and_then(|s| u16::try_from(s).ok())
                .filter(|s| *s != 0);
            let final_url = self.current_url().await?;
            Ok(NavigationResponse::new(final_url, status))
        };

        timeout(wait, attempt).await.map_err(|_| {
            ProbeError::navigation(url, format!("timed out after {}ms", duration_ms(wait)))
        })?
    }

    async fn wait_for_load_state(&self, state: LoadState, wait: Duration) -> ProbeResult<()> {
        timeout(wait, self.poll_load_state(state))
            .await
            .map_err(|_| ProbeError::Timeout {
                ms: duration_ms(wait),
            })?
    }

    async fn count(&self, signal: &Signal) -> ProbeResult<usize> {
        let value = self
            .eval(&signal.to_count_query())
            .await
            .map_err(|e| ProbeError::query(signal, e.to_string()))?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| ProbeError::query(signal, format!("unexpected count {value}")))
    }

    async fn is_visible(&self, element: &ElementHandle, wait: Duration) -> ProbeResult<bool> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; \
             const s = getComputedStyle(el); const r = el.getBoundingClientRect(); \
             return s.display !== 'none' && s.visibility !== 'hidden' && \
             parseFloat(s.opacity || '1') > 0 && r.width > 0 && r.height > 0; }})()",
            element.to_js()
        );
        match timeout(wait, self.eval(&script)).await {
            Ok(value) => Ok(value?.as_bool().unwrap_or(false)),
            Err(_) => Ok(false),
        }
    }

    async fn text_content(&self, element: &ElementHandle) -> ProbeResult<Option<String>> {
        let value = self.on_element(element, "return el.textContent;").await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> ProbeResult<Option<String>> {
        let body = format!(
            "return el.getAttribute({});",
            serde_json::Value::String(name.to_string())
        );
        let value = self.on_element(element, &body).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn click(&self, element: &ElementHandle) -> ProbeResult<()> {
        self.on_element(element, "el.scrollIntoView({block: 'center'}); el.click(); return true;")
            .await
            .map(|_| ())
    }

    async fn clear(&self, element: &ElementHandle) -> ProbeResult<()> {
        self.fill(element, "").await
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> ProbeResult<()> {
        // Native setter so framework-managed inputs see the change.
        let body = format!(
            "el.focus(); \
             const proto = el instanceof HTMLTextAreaElement \
             ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
             const setter = Object.getOwnPropertyDescriptor(proto, 'value').set; \
             setter.call(el, {}); \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true;",
            serde_json::Value::String(value.to_string())
        );
        self.on_element(element, &body).await.map(|_| ())
    }

    async fn input_value(&self, element: &ElementHandle) -> ProbeResult<String> {
        let value = self.on_element(element, "return el.value ?? '';").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> ProbeResult<()> {
        self.on_element(element, "el.scrollIntoView({block: 'center'}); return true;")
            .await
            .map(|_| ())
    }

    async fn evaluate(&self, script: &str) -> ProbeResult<serde_json::Value> {
        self.eval(script).await
    }

    async fn press_key(&self, key: &str) -> ProbeResult<()> {
        let page = self.page.lock().await;
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let params = DispatchKeyEventParams::builder()
                .r#type(kind)
                .key(key)
                .build()
                .map_err(ProbeError::driver)?;
            page.execute(params)
                .await
                .map_err(|e| ProbeError::driver(e.to_string()))?;
        }
        Ok(())
    }

    async fn set_viewport(&self, viewport: Viewport) -> ProbeResult<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(viewport.width))
            .height(i64::from(viewport.height))
            .device_scale_factor(1.0)
            .mobile(viewport.width < Viewport::TABLET.width)
            .build()
            .map_err(ProbeError::driver)?;
        let page = self.page.lock().await;
        page.execute(params)
            .await
            .map_err(|e| ProbeError::driver(e.to_string()))?;
        Ok(())
    }

    async fn screenshot(&self, full_page: bool) -> ProbeResult<Vec<u8>> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .capture_beyond_viewport(full_page)
            .build();
        let page = self.page.lock().await;
        let shot = page
            .execute(params)
            .await
            .map_err(|e| ProbeError::driver(e.to_string()))?;

        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| ProbeError::driver(e.to_string()))
    }

    async fn current_url(&self) -> ProbeResult<String> {
        let page = self.page.lock().await;
        let url = page
            .url()
            .await
            .map_err(|e| ProbeError::driver(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        self.events.subscribe(kinds)
    }
}
