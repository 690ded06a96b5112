//! Page event subscriptions.
//!
//! Drivers publish console output, uncaught page errors and network traffic
//! onto an [`EventBus`]. Tests observe it through a [`Subscription`]: a handle
//! returned at registration that buffers events in arrival order and
//! unregisters itself when dropped, so listeners never outlive the test that
//! created them.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Console message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// `console.debug`
    Debug,
    /// `console.log`
    Log,
    /// `console.info`
    Info,
    /// `console.warn`
    Warning,
    /// `console.error`
    Error,
}

/// Event kinds a subscriber can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Console message
    Console,
    /// Uncaught exception in the page
    PageError,
    /// Request issued
    Request,
    /// Response received
    Response,
}

impl EventKind {
    /// Every kind
    pub const ALL: [Self; 4] = [Self::Console, Self::PageError, Self::Request, Self::Response];

    /// Get the event name string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::PageError => "pageerror",
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An event observed on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageEvent {
    /// Console message
    Console {
        /// Severity
        level: ConsoleLevel,
        /// Rendered message text
        text: String,
    },
    /// Uncaught exception
    PageError {
        /// Exception message
        message: String,
    },
    /// Outgoing request
    Request {
        /// Request URL
        url: String,
        /// HTTP method
        method: String,
        /// Request headers
        headers: Vec<(String, String)>,
    },
    /// Incoming response
    Response {
        /// Response URL
        url: String,
        /// HTTP status
        status: u16,
        /// HTTP method of the originating request
        method: String,
    },
}

impl PageEvent {
    /// The kind of this event
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Console { .. } => EventKind::Console,
            Self::PageError { .. } => EventKind::PageError,
            Self::Request { .. } => EventKind::Request,
            Self::Response { .. } => EventKind::Response,
        }
    }

    /// Console message at error level
    #[must_use]
    pub fn console_error(text: impl Into<String>) -> Self {
        Self::Console {
            level: ConsoleLevel::Error,
            text: text.into(),
        }
    }

    /// Uncaught page error
    #[must_use]
    pub fn page_error(message: impl Into<String>) -> Self {
        Self::PageError {
            message: message.into(),
        }
    }

    /// Response event
    #[must_use]
    pub fn response(url: impl Into<String>, status: u16, method: impl Into<String>) -> Self {
        Self::Response {
            url: url.into(),
            status,
            method: method.into(),
        }
    }
}

struct Subscriber {
    id: u64,
    kinds: Vec<EventKind>,
    tx: UnboundedSender<PageEvent>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// Fan-out point for page events, owned by a driver
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for the given kinds (empty means all kinds)
    #[must_use]
    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let kinds = if kinds.is_empty() {
            EventKind::ALL.to_vec()
        } else {
            kinds.to_vec()
        };

        let id = match self.inner.lock() {
            Ok(mut inner) => {
                let id = inner.next_id;
                inner.next_id += 1;
                inner.subscribers.push(Subscriber {
                    id,
                    kinds: kinds.clone(),
                    tx,
                });
                id
            }
            // A poisoned bus delivers nothing; the subscription simply stays empty.
            Err(_) => u64::MAX,
        };

        Subscription {
            id,
            kinds,
            rx,
            bus: Arc::downgrade(&self.inner),
            collected: Vec::new(),
        }
    }

    /// Deliver an event to every matching subscriber
    pub fn publish(&self, event: &PageEvent) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let kind = event.kind();
        inner.subscribers.retain(|sub| {
            if sub.kinds.contains(&kind) {
                sub.tx.send(event.clone()).is_ok()
            } else {
                !sub.tx.is_closed()
            }
        });
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().map(|i| i.subscribers.len()).unwrap_or(0)
    }
}

/// Scoped event listener; unsubscribes on drop
pub struct Subscription {
    id: u64,
    kinds: Vec<EventKind>,
    rx: UnboundedReceiver<PageEvent>,
    bus: Weak<Mutex<BusInner>>,
    collected: Vec<PageEvent>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kinds", &self.kinds)
            .field("collected", &self.collected.len())
            .finish()
    }
}

impl Subscription {
    /// Kinds this subscription listens to
    #[must_use]
    pub fn kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    /// Pull pending events and return everything seen so far, in order
    pub fn drain(&mut self) -> &[PageEvent] {
        while let Ok(event) = self.rx.try_recv() {
            self.collected.push(event);
        }
        &self.collected
    }

    /// Console errors and page errors, formatted for assertion messages
    pub fn errors(&mut self) -> Vec<String> {
        self.drain()
            .iter()
            .filter_map(|event| match event {
                PageEvent::Console {
                    level: ConsoleLevel::Error,
                    text,
                } => Some(text.clone()),
                PageEvent::PageError { message } => Some(format!("Page error: {message}")),
                _ => None,
            })
            .collect()
    }

    /// Responses with status >= 400 as `(url, status)`
    pub fn failed_responses(&mut self) -> Vec<(String, u16)> {
        self.drain()
            .iter()
            .filter_map(|event| match event {
                PageEvent::Response { url, status, .. } if *status >= 400 => {
                    Some((url.clone(), *status))
                }
                _ => None,
            })
            .collect()
    }

    /// Explicitly release the subscription
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            if let Ok(mut inner) = bus.lock() {
                inner.subscribers.retain(|sub| sub.id != self.id);
            }
        }
    }
}
