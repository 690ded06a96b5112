//! Candidate signals: the ways an expected element might be identified.
//!
//! A client-rendered page does not promise a stable DOM, so callers describe
//! an element several ways and let the poller take whichever shows up first.
//! Signals are plain data; drivers decide how to evaluate them. The browser
//! driver evaluates the JavaScript produced by [`Signal::to_elements_query`].
//!
//! # String syntax
//!
//! | input                         | signal                    |
//! |-------------------------------|---------------------------|
//! | `#logo`, `css=#logo`          | CSS selector              |
//! | `text=Entrar`                 | element containing text   |
//! | `button:has-text("Entrar")`   | CSS filtered by text      |
//! | `testid=submit`               | `data-testid` attribute   |
//! | `alt=Logo Mais Gestão`        | image alt text            |
//! | `role=button[name="Entrar"]`  | ARIA role + accessible name |

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::result::{ProbeError, ProbeResult};

/// Descriptor naming one candidate element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Signal {
    /// CSS selector (e.g., `img[src*="logo"]`)
    Css(String),
    /// Any element whose text content contains the string
    Text(String),
    /// CSS selector filtered by text content
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// `data-testid` attribute
    TestId(String),
    /// Image alt text (exact match)
    AltText(String),
    /// ARIA role, optionally with an accessible name substring
    Role {
        /// Role name (e.g., "button")
        role: String,
        /// Accessible name filter
        name: Option<String>,
    },
}

impl Signal {
    /// Create a CSS signal
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a text signal
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a test ID signal
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create an alt-text signal
    #[must_use]
    pub fn alt_text(alt: impl Into<String>) -> Self {
        Self::AltText(alt.into())
    }

    /// Create a role signal
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    /// Restrict to elements whose text contains `text`
    ///
    /// Only CSS and role signals can be narrowed; other variants are returned
    /// unchanged.
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        match self {
            Self::Css(css) => Self::CssWithText {
                css,
                text: text.into(),
            },
            Self::Role { role, .. } => Self::Role {
                role,
                name: Some(text.into()),
            },
            other => other,
        }
    }

    /// Parse a list of strings into signals
    pub fn parse_all<I, S>(inputs: I) -> ProbeResult<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        inputs.into_iter().map(|s| s.as_ref().parse()).collect()
    }

    /// JavaScript expression evaluating to an array of matching elements
    #[must_use]
    pub fn to_elements_query(&self) -> String {
        match self {
            Self::Css(css) => format!("Array.from(document.querySelectorAll({}))", js_str(css)),
            Self::Text(text) => format!(
                "Array.from(document.querySelectorAll('body *')).filter(el => \
                 el.children.length === 0 && (el.textContent || '').includes({}))",
                js_str(text)
            ),
            Self::CssWithText { css, text } => format!(
                "Array.from(document.querySelectorAll({})).filter(el => \
                 (el.textContent || '').includes({}))",
                js_str(css),
                js_str(text)
            ),
            Self::TestId(id) => format!(
                "Array.from(document.querySelectorAll('[data-testid=' + JSON.stringify({}) + ']'))",
                js_str(id)
            ),
            Self::AltText(alt) => format!(
                "Array.from(document.querySelectorAll('img[alt]')).filter(el => \
                 el.getAttribute('alt') === {})",
                js_str(alt)
            ),
            Self::Role { role, name } => {
                let base = format!(
                    "Array.from(document.querySelectorAll({}))",
                    js_str(&role_selector(role))
                );
                match name {
                    Some(name) => format!(
                        "{base}.filter(el => ((el.getAttribute('aria-label') || '') + ' ' + \
                         (el.getAttribute('alt') || '') + ' ' + (el.textContent || '') + ' ' + \
                         (el.value || '')).toLowerCase().includes({}.toLowerCase()))",
                        js_str(name)
                    ),
                    None => base,
                }
            }
        }
    }

    /// JavaScript expression counting matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        format!("({}).length", self.to_elements_query())
    }
}

/// CSS selector for an ARIA role, including common implicit roles
fn role_selector(role: &str) -> String {
    let explicit = format!("[role=\"{role}\"]");
    let implicit = match role {
        "button" => "button, input[type=\"button\"], input[type=\"submit\"], input[type=\"reset\"]",
        "link" => "a[href]",
        "textbox" => {
            "textarea, input:not([type]), input[type=\"text\"], input[type=\"email\"], \
             input[type=\"tel\"], input[type=\"url\"], input[type=\"search\"]"
        }
        "checkbox" => "input[type=\"checkbox\"]",
        "heading" => "h1, h2, h3, h4, h5, h6",
        "img" => "img[alt]:not([alt=\"\"])",
        "navigation" => "nav",
        "main" => "main",
        "banner" => "header",
        "contentinfo" => "footer",
        "form" => "form",
        "list" => "ul, ol",
        "listitem" => "li",
        _ => "",
    };
    if implicit.is_empty() {
        explicit
    } else {
        format!("{explicit}, {implicit}")
    }
}

/// Quote a string as a JavaScript literal
fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn role_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^([A-Za-z]+)(?:\[name=(?:"([^"]*)"|'([^']*)'|([^\]]*))\])?$"#)
            .expect("role pattern is a valid regex")
    })
}

fn has_text_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^(.+):has-text\((?:"([^"]*)"|'([^']*)')\)$"#)
            .expect("has-text pattern is a valid regex")
    })
}

impl FromStr for Signal {
    type Err = ProbeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ProbeError::invalid_argument("empty signal"));
        }

        let non_empty = |value: &str, kind: &str| -> ProbeResult<String> {
            if value.is_empty() {
                Err(ProbeError::invalid_argument(format!(
                    "`{kind}=` signal needs a value"
                )))
            } else {
                Ok(value.to_string())
            }
        };

        if let Some(rest) = input.strip_prefix("css=") {
            return Ok(Self::Css(non_empty(rest, "css")?));
        }
        if let Some(rest) = input.strip_prefix("text=") {
            return Ok(Self::Text(non_empty(rest, "text")?));
        }
        if let Some(rest) = input.strip_prefix("testid=") {
            return Ok(Self::TestId(non_empty(rest, "testid")?));
        }
        if let Some(rest) = input.strip_prefix("alt=") {
            return Ok(Self::AltText(non_empty(rest, "alt")?));
        }
        if let Some(rest) = input.strip_prefix("role=") {
            let caps = role_pattern().captures(rest).ok_or_else(|| {
                ProbeError::invalid_argument(format!("malformed role signal `{input}`"))
            })?;
            let role = caps[1].to_string();
            let name = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string());
            return Ok(Self::Role { role, name });
        }
        if let Some(caps) = has_text_pattern().captures(input) {
            let text = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            return Ok(Self::CssWithText {
                css: caps[1].to_string(),
                text,
            });
        }
        Ok(Self::Css(input.to_string()))
    }
}

impl TryFrom<String> for Signal {
    type Error = ProbeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Signal> for String {
    fn from(signal: Signal) -> Self {
        signal.to_string()
    }
}

impl From<&str> for Signal {
    /// Bare strings are CSS selectors; use [`str::parse`] for prefixed syntax.
    fn from(css: &str) -> Self {
        Self::Css(css.to_string())
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{css}"),
            Self::Text(text) => write!(f, "text={text}"),
            Self::CssWithText { css, text } => write!(f, "{css}:has-text(\"{text}\")"),
            Self::TestId(id) => write!(f, "testid={id}"),
            Self::AltText(alt) => write!(f, "alt={alt}"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role}[name=\"{name}\"]"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_bare_string_is_css() {
            let s: Signal = "input[type=\"email\"]".parse().unwrap();
            assert_eq!(s, Signal::css("input[type=\"email\"]"));
        }

        #[test]
        fn test_prefixed_forms() {
            assert_eq!(
                "text=Entrar".parse::<Signal>().unwrap(),
                Signal::text("Entrar")
            );
            assert_eq!(
                "testid=submit".parse::<Signal>().unwrap(),
                Signal::test_id("submit")
            );
            assert_eq!(
                "alt=Logo Mais Gestão".parse::<Signal>().unwrap(),
                Signal::alt_text("Logo Mais Gestão")
            );
            assert_eq!(
                "css=#logo".parse::<Signal>().unwrap(),
                Signal::css("#logo")
            );
        }

        #[test]
        fn test_role_with_name() {
            let s: Signal = "role=button[name=\"Entrar\"]".parse().unwrap();
            assert_eq!(
                s,
                Signal::Role {
                    role: "button".to_string(),
                    name: Some("Entrar".to_string()),
                }
            );

            let bare: Signal = "role=navigation".parse().unwrap();
            assert_eq!(bare, Signal::role("navigation"));
        }

        #[test]
        fn test_has_text() {
            let s: Signal = "button:has-text('Acessar')".parse().unwrap();
            assert_eq!(s, Signal::css("button").with_text("Acessar"));
        }

        #[test]
        fn test_rejects_empty() {
            assert!("".parse::<Signal>().is_err());
            assert!("text=".parse::<Signal>().is_err());
            assert!("role=bad role".parse::<Signal>().is_err());
        }

        #[test]
        fn test_parse_all_keeps_order() {
            let signals = Signal::parse_all(["#missing", "text=Olá", "#real"]).unwrap();
            assert_eq!(signals.len(), 3);
            assert_eq!(signals[2], Signal::css("#real"));
        }
    }

    mod display_tests {
        use super::*;

        #[test]
        fn test_display_is_reparseable() {
            let signals = vec![
                Signal::css("img[src*=\"logo\"]"),
                Signal::text("Bem-vindo"),
                Signal::css("a").with_text("Cadastre-se"),
                Signal::test_id("cta"),
                Signal::alt_text("Logo"),
                Signal::role("button").with_text("Entrar"),
            ];
            for signal in signals {
                let reparsed: Signal = signal.to_string().parse().unwrap();
                assert_eq!(reparsed, signal);
            }
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_css_query_is_quoted() {
            let q = Signal::css("img[alt=\"Logo\"]").to_count_query();
            assert!(q.starts_with("(Array.from(document.querySelectorAll("));
            assert!(q.contains(r#""img[alt=\"Logo\"]""#));
            assert!(q.ends_with(".length"));
        }

        #[test]
        fn test_role_query_includes_implicit_tags() {
            let q = Signal::role("button").to_elements_query();
            assert!(q.contains("[role=\\\"button\\\"]"));
            assert!(q.contains("input[type=\\\"submit\\\"]"));
        }

        #[test]
        fn test_unknown_role_is_explicit_only() {
            assert_eq!(role_selector("tabpanel"), "[role=\"tabpanel\"]");
        }
    }

    mod serde_tests {
        use super::*;

        #[test]
        fn test_serde_as_string() {
            let json = serde_json::to_string(&Signal::text("Entrar")).unwrap();
            assert_eq!(json, "\"text=Entrar\"");
            let back: Signal = serde_json::from_str("\"role=link\"").unwrap();
            assert_eq!(back, Signal::role("link"));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_text_signals_roundtrip(text in "[A-Za-z0-9 À-ú]{1,24}") {
                let text = text.trim().to_string();
                prop_assume!(!text.is_empty());
                let signal = Signal::text(text);
                let reparsed: Signal = signal.to_string().parse().unwrap();
                prop_assert_eq!(reparsed, signal);
            }

            #[test]
            fn prop_css_query_never_panics(css in "\\PC{0,40}") {
                let _ = Signal::css(css).to_count_query();
            }
        }
    }
}
