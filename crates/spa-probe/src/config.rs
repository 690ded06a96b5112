//! Suite configuration.
//!
//! One immutable [`SuiteConfig`] is built at startup (defaults, then an
//! optional YAML file, then environment overrides) and shared by reference
//! with every check. Nothing in the crate mutates it afterwards.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::result::{ProbeError, ProbeResult};
use crate::signal::Signal;

/// Environment variable overriding [`SuiteConfig::base_url`]
pub const ENV_BASE_URL: &str = "SPA_PROBE_BASE_URL";

/// Environment variable scaling every timeout tier (e.g. `2.0` on slow CI)
pub const ENV_TIMEOUT_SCALE: &str = "SPA_PROBE_TIMEOUT_SCALE";

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl Viewport {
    /// Phone portrait
    pub const MOBILE: Self = Self::new(375, 667);
    /// Tablet portrait
    pub const TABLET: Self = Self::new(768, 1024);
    /// Desktop 1080p
    pub const DESKTOP: Self = Self::new(1920, 1080);

    /// Create a viewport
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Named viewport presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportPresets {
    /// Mobile preset
    pub mobile: Viewport,
    /// Tablet preset
    pub tablet: Viewport,
    /// Desktop preset
    pub desktop: Viewport,
}

impl Default for ViewportPresets {
    fn default() -> Self {
        Self {
            mobile: Viewport::MOBILE,
            tablet: Viewport::TABLET,
            desktop: Viewport::DESKTOP,
        }
    }
}

/// Timeout tier names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Quick element checks
    Short,
    /// Element waits on rendered pages
    Medium,
    /// Full page loads
    Long,
    /// Network-bound waits
    Network,
}

/// Per-operation timeout tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutTiers {
    /// Short tier in milliseconds
    pub short_ms: u64,
    /// Medium tier in milliseconds
    pub medium_ms: u64,
    /// Long tier in milliseconds
    pub long_ms: u64,
    /// Network tier in milliseconds
    pub network_ms: u64,
}

impl Default for TimeoutTiers {
    fn default() -> Self {
        Self {
            short_ms: 5_000,
            medium_ms: 15_000,
            long_ms: 30_000,
            network_ms: 30_000,
        }
    }
}

impl TimeoutTiers {
    /// Duration for a tier
    #[must_use]
    pub const fn get(&self, tier: Tier) -> Duration {
        Duration::from_millis(match tier {
            Tier::Short => self.short_ms,
            Tier::Medium => self.medium_ms,
            Tier::Long => self.long_ms,
            Tier::Network => self.network_ms,
        })
    }

    /// Multiply every tier by `factor`
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        let scale = |ms: u64| (ms as f64 * factor).round() as u64;
        Self {
            short_ms: scale(self.short_ms),
            medium_ms: scale(self.medium_ms),
            long_ms: scale(self.long_ms),
            network_ms: scale(self.network_ms),
        }
    }
}

/// Readiness heuristics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Sleep between poll iterations
    pub poll_interval_ms: u64,
    /// Cap on a single visibility check
    pub visibility_timeout_ms: u64,
    /// Fixed delay after network idle for client-side rendering
    pub settle_delay_ms: u64,
    /// Cap on the landmark wait
    pub landmark_cap_ms: u64,
    /// Signals that indicate the app has rendered (empty skips the check)
    pub landmarks: Vec<Signal>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            visibility_timeout_ms: 500,
            settle_delay_ms: 2_000,
            landmark_cap_ms: 10_000,
            landmarks: vec![
                Signal::css("img[alt=\"Logo Mais Gestão\"]"),
                Signal::css("img[src*=\"logo\"]"),
            ],
        }
    }
}

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run in headless mode
    pub headless: bool,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Path to chromium binary (None = auto-detect)
    pub executable_path: Option<String>,
    /// Initial viewport
    pub viewport: Viewport,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            executable_path: None,
            viewport: Viewport::DESKTOP,
        }
    }
}

/// Process-wide configuration shared by every check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Application root, without trailing slash
    pub base_url: String,
    /// Landing route relative to the base URL
    pub landing_path: String,
    /// Login route relative to the base URL
    pub login_path: String,
    /// Directory for captured screenshots
    pub screenshot_dir: String,
    /// Timeout tiers
    pub timeouts: TimeoutTiers,
    /// Viewport presets
    pub viewports: ViewportPresets,
    /// Readiness heuristics
    pub readiness: ReadinessConfig,
    /// Browser launch settings
    pub browser: BrowserSettings,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://app-hml.melhorgestaogrp.com.br".to_string(),
            landing_path: "/#/landing".to_string(),
            login_path: "/#/login".to_string(),
            screenshot_dir: "test-results/screenshots".to_string(),
            timeouts: TimeoutTiers::default(),
            viewports: ViewportPresets::default(),
            readiness: ReadinessConfig::default(),
            browser: BrowserSettings::default(),
        }
    }
}

impl SuiteConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML; missing keys keep their defaults
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load YAML from a file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ProbeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> ProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Apply `SPA_PROBE_*` environment overrides
    pub fn apply_env(self) -> ProbeResult<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (testable without touching the process env)
    pub fn apply_env_from<F>(mut self, lookup: F) -> ProbeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SCALE) {
            let factor: f64 = raw.trim().parse().map_err(|_| {
                ProbeError::config(format!("{ENV_TIMEOUT_SCALE} must be a number, got `{raw}`"))
            })?;
            if !(factor.is_finite() && factor > 0.0) {
                return Err(ProbeError::config(format!(
                    "{ENV_TIMEOUT_SCALE} must be positive, got `{raw}`"
                )));
            }
            self.timeouts = self.timeouts.scaled(factor);
        }
        self.validate()?;
        Ok(self)
    }

    /// Check invariants
    pub fn validate(&self) -> ProbeResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ProbeError::config("base_url must not be empty"));
        }
        if self.readiness.poll_interval_ms == 0 {
            return Err(ProbeError::config("readiness.poll_interval_ms must be > 0"));
        }
        if self.readiness.visibility_timeout_ms == 0 {
            return Err(ProbeError::config(
                "readiness.visibility_timeout_ms must be > 0",
            ));
        }
        Ok(())
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the timeout tiers
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: TimeoutTiers) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the readiness heuristics
    #[must_use]
    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    /// Set the landmark signals
    #[must_use]
    pub fn with_landmarks(mut self, landmarks: Vec<Signal>) -> Self {
        self.readiness.landmarks = landmarks;
        self
    }

    /// Timeout for a tier
    #[must_use]
    pub const fn timeout(&self, tier: Tier) -> Duration {
        self.timeouts.get(tier)
    }

    /// Absolute URL for a path (or the path itself when already absolute)
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Landing page URL
    #[must_use]
    pub fn landing_url(&self) -> String {
        self.url_for(&self.landing_path)
    }

    /// Login page URL
    #[must_use]
    pub fn login_url(&self) -> String {
        self.url_for(&self.login_path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    mod defaults_tests {
        use super::*;

        #[test]
        fn test_default_tiers() {
            let config = SuiteConfig::default();
            assert_eq!(config.timeout(Tier::Short), Duration::from_secs(5));
            assert_eq!(config.timeout(Tier::Medium), Duration::from_secs(15));
            assert_eq!(config.timeout(Tier::Long), Duration::from_secs(30));
            assert_eq!(config.timeout(Tier::Network), Duration::from_secs(30));
        }

        #[test]
        fn test_default_viewports() {
            let presets = ViewportPresets::default();
            assert_eq!(presets.mobile, Viewport::new(375, 667));
            assert_eq!(presets.tablet, Viewport::new(768, 1024));
            assert_eq!(presets.desktop.to_string(), "1920x1080");
        }

        #[test]
        fn test_urls() {
            let config = SuiteConfig::default().with_base_url("https://example.test/");
            assert_eq!(config.landing_url(), "https://example.test/#/landing");
            assert_eq!(config.login_url(), "https://example.test/#/login");
            assert_eq!(config.url_for("api/health"), "https://example.test/api/health");
            assert_eq!(config.url_for("https://other.test/x"), "https://other.test/x");
            assert_eq!(config.url_for(""), "https://example.test");
        }

        #[test]
        fn test_default_landmarks() {
            let config = SuiteConfig::default();
            assert_eq!(config.readiness.landmarks.len(), 2);
            assert_eq!(
                config.readiness.landmarks[1],
                Signal::css("img[src*=\"logo\"]")
            );
        }
    }

    mod yaml_tests {
        use super::*;
        use std::io::Write;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = SuiteConfig::from_yaml_str(
                "base_url: https://staging.test\ntimeouts:\n  short_ms: 1000\n",
            )
            .unwrap();
            assert_eq!(config.base_url, "https://staging.test");
            assert_eq!(config.timeouts.short_ms, 1000);
            assert_eq!(config.timeouts.long_ms, 30_000);
            assert_eq!(config.readiness.poll_interval_ms, 500);
        }

        #[test]
        fn test_landmarks_parse_signal_syntax() {
            let config = SuiteConfig::from_yaml_str(
                "readiness:\n  landmarks:\n    - alt=Logo\n    - role=banner\n",
            )
            .unwrap();
            assert_eq!(
                config.readiness.landmarks,
                vec![Signal::alt_text("Logo"), Signal::role("banner")]
            );
        }

        #[test]
        fn test_yaml_roundtrip() {
            let config = SuiteConfig::default();
            let yaml = config.to_yaml().unwrap();
            assert_eq!(SuiteConfig::from_yaml_str(&yaml).unwrap(), config);
        }

        #[test]
        fn test_from_file() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "base_url: https://file.test").unwrap();
            let config = SuiteConfig::from_yaml_file(file.path()).unwrap();
            assert_eq!(config.base_url, "https://file.test");
        }

        #[test]
        fn test_invalid_yaml_rejected() {
            assert!(matches!(
                SuiteConfig::from_yaml_str("readiness:\n  poll_interval_ms: 0\n"),
                Err(ProbeError::Config { .. })
            ));
            assert!(matches!(
                SuiteConfig::from_yaml_str("base_url: [1, 2]"),
                Err(ProbeError::Yaml(_))
            ));
        }
    }

    mod env_tests {
        use super::*;

        fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
            let map: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
            move |key| map.get(key).cloned()
        }

        #[test]
        fn test_base_url_override() {
            let config = SuiteConfig::default()
                .apply_env_from(env(&[(ENV_BASE_URL, "https://ci.test")]))
                .unwrap();
            assert_eq!(config.base_url, "https://ci.test");
        }

        #[test]
        fn test_timeout_scale() {
            let config = SuiteConfig::default()
                .apply_env_from(env(&[(ENV_TIMEOUT_SCALE, "2")]))
                .unwrap();
            assert_eq!(config.timeouts.short_ms, 10_000);
            assert_eq!(config.timeouts.network_ms, 60_000);
        }

        #[test]
        fn test_bad_scale_rejected() {
            for raw in ["fast", "0", "-1"] {
                let result =
                    SuiteConfig::default().apply_env_from(env(&[(ENV_TIMEOUT_SCALE, raw)]));
                assert!(matches!(result, Err(ProbeError::Config { .. })), "{raw}");
            }
        }

        #[test]
        fn test_empty_base_url_rejected() {
            let result = SuiteConfig::default().apply_env_from(env(&[(ENV_BASE_URL, " ")]));
            assert!(result.is_err());
        }
    }
}
