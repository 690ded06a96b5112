//! Accessibility audits.
//!
//! The rule engine is not reimplemented here. [`AxeAuditor`] injects a
//! caller-supplied axe-core bundle into the page via [`Driver::evaluate`],
//! runs it with a tag filter (e.g. `wcag2a`, `wcag2aa`) and parses the
//! result into an [`AuditReport`]. [`alt_text_coverage`] is a lightweight
//! check that needs no engine at all.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::driver::{Driver, ElementHandle};
use crate::result::{ProbeError, ProbeResult};
use crate::signal::Signal;

/// Default share of images allowed to lack alt text (decorative images)
pub const DEFAULT_MAX_MISSING_ALT_RATIO: f64 = 0.3;

/// Violation impact, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    /// Minor issue
    Minor,
    /// Moderate issue
    Moderate,
    /// Serious issue
    Serious,
    /// Critical issue
    Critical,
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Serious => "serious",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// A node affected by a violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationNode {
    /// CSS selector path to the node
    #[serde(default)]
    pub target: Vec<serde_json::Value>,
    /// Outer HTML snippet
    #[serde(default)]
    pub html: String,
}

/// One failed rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Rule id (e.g. `html-has-lang`)
    pub id: String,
    /// Impact; axe omits it for some rules
    #[serde(default)]
    pub impact: Option<Impact>,
    /// Rule description
    #[serde(default)]
    pub description: String,
    /// Short help text
    #[serde(default)]
    pub help: String,
    /// Link to rule documentation
    #[serde(default)]
    pub help_url: String,
    /// Affected nodes
    #[serde(default)]
    pub nodes: Vec<ViolationNode>,
}

impl Violation {
    /// One-line summary: `id (impact): description [n node(s)]`
    #[must_use]
    pub fn summary(&self) -> String {
        let impact = self
            .impact
            .map_or_else(|| "unknown".to_string(), |i| i.to_string());
        format!(
            "{} ({impact}): {} [{} node(s)]",
            self.id,
            self.description,
            self.nodes.len()
        )
    }
}

/// Rule result reported without violations (passes, incomplete)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    /// Rule id
    pub id: String,
}

/// Parsed audit result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Failed rules
    #[serde(default)]
    pub violations: Vec<Violation>,
    /// Passing rules
    #[serde(default)]
    pub passes: Vec<RuleResult>,
    /// Rules needing manual review
    #[serde(default)]
    pub incomplete: Vec<RuleResult>,
}

impl AuditReport {
    /// Parse axe-core result JSON
    pub fn from_json(value: serde_json::Value) -> ProbeResult<Self> {
        serde_json::from_value(value).map_err(|e| ProbeError::Audit {
            message: format!("unexpected audit result shape: {e}"),
        })
    }

    /// Violations with impact at least `min`
    #[must_use]
    pub fn at_least(&self, min: Impact) -> Vec<&Violation> {
        self.violations
            .iter()
            .filter(|v| v.impact.is_some_and(|i| i >= min))
            .collect()
    }

    /// Critical and serious violations
    #[must_use]
    pub fn critical_or_serious(&self) -> Vec<&Violation> {
        self.at_least(Impact::Serious)
    }

    /// Whether there are no critical or serious violations
    #[must_use]
    pub fn passes_blocking(&self) -> bool {
        self.critical_or_serious().is_empty()
    }

    /// One summary line per violation
    #[must_use]
    pub fn summary(&self) -> Vec<String> {
        self.violations.iter().map(Violation::summary).collect()
    }
}

/// Something that can audit the current page
#[async_trait]
pub trait Auditor: Send + Sync {
    /// Audit the page, restricted to rules carrying any of `tags` (empty = all)
    async fn audit(&self, driver: &dyn Driver, tags: &[String]) -> ProbeResult<AuditReport>;
}

/// axe-core injected through `evaluate`
#[derive(Debug, Clone)]
pub struct AxeAuditor {
    source: String,
}

impl AxeAuditor {
    /// Use an in-memory axe-core bundle
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Load the axe-core bundle from disk
    pub fn from_file(path: impl AsRef<Path>) -> ProbeResult<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        if source.trim().is_empty() {
            return Err(ProbeError::Audit {
                message: format!("{} is empty", path.as_ref().display()),
            });
        }
        Ok(Self::new(source))
    }

    /// Script that runs axe and resolves to its result object
    #[must_use]
    pub fn run_script(tags: &[String]) -> String {
        let options = if tags.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::json!({ "runOnly": { "type": "tag", "values": tags } })
        };
        format!(
            "(async () => {{ const r = await axe.run(document, {options}); \
             return {{ violations: r.violations, \
             passes: r.passes.map(p => ({{ id: p.id }})), \
             incomplete: r.incomplete.map(p => ({{ id: p.id }})) }}; }})()"
        )
    }
}

#[async_trait]
impl Auditor for AxeAuditor {
    async fn audit(&self, driver: &dyn Driver, tags: &[String]) -> ProbeResult<AuditReport> {
        let loaded = driver
            .evaluate(&format!(
                "{}\n;typeof axe !== 'undefined'",
                self.source
            ))
            .await?;
        if loaded != serde_json::Value::Bool(true) {
            return Err(ProbeError::Audit {
                message: "axe-core did not load in the page".to_string(),
            });
        }

        let raw = driver.evaluate(&Self::run_script(tags)).await?;
        let report = AuditReport::from_json(raw)?;
        tracing::info!(
            violations = report.violations.len(),
            blocking = report.critical_or_serious().len(),
            "accessibility audit complete"
        );
        Ok(report)
    }
}

/// Alt-text coverage of `<img>` elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AltTextCoverage {
    /// Images on the page
    pub total: usize,
    /// Images with a missing or empty `alt`
    pub missing: usize,
}

impl AltTextCoverage {
    /// Share of images without alt text (0.0 when there are no images)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn missing_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.missing as f64 / self.total as f64
        }
    }

    /// Whether the missing share is strictly below `max_ratio`
    #[must_use]
    pub fn acceptable(&self, max_ratio: f64) -> bool {
        self.total == 0 || self.missing_ratio() < max_ratio
    }
}

/// Count images whose `alt` is missing or empty
pub async fn alt_text_coverage<D: Driver + ?Sized>(driver: &D) -> ProbeResult<AltTextCoverage> {
    let images = Signal::css("img");
    let total = driver.count(&images).await?;
    let mut missing = 0;
    for index in 0..total {
        let alt = driver
            .attribute(&ElementHandle::nth(images.clone(), index), "alt")
            .await?;
        if alt.map_or(true, |a| a.is_empty()) {
            missing += 1;
        }
    }
    Ok(AltTextCoverage { total, missing })
}

/// Share of images without alt text
pub async fn missing_alt_ratio<D: Driver + ?Sized>(driver: &D) -> ProbeResult<f64> {
    Ok(alt_text_coverage(driver).await?.missing_ratio())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "violations": [
                {
                    "id": "html-has-lang",
                    "impact": "serious",
                    "description": "Ensures every HTML document has a lang attribute",
                    "help": "<html> element must have a lang attribute",
                    "helpUrl": "https://dequeuniversity.com/rules/axe/4.8/html-has-lang",
                    "nodes": [{ "target": ["html"], "html": "<html>" }]
                },
                {
                    "id": "region",
                    "impact": "moderate",
                    "description": "Ensures all page content is contained by landmarks",
                    "nodes": [{ "target": ["div"] }, { "target": ["span"] }]
                },
                { "id": "experimental", "impact": null }
            ],
            "passes": [{ "id": "image-alt" }],
            "incomplete": []
        })
    }

    mod report_tests {
        use super::*;

        #[test]
        fn test_parse_axe_shape() {
            let report = AuditReport::from_json(sample()).unwrap();
            assert_eq!(report.violations.len(), 3);
            assert_eq!(report.violations[0].impact, Some(Impact::Serious));
            assert_eq!(report.violations[2].impact, None);
            assert!(report.violations[0].help_url.contains("html-has-lang"));
            assert_eq!(report.passes[0].id, "image-alt");
        }

        #[test]
        fn test_blocking_filter() {
            let report = AuditReport::from_json(sample()).unwrap();
            let blocking = report.critical_or_serious();
            assert_eq!(blocking.len(), 1);
            assert_eq!(blocking[0].id, "html-has-lang");
            assert!(!report.passes_blocking());
            assert_eq!(report.at_least(Impact::Minor).len(), 2);
        }

        #[test]
        fn test_summary_lines() {
            let report = AuditReport::from_json(sample()).unwrap();
            let lines = report.summary();
            assert_eq!(
                lines[1],
                "region (moderate): Ensures all page content is contained by landmarks [2 node(s)]"
            );
            assert!(lines[2].starts_with("experimental (unknown)"));
        }

        #[test]
        fn test_impact_ordering() {
            assert!(Impact::Critical > Impact::Serious);
            assert!(Impact::Moderate > Impact::Minor);
        }

        #[test]
        fn test_bad_shape_is_audit_error() {
            let err = AuditReport::from_json(json!({ "violations": 3 })).unwrap_err();
            assert!(matches!(err, ProbeError::Audit { .. }));
        }
    }

    mod axe_tests {
        use super::*;

        #[test]
        fn test_run_script_tags() {
            let script = AxeAuditor::run_script(&["wcag2a".to_string(), "wcag2aa".to_string()]);
            assert!(script.contains(r#""runOnly":{"type":"tag","values":["wcag2a","wcag2aa"]}"#));
            assert!(AxeAuditor::run_script(&[]).contains("axe.run(document, {})"));
        }

        #[tokio::test]
        async fn test_audit_through_driver() {
            let driver = MockDriver::new()
                .with_js_result(json!(true))
                .with_js_result(sample());
            let report = AxeAuditor::new("window.axe = {};")
                .audit(&driver, &["wcag2a".to_string()])
                .await
                .unwrap();
            assert_eq!(report.critical_or_serious().len(), 1);
            assert_eq!(driver.call_count("evaluate:"), 2);
        }

        #[tokio::test]
        async fn test_audit_fails_when_axe_missing() {
            let driver = MockDriver::new().with_js_result(json!(false));
            let err = AxeAuditor::new("/* nothing */")
                .audit(&driver, &[])
                .await
                .unwrap_err();
            assert!(matches!(err, ProbeError::Audit { .. }));
        }

        #[test]
        fn test_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("axe.min.js");
            std::fs::write(&path, "window.axe = {};").unwrap();
            assert!(AxeAuditor::from_file(&path).is_ok());

            std::fs::write(&path, "  ").unwrap();
            assert!(AxeAuditor::from_file(&path).is_err());
            assert!(AxeAuditor::from_file(dir.path().join("missing.js")).is_err());
        }
    }

    mod alt_text_tests {
        use super::*;

        #[tokio::test]
        async fn test_coverage_counts_missing_and_empty() {
            let driver = MockDriver::new()
                .with_element(MockElement::new("img").with_attribute("alt", "Logo Mais Gestão"))
                .with_element(MockElement::new("img").with_attribute("alt", ""))
                .with_element(MockElement::new("img"))
                .with_element(MockElement::new("img").with_attribute("alt", "Banner"));

            let coverage = alt_text_coverage(&driver).await.unwrap();
            assert_eq!(coverage, AltTextCoverage { total: 4, missing: 2 });
            assert!((coverage.missing_ratio() - 0.5).abs() < f64::EPSILON);
            assert!(!coverage.acceptable(DEFAULT_MAX_MISSING_ALT_RATIO));
        }

        #[tokio::test]
        async fn test_no_images_is_acceptable() {
            let driver = MockDriver::new();
            assert_eq!(missing_alt_ratio(&driver).await.unwrap(), 0.0);
            assert!(alt_text_coverage(&driver)
                .await
                .unwrap()
                .acceptable(DEFAULT_MAX_MISSING_ALT_RATIO));
        }
    }
}
