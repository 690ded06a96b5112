//! Check execution against a driver
//!
//! Each check is generic over [`Driver`] so it runs the same against Chromium
//! and the mock. The `run_*` entry points launch the browser, run the check,
//! and close the browser again.

use spa_probe::{
    alt_text_coverage, capture_screenshot, Auditor, AxeAuditor, Driver, PageReady, Readiness,
    ReadinessPoller, Signal, SuiteConfig, Tier,
};
use std::time::Duration;

use crate::commands::{AuditArgs, FindArgs, ReadyArgs};
use crate::error::{CliError, CliResult};
use crate::output::{format_elapsed, Reporter};

fn budget(explicit: Option<u64>, config: &SuiteConfig, tier: Tier) -> Duration {
    explicit.map_or_else(|| config.timeout(tier), Duration::from_millis)
}

/// Navigate and wait for readiness, reporting the landmark outcome
pub async fn check_ready<D: Driver + ?Sized>(
    driver: &D,
    config: &SuiteConfig,
    args: &ReadyArgs,
    reporter: &Reporter,
) -> CliResult<PageReady> {
    let url = config.url_for(&args.url);
    let ready = ReadinessPoller::from_config(config)
        .await_page_ready(driver, &url, budget(args.budget_ms, config, Tier::Long))
        .await?;

    let status = ready
        .status
        .map_or_else(|| "no status".to_string(), |s| format!("HTTP {s}"));
    reporter.success(&format!(
        "{} ready in {} ({status})",
        ready.url,
        format_elapsed(ready.elapsed)
    ));
    match &ready.landmark {
        Some(landmark) => reporter.info(&format!("landmark visible: {landmark}")),
        None if config.readiness.landmarks.is_empty() => {}
        None => reporter.warning("no landmark became visible"),
    }

    if let Some(name) = &args.screenshot {
        let path = capture_screenshot(driver, &config.screenshot_dir, name, true).await?;
        reporter.info(&format!("screenshot: {}", path.display()));
    }
    Ok(ready)
}

/// Navigate, then poll for any of the given signals
pub async fn check_find<D: Driver + ?Sized>(
    driver: &D,
    config: &SuiteConfig,
    args: &FindArgs,
    reporter: &Reporter,
) -> CliResult<Readiness> {
    let signals = Signal::parse_all(&args.signals)?;
    let url = config.url_for(&args.url);
    let poller = ReadinessPoller::from_config(config);
    poller
        .await_page_ready(driver, &url, config.timeout(Tier::Long))
        .await?;

    let outcome = poller
        .await_any(driver, &signals, budget(args.budget_ms, config, Tier::Medium))
        .await?;
    match &outcome {
        Readiness::Found {
            signal, elapsed, ..
        } => {
            reporter.success(&format!("found {signal} after {}", format_elapsed(*elapsed)));
            Ok(outcome)
        }
        Readiness::TimedOut {
            attempted, budget, ..
        } => {
            let attempted: Vec<String> = attempted.iter().map(ToString::to_string).collect();
            let message = format!(
                "none of [{}] became visible within {}",
                attempted.join(", "),
                format_elapsed(*budget)
            );
            reporter.failure(&message);
            Err(CliError::check_failed(message))
        }
    }
}

/// Navigate, run axe and the alt-text check; blocking violations fail
pub async fn check_audit(
    driver: &dyn Driver,
    auditor: &dyn Auditor,
    config: &SuiteConfig,
    args: &AuditArgs,
    reporter: &Reporter,
) -> CliResult<()> {
    if !(0.0..=1.0).contains(&args.max_missing_alt) {
        return Err(CliError::invalid_argument(format!(
            "--max-missing-alt must be within 0..=1, got {}",
            args.max_missing_alt
        )));
    }

    let url = config.url_for(&args.url);
    ReadinessPoller::from_config(config)
        .await_page_ready(driver, &url, config.timeout(Tier::Long))
        .await?;

    let report = auditor.audit(driver, &args.tags).await?;
    reporter.header(&format!("Accessibility: {url}"));
    for line in report.summary() {
        reporter.info(&line);
    }

    let coverage = alt_text_coverage(driver).await?;
    let alt_ok = coverage.acceptable(args.max_missing_alt);
    let alt_line = format!(
        "{} of {} images without alt text",
        coverage.missing, coverage.total
    );
    if alt_ok {
        reporter.success(&alt_line);
    } else {
        reporter.failure(&alt_line);
    }

    let blocking = report.critical_or_serious().len();
    if blocking > 0 {
        reporter.failure(&format!("{blocking} critical/serious violation(s)"));
    } else {
        reporter.success(&format!(
            "no blocking violations ({} total)",
            report.violations.len()
        ));
    }

    if blocking > 0 || !alt_ok {
        return Err(CliError::check_failed(format!(
            "accessibility audit failed for {url}"
        )));
    }
    Ok(())
}

#[cfg(feature = "browser")]
mod browser {
    use super::*;
    use spa_probe::ChromiumDriver;

    async fn shutdown(driver: ChromiumDriver) {
        if let Err(e) = driver.close().await {
            tracing::warn!(error = %e, "browser did not close cleanly");
        }
    }

    pub async fn run_ready(
        config: &SuiteConfig,
        args: &ReadyArgs,
        reporter: &Reporter,
    ) -> CliResult<()> {
        let driver = ChromiumDriver::launch(&config.browser).await?;
        let outcome = check_ready(&driver, config, args, reporter).await.map(drop);
        shutdown(driver).await;
        outcome
    }

    pub async fn run_find(
        config: &SuiteConfig,
        args: &FindArgs,
        reporter: &Reporter,
    ) -> CliResult<()> {
        let driver = ChromiumDriver::launch(&config.browser).await?;
        let outcome = check_find(&driver, config, args, reporter).await.map(drop);
        shutdown(driver).await;
        outcome
    }

    pub async fn run_audit(
        config: &SuiteConfig,
        args: &AuditArgs,
        reporter: &Reporter,
    ) -> CliResult<()> {
        let auditor = AxeAuditor::from_file(&args.axe)?;
        let driver = ChromiumDriver::launch(&config.browser).await?;
        let outcome = check_audit(&driver, &auditor, config, args, reporter).await;
        shutdown(driver).await;
        outcome
    }
}

#[cfg(not(feature = "browser"))]
mod browser {
    use super::*;

    pub async fn run_ready(_: &SuiteConfig, _: &ReadyArgs, _: &Reporter) -> CliResult<()> {
        Err(CliError::feature_disabled("ready", "browser"))
    }

    pub async fn run_find(_: &SuiteConfig, _: &FindArgs, _: &Reporter) -> CliResult<()> {
        Err(CliError::feature_disabled("find", "browser"))
    }

    pub async fn run_audit(_: &SuiteConfig, args: &AuditArgs, _: &Reporter) -> CliResult<()> {
        let _ = AxeAuditor::from_file(&args.axe)?;
        Err(CliError::feature_disabled("audit", "browser"))
    }
}

pub use browser::{run_audit, run_find, run_ready};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use spa_probe::{MockDriver, MockElement, ProbeError};

    fn config() -> SuiteConfig {
        SuiteConfig::default()
            .with_base_url("https://app.test")
            .with_landmarks(vec![Signal::css("img.logo")])
    }

    fn quiet() -> Reporter {
        Reporter::new(false, true)
    }

    mod ready_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_ready_resolves_path_and_landmark() {
            let driver = MockDriver::new().with_element(MockElement::new("img.logo"));
            let args = ReadyArgs {
                url: "/#/landing".to_string(),
                budget_ms: None,
                screenshot: None,
            };
            let ready = check_ready(&driver, &config(), &args, &quiet()).await.unwrap();
            assert_eq!(ready.url, "https://app.test/#/landing");
            assert_eq!(ready.landmark, Some(Signal::css("img.logo")));
        }

        #[tokio::test(start_paused = true)]
        async fn test_ready_non_2xx_fails() {
            let driver = MockDriver::new().with_navigation_status(Some(503));
            let args = ReadyArgs {
                url: "https://app.test/".to_string(),
                budget_ms: Some(5000),
                screenshot: None,
            };
            let err = check_ready(&driver, &config(), &args, &quiet())
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                CliError::Probe(ProbeError::NavigationFailed { .. })
            ));
        }

        #[tokio::test(start_paused = true)]
        async fn test_ready_saves_screenshot() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = config();
            config.screenshot_dir = dir.path().display().to_string();
            let driver = MockDriver::new().with_element(MockElement::new("img.logo"));
            let args = ReadyArgs {
                url: "/".to_string(),
                budget_ms: None,
                screenshot: Some("landing".to_string()),
            };
            check_ready(&driver, &config, &args, &quiet()).await.unwrap();
            assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        }
    }

    mod find_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_find_reports_winner() {
            let driver = MockDriver::new().with_element(
                MockElement::new("a[href*=login]").appears_after(Duration::from_millis(700)),
            );
            let args = FindArgs {
                url: "/".to_string(),
                signals: vec!["text=Entrar".to_string(), "a[href*=login]".to_string()],
                budget_ms: Some(5000),
            };
            let outcome = check_find(&driver, &config(), &args, &quiet()).await.unwrap();
            assert_eq!(outcome.signal(), Some(&Signal::css("a[href*=login]")));
        }

        #[tokio::test(start_paused = true)]
        async fn test_find_timeout_is_check_failure() {
            let driver = MockDriver::new();
            let args = FindArgs {
                url: "/".to_string(),
                signals: vec!["#never".to_string()],
                budget_ms: Some(1000),
            };
            let err = check_find(&driver, &config(), &args, &quiet())
                .await
                .unwrap_err();
            assert!(matches!(err, CliError::CheckFailed { .. }));
            assert!(err.to_string().contains("#never"));
        }
    }

    mod audit_tests {
        use super::*;

        fn args(max_missing_alt: f64) -> AuditArgs {
            AuditArgs {
                url: "/".to_string(),
                axe: "axe.min.js".into(),
                tags: vec!["wcag2a".to_string()],
                max_missing_alt,
            }
        }

        fn axe_result(impact: &str) -> serde_json::Value {
            json!({
                "violations": [{
                    "id": "color-contrast",
                    "impact": impact,
                    "description": "Elements must have sufficient color contrast",
                    "help": "contrast",
                    "helpUrl": "https://dequeuniversity.com/rules/axe/color-contrast",
                    "nodes": [{ "target": ["button"], "html": "<button>" }]
                }],
                "passes": [],
                "incomplete": []
            })
        }

        #[tokio::test(start_paused = true)]
        async fn test_minor_violation_passes() {
            let driver = MockDriver::new()
                .with_element(MockElement::new("img.logo"))
                .with_element(MockElement::new("img").with_attribute("alt", "Logo"))
                .with_js_result(json!(true))
                .with_js_result(axe_result("minor"));
            let auditor = AxeAuditor::new("window.axe = {};");
            check_audit(&driver, &auditor, &config(), &args(0.3), &quiet())
                .await
                .unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_serious_violation_fails() {
            let driver = MockDriver::new()
                .with_js_result(json!(true))
                .with_js_result(axe_result("serious"));
            let auditor = AxeAuditor::new("window.axe = {};");
            let err = check_audit(&driver, &auditor, &config(), &args(0.3), &quiet())
                .await
                .unwrap_err();
            assert!(matches!(err, CliError::CheckFailed { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_alt_fails() {
            let driver = MockDriver::new()
                .with_element(MockElement::new("img"))
                .with_element(MockElement::new("img").with_attribute("alt", "ok"))
                .with_js_result(json!(true))
                .with_js_result(json!({ "violations": [], "passes": [], "incomplete": [] }));
            let auditor = AxeAuditor::new("window.axe = {};");
            let err = check_audit(&driver, &auditor, &config(), &args(0.3), &quiet())
                .await
                .unwrap_err();
            assert!(matches!(err, CliError::CheckFailed { .. }));
        }

        #[tokio::test]
        async fn test_ratio_out_of_range() {
            let driver = MockDriver::new();
            let auditor = AxeAuditor::new("window.axe = {};");
            let err = check_audit(&driver, &auditor, &config(), &args(1.5), &quiet())
                .await
                .unwrap_err();
            assert!(matches!(err, CliError::InvalidArgument { .. }));
            assert!(driver.history().is_empty());
        }
    }
}
