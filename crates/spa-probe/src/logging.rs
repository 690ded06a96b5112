//! Log output setup for binaries and test harnesses.

use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for a verbosity level (0 = warn, 1 = info, 2 = debug, 3+ = trace)
#[must_use]
pub fn filter_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "spa_probe=info,warn",
        2 => "spa_probe=debug,info",
        _ => "trace",
    }
}

fn env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity)))
}

fn text_subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
}

fn json_subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(std::io::stderr))
}

/// Install a human-readable subscriber on stderr; `RUST_LOG` overrides `verbosity`
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(verbosity: u8) -> bool {
    text_subscriber(env_filter(verbosity)).try_init().is_ok()
}

/// Install a JSON-lines subscriber on stderr, for CI log collectors
pub fn init_tracing_json(verbosity: u8) -> bool {
    json_subscriber(env_filter(verbosity)).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{enabled, subscriber::with_default, Level};

    #[test]
    fn test_directives_widen_with_verbosity() {
        assert_eq!(filter_directive(0), "warn");
        assert!(filter_directive(1).contains("spa_probe=info"));
        assert!(filter_directive(2).contains("spa_probe=debug"));
        assert_eq!(filter_directive(9), "trace");
    }

    #[test]
    fn test_quiet_filter_keeps_warnings_only() {
        let subscriber = text_subscriber(EnvFilter::new(filter_directive(0)));
        with_default(subscriber, || {
            assert!(enabled!(target: "spa_probe::wait", Level::WARN));
            assert!(!enabled!(target: "spa_probe::wait", Level::INFO));
        });
    }

    #[test]
    fn test_debug_filter_opens_library_target() {
        let subscriber = json_subscriber(EnvFilter::new(filter_directive(2)));
        with_default(subscriber, || {
            assert!(enabled!(target: "spa_probe::fill", Level::DEBUG));
            assert!(!enabled!(target: "chromiumoxide::handler", Level::DEBUG));
        });
    }
}
