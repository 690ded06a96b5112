//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// spa-probe: readiness, discovery and audit checks against a live single-page app
#[derive(Parser, Debug)]
#[command(name = "spa-probe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Suite configuration file (YAML)
    #[arg(short, long, global = true, env = "SPA_PROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a page and wait until it is ready
    Ready(ReadyArgs),

    /// Open a page and wait for any of several signals
    Find(FindArgs),

    /// Run an axe-core accessibility audit
    Audit(AuditArgs),

    /// Print the effective configuration as YAML
    Config(ConfigArgs),
}

/// Arguments for the ready command
#[derive(Parser, Debug)]
pub struct ReadyArgs {
    /// Absolute URL or a path under the configured base URL
    pub url: String,

    /// Overall budget in milliseconds (default: long tier)
    #[arg(long)]
    pub budget_ms: Option<u64>,

    /// Save a screenshot under this name once the page is ready
    #[arg(long)]
    pub screenshot: Option<String>,
}

/// Arguments for the find command
#[derive(Parser, Debug)]
pub struct FindArgs {
    /// Absolute URL or a path under the configured base URL
    pub url: String,

    /// Signal to look for, in priority order (css, text=, testid=, alt=, role=)
    #[arg(short, long = "signal", required = true)]
    pub signals: Vec<String>,

    /// Poll budget in milliseconds (default: medium tier)
    #[arg(long)]
    pub budget_ms: Option<u64>,
}

/// Arguments for the audit command
#[derive(Parser, Debug)]
pub struct AuditArgs {
    /// Absolute URL or a path under the configured base URL
    pub url: String,

    /// Path to the axe-core bundle (axe.min.js)
    #[arg(long)]
    pub axe: PathBuf,

    /// Restrict rules to these tags (e.g. wcag2a, wcag2aa)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Highest tolerated share of images without alt text
    #[arg(long, default_value = "0.3")]
    pub max_missing_alt: f64,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Print built-in defaults, ignoring the file and environment
    #[arg(long)]
    pub defaults: bool,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON lines
    Json,
}
