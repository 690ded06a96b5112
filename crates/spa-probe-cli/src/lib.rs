//! spa-probe CLI library
//!
//! Argument parsing, configuration loading, console reporting and the
//! browser-backed checks behind the `spa-probe` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{
    AuditArgs, Cli, ColorArg, Commands, ConfigArgs, FindArgs, LogFormat, ReadyArgs,
};
pub use config::{load_suite_config, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{format_elapsed, LineKind, Reporter};
pub use runner::{check_audit, check_find, check_ready, run_audit, run_find, run_ready};
