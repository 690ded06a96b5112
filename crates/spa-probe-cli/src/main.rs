//! spa-probe: readiness checks for client-rendered web apps
//!
//! ## Usage
//!
//! ```bash
//! spa-probe ready /#/landing                          # Wait for the landing page
//! spa-probe find /#/login -s 'text=Entrar' -s form    # First visible signal wins
//! spa-probe audit / --axe axe.min.js -t wcag2aa       # Accessibility audit
//! spa-probe config --config suite.yaml                # Effective configuration
//! ```

use clap::Parser;
use spa_probe_cli::{
    run_audit, run_find, run_ready, Cli, CliConfig, CliResult, ColorChoice, Commands, ConfigArgs,
    LogFormat, Reporter, Verbosity,
};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);

    let level = config.verbosity.log_level();
    let _ = match cli.log_format {
        LogFormat::Text => spa_probe::init_tracing(level),
        LogFormat::Json => spa_probe::init_tracing_json(level),
    };

    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());

    match cli.command {
        Commands::Ready(args) => run_ready(&config.suite_config()?, &args, &reporter).await,
        Commands::Find(args) => run_find(&config.suite_config()?, &args, &reporter).await,
        Commands::Audit(args) => run_audit(&config.suite_config()?, &args, &reporter).await,
        Commands::Config(args) => run_config(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.into();

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_config_path(cli.config.clone())
}

fn run_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<()> {
    let suite = if args.defaults {
        spa_probe::SuiteConfig::default()
    } else {
        config.suite_config()?
    };
    print!("{}", suite.to_yaml()?);
    Ok(())
}
