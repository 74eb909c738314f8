//! Tollstream CLI binary entry point.

use std::path::Path;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tollstream_cli::{
    cli::{Cli, Commands},
    commands,
    config::{default_config_path, CliConfig},
    error::{CliError, CliResult},
    output::OutputFormat,
};

/// Log filter applied by `--verbose`.
const VERBOSE_DIRECTIVES: &str =
    "tollstream_cli=debug,tollstream_session=debug,tollstream_settle=debug";

fn main() {
    let cli = Cli::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: failed to start runtime: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    };
    rt.block_on(async_main(cli));
}

async fn async_main(cli: Cli) {
    // Initialize logging based on --verbose flag or RUST_LOG env var
    let has_rust_log = std::env::var("RUST_LOG").is_ok();
    if cli.verbose || has_rust_log {
        let filter = if cli.verbose {
            EnvFilter::new(VERBOSE_DIRECTIVES)
        } else {
            EnvFilter::from_default_env()
        };
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    if let Err(e) = run(cli).await {
        print_error(&e);
        std::process::exit(e.exit_code());
    }
}

/// Print a user-friendly error message with a recovery hint.
fn print_error(e: &CliError) {
    eprintln!("{}: {}", "Error".red().bold(), e);

    if let Some(suggestion) = e.suggestion() {
        eprintln!("{}: {}", "Hint".cyan(), suggestion);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let format_arg: Option<OutputFormat> = cli.format.map(Into::into);

    let output = match cli.command {
        Commands::Init {
            force,
            api_url,
            viewer,
            model,
        } => commands::init(
            &config_path,
            format_arg.unwrap_or_default(),
            force,
            api_url,
            viewer,
            model.map(Into::into),
        )?,
        Commands::Content { content_id } => {
            let (config, format) = load_config(&config_path, format_arg)?;
            commands::content(config, format, &content_id).await?
        }
        Commands::Watch(args) => {
            let (config, format) = load_config(&config_path, format_arg)?;
            commands::watch(config, format, args).await?
        }
    };

    println!("{}", output);
    Ok(())
}

/// Load the configuration; `--format` wins over `display.default_format`.
fn load_config(path: &Path, format: Option<OutputFormat>) -> CliResult<(CliConfig, OutputFormat)> {
    let config = CliConfig::load(path)?;
    let format = format.unwrap_or_else(|| config.display.format());
    Ok((config, format))
}
