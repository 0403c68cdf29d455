//! # jwtcloak CLI
//!
//! Operator tooling for jwtcloak issuer files.
//!
//! ## Usage
//!
//! ```bash
//! # Validate an issuer file and list what it trusts
//! jwtcloak check-config --config issuers.toml
//!
//! # Verify a token and print its normalized claims
//! jwtcloak verify --config issuers.toml --header "Bearer eyJhbGciOi..."
//!
//! # Token from stdin, JSON logs at debug level
//! echo "$TOKEN" | jwtcloak verify -c issuers.toml --log-format json -v
//! ```
//!
//! Claims are printed on stdout. A rejected token exits with status 1 and the
//! rejection cause on stderr.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;

use clap::Parser;

pub use cli::{Cli, Commands, IssuerFileArgs, LogFormat, OutputFormat, VerifyArgs};
pub use error::{CliError, CliResult};

/// Parse arguments, initialize logging and run the selected command
///
/// # Errors
///
/// Returns the command's error; the caller decides the exit status.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.verbose)?;
    execute(cli).await
}

/// Run an already parsed command line
///
/// # Errors
///
/// Returns the command's error.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Verify(args) => commands::verify(args, cli.format).await,
        Commands::CheckConfig(args) => commands::check_config(&args, cli.format),
    }
}
