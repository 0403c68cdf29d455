//! CLI argument parsing

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Main CLI application structure
#[derive(Parser, Debug)]
#[command(
    name = "jwtcloak",
    version,
    about = "Check issuer files and verify bearer tokens against them",
    long_about = "jwtcloak loads an issuer file (TOML, YAML or JSON) describing trusted token issuers\n\
                  and verifies bearer tokens the same way an application using the library would.\n\n\
                  Remote-keyset and introspection issuers are contacted over the network.\n\
                  Tokens passed with --token or --header may end up in shell history;\n\
                  omit both to read the token from stdin."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Log line format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify a token and print its normalized claims
    Verify(VerifyArgs),

    /// Validate an issuer file and list its issuers
    CheckConfig(IssuerFileArgs),
}

/// Issuer file location
#[derive(Args, Debug, Clone)]
pub struct IssuerFileArgs {
    /// Path to the issuer file
    #[arg(long, short = 'c', env = "JWTCLOAK_CONFIG")]
    pub config: PathBuf,
}

/// Arguments of `verify`
#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub issuers: IssuerFileArgs,

    /// Raw token
    #[arg(long, conflicts_with = "header")]
    pub token: Option<String>,

    /// Full Authorization header value (e.g. "Bearer eyJ...")
    #[arg(long)]
    pub header: Option<String>,
}

/// Output formats
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable (pretty JSON for claims)
    Human,
    /// Compact JSON
    Json,
}

/// Log line formats
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain text
    Text,
    /// One JSON object per line
    Json,
}
