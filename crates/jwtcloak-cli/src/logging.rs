//! Logging initialization
//!
//! Logs always go to stderr so stdout carries only command output.

use std::io;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogFormat;

/// Default filter for a given `-v` count
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "jwtcloak=info",
        1 => "jwtcloak=debug",
        _ => "jwtcloak=trace",
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over the verbosity flag when set.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(format: LogFormat, verbose: u8) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
        LogFormat::Text => subscriber
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .try_init(),
    }
    .map_err(|e| io::Error::other(e.to_string()))
}
