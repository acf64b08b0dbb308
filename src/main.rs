//! stackplan CLI entry point.
//!
//! Parses command-line arguments, initializes logging, and executes the
//! selected command. Any failure is printed in a user-friendly form and
//! the process exits with status 1.

use clap::Parser;
use colored::Colorize;
use stackplan::cli;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    if let Err(error) = cli.execute() {
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
