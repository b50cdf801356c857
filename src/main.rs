//! # fastmig command-line entry point
//!
//! ```bash
//! fastmig inspect people.csv --column age
//! fastmig convert people.csv --column age --to integer --output clean.csv --record tidy
//! fastmig replay --macro tidy.json people.csv --output clean.xlsx
//! fastmig rename people.csv --map name=full_name
//! ```
//!
//! Set `RUST_LOG=debug` to see every applied step.

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // println! is the CLI's output channel

mod cli;

use clap::Parser as _;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = fastmig::config::load_app_config();

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();

    let cli = cli::Cli::parse();
    cli::run_command(cli.command, settings)?;
    Ok(())
}
