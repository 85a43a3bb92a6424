//! signet - trust anchor server for mobile multifactor authentication.
//!
//! devices activate against the server, deriving a long-lived shared secret;
//! every subsequent request carries a symmetric multi-factor signature that
//! the server verifies against a monotonically advancing counter.

use clap::Parser;
use color_eyre::eyre::Result;
use signet::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(cmd) => cmd.run().await,
        Command::Apps(cmd) => cmd.run().await,
    }
}
