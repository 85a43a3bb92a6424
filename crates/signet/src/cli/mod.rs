//! cli subcommands for signet.
//!
//! - `signet serve` - run the server
//! - `signet apps create` - bootstrap an application with credentials and a
//!   master keypair

mod apps;
mod serve;

pub use apps::AppsCommand;
pub use serve::ServeCommand;

use clap::{Parser, Subcommand};

/// signet - trust anchor server for mobile multifactor authentication
#[derive(Parser, Debug)]
#[command(name = "signet")]
#[command(about = "Trust anchor server for mobile multifactor authentication", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// run the server
    Serve(ServeCommand),

    /// manage applications
    #[command(subcommand)]
    Apps(AppsCommand),
}
