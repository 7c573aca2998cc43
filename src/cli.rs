//! CLI argument parsing for the routopia-worker binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "routopia-worker", about = "Routopia route planning backend worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Print a signed token for local testing against a seeded user
    DevToken {
        /// Identity provider subject, e.g. "auth0|alice"
        #[arg(long)]
        subject: String,
        #[arg(long)]
        email: Option<String>,
        /// Lifetime in hours, a working day when omitted
        #[arg(long)]
        hours: Option<u64>,
    },
}
