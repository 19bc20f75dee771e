//! gigmarket CLI
//!
//! Command-line front end for a gigmarket store directory.
//!
//! # Commands
//!
//! - `gig create|list|show|update` - post and browse gigs (`list --mine` for your own)
//! - `bid submit|list|mine` - bid on gigs and review bids
//! - `hire` - hire a bid
//! - `verify` - check the marketplace invariants
//! - `stats` - count gigs and bids by status
//! - `dump-log` - dump write-ahead log records for debugging
//!
//! The caller identity comes from `--as`; the CLI trusts it as given.

mod commands;
mod error;
mod money;
mod output;

use clap::{Parser, Subcommand};
use commands::Session;
use error::CliError;
use output::Format;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Gig marketplace command-line tools.
#[derive(Parser)]
#[command(name = "gigmarket")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Identity of the caller
    #[arg(global = true, long = "as", value_name = "USER")]
    user: Option<String>,

    /// Bound on every store interaction, in milliseconds
    #[arg(global = true, long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post and browse gigs
    #[command(subcommand)]
    Gig(commands::gig::GigCommand),

    /// Submit and review bids
    #[command(subcommand)]
    Bid(commands::bid::BidCommand),

    /// Hire a bid (gig owner only)
    Hire {
        /// ID of the bid to hire
        bid: String,
    },

    /// Check the marketplace invariants
    Verify,

    /// Count gigs and bids by status
    Stats,

    /// Dump write-ahead log records for debugging
    DumpLog {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip records before this offset
        #[arg(short, long, default_value = "0")]
        offset: u64,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Version => {
            println!("gigmarket CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("gigmarket core v{}", gigmarket_core::VERSION);
        }
        Commands::DumpLog { limit, offset } => {
            let path = cli.path.ok_or(CliError::PathRequired("dump-log"))?;
            commands::dump_log::run(&path, limit, offset, cli.format)?;
        }
        command => {
            let path = cli.path.ok_or(CliError::PathRequired("this command"))?;
            let session = Session::open(&path, cli.user, cli.timeout_ms, cli.format)?;
            match command {
                Commands::Gig(cmd) => commands::gig::run(&session, cmd)?,
                Commands::Bid(cmd) => commands::bid::run(&session, cmd)?,
                Commands::Hire { bid } => commands::hire::run(&session, &bid)?,
                Commands::Verify => commands::verify::run(&session)?,
                Commands::Stats => commands::stats::run(&session)?,
                Commands::Version | Commands::DumpLog { .. } => {}
            }
            session.close()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gigmarket", "hire", "abc", "--path", "/tmp/m", "--as", "client", "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.user.as_deref(), Some("client"));
        assert_eq!(cli.format, Format::Json);
        assert!(matches!(cli.command, Commands::Hire { .. }));
    }

    #[test]
    fn gig_list_mine_flag() {
        let cli = Cli::try_parse_from(["gigmarket", "gig", "list", "--mine", "--as", "client"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Gig(commands::gig::GigCommand::List { mine: true, .. })
        ));
    }
}
