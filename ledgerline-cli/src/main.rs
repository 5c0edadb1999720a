//! Ledgerline CLI - bank sync and a categorized ledger in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{accounts, categories, connections, recategorize, rules, sync, transactions};

/// Ledgerline - bank sync and a categorized ledger in your terminal
#[derive(Parser)]
#[command(name = "ll", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link a new provider connection
    Link {
        /// Provider name (plaid, teller)
        provider: String,
        /// Institution display name
        institution: String,
        /// Provider access token
        #[arg(long, env = "LEDGERLINE_ACCESS_TOKEN")]
        token: String,
    },

    /// List provider connections
    Connections {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync one connection (or all) from its provider
    Sync {
        /// Connection id (optional, syncs all if not specified)
        connection: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage accounts
    Accounts {
        #[command(subcommand)]
        command: Option<accounts::AccountCommands>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage transactions
    Transactions {
        #[command(subcommand)]
        command: Option<transactions::TransactionCommands>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage categorization rules
    Rules {
        #[command(subcommand)]
        command: Option<rules::RuleCommands>,
    },

    /// Manage categories
    Categories {
        #[command(subcommand)]
        command: Option<categories::CategoryCommands>,
    },

    /// Re-run categorization over existing synced transactions
    Recategorize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Link {
            provider,
            institution,
            token,
        } => connections::link(&provider, &institution, &token),
        Commands::Connections { json } => connections::list(json),
        Commands::Sync { connection, json } => sync::run(connection.as_deref(), json),
        Commands::Accounts { command, json } => accounts::run(command, json),
        Commands::Transactions { command, json } => transactions::run(command, json),
        Commands::Rules { command } => rules::run(command),
        Commands::Categories { command } => categories::run(command),
        Commands::Recategorize => recategorize::run(),
    }
}
