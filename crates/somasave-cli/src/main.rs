//! SomaSave terminal client.
//!
//! Member login, dashboard figures (served from the offline cache when the
//! network is down), mobile-money deposits and cache maintenance.

mod commands;
mod terminal;

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "somasave", version, about = "SomaSave member client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with your email address or student ID
    Login {
        /// Email or student ID (defaults to SOMASAVE_USERNAME or the last one used)
        #[arg(short, long)]
        username: Option<String>,
        /// One-time code, when the backend asks for one
        #[arg(long)]
        otp: Option<String>,
    },
    /// Log out and forget the saved session
    Logout,
    /// Show the logged-in member
    Whoami,
    /// Show savings, loans and recent transactions
    Stats,
    /// Deposit via mobile money and wait for confirmation
    Deposit {
        /// Amount in UGX
        amount: String,
        /// Phone number to charge (defaults to the one on your profile)
        #[arg(short, long)]
        phone: Option<String>,
    },
    /// Inspect or maintain the offline cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List stores and how many entries each holds
    List,
    /// Precache the app shell and switch to the current cache version
    Install,
    /// Delete stores left over from older cache versions
    Activate,
    /// Delete every store
    Clear,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g. RUST_LOG=somasave_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();
    info!("SomaSave client starting");

    let mut ctx = commands::Context::load()?;
    match cli.command {
        Command::Login { username, otp } => commands::login(&mut ctx, username, otp).await,
        Command::Logout => commands::logout(&mut ctx).await,
        Command::Whoami => commands::whoami(&ctx).await,
        Command::Stats => commands::stats(&ctx).await,
        Command::Deposit { amount, phone } => commands::deposit(&ctx, &amount, phone).await,
        Command::Cache { action } => match action {
            CacheAction::List => commands::cache_list(&ctx).await,
            CacheAction::Install => commands::cache_install(&ctx).await,
            CacheAction::Activate => commands::cache_activate(&ctx).await,
            CacheAction::Clear => commands::cache_clear(&ctx).await,
        },
    }
}
