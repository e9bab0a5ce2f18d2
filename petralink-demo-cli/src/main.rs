//! Petra deep-link demo CLI
//!
//! Drives a wallet session from the terminal: deep links are printed as
//! QR codes and the URLs the wallet redirects to are pasted back in.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use petralink_payments::PaymentRequest;
use rust_decimal::Decimal;

mod commands;
mod navigator;
mod ui;

use commands::Context;

#[derive(Parser)]
#[command(name = "petralink")]
#[command(about = "Petra wallet deep-link session and payments from the terminal", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom storage directory
    #[arg(long, global = true, env = "PETRALINK_DEMO_DIR")]
    storage_dir: Option<PathBuf>,

    /// Behave like a desktop browser (deep links are refused)
    #[arg(long, global = true)]
    desktop: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session
    Status,

    /// Connect to the Petra wallet
    Connect,

    /// Disconnect and clear the session
    Disconnect,

    /// Route a wallet response URL
    Open {
        /// URL Petra redirected to
        url: String,
    },

    /// Ask the wallet to sign a message
    SignMessage {
        /// Message text
        text: String,

        /// Optional nonce to include
        #[arg(long)]
        nonce: Option<String>,
    },

    /// Convert a fiat amount to the on-chain transfer
    Quote {
        /// Fiat amount
        amount: Decimal,
    },

    /// Show the APT balance of an account
    Balance {
        /// Account address (defaults to the connected wallet)
        address: Option<String>,
    },

    /// Pay a bill with APT
    Pay {
        #[command(subcommand)]
        target: PayTarget,

        /// Treasury address (overrides PETRALINK_TREASURY_ADDRESS)
        #[arg(long, global = true)]
        treasury: Option<String>,
    },
}

#[derive(Subcommand)]
enum PayTarget {
    /// Buy airtime
    Airtime {
        /// Fiat amount
        amount: Decimal,

        /// Phone number to top up
        #[arg(long)]
        phone: String,

        /// Mobile network (e.g. MTN)
        #[arg(long)]
        network: String,
    },

    /// Bank transfer
    Bank {
        /// Fiat amount
        amount: Decimal,

        #[arg(long)]
        bank: String,

        #[arg(long)]
        account_number: String,

        #[arg(long)]
        account_name: String,
    },
}

impl PayTarget {
    fn into_request(self) -> PaymentRequest {
        match self {
            PayTarget::Airtime {
                amount,
                phone,
                network,
            } => PaymentRequest::airtime(amount, phone, network),
            PayTarget::Bank {
                amount,
                bank,
                account_number,
                account_name,
            } => PaymentRequest::bank(amount, bank, account_number, account_name),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("petralink=debug,petralink_lib=debug,petralink_payments=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("petralink=info,petralink_lib=warn,petralink_payments=warn")
            .init();
    }

    let storage_dir = cli.storage_dir.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("petralink")
    });
    let ctx = Context {
        storage_dir,
        verbose: cli.verbose,
        desktop: cli.desktop,
    };

    let result = match cli.command {
        Commands::Status => commands::status::run(&ctx).await,
        Commands::Connect => commands::connect::run(&ctx).await,
        Commands::Disconnect => commands::disconnect::run(&ctx).await,
        Commands::Open { url } => commands::open::run(&ctx, &url).await,
        Commands::SignMessage { text, nonce } => {
            commands::sign_message::run(&ctx, &text, nonce).await
        }
        Commands::Quote { amount } => commands::quote::run(amount).await,
        Commands::Balance { address } => commands::balance::run(&ctx, address).await,
        Commands::Pay { target, treasury } => {
            commands::pay::run(&ctx, target.into_request(), treasury).await
        }
    };

    if let Err(e) = result {
        ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
