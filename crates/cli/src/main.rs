//! Zeaver CLI - Session migration, backend diagnostics and order updates.
//!
//! # Usage
//!
//! ```bash
//! # Create the session table
//! zv-cli migrate sessions
//!
//! # Check the backend schema and policies
//! zv-cli check products
//! zv-cli check schema
//! zv-cli check orders
//!
//! # Update an order (requires BACKEND_SERVICE_ROLE_KEY)
//! zv-cli orders status ZV-20260301-4821 shipped
//! zv-cli orders payment ZV-20260301-4821 paid --intent pi_3N...
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use zeaver_core::{OrderStatus, PaymentStatus};

mod commands;

#[derive(Parser)]
#[command(name = "zv-cli")]
#[command(author, version, about = "Zeaver CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Diagnose the backend schema and access policies
    Check {
        #[command(subcommand)]
        target: CheckTarget,
    },
    /// Update orders with the service key
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Create the tower-sessions table in the storefront database
    Sessions,
}

#[derive(Subcommand)]
enum CheckTarget {
    /// List a few products and run the detail query on the first
    Products,
    /// Print sample rows from reviews and user profiles
    Schema,
    /// Check whether guests may insert orders
    Orders,
}

#[derive(Subcommand)]
enum OrderAction {
    /// Set the fulfillment status
    Status {
        /// Public order number, e.g. `ZV-20260301-4821`
        order_number: String,
        /// `pending`, `processing`, `shipped`, `delivered` or `cancelled`
        status: OrderStatus,
    },
    /// Set the payment status
    Payment {
        /// Public order number
        order_number: String,
        /// `pending`, `paid`, `failed` or `refunded`
        status: PaymentStatus,
        /// Payment processor reference
        #[arg(long)]
        intent: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Before the subscriber, so RUST_LOG in .env applies
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zv_cli=info,zeaver_storefront=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate { target } => match target {
            MigrateTarget::Sessions => commands::migrate::sessions().await?,
        },
        Commands::Check { target } => match target {
            CheckTarget::Products => commands::check::products().await?,
            CheckTarget::Schema => commands::check::schema().await?,
            CheckTarget::Orders => commands::check::orders().await?,
        },
        Commands::Orders { action } => match action {
            OrderAction::Status {
                order_number,
                status,
            } => commands::orders::set_status(&order_number, status).await?,
            OrderAction::Payment {
                order_number,
                status,
                intent,
            } => commands::orders::set_payment(&order_number, status, intent.as_deref()).await?,
        },
    }
    Ok(())
}
