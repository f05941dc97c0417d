//! Sick Fits CLI - Operator tools for the shop database.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! sf-cli migrate
//!
//! # Grant permissions to a user
//! sf-cli permissions grant -e wes@example.com -p ADMIN,PERMISSIONUPDATE
//!
//! # Seed the catalog from a YAML file
//! sf-cli seed items crates/cli/seed/items.yaml --owner wes@example.com
//!
//! # Inspect and resolve checkouts that charged a card but did not finish
//! sf-cli reconcile list
//! sf-cli reconcile run --id 42
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use sick_fits_shop::config::TelemetryConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Sick Fits operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user permissions
    Permissions {
        #[command(subcommand)]
        action: PermissionsAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Work the checkout reconciliation queue
    Reconcile {
        #[command(subcommand)]
        action: ReconcileAction,
    },
}

#[derive(Subcommand)]
enum PermissionsAction {
    /// Replace a user's permissions
    Grant {
        /// User email address
        #[arg(short, long)]
        email: String,

        /// Comma-separated permissions (e.g. `ADMIN,PERMISSIONUPDATE`)
        #[arg(short, long, value_delimiter = ',', required = true)]
        permissions: Vec<String>,
    },
    /// Show a user's permissions
    Show {
        /// User email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Create catalog items from a YAML list
    Items {
        /// Path to the YAML file
        file: PathBuf,

        /// Email of the user who will own the items
        #[arg(short, long)]
        owner: String,
    },
}

#[derive(Subcommand)]
enum ReconcileAction {
    /// List unresolved entries
    List,
    /// Resolve one entry, or every pending entry without `--id`
    Run {
        /// Reconciliation entry ID
        #[arg(long)]
        id: Option<i32>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &TelemetryConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let telemetry = TelemetryConfig::from_env();
    let _sentry_guard = init_sentry(&telemetry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sick_fits_shop=info,sf_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Permissions { action } => match action {
            PermissionsAction::Grant { email, permissions } => {
                commands::permissions::grant(&email, &permissions).await?;
            }
            PermissionsAction::Show { email } => commands::permissions::show(&email).await?,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Items { file, owner } => commands::seed::items(&file, &owner).await?,
        },
        Commands::Reconcile { action } => match action {
            ReconcileAction::List => commands::reconcile::list().await?,
            ReconcileAction::Run { id: Some(id) } => commands::reconcile::run_one(id).await?,
            ReconcileAction::Run { id: None } => commands::reconcile::run_all().await?,
        },
    }
    Ok(())
}
