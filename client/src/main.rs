//! Rulesync - sync proxy rule sets from the remote service into a local store.
//!
//! # Commands
//!
//! - `list` - Fetch one page of rule sets and sync it
//! - `detail` - Fetch and sync a single rule set
//! - `refresh` - Re-fetch every subscribed rule set in one request
//! - `show` - Print the live rule sets in the local store
//! - `unsubscribe` - Tombstone a rule set locally

use clap::{Parser, Subcommand};
use rulesync_client::{db, Config, RemoteClient, RequestContext, SyncService, DEFAULT_PAGE};
use rulesync_engine::{DateTransform, ReconcileResult};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sync proxy rule sets into a local SQLite mirror.
#[derive(Debug, Parser)]
#[command(name = "rulesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Abort a request that has not completed after this many seconds
    #[arg(global = true, long)]
    deadline: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch one page of rule sets and sync it
    List {
        /// Page number, starting at 1
        #[arg(long, default_value_t = DEFAULT_PAGE)]
        page: u32,

        /// Rule sets per page (defaults to PAGE_SIZE)
        #[arg(long)]
        count: Option<u32>,
    },

    /// Fetch and sync a single rule set
    Detail {
        /// Rule set uuid
        uuid: String,
    },

    /// Re-fetch every subscribed rule set
    Refresh,

    /// Print the live rule sets in the local store
    Show {
        /// Print each rule as well
        #[arg(short, long)]
        rules: bool,
    },

    /// Tombstone a rule set locally
    Unsubscribe {
        /// Rule set uuid
        uuid: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rulesync_client=info,rulesync_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let client = RemoteClient::new(&config)?;
    let service = SyncService::new(client, pool);

    let mut ctx = RequestContext::new();
    if let Some(secs) = cli.deadline {
        ctx = ctx.with_deadline(Duration::from_secs(secs));
    }

    // Ctrl-C cancels whatever request is in flight
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling request");
            cancel.cancel();
        }
    });

    match cli.command {
        Commands::List { page, count } => {
            let count = count.unwrap_or(config.page_size);
            let result = service.sync_page(page, count, &ctx).await?;
            print_result(&result);
        }
        Commands::Detail { uuid } => {
            let action = service.sync_detail(&uuid, &ctx).await?;
            println!("{}: {:?}", uuid, action);
        }
        Commands::Refresh => {
            let result = service.refresh_subscribed(&ctx).await?;
            print_result(&result);
        }
        Commands::Show { rules } => {
            for rule_set in service.local_rule_sets().await? {
                let updated = DateTransform::encode(rule_set.remote_updated_at)
                    .unwrap_or_else(|| rule_set.remote_updated_at.to_string());
                println!(
                    "{}  {}  ({} rules, updated {}){}",
                    rule_set.uuid,
                    rule_set.name,
                    rule_set.rules.len(),
                    updated,
                    if rule_set.is_official { "  [official]" } else { "" }
                );
                if rules {
                    for rule in &rule_set.rules {
                        println!("    {}", rule);
                    }
                }
            }
        }
        Commands::Unsubscribe { uuid } => {
            if service.unsubscribe(&uuid).await? {
                println!("{}: unsubscribed", uuid);
            } else {
                println!("{}: not in local store", uuid);
            }
        }
    }

    Ok(())
}

fn print_result(result: &ReconcileResult) {
    println!(
        "{} inserted, {} replaced, {} unchanged",
        result.inserted.len(),
        result.replaced.len(),
        result.skipped.len()
    );
}
