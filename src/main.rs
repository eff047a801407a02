use anyhow::Context;
use clap::{Parser, Subcommand};
use foodgram::api::AppState;
use foodgram::config::Config;
use foodgram::images::MediaStore;
use foodgram::domain::SubscriptionFilter;
use foodgram::reports::{self, Bucket, CookingTimeBuckets};
use foodgram::storage::{SqliteStorage, Storage};
use foodgram::{loaders, logging, metrics, server};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "foodgram")]
#[command(about = "Recipe sharing service: API server and admin commands")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (defaults to ./foodgram.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve,
    /// Load ingredients from a JSON file of {name, measurement_unit} records
    LoadIngredients {
        /// Path to the .json file
        file: PathBuf,
    },
    /// Load tags from a JSON file of {name, color, slug} records
    LoadTags {
        /// Path to the .json file
        file: PathBuf,
    },
    /// Admin reports
    Report {
        #[command(subcommand)]
        report: Reports,
    },
}

#[derive(Subcommand)]
enum Reports {
    /// Recipe counts by cooking time, or the recipes in one bucket
    CookingTime {
        /// fast, medium or long
        #[arg(long)]
        bucket: Option<Bucket>,
    },
    /// Users that follow someone, or authors that have followers
    Subscriptions {
        /// has-subscriptions or has-subscribers
        #[arg(long)]
        filter: SubscriptionFilter,
    },
    /// Recipes with the number of users who favorited them
    Favorites,
}

async fn cooking_time_report(storage: &dyn Storage, bucket: Option<Bucket>) -> anyhow::Result<()> {
    let recipes = storage.cooking_times().await?;
    let times: Vec<i64> = recipes.iter().map(|(_, _, minutes)| *minutes).collect();
    let Some(buckets) = CookingTimeBuckets::from_times(&times) else {
        warn!("Not enough recipes for a cooking time report");
        println!("Not enough recipes to split by cooking time ({} found, 3 needed).", times.len());
        return Ok(());
    };

    match bucket {
        None => {
            for (bucket, count) in buckets.counts(&times) {
                println!("{:<6} {:<24} {}", bucket, buckets.label(bucket), count);
            }
        }
        Some(bucket) => {
            println!("{} ({}):", bucket, buckets.label(bucket));
            for (id, name, minutes) in &recipes {
                if buckets.bucket_of(*minutes) == bucket {
                    println!("  #{id} {name} ({minutes} min)");
                }
            }
        }
    }
    Ok(())
}

async fn subscriptions_report(storage: &dyn Storage, filter: SubscriptionFilter) -> anyhow::Result<()> {
    let users = storage.users_by_subscriptions(filter).await?;
    info!("Subscription report ({}): {} users", filter, users.len());
    println!("{} ({} users):", filter, users.len());
    for line in reports::user_lines(&users) {
        println!("  {line}");
    }
    Ok(())
}

async fn favorites_report(storage: &dyn Storage) -> anyhow::Result<()> {
    let counts = storage.favorite_counts().await?;
    if counts.is_empty() {
        println!("No recipes yet.");
        return Ok(());
    }
    for line in reports::favorite_lines(&counts) {
        println!("{line}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = logging::init_logging(&config.logging.dir);
    config.log_summary();

    let storage = SqliteStorage::open(&config.database.path).with_context(|| {
        format!("Failed to open database {}", config.database.path.display())
    })?;
    let storage: Arc<dyn Storage> = Arc::new(storage);

    match cli.command {
        Commands::Serve => {
            let media = MediaStore::new(config.media.root.clone(), config.media.url.clone());
            let state = AppState::new(storage, media, config.api.page_size)
                .with_metrics(metrics::install_recorder());
            info!("Starting Foodgram API");
            if let Err(e) = server::start_server(state, &config.bind_addr()).await {
                error!("Server failed: {}", e);
                return Err(e);
            }
        }
        Commands::LoadIngredients { file } => {
            let loaded = loaders::load_ingredients(storage.as_ref(), &file).await?;
            println!("Loaded {loaded} ingredients.");
        }
        Commands::LoadTags { file } => {
            let loaded = loaders::load_tags(storage.as_ref(), &file).await?;
            println!("Loaded {loaded} tags.");
        }
        Commands::Report { report } => match report {
            Reports::CookingTime { bucket } => cooking_time_report(storage.as_ref(), bucket).await?,
            Reports::Subscriptions { filter } => subscriptions_report(storage.as_ref(), filter).await?,
            Reports::Favorites => favorites_report(storage.as_ref()).await?,
        },
    }
    Ok(())
}
