use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use retail_arbitrage_scanner::{
    arbitrage::{ProfitCalculator, SizeTier},
    bot::{ScanPipeline, ScanRequest},
    config::Config,
    database::{DatabaseConnection, OpportunityRepository, StoredOpportunity},
    report::{self, OutputFormat},
    types::{Dimensions, FulfillmentCost, FulfillmentMethod, Opportunity},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "arbitrage-scanner", version, about = "Find retail clearance items that resell on Amazon at a profit")]
struct Cli {
    /// Configuration file, without extension
    #[arg(long, global = true, default_value = "config/default")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one scan and print the opportunities that pass the filters
    Scan(ScanArgs),
    /// Scan repeatedly until interrupted
    Watch(ScanArgs),
    /// List stored opportunities
    List(ListArgs),
    /// Show one stored opportunity in detail
    Show { id: Uuid },
    /// Delete a stored opportunity
    Delete { id: Uuid },
    /// Print the size tier and fulfillment fees for a package
    Tiers(TierArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Only scan this store
    #[arg(long)]
    store: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Minimum discount off the original price, in percent
    #[arg(long, default_value_t = 0.0)]
    min_discount: f64,
    #[arg(long)]
    limit: Option<usize>,
    /// FBA or FBM
    #[arg(long)]
    method: Option<FulfillmentMethod>,
    /// Catalog JSON file, overriding sources.catalog_path
    #[arg(long)]
    catalog: Option<String>,
    /// Minimum ROI in percent, overriding filter.min_roi
    #[arg(long)]
    min_roi: Option<f64>,
    /// Maximum Amazon review count, overriding filter.max_reviews
    #[arg(long)]
    max_reviews: Option<i64>,
    /// Minimum profit in dollars, overriding filter.min_profit
    #[arg(long)]
    min_profit: Option<f64>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, default_value_t = 30.0)]
    min_roi: f64,
    #[arg(long, default_value_t = 0.0)]
    min_profit: f64,
    #[arg(long, default_value_t = 20)]
    limit: i64,
    #[arg(long)]
    store: Option<String>,
    /// Only opportunities found today
    #[arg(long)]
    today: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Args)]
struct TierArgs {
    /// Weight in pounds
    #[arg(long, default_value_t = 1.0)]
    weight: f64,
    #[arg(long, default_value_t = 8.0)]
    length: f64,
    #[arg(long, default_value_t = 6.0)]
    width: f64,
    #[arg(long, default_value_t = 2.0)]
    height: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();

    let config = Config::load_from(&cli.config).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Configuration loaded successfully");

    match cli.command {
        Command::Scan(args) => scan(config, args).await,
        Command::Watch(args) => watch(config, args).await,
        Command::List(args) => list(&config, args).await,
        Command::Show { id } => show(&config, id).await,
        Command::Delete { id } => delete(&config, id).await,
        Command::Tiers(args) => {
            tiers(args);
            Ok(())
        }
    }
}

fn scan_request(config: &Config, args: &ScanArgs) -> ScanRequest {
    ScanRequest {
        store: args.store.clone(),
        category: args.category.clone(),
        min_discount: args.min_discount,
        limit: args.limit.unwrap_or(config.scan.limit),
        method: args.method.unwrap_or(config.calculator.fulfillment_method),
    }
}

async fn build_pipeline(mut config: Config, args: &ScanArgs) -> Result<ScanPipeline> {
    if let Some(catalog) = &args.catalog {
        config.sources.catalog_path = Some(catalog.clone());
    }
    config.filter = config
        .filter
        .with_overrides(args.min_roi, args.max_reviews, args.min_profit);

    ScanPipeline::from_config(config).await.map_err(|e| {
        error!("Failed to initialize scan pipeline: {}", e);
        e
    })
}

async fn scan(config: Config, args: ScanArgs) -> Result<()> {
    let request = scan_request(&config, &args);
    let mut pipeline = build_pipeline(config, &args).await?;

    let opportunities = pipeline.run_once(&request).await?;
    println!("{}", report::render(&opportunities, args.format)?);
    Ok(())
}

async fn watch(config: Config, args: ScanArgs) -> Result<()> {
    let request = scan_request(&config, &args);
    let mut pipeline = build_pipeline(config, &args).await?;
    let stop_handle = pipeline.stop_handle();

    info!("Starting retail arbitrage scanner");

    tokio::select! {
        result = pipeline.run_loop(&request) => {
            match result {
                Ok(_) => info!("Scanner completed successfully"),
                Err(e) => error!("Scanner error: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            stop_handle.stop();
        }
    }

    println!("{}", pipeline.metrics().generate_report());
    info!("Retail arbitrage scanner shutdown complete");
    Ok(())
}

async fn connect(config: &Config) -> Result<(DatabaseConnection, OpportunityRepository)> {
    let database_config = config
        .database
        .as_ref()
        .ok_or_else(|| anyhow!("No database configured (set DATABASE_URL)"))?;

    let database = DatabaseConnection::new(database_config).await?;
    database.run_migrations().await?;
    let repository = OpportunityRepository::new(database.pool().clone());
    Ok((database, repository))
}

async fn list(config: &Config, args: ListArgs) -> Result<()> {
    let (database, repository) = connect(config).await?;

    let stored = if args.today {
        repository.get_today_opportunities(args.limit).await?
    } else if let Some(store) = &args.store {
        repository.get_opportunities_by_store(store, args.limit).await?
    } else {
        repository
            .get_opportunities(args.min_roi, args.min_profit, args.limit)
            .await?
    };
    database.close().await;

    let opportunities: Vec<Opportunity> = stored.into_iter().map(|s| s.opportunity).collect();
    println!("{}", report::render(&opportunities, args.format)?);
    Ok(())
}

async fn show(config: &Config, id: Uuid) -> Result<()> {
    let (database, repository) = connect(config).await?;
    let stored = repository.get_opportunity(id).await?;
    database.close().await;

    match stored {
        Some(StoredOpportunity { id, created_at, opportunity }) => {
            let break_even = ProfitCalculator::from_config(&config.calculator).break_even_price(&opportunity);
            println!("{}", report::render_detail(&id.to_string(), &opportunity, break_even));
            println!("Found: {}", created_at);
        }
        None => println!("Opportunity {} not found", id),
    }
    Ok(())
}

async fn delete(config: &Config, id: Uuid) -> Result<()> {
    let (database, repository) = connect(config).await?;
    let deleted = repository.delete_opportunity(id).await?;
    database.close().await;

    if deleted {
        println!("Deleted opportunity {}", id);
    } else {
        println!("Opportunity {} not found", id);
    }
    Ok(())
}

fn tiers(args: TierArgs) {
    let dims = Dimensions::new(args.length, args.width, args.height);
    let tier = SizeTier::classify(args.weight, &dims);
    let fba = FulfillmentCost::for_method(FulfillmentMethod::Fba, args.weight, &dims);
    let fbm = FulfillmentCost::for_method(FulfillmentMethod::Fbm, args.weight, &dims);

    println!("Size tier: {}", tier);
    println!("Weight handling: ${:.2}", fba.weight_handling);
    println!("Order handling: ${:.2}", fba.order_handling);
    println!("Pick & pack: ${:.2}", fba.pick_pack);
    println!("30-day storage: ${:.2}", fba.thirty_day_storage);
    println!("FBA per unit: ${:.2}", fba.fba_total());
    println!("FBM shipping: ${:.2}", fbm.weight_handling);
}
