use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, FulfillmentMethod};

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    pub calculator: CalculatorConfig,
    pub filter: FilterConfig,
    pub sales_rank: SalesRankConfig,
    pub sources: SourcesConfig,
    pub scan: ScanConfig,
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CalculatorConfig {
    pub referral_fee_percent: f64,
    pub default_weight_lb: f64,
    pub default_dimensions: Dimensions,
    pub shipping_to_amazon_per_lb: f64,
    pub other_costs_percent: f64,
    pub fulfillment_method: FulfillmentMethod,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            referral_fee_percent: 15.0,
            default_weight_lb: 1.0,
            default_dimensions: Dimensions::default(),
            shipping_to_amazon_per_lb: 0.50,
            other_costs_percent: 2.0,
            fulfillment_method: FulfillmentMethod::Fba,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FilterConfig {
    pub min_roi: f64,
    pub max_reviews: i64,
    pub min_profit: f64,
    pub max_bsr_percentile: f64,
}

impl FilterConfig {
    /// Replaces the thresholds that were given on the command line.
    pub fn with_overrides(mut self, min_roi: Option<f64>, max_reviews: Option<i64>, min_profit: Option<f64>) -> Self {
        if let Some(min_roi) = min_roi {
            self.min_roi = min_roi;
        }
        if let Some(max_reviews) = max_reviews {
            self.max_reviews = max_reviews;
        }
        if let Some(min_profit) = min_profit {
            self.min_profit = min_profit;
        }
        self
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_roi: 40.0,
            max_reviews: 20,
            min_profit: 5.0,
            max_bsr_percentile: 5.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SalesRankConfig {
    /// Ship the built-in Books/Electronics/Toys/Home curves.
    pub use_default_curves: bool,
    /// Extra curves; a category listed here replaces a built-in curve.
    pub curves: Vec<CurveConfig>,
    pub default_threshold: f64,
}

impl Default for SalesRankConfig {
    fn default() -> Self {
        Self {
            use_default_curves: true,
            curves: Vec::new(),
            default_threshold: crate::arbitrage::percentile::DEFAULT_RANK_THRESHOLD,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CurveConfig {
    pub category: String,
    pub points: Vec<CurvePoint>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CurvePoint {
    pub rank: u64,
    pub percentile: f64,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SourcesConfig {
    pub feeds: Vec<FeedConfig>,
    pub catalog_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedConfig {
    pub store: String,
    /// Local path or http(s) URL of a JSON array of listings.
    pub location: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ScanConfig {
    pub limit: usize,
    pub check_interval_seconds: u64,
    pub error_backoff_seconds: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            check_interval_seconds: 3600,
            error_backoff_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from("config/default")
    }

    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let mut settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ARBITRAGE").separator("__"));

        // Override database URL from environment if present
        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            settings = settings
                .set_override("database.url", db_url)?
                .set_default("database.max_connections", 5)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }
}
