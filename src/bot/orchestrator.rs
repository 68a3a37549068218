use anyhow::{anyhow, Result};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::Notify,
    time::{interval, sleep},
};
use tracing::{debug, error, info, warn};

use crate::{
    arbitrage::{OpportunityAnalyzer, OpportunityFilter, ProfitCalculator, SalesRankModel},
    bot::ScanMetrics,
    config::Config,
    database::{DatabaseConnection, OpportunityRepository},
    sources::{build_catalog_map, create_scanners, CatalogLookup, JsonCatalog, ScannerManager},
    types::{FulfillmentMethod, Opportunity},
};

const MAINTENANCE_EVERY_CYCLES: u64 = 24;

/// Stops a running `run_loop` after its current cycle. A stop requested
/// before the loop starts makes the next `run_loop` return at once.
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl StopHandle {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn stop(&self) {
        info!("Stopping scan pipeline");
        self.stop_requested.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn should_stop(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn finish(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

/// What one scan cycle looks for.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub store: Option<String>,
    pub category: Option<String>,
    pub min_discount: f64,
    pub limit: usize,
    pub method: FulfillmentMethod,
}

pub struct ScanPipeline {
    config: Config,
    scanners: ScannerManager,
    catalog: Box<dyn CatalogLookup>,
    profit_calculator: ProfitCalculator,
    opportunity_filter: OpportunityFilter,
    sales_rank_model: SalesRankModel,
    opportunity_analyzer: OpportunityAnalyzer,
    repository: Option<OpportunityRepository>,
    metrics: ScanMetrics,
    stop_handle: StopHandle,
}

impl ScanPipeline {
    pub fn new(
        config: Config,
        scanners: ScannerManager,
        catalog: Box<dyn CatalogLookup>,
        repository: Option<OpportunityRepository>,
    ) -> Self {
        let profit_calculator = ProfitCalculator::from_config(&config.calculator);
        let opportunity_filter = OpportunityFilter::from_config(&config.filter);
        let sales_rank_model = SalesRankModel::from_config(&config.sales_rank);

        Self {
            config,
            scanners,
            catalog,
            profit_calculator,
            opportunity_filter,
            sales_rank_model,
            opportunity_analyzer: OpportunityAnalyzer::new(),
            repository,
            metrics: ScanMetrics::new(),
            stop_handle: StopHandle::new(),
        }
    }

    /// Builds scanners, the catalog and (when configured) the database from
    /// `config`.
    pub async fn from_config(config: Config) -> Result<Self> {
        info!("Initializing scan pipeline");

        let scanners = create_scanners(&config.sources.feeds);
        info!("Retail scanners initialized: {} stores", scanners.scanner_count());

        let catalog_path = config
            .sources
            .catalog_path
            .clone()
            .ok_or_else(|| anyhow!("No catalog configured (sources.catalog_path)"))?;
        let catalog = JsonCatalog::load(&catalog_path).await?;

        let repository = match &config.database {
            Some(database_config) => {
                let database = DatabaseConnection::new(database_config).await?;
                database.run_migrations().await?;
                Some(OpportunityRepository::new(database.pool().clone()))
            }
            None => {
                info!("No database configured, opportunities will not be persisted");
                None
            }
        };

        Ok(Self::new(config, scanners, Box::new(catalog), repository))
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    pub fn analyzer(&self) -> &OpportunityAnalyzer {
        &self.opportunity_analyzer
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    pub fn stop(&self) {
        self.stop_handle.stop();
    }

    /// Scans, matches, prices and filters once. Kept opportunities are
    /// persisted when a repository is attached.
    pub async fn run_once(&mut self, request: &ScanRequest) -> Result<Vec<Opportunity>> {
        info!(
            "Step 1/4: Retrieving listings (store: {:?}, category: {:?}, min discount: {}%)",
            request.store, request.category, request.min_discount
        );
        let listings = self
            .scanners
            .scan_all(
                request.store.as_deref(),
                request.category.as_deref(),
                request.min_discount,
                request.limit,
            )
            .await?;

        if listings.is_empty() {
            info!("No listings found for the selected criteria");
            self.metrics.update_cycle_metrics(0, 0, &[]);
            return Ok(Vec::new());
        }

        info!("Step 2/4: Matching {} listings against the catalog", listings.len());
        let matches = build_catalog_map(self.catalog.as_ref(), &listings).await;
        info!("Found {} catalog matches", matches.len());

        info!("Step 3/4: Calculating profit and ROI");
        let opportunities = self
            .profit_calculator
            .calculate_bulk(&listings, &matches, request.method);
        let matched = opportunities.len();

        info!("Step 4/4: Filtering {} opportunities", matched);
        let kept = self
            .opportunity_filter
            .apply(opportunities, Some(&self.sales_rank_model));

        for opportunity in &kept {
            info!(
                "Opportunity: buy '{}' at {} for ${:.2}, sell {} for ${:.2}, profit ${:.2} ({:.1}% ROI)",
                opportunity.retail.title,
                opportunity.retail.store,
                opportunity.retail.price,
                opportunity.catalog.asin,
                opportunity.catalog.price,
                opportunity.profit(),
                opportunity.roi()
            );
        }

        if let Some(repository) = &self.repository {
            repository.save_opportunities(&kept).await?;
        }

        self.metrics.update_cycle_metrics(listings.len(), matched, &kept);
        self.opportunity_analyzer.add_opportunities(kept.iter().cloned());

        Ok(kept)
    }

    /// Repeats `run_once` every `scan.check_interval_seconds` until stopped.
    /// A failed cycle is logged and followed by a back-off pause.
    pub async fn run_loop(&mut self, request: &ScanRequest) -> Result<()> {
        if self.scanners.scanner_count() == 0 {
            return Err(anyhow!("No retail scanners configured"));
        }

        let handle = self.stop_handle.clone();
        if handle.running.swap(true, Ordering::SeqCst) {
            return Err(anyhow!("Scan pipeline is already running"));
        }

        let check_interval = Duration::from_secs(self.config.scan.check_interval_seconds.max(1));
        let backoff = Duration::from_secs(self.config.scan.error_backoff_seconds);
        let mut ticker = interval(check_interval);
        let mut cycle_count = 0u64;

        info!(
            "Starting scan loop with {} second intervals",
            check_interval.as_secs()
        );

        loop {
            // Created before the check so a stop in between still wakes it.
            let woken = handle.wake.notified();
            if handle.should_stop() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = woken => {}
            }
            if handle.should_stop() {
                break;
            }
            cycle_count += 1;

            debug!("Starting scan cycle #{}", cycle_count);

            match self.run_once(request).await {
                Ok(kept) => {
                    debug!(
                        "Scan cycle #{} completed, kept {} opportunities",
                        cycle_count,
                        kept.len()
                    );
                }
                Err(e) => {
                    error!("Error in scan cycle #{}: {}", cycle_count, e);
                    self.metrics.record_error(&e.to_string());

                    warn!("Backing off for {:?} due to error", backoff);
                    sleep(backoff).await;
                }
            }

            if cycle_count % MAINTENANCE_EVERY_CYCLES == 0 {
                self.perform_maintenance();
            }
        }

        handle.finish();
        info!("Scan loop stopped");
        Ok(())
    }

    fn perform_maintenance(&mut self) {
        info!("Performing periodic maintenance");

        let summary = self.opportunity_analyzer.generate_summary();
        info!(
            "Summary: {} opportunities, avg profit ${:.2}, avg ROI {:.1}%, best store {:?}",
            summary.total_opportunities,
            summary.average_profit,
            summary.average_roi,
            summary.best_store
        );

        debug!("{}", self.metrics.generate_report());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sources::RetailScanner,
        types::{
            fixtures::{catalog, retail},
            CatalogListing, RetailListing,
        },
    };
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticScanner(Vec<RetailListing>);

    #[async_trait]
    impl RetailScanner for StaticScanner {
        fn name(&self) -> &str {
            "walmart"
        }

        async fn search_clearance(&self, _category: Option<&str>, limit: usize) -> Result<Vec<RetailListing>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }

        async fn search_discounted(
            &self,
            _min_discount: f64,
            category: Option<&str>,
            limit: usize,
        ) -> Result<Vec<RetailListing>> {
            self.search_clearance(category, limit).await
        }
    }

    struct MapCatalog(HashMap<String, CatalogListing>);

    #[async_trait]
    impl CatalogLookup for MapCatalog {
        async fn lookup(&self, listing: &RetailListing) -> Result<Option<CatalogListing>> {
            Ok(self.0.get(listing.match_key()).cloned())
        }
    }

    fn pipeline() -> ScanPipeline {
        let mut scanners = ScannerManager::new();
        scanners.add_scanner(Box::new(StaticScanner(vec![
            retail("good", 10.0),
            retail("thin", 25.0),
            retail("orphan", 5.0),
        ])));

        let ranked = |asin: &str| {
            let mut listing = catalog(asin, 30.0);
            listing.sales_rank = Some(1_000);
            listing.category = Some("Books".to_string());
            listing
        };

        let mut matches = HashMap::new();
        matches.insert("good".to_string(), ranked("B-good"));
        matches.insert("thin".to_string(), ranked("B-thin"));

        ScanPipeline::new(Config::default(), scanners, Box::new(MapCatalog(matches)), None)
    }

    #[tokio::test]
    async fn test_run_once_keeps_profitable_matches() {
        let mut pipeline = pipeline();
        let request = ScanRequest {
            limit: 10,
            ..ScanRequest::default()
        };

        let kept = pipeline.run_once(&request).await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].catalog.asin, "B-good");

        let metrics = pipeline.metrics();
        assert_eq!(metrics.listings_scanned, 3);
        assert_eq!(metrics.listings_matched, 2);
        assert_eq!(metrics.opportunities_kept, 1);
        assert_eq!(pipeline.analyzer().get_opportunity_count(), 1);
    }

    #[tokio::test]
    async fn test_run_loop_refuses_without_scanners() {
        let mut pipeline = ScanPipeline::new(
            Config::default(),
            ScannerManager::new(),
            Box::new(MapCatalog(HashMap::new())),
            None,
        );
        assert!(pipeline.run_loop(&ScanRequest::default()).await.is_err());
        assert!(!pipeline.stop_handle().is_running());
    }

    #[tokio::test]
    async fn test_stop_ends_loop() {
        let mut pipeline = pipeline();
        let handle = pipeline.stop_handle();
        let request = ScanRequest {
            limit: 10,
            ..ScanRequest::default()
        };

        let stopper = async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.stop();
        };

        let (result, _) = tokio::join!(pipeline.run_loop(&request), stopper);
        assert!(result.is_ok());
        assert_eq!(pipeline.metrics().total_cycles_completed, 1);
    }

    #[tokio::test]
    async fn test_stop_before_run_loop_returns_immediately() {
        let mut pipeline = pipeline();
        pipeline.stop();

        let request = ScanRequest {
            limit: 10,
            ..ScanRequest::default()
        };
        let result = tokio::time::timeout(Duration::from_millis(300), pipeline.run_loop(&request)).await;

        assert!(matches!(result, Ok(Ok(()))));
        assert_eq!(pipeline.metrics().total_cycles_completed, 0);
        assert!(!pipeline.stop_handle().is_running());
    }

    #[tokio::test]
    async fn test_loop_restarts_after_stop() {
        let mut pipeline = pipeline();
        let request = ScanRequest {
            limit: 10,
            ..ScanRequest::default()
        };

        pipeline.stop();
        pipeline.run_loop(&request).await.unwrap();

        let handle = pipeline.stop_handle();
        let stopper = async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.stop();
        };
        let (result, _) = tokio::join!(pipeline.run_loop(&request), stopper);
        assert!(result.is_ok());
        assert_eq!(pipeline.metrics().total_cycles_completed, 1);
    }
}
