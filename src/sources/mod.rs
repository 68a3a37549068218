pub mod catalog;
pub mod json_feed;
pub mod traits;

pub use catalog::JsonCatalog;
pub use json_feed::JsonFeedScanner;
pub use traits::*;

use anyhow::Result;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::{
    config::FeedConfig,
    types::{CatalogListing, RetailListing},
};

pub struct ScannerManager {
    scanners: Vec<Box<dyn RetailScanner>>,
}

impl ScannerManager {
    pub fn new() -> Self {
        Self {
            scanners: Vec::new(),
        }
    }

    pub fn add_scanner(&mut self, scanner: Box<dyn RetailScanner>) {
        self.scanners.push(scanner);
    }

    /// Scans every store (or only `store` when given), splitting the limit
    /// evenly with integer division, so the total never exceeds `limit`.
    /// A store that fails is logged and skipped.
    pub async fn scan_all(
        &self,
        store: Option<&str>,
        category: Option<&str>,
        min_discount: f64,
        limit: usize,
    ) -> Result<Vec<RetailListing>> {
        let selected: Vec<&Box<dyn RetailScanner>> = self
            .scanners
            .iter()
            .filter(|scanner| store.map_or(true, |wanted| scanner.name().eq_ignore_ascii_case(wanted)))
            .collect();

        if selected.is_empty() {
            warn!("No scanners configured for store {:?}", store);
            return Ok(Vec::new());
        }

        let per_store_limit = limit / selected.len();
        if per_store_limit == 0 {
            debug!("Limit {} is too small to split across {} stores", limit, selected.len());
            return Ok(Vec::new());
        }
        let mut all_listings = Vec::new();

        for scanner in selected {
            let result = if min_discount > 0.0 {
                scanner.search_discounted(min_discount, category, per_store_limit).await
            } else {
                scanner.search_clearance(category, per_store_limit).await
            };

            match result {
                Ok(listings) => {
                    info!("Found {} listings from {}", listings.len(), scanner.name());
                    all_listings.extend(listings);
                }
                Err(e) => {
                    warn!("Failed to scan {}: {}", scanner.name(), e);
                }
            }
        }

        Ok(all_listings)
    }

    pub fn scanner_count(&self) -> usize {
        self.scanners.len()
    }
}

impl Default for ScannerManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn create_scanners(feeds: &[FeedConfig]) -> ScannerManager {
    let mut manager = ScannerManager::new();

    for feed in feeds {
        manager.add_scanner(Box::new(JsonFeedScanner::new(&feed.store, &feed.location)));
    }

    manager
}

/// Looks up every listing and keys each match by the listing's match key
/// (UPC, else SKU, else product id). Misses and lookup errors are skipped.
pub async fn build_catalog_map(
    lookup: &dyn CatalogLookup,
    listings: &[RetailListing],
) -> HashMap<String, CatalogListing> {
    let mut matches = HashMap::new();

    for listing in listings {
        match lookup.lookup(listing).await {
            Ok(Some(catalog_listing)) => {
                matches.insert(listing.match_key().to_string(), catalog_listing);
            }
            Ok(None) => debug!("No catalog listing found for {}", listing.title),
            Err(e) => warn!("Catalog lookup failed for {}: {}", listing.title, e),
        }
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{catalog, retail};
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct FixedScanner {
        name: String,
        listings: Vec<RetailListing>,
        fail: bool,
    }

    #[async_trait]
    impl RetailScanner for FixedScanner {
        fn name(&self) -> &str {
            &self.name
        }

        async fn search_clearance(&self, _category: Option<&str>, limit: usize) -> Result<Vec<RetailListing>> {
            if self.fail {
                return Err(anyhow!("store offline"));
            }
            Ok(self.listings.iter().take(limit).cloned().collect())
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

    struct FlakyCatalog;

    #[async_trait]
    impl CatalogLookup for FlakyCatalog {
        async fn lookup(&self, listing: &RetailListing) -> Result<Option<CatalogListing>> {
            match listing.product_id.as_str() {
                "boom" => Err(anyhow!("throttled")),
                "miss" => Ok(None),
                id => Ok(Some(catalog(&format!("B-{}", id), 20.0))),
            }
        }
    }

    fn scanner(name: &str, count: usize, fail: bool) -> Box<dyn RetailScanner> {
        Box::new(FixedScanner {
            name: name.to_string(),
            listings: (0..count).map(|i| retail(&format!("{}-{}", name, i), 5.0)).collect(),
            fail,
        })
    }

    #[tokio::test]
    async fn test_scan_splits_limit_and_skips_failures() {
        let mut manager = ScannerManager::new();
        manager.add_scanner(scanner("walmart", 10, false));
        manager.add_scanner(scanner("target", 10, true));

        let listings = manager.scan_all(None, None, 0.0, 8).await.unwrap();
        assert_eq!(listings.len(), 4);
        assert!(listings.iter().all(|l| l.product_id.starts_with("walmart")));
    }

    #[tokio::test]
    async fn test_scan_never_exceeds_limit() {
        let mut manager = ScannerManager::new();
        manager.add_scanner(scanner("walmart", 10, false));
        manager.add_scanner(scanner("target", 10, false));

        assert!(manager.scan_all(None, None, 0.0, 1).await.unwrap().is_empty());
        assert!(manager.scan_all(None, None, 0.0, 0).await.unwrap().is_empty());
        assert_eq!(manager.scan_all(None, None, 0.0, 5).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_scan_single_store() {
        let mut manager = ScannerManager::new();
        manager.add_scanner(scanner("walmart", 10, false));
        manager.add_scanner(scanner("target", 10, false));

        let listings = manager.scan_all(Some("Target"), None, 30.0, 3).await.unwrap();
        assert_eq!(listings.len(), 3);
        assert!(manager.scan_all(Some("ebay"), None, 0.0, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_map_keys_by_match_key() {
        let mut with_upc = retail("a", 5.0);
        with_upc.upc = Some("111".to_string());
        let listings = vec![with_upc, retail("miss", 5.0), retail("boom", 5.0), retail("c", 5.0)];

        let matches = build_catalog_map(&FlakyCatalog, &listings).await;
        assert_eq!(matches.len(), 2);
        assert_eq!(matches["111"].asin, "B-a");
        assert_eq!(matches["c"].asin, "B-c");
    }
}
