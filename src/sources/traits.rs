use anyhow::Result;
use async_trait::async_trait;

use crate::types::{CatalogListing, RetailListing};

/// A store that can be searched for clearance and discounted listings.
#[async_trait]
pub trait RetailScanner: Send + Sync {
    fn name(&self) -> &str;

    async fn search_clearance(&self, category: Option<&str>, limit: usize) -> Result<Vec<RetailListing>>;

    async fn search_discounted(
        &self,
        min_discount: f64,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RetailListing>>;
}

/// Finds the marketplace listing for a retail listing, if there is one.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn lookup(&self, listing: &RetailListing) -> Result<Option<CatalogListing>>;
}
