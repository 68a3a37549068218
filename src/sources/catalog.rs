use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::{
    sources::CatalogLookup,
    types::{CatalogListing, RetailListing},
};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    listings: Vec<CatalogListing>,
    /// UPC / SKU / store product id -> ASIN
    #[serde(default)]
    index: HashMap<String, String>,
}

/// Catalog snapshot loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    by_asin: HashMap<String, CatalogListing>,
    index: HashMap<String, String>,
}

impl JsonCatalog {
    pub fn new(listings: Vec<CatalogListing>, index: HashMap<String, String>) -> Self {
        let mut by_asin = HashMap::with_capacity(listings.len());
        for listing in listings {
            if !listing.is_valid() {
                warn!("Skipping invalid catalog listing '{}'", listing.asin);
                continue;
            }
            by_asin.insert(listing.asin.clone(), listing);
        }
        Self { by_asin, index }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;

        let catalog = Self::new(file.listings, file.index);
        info!("Loaded {} catalog listings from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.by_asin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_asin.is_empty()
    }

    fn find(&self, key: &str) -> Option<&CatalogListing> {
        self.index
            .get(key)
            .and_then(|asin| self.by_asin.get(asin))
            .or_else(|| self.by_asin.get(key))
    }
}

#[async_trait]
impl CatalogLookup for JsonCatalog {
    async fn lookup(&self, listing: &RetailListing) -> Result<Option<CatalogListing>> {
        let found = [listing.upc.as_deref(), listing.sku.as_deref(), Some(listing.product_id.as_str())]
            .into_iter()
            .flatten()
            .filter(|key| !key.is_empty())
            .find_map(|key| self.find(key))
            .cloned();
        Ok(found)
    }
}
