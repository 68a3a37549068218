use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::{sources::RetailScanner, types::RetailListing};

/// Reads a JSON array of retail listings from a file or an http(s) URL.
pub struct JsonFeedScanner {
    store: String,
    location: String,
    client: reqwest::Client,
}

impl JsonFeedScanner {
    pub fn new(store: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            location: location.into(),
            client: reqwest::Client::new(),
        }
    }

    fn is_remote(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }

    async fn load(&self) -> Result<Vec<RetailListing>> {
        let mut listings: Vec<RetailListing> = if self.is_remote() {
            self.client
                .get(&self.location)
                .send()
                .await
                .map_err(|e| anyhow!("Failed to fetch feed {}: {}", self.location, e))?
                .error_for_status()
                .map_err(|e| anyhow!("Feed {} returned an error: {}", self.location, e))?
                .json()
                .await
                .map_err(|e| anyhow!("Failed to decode feed {}: {}", self.location, e))?
        } else {
            let raw = tokio::fs::read_to_string(&self.location)
                .await
                .with_context(|| format!("Failed to read feed {}", self.location))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse feed {}", self.location))?
        };

        for listing in &mut listings {
            if listing.store.is_empty() {
                listing.store = self.store.clone();
            }
        }

        debug!("Loaded {} listings from {}", listings.len(), self.location);
        Ok(listings)
    }
}

fn in_category(listing: &RetailListing, category: Option<&str>) -> bool {
    match category {
        None => true,
        Some(wanted) => listing
            .category
            .as_deref()
            .map_or(false, |actual| actual.to_lowercase().contains(&wanted.to_lowercase())),
    }
}

#[async_trait]
impl RetailScanner for JsonFeedScanner {
    fn name(&self) -> &str {
        &self.store
    }

    async fn search_clearance(&self, category: Option<&str>, limit: usize) -> Result<Vec<RetailListing>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|listing| in_category(listing, category))
            .take(limit)
            .collect())
    }

    async fn search_discounted(
        &self,
        min_discount: f64,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RetailListing>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|listing| in_category(listing, category))
            .filter(|listing| {
                listing
                    .discount_percentage()
                    .map_or(false, |discount| discount >= min_discount)
            })
            .take(limit)
            .collect())
    }
}
