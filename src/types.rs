use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A discounted product found at a retail store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetailListing {
    pub product_id: String,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub original_price: Option<f64>,
    pub url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub upc: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub store: String,
}

impl RetailListing {
    /// Discount off the original price, rounded to two decimals.
    pub fn discount_percentage(&self) -> Option<f64> {
        match self.original_price {
            Some(original) if original > 0.0 => {
                let pct = (original - self.price) / original * 100.0;
                Some((pct * 100.0).round() / 100.0)
            }
            _ => None,
        }
    }

    /// Key used to find this listing in a catalog map: UPC, then SKU, then the
    /// store's own product id.
    pub fn match_key(&self) -> &str {
        self.upc
            .as_deref()
            .filter(|upc| !upc.is_empty())
            .or_else(|| self.sku.as_deref().filter(|sku| !sku.is_empty()))
            .unwrap_or(&self.product_id)
    }
}

/// The marketplace side of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogListing {
    pub asin: String,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub sales_rank: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub review_count: Option<i64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl CatalogListing {
    pub fn is_valid(&self) -> bool {
        !self.asin.is_empty() && !self.title.is_empty() && self.price > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FulfillmentMethod {
    #[serde(rename = "FBA")]
    Fba,
    #[serde(rename = "FBM")]
    Fbm,
}

impl FulfillmentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentMethod::Fba => "FBA",
            FulfillmentMethod::Fbm => "FBM",
        }
    }
}

impl Default for FulfillmentMethod {
    fn default() -> Self {
        FulfillmentMethod::Fba
    }
}

impl fmt::Display for FulfillmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FulfillmentMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FBA" => Ok(FulfillmentMethod::Fba),
            "FBM" => Ok(FulfillmentMethod::Fbm),
            other => Err(anyhow!("Unknown fulfillment method: {}", other)),
        }
    }
}

/// Package dimensions in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(length: f64, width: f64, height: f64) -> Self {
        Self { length, width, height }
    }

    pub fn max(&self) -> f64 {
        self.length.max(self.width).max(self.height)
    }

    pub fn min(&self) -> f64 {
        self.length.min(self.width).min(self.height)
    }

    pub fn median(&self) -> f64 {
        let sum = self.length + self.width + self.height;
        sum - self.max() - self.min()
    }

    /// Longest side plus twice the sum of the other two.
    pub fn length_plus_girth(&self) -> f64 {
        self.max() + 2.0 * (self.median() + self.min())
    }

    pub fn cubic_feet(&self) -> f64 {
        (self.length * self.width * self.height) / 1728.0
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(8.0, 6.0, 2.0)
    }
}

/// Per-unit fees charged for fulfilling one order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentCost {
    pub weight_handling: f64,
    pub order_handling: f64,
    pub pick_pack: f64,
    pub thirty_day_storage: f64,
}

impl FulfillmentCost {
    /// Fees charged per unit shipped from the warehouse. Storage is billed
    /// monthly and is not part of this figure.
    pub fn fba_total(&self) -> f64 {
        self.weight_handling + self.order_handling + self.pick_pack
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Costs {
    pub buy_price: f64,
    pub referral_fee: f64,
    pub fulfillment_cost: f64,
    pub shipping_to_amazon: f64,
    pub other_costs: f64,
}

impl Costs {
    pub fn total(&self) -> f64 {
        self.buy_price
            + self.referral_fee
            + self.fulfillment_cost
            + self.shipping_to_amazon
            + self.other_costs
    }
}

/// One retail listing paired with its catalog match and the cost of
/// reselling it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub retail: RetailListing,
    pub catalog: CatalogListing,
    pub costs: Costs,
    pub fulfillment_method: FulfillmentMethod,
}

impl Opportunity {
    pub fn new(
        retail: RetailListing,
        catalog: CatalogListing,
        costs: Costs,
        fulfillment_method: FulfillmentMethod,
    ) -> Self {
        Self {
            retail,
            catalog,
            costs,
            fulfillment_method,
        }
    }

    pub fn profit(&self) -> f64 {
        self.catalog.price - self.costs.total()
    }

    /// Return on investment in percent; zero when nothing was spent.
    pub fn roi(&self) -> f64 {
        let total = self.costs.total();
        if total == 0.0 {
            return 0.0;
        }
        self.profit() / total * 100.0
    }

    pub fn is_profitable(&self) -> bool {
        self.profit() > 0.0
    }

    pub fn meets_roi_threshold(&self, threshold: f64) -> bool {
        self.roi() >= threshold
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_discount_percentage() {
        let mut listing = retail("1", 6.0);
        assert_eq!(listing.discount_percentage(), None);

        listing.original_price = Some(0.0);
        assert_eq!(listing.discount_percentage(), None);

        listing.original_price = Some(9.0);
        assert_eq!(listing.discount_percentage(), Some(33.33));
    }

    #[test]
    fn test_match_key_prefers_upc_then_sku() {
        let mut listing = retail("store-42", 5.0);
        assert_eq!(listing.match_key(), "store-42");

        listing.sku = Some("SKU-1".to_string());
        assert_eq!(listing.match_key(), "SKU-1");

        listing.upc = Some("012345678905".to_string());
        assert_eq!(listing.match_key(), "012345678905");
    }

    #[test]
    fn test_catalog_validity() {
        assert!(catalog("B000123", 12.0).is_valid());
        assert!(!catalog("", 12.0).is_valid());
        assert!(!catalog("B000123", 0.0).is_valid());
    }

    #[test]
    fn test_roi_is_zero_when_total_cost_is_zero() {
        let opportunity = Opportunity::new(
            retail("1", 0.0),
            catalog("B1", 25.0),
            costs(0.0),
            FulfillmentMethod::Fbm,
        );
        assert_eq!(opportunity.profit(), 25.0);
        assert_eq!(opportunity.roi(), 0.0);
        assert!(opportunity.is_profitable());
    }

    #[test]
    fn test_fulfillment_method_parsing() {
        assert_eq!("fba".parse::<FulfillmentMethod>().unwrap(), FulfillmentMethod::Fba);
        assert_eq!(" FBM ".parse::<FulfillmentMethod>().unwrap(), FulfillmentMethod::Fbm);
        assert!("drop-ship".parse::<FulfillmentMethod>().is_err());
        assert_eq!(
            serde_json::to_string(&FulfillmentMethod::Fbm).unwrap(),
            "\"FBM\""
        );
    }

    #[test]
    fn test_dimensions_geometry() {
        let dims = Dimensions::new(2.0, 8.0, 6.0);
        assert_eq!(dims.max(), 8.0);
        assert_eq!(dims.min(), 2.0);
        assert_eq!(dims.median(), 6.0);
        assert_eq!(dims.length_plus_girth(), 24.0);
        assert!((dims.cubic_feet() - 96.0 / 1728.0).abs() < 1e-12);
    }
}
