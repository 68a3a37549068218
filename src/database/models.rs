use bigdecimal::{BigDecimal, FromPrimitive};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{CatalogListing, Costs, FulfillmentMethod, Opportunity, RetailListing};

#[derive(Debug, Clone)]
pub struct RetailListingRow {
    pub id: Uuid,
    pub store: String,
    pub product_id: String,
    pub title: String,
    pub price: BigDecimal,
    pub original_price: Option<BigDecimal>,
    pub url: String,
    pub image_url: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub upc: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CatalogListingRow {
    pub id: Uuid,
    pub asin: String,
    pub title: String,
    pub price: BigDecimal,
    pub sales_rank: Option<i64>,
    pub category: Option<String>,
    pub review_count: Option<i64>,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpportunityRow {
    pub id: Uuid,
    pub retail_listing_id: Uuid,
    pub catalog_listing_id: Uuid,
    pub buy_price: BigDecimal,
    pub referral_fee: BigDecimal,
    pub fulfillment_cost: BigDecimal,
    pub shipping_to_amazon: BigDecimal,
    pub other_costs: BigDecimal,
    pub total_cost: BigDecimal,
    pub profit: BigDecimal,
    pub roi: BigDecimal,
    pub fulfillment_method: String,
}

/// One stored opportunity joined with both of its listings. Listing columns
/// are prefixed `r_` and `c_` in the query.
#[derive(Debug, Clone, FromRow)]
pub struct OpportunityRecordRow {
    pub id: Uuid,
    pub buy_price: BigDecimal,
    pub referral_fee: BigDecimal,
    pub fulfillment_cost: BigDecimal,
    pub shipping_to_amazon: BigDecimal,
    pub other_costs: BigDecimal,
    pub fulfillment_method: String,
    pub created_at: DateTime<Utc>,

    pub r_store: String,
    pub r_product_id: String,
    pub r_title: String,
    pub r_price: BigDecimal,
    pub r_original_price: Option<BigDecimal>,
    pub r_url: String,
    pub r_image_url: Option<String>,
    pub r_brand: Option<String>,
    pub r_category: Option<String>,
    pub r_upc: Option<String>,
    pub r_sku: Option<String>,
    pub r_description: Option<String>,

    pub c_asin: String,
    pub c_title: String,
    pub c_price: BigDecimal,
    pub c_sales_rank: Option<i64>,
    pub c_category: Option<String>,
    pub c_review_count: Option<i64>,
    pub c_rating: Option<f64>,
    pub c_description: Option<String>,
    pub c_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredOpportunity {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub opportunity: Opportunity,
}

pub fn to_decimal(value: f64) -> BigDecimal {
    BigDecimal::from_f64(value)
        .map(|d| d.round(4))
        .unwrap_or_else(|| BigDecimal::from(0))
}

/// Goes through the decimal text so stored cents read back exactly.
pub fn from_decimal(value: &BigDecimal) -> f64 {
    value.to_string().parse::<f64>().unwrap_or(0.0)
}

impl From<&RetailListing> for RetailListingRow {
    fn from(listing: &RetailListing) -> Self {
        Self {
            id: Uuid::new_v4(),
            store: listing.store.clone(),
            product_id: listing.product_id.clone(),
            title: listing.title.clone(),
            price: to_decimal(listing.price),
            original_price: listing.original_price.map(to_decimal),
            url: listing.url.clone(),
            image_url: listing.image_url.clone(),
            brand: listing.brand.clone(),
            category: listing.category.clone(),
            upc: listing.upc.clone(),
            sku: listing.sku.clone(),
            description: listing.description.clone(),
        }
    }
}

impl From<&CatalogListing> for CatalogListingRow {
    fn from(listing: &CatalogListing) -> Self {
        Self {
            id: Uuid::new_v4(),
            asin: listing.asin.clone(),
            title: listing.title.clone(),
            price: to_decimal(listing.price),
            sales_rank: listing.sales_rank,
            category: listing.category.clone(),
            review_count: listing.review_count,
            rating: listing.rating,
            description: listing.description.clone(),
            url: listing.url.clone(),
        }
    }
}

impl OpportunityRow {
    pub fn new(opportunity: &Opportunity, retail_listing_id: Uuid, catalog_listing_id: Uuid) -> Self {
        let costs = &opportunity.costs;
        Self {
            id: Uuid::new_v4(),
            retail_listing_id,
            catalog_listing_id,
            buy_price: to_decimal(costs.buy_price),
            referral_fee: to_decimal(costs.referral_fee),
            fulfillment_cost: to_decimal(costs.fulfillment_cost),
            shipping_to_amazon: to_decimal(costs.shipping_to_amazon),
            other_costs: to_decimal(costs.other_costs),
            total_cost: to_decimal(costs.total()),
            profit: to_decimal(opportunity.profit()),
            roi: to_decimal(opportunity.roi()),
            fulfillment_method: opportunity.fulfillment_method.as_str().to_string(),
        }
    }
}

impl From<OpportunityRecordRow> for StoredOpportunity {
    fn from(row: OpportunityRecordRow) -> Self {
        let retail = RetailListing {
            product_id: row.r_product_id,
            title: row.r_title,
            price: from_decimal(&row.r_price),
            original_price: row.r_original_price.as_ref().map(from_decimal),
            url: row.r_url,
            image_url: row.r_image_url,
            brand: row.r_brand,
            category: row.r_category,
            upc: row.r_upc,
            sku: row.r_sku,
            description: row.r_description,
            store: row.r_store,
        };

        let catalog = CatalogListing {
            asin: row.c_asin,
            title: row.c_title,
            price: from_decimal(&row.c_price),
            sales_rank: row.c_sales_rank,
            category: row.c_category,
            review_count: row.c_review_count,
            rating: row.c_rating,
            description: row.c_description,
            url: row.c_url,
        };

        let costs = Costs {
            buy_price: from_decimal(&row.buy_price),
            referral_fee: from_decimal(&row.referral_fee),
            fulfillment_cost: from_decimal(&row.fulfillment_cost),
            shipping_to_amazon: from_decimal(&row.shipping_to_amazon),
            other_costs: from_decimal(&row.other_costs),
        };

        let fulfillment_method = row
            .fulfillment_method
            .parse::<FulfillmentMethod>()
            .unwrap_or_default();

        Self {
            id: row.id,
            created_at: row.created_at,
            opportunity: Opportunity::new(retail, catalog, costs, fulfillment_method),
        }
    }
}
