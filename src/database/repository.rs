use anyhow::{anyhow, Result};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    database::models::*,
    types::{CatalogListing, Opportunity, RetailListing},
};

const SELECT_OPPORTUNITY_RECORDS: &str = r#"
    SELECT
        o.id, o.buy_price, o.referral_fee, o.fulfillment_cost, o.shipping_to_amazon,
        o.other_costs, o.fulfillment_method, o.created_at,
        r.store AS r_store, r.product_id AS r_product_id, r.title AS r_title,
        r.price AS r_price, r.original_price AS r_original_price, r.url AS r_url,
        r.image_url AS r_image_url, r.brand AS r_brand, r.category AS r_category,
        r.upc AS r_upc, r.sku AS r_sku, r.description AS r_description,
        c.asin AS c_asin, c.title AS c_title, c.price AS c_price,
        c.sales_rank AS c_sales_rank, c.category AS c_category,
        c.review_count AS c_review_count, c.rating AS c_rating,
        c.description AS c_description, c.url AS c_url
    FROM opportunities o
    JOIN retail_listings r ON r.id = o.retail_listing_id
    JOIN catalog_listings c ON c.id = o.catalog_listing_id
"#;

pub struct OpportunityRepository {
    pool: PgPool,
}

impl OpportunityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts both listings and then the opportunity linking them. Saving the
    /// same pair again refreshes prices and costs in place.
    pub async fn save_opportunity(&self, opportunity: &Opportunity) -> Result<Uuid> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| anyhow!("Failed to start transaction: {}", e))?;

        let retail_id = upsert_retail_listing(&mut tx, &opportunity.retail).await?;
        let catalog_id = upsert_catalog_listing(&mut tx, &opportunity.catalog).await?;
        let row = OpportunityRow::new(opportunity, retail_id, catalog_id);

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO opportunities (
                id, retail_listing_id, catalog_listing_id, buy_price, referral_fee,
                fulfillment_cost, shipping_to_amazon, other_costs, total_cost,
                profit, roi, fulfillment_method
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (retail_listing_id, catalog_listing_id) DO UPDATE SET
                buy_price = EXCLUDED.buy_price,
                referral_fee = EXCLUDED.referral_fee,
                fulfillment_cost = EXCLUDED.fulfillment_cost,
                shipping_to_amazon = EXCLUDED.shipping_to_amazon,
                other_costs = EXCLUDED.other_costs,
                total_cost = EXCLUDED.total_cost,
                profit = EXCLUDED.profit,
                roi = EXCLUDED.roi,
                fulfillment_method = EXCLUDED.fulfillment_method,
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(&row.id)
        .bind(&row.retail_listing_id)
        .bind(&row.catalog_listing_id)
        .bind(&row.buy_price)
        .bind(&row.referral_fee)
        .bind(&row.fulfillment_cost)
        .bind(&row.shipping_to_amazon)
        .bind(&row.other_costs)
        .bind(&row.total_cost)
        .bind(&row.profit)
        .bind(&row.roi)
        .bind(&row.fulfillment_method)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| anyhow!("Failed to save opportunity: {}", e))?;

        tx.commit()
            .await
            .map_err(|e| anyhow!("Failed to commit opportunity: {}", e))?;

        debug!("Saved opportunity {} ({})", id, opportunity.catalog.asin);
        Ok(id)
    }

    /// Saves each opportunity, skipping the ones that fail. Returns how many
    /// were stored.
    pub async fn save_opportunities(&self, opportunities: &[Opportunity]) -> Result<usize> {
        let mut saved = 0;

        for opportunity in opportunities {
            match self.save_opportunity(opportunity).await {
                Ok(_) => saved += 1,
                Err(e) => warn!(
                    "Skipping opportunity {} / {}: {}",
                    opportunity.retail.product_id, opportunity.catalog.asin, e
                ),
            }
        }

        info!("Saved {} of {} opportunities", saved, opportunities.len());
        Ok(saved)
    }

    pub async fn get_opportunities(
        &self,
        min_roi: f64,
        min_profit: f64,
        limit: i64,
    ) -> Result<Vec<StoredOpportunity>> {
        let sql = format!(
            "{} WHERE o.roi >= $1 AND o.profit >= $2 ORDER BY o.roi DESC LIMIT $3",
            SELECT_OPPORTUNITY_RECORDS
        );

        let rows = sqlx::query_as::<_, OpportunityRecordRow>(&sql)
            .bind(to_decimal(min_roi))
            .bind(to_decimal(min_profit))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to fetch opportunities: {}", e))?;

        Ok(rows.into_iter().map(StoredOpportunity::from).collect())
    }

    pub async fn get_opportunity(&self, id: Uuid) -> Result<Option<StoredOpportunity>> {
        let sql = format!("{} WHERE o.id = $1", SELECT_OPPORTUNITY_RECORDS);

        let row = sqlx::query_as::<_, OpportunityRecordRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to fetch opportunity {}: {}", id, e))?;

        Ok(row.map(StoredOpportunity::from))
    }

    pub async fn get_opportunities_by_store(
        &self,
        store: &str,
        limit: i64,
    ) -> Result<Vec<StoredOpportunity>> {
        let sql = format!(
            "{} WHERE LOWER(r.store) = LOWER($1) ORDER BY o.roi DESC LIMIT $2",
            SELECT_OPPORTUNITY_RECORDS
        );

        let rows = sqlx::query_as::<_, OpportunityRecordRow>(&sql)
            .bind(store)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to fetch opportunities for {}: {}", store, e))?;

        Ok(rows.into_iter().map(StoredOpportunity::from).collect())
    }

    pub async fn get_today_opportunities(&self, limit: i64) -> Result<Vec<StoredOpportunity>> {
        let sql = format!(
            "{} WHERE o.created_at >= CURRENT_DATE ORDER BY o.roi DESC LIMIT $1",
            SELECT_OPPORTUNITY_RECORDS
        );

        let rows = sqlx::query_as::<_, OpportunityRecordRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to fetch today's opportunities: {}", e))?;

        Ok(rows.into_iter().map(StoredOpportunity::from).collect())
    }

    pub async fn delete_opportunity(&self, id: Uuid) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM opportunities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to delete opportunity {}: {}", id, e))?
            .rows_affected();

        Ok(deleted > 0)
    }
}

async fn upsert_retail_listing(
    tx: &mut Transaction<'_, Postgres>,
    listing: &RetailListing,
) -> Result<Uuid> {
    let row = RetailListingRow::from(listing);

    sqlx::query_scalar(
        r#"
        INSERT INTO retail_listings (
            id, store, product_id, title, price, original_price, url,
            image_url, brand, category, upc, sku, description
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (store, product_id) DO UPDATE SET
            title = EXCLUDED.title,
            price = EXCLUDED.price,
            original_price = EXCLUDED.original_price,
            url = EXCLUDED.url,
            image_url = EXCLUDED.image_url,
            brand = EXCLUDED.brand,
            category = EXCLUDED.category,
            upc = EXCLUDED.upc,
            sku = EXCLUDED.sku,
            description = EXCLUDED.description,
            updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(&row.id)
    .bind(&row.store)
    .bind(&row.product_id)
    .bind(&row.title)
    .bind(&row.price)
    .bind(&row.original_price)
    .bind(&row.url)
    .bind(&row.image_url)
    .bind(&row.brand)
    .bind(&row.category)
    .bind(&row.upc)
    .bind(&row.sku)
    .bind(&row.description)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| anyhow!("Failed to save retail listing {}: {}", listing.product_id, e))
}

async fn upsert_catalog_listing(
    tx: &mut Transaction<'_, Postgres>,
    listing: &CatalogListing,
) -> Result<Uuid> {
    let row = CatalogListingRow::from(listing);

    sqlx::query_scalar(
        r#"
        INSERT INTO catalog_listings (
            id, asin, title, price, sales_rank, category, review_count,
            rating, description, url
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (asin) DO UPDATE SET
            title = EXCLUDED.title,
            price = EXCLUDED.price,
            sales_rank = EXCLUDED.sales_rank,
            category = EXCLUDED.category,
            review_count = EXCLUDED.review_count,
            rating = EXCLUDED.rating,
            description = EXCLUDED.description,
            url = EXCLUDED.url,
            updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(&row.id)
    .bind(&row.asin)
    .bind(&row.title)
    .bind(&row.price)
    .bind(&row.sales_rank)
    .bind(&row.category)
    .bind(&row.review_count)
    .bind(&row.rating)
    .bind(&row.description)
    .bind(&row.url)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| anyhow!("Failed to save catalog listing {}: {}", listing.asin, e))
}
