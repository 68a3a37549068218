use std::collections::HashMap;
use tracing::debug;

use crate::{
    config::CalculatorConfig,
    types::{
        CatalogListing, Costs, Dimensions, FulfillmentCost, FulfillmentMethod, Opportunity,
        RetailListing,
    },
};

/// Turns a retail/catalog pair into an [`Opportunity`] with every resale cost
/// filled in. Stateless apart from the rates it is built with.
#[derive(Debug, Clone)]
pub struct ProfitCalculator {
    referral_fee_percent: f64,
    default_weight_lb: f64,
    default_dimensions: Dimensions,
    shipping_to_amazon_per_lb: f64,
    other_costs_percent: f64,
}

impl ProfitCalculator {
    pub fn new(
        referral_fee_percent: f64,
        default_weight_lb: f64,
        default_dimensions: Dimensions,
        shipping_to_amazon_per_lb: f64,
        other_costs_percent: f64,
    ) -> Self {
        Self {
            referral_fee_percent,
            default_weight_lb,
            default_dimensions,
            shipping_to_amazon_per_lb,
            other_costs_percent,
        }
    }

    pub fn from_config(config: &CalculatorConfig) -> Self {
        Self::new(
            config.referral_fee_percent,
            config.default_weight_lb,
            config.default_dimensions,
            config.shipping_to_amazon_per_lb,
            config.other_costs_percent,
        )
    }

    /// Callers are expected to pass validated listings; nothing is checked
    /// here.
    pub fn calculate(
        &self,
        retail: &RetailListing,
        catalog: &CatalogListing,
        weight_lb: Option<f64>,
        dimensions: Option<Dimensions>,
        method: FulfillmentMethod,
    ) -> Opportunity {
        let weight = weight_lb.unwrap_or(self.default_weight_lb);
        let dims = dimensions.unwrap_or(self.default_dimensions);

        let referral_fee = catalog.price * self.referral_fee_percent / 100.0;

        let fulfillment = FulfillmentCost::for_method(method, weight, &dims);
        let (fulfillment_cost, shipping_to_amazon) = match method {
            FulfillmentMethod::Fba => (fulfillment.fba_total(), weight * self.shipping_to_amazon_per_lb),
            FulfillmentMethod::Fbm => (fulfillment.weight_handling, 0.0),
        };

        let other_costs = retail.price * self.other_costs_percent / 100.0;

        let costs = Costs {
            buy_price: retail.price,
            referral_fee,
            fulfillment_cost,
            shipping_to_amazon,
            other_costs,
        };

        debug!(
            "Costs for {} -> {}: buy={:.2}, referral={:.2}, fulfillment={:.2}, inbound={:.2}, other={:.2}, total={:.2}",
            retail.product_id,
            catalog.asin,
            costs.buy_price,
            costs.referral_fee,
            costs.fulfillment_cost,
            costs.shipping_to_amazon,
            costs.other_costs,
            costs.total()
        );

        Opportunity::new(retail.clone(), catalog.clone(), costs, method)
    }

    /// One opportunity per retail listing with a catalog match, looked up by
    /// UPC, then SKU, then the store's product id. Unmatched listings are
    /// skipped.
    pub fn calculate_bulk(
        &self,
        retail_listings: &[RetailListing],
        catalog: &HashMap<String, CatalogListing>,
        method: FulfillmentMethod,
    ) -> Vec<Opportunity> {
        let mut opportunities = Vec::with_capacity(retail_listings.len());

        for retail in retail_listings {
            match find_match(retail, catalog) {
                Some(catalog_listing) => {
                    opportunities.push(self.calculate(retail, catalog_listing, None, None, method));
                }
                None => debug!("No catalog match for {} ({})", retail.product_id, retail.title),
            }
        }

        opportunities
    }

    /// Catalog price at which the opportunity makes zero profit, with the
    /// referral fee scaling along with the price.
    pub fn break_even_price(&self, opportunity: &Opportunity) -> f64 {
        let fixed_costs = opportunity.costs.total() - opportunity.costs.referral_fee;
        let kept_share = 1.0 - self.referral_fee_percent / 100.0;
        if kept_share <= 0.0 {
            return f64::INFINITY;
        }
        fixed_costs / kept_share
    }
}

impl Default for ProfitCalculator {
    fn default() -> Self {
        Self::from_config(&CalculatorConfig::default())
    }
}

fn find_match<'a>(
    retail: &RetailListing,
    catalog: &'a HashMap<String, CatalogListing>,
) -> Option<&'a CatalogListing> {
    [retail.upc.as_deref(), retail.sku.as_deref(), Some(retail.product_id.as_str())]
        .into_iter()
        .flatten()
        .filter(|key| !key.is_empty())
        .find_map(|key| catalog.get(key))
}
