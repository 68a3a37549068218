use tracing::info;

use crate::{arbitrage::percentile::SalesRankModel, config::FilterConfig, types::Opportunity};

/// Threshold filters applied to a batch of computed opportunities.
#[derive(Debug, Clone)]
pub struct OpportunityFilter {
    min_roi: f64,
    max_reviews: i64,
    min_profit: f64,
    max_bsr_percentile: f64,
}

impl OpportunityFilter {
    pub fn new(min_roi: f64, max_reviews: i64, min_profit: f64, max_bsr_percentile: f64) -> Self {
        Self {
            min_roi,
            max_reviews,
            min_profit,
            max_bsr_percentile,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(
            config.min_roi,
            config.max_reviews,
            config.min_profit,
            config.max_bsr_percentile,
        )
    }

    pub fn filter_by_roi(&self, opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
        opportunities
            .into_iter()
            .filter(|opp| opp.roi() >= self.min_roi)
            .collect()
    }

    pub fn filter_by_profit(&self, opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
        opportunities
            .into_iter()
            .filter(|opp| opp.profit() >= self.min_profit)
            .collect()
    }

    /// Listings with an unknown review count are kept.
    pub fn filter_by_reviews(&self, opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
        opportunities
            .into_iter()
            .filter(|opp| {
                opp.catalog
                    .review_count
                    .map_or(true, |reviews| reviews <= self.max_reviews)
            })
            .collect()
    }

    /// Drops listings without a sales rank or category, then keeps those in
    /// the top `max_bsr_percentile` of their category.
    pub fn filter_by_sales_rank(
        &self,
        opportunities: Vec<Opportunity>,
        model: &SalesRankModel,
    ) -> Vec<Opportunity> {
        opportunities
            .into_iter()
            .filter(|opp| {
                let (Some(rank), Some(category)) =
                    (opp.catalog.sales_rank, opp.catalog.category.as_deref())
                else {
                    return false;
                };
                if category.is_empty() {
                    return false;
                }
                model.percentile(rank, category) <= self.max_bsr_percentile
            })
            .collect()
    }

    /// Runs ROI, profit, review and (when curves are available) sales-rank
    /// filters in that order, then sorts by ROI, highest first. Ties keep
    /// their input order.
    pub fn apply(
        &self,
        opportunities: Vec<Opportunity>,
        sales_rank_model: Option<&SalesRankModel>,
    ) -> Vec<Opportunity> {
        info!("Applying all filters to {} opportunities", opportunities.len());

        let filtered = self.filter_by_roi(opportunities);
        info!(
            "After ROI filter (>= {}%): {} opportunities",
            self.min_roi,
            filtered.len()
        );

        let filtered = self.filter_by_profit(filtered);
        info!(
            "After profit filter (>= ${:.2}): {} opportunities",
            self.min_profit,
            filtered.len()
        );

        let filtered = self.filter_by_reviews(filtered);
        info!(
            "After reviews filter (<= {}): {} opportunities",
            self.max_reviews,
            filtered.len()
        );

        let mut filtered = match sales_rank_model {
            Some(model) if model.has_curves() => {
                let filtered = self.filter_by_sales_rank(filtered, model);
                info!(
                    "After sales rank filter (<= {}th percentile): {} opportunities",
                    self.max_bsr_percentile,
                    filtered.len()
                );
                filtered
            }
            _ => filtered,
        };

        filtered.sort_by(|a, b| b.roi().total_cmp(&a.roi()));
        filtered
    }
}

impl Default for OpportunityFilter {
    fn default() -> Self {
        Self::from_config(&FilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::percentile::PercentileCurve;
    use crate::types::fixtures::opportunity_with_roi;
    use std::collections::HashMap;

    fn rois(opportunities: &[Opportunity]) -> Vec<f64> {
        opportunities.iter().map(|o| o.roi().round()).collect()
    }

    /// Filter with only the ROI criterion active.
    fn roi_only(min_roi: f64) -> OpportunityFilter {
        OpportunityFilter::new(min_roi, i64::MAX, f64::MIN, 100.0)
    }

    #[test]
    fn test_roi_filter_keeps_and_sorts() {
        let opportunities = vec![
            opportunity_with_roi("1", 60.0),
            opportunity_with_roi("2", 30.0),
            opportunity_with_roi("3", 50.0),
        ];

        let result = roi_only(40.0).apply(opportunities, None);
        assert_eq!(rois(&result), vec![60.0, 50.0]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_roi() {
        let opportunities = vec![
            opportunity_with_roi("first", 50.0),
            opportunity_with_roi("top", 80.0),
            opportunity_with_roi("second", 50.0),
        ];

        let result = roi_only(0.0).apply(opportunities, None);
        let ids: Vec<&str> = result.iter().map(|o| o.retail.product_id.as_str()).collect();
        assert_eq!(ids, vec!["top", "first", "second"]);
    }

    #[test]
    fn test_profit_filter() {
        // 10.00 outlay: 40% ROI is $4 profit, 60% is $6
        let opportunities = vec![
            opportunity_with_roi("1", 40.0),
            opportunity_with_roi("2", 60.0),
        ];

        let result = OpportunityFilter::default().filter_by_profit(opportunities);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].retail.product_id, "2");
    }

    #[test]
    fn test_reviews_filter_keeps_unknown_counts() {
        let mut few = opportunity_with_roi("few", 60.0);
        few.catalog.review_count = Some(20);
        let mut many = opportunity_with_roi("many", 60.0);
        many.catalog.review_count = Some(21);
        let unknown = opportunity_with_roi("unknown", 60.0);

        let result = OpportunityFilter::default().filter_by_reviews(vec![few, many, unknown]);
        let ids: Vec<&str> = result.iter().map(|o| o.retail.product_id.as_str()).collect();
        assert_eq!(ids, vec!["few", "unknown"]);
    }

    #[test]
    fn test_sales_rank_filter_requires_rank_and_category() {
        let model = SalesRankModel::with_default_curves();

        let mut top = opportunity_with_roi("top", 60.0);
        top.catalog.sales_rank = Some(10_000);
        top.catalog.category = Some("Books".to_string());

        let mut slow = opportunity_with_roi("slow", 60.0);
        slow.catalog.sales_rank = Some(400_000);
        slow.catalog.category = Some("Books".to_string());

        let mut no_rank = opportunity_with_roi("no-rank", 60.0);
        no_rank.catalog.category = Some("Books".to_string());

        let mut no_category = opportunity_with_roi("no-category", 60.0);
        no_category.catalog.sales_rank = Some(10);

        let result = OpportunityFilter::default()
            .filter_by_sales_rank(vec![top, slow, no_rank, no_category], &model);
        let ids: Vec<&str> = result.iter().map(|o| o.retail.product_id.as_str()).collect();
        assert_eq!(ids, vec!["top"]);
    }

    #[test]
    fn test_sales_rank_stage_skipped_without_curves() {
        let model = SalesRankModel::new(HashMap::new());
        let no_rank = opportunity_with_roi("no-rank", 60.0);

        let result = OpportunityFilter::default().apply(vec![no_rank.clone()], Some(&model));
        assert_eq!(result.len(), 1);

        let result = OpportunityFilter::default().apply(vec![no_rank], None);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_apply_runs_every_stage() {
        let mut curves = HashMap::new();
        curves.insert(
            "Electronics".to_string(),
            PercentileCurve::new([(1_000, 1.0), (100_000, 50.0)]),
        );
        let model = SalesRankModel::new(curves);

        let mut keep = opportunity_with_roi("keep", 70.0);
        keep.catalog.sales_rank = Some(2_000);
        keep.catalog.category = Some("Electronics".to_string());
        keep.catalog.review_count = Some(3);

        let mut low_roi = keep.clone();
        low_roi.retail.product_id = "low-roi".to_string();
        low_roi.catalog.price = 13.0;

        let mut reviewed = keep.clone();
        reviewed.retail.product_id = "reviewed".to_string();
        reviewed.catalog.review_count = Some(500);

        let mut slow = keep.clone();
        slow.retail.product_id = "slow".to_string();
        slow.catalog.sales_rank = Some(90_000);

        let result = OpportunityFilter::default().apply(vec![low_roi, reviewed, slow, keep], Some(&model));
        let ids: Vec<&str> = result.iter().map(|o| o.retail.product_id.as_str()).collect();
        assert_eq!(ids, vec!["keep"]);
    }
}
