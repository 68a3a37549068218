use std::collections::HashMap;
use tracing::debug;

use crate::config::SalesRankConfig;

/// Rank treated as "top 100%" when a category has neither a curve nor a
/// matching threshold.
pub const DEFAULT_RANK_THRESHOLD: f64 = 500_000.0;

pub const WORST_PERCENTILE: f64 = 100.0;

/// Approximate number of ranked products per category, matched
/// case-insensitively as a substring of the listing's category.
pub const CATEGORY_RANK_THRESHOLDS: [(&str, f64); 10] = [
    ("Books", 2_000_000.0),
    ("Electronics", 500_000.0),
    ("Toys", 400_000.0),
    ("Video Games", 150_000.0),
    ("Kitchen", 600_000.0),
    ("Home & Garden", 800_000.0),
    ("Beauty", 300_000.0),
    ("Clothing", 1_000_000.0),
    ("Sports & Outdoors", 400_000.0),
    ("Office Products", 300_000.0),
];

/// Empirical rank -> percentile mapping for one category, sorted by rank.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileCurve {
    points: Vec<(u64, f64)>,
}

impl PercentileCurve {
    pub fn new(points: impl IntoIterator<Item = (u64, f64)>) -> Self {
        let mut points: Vec<(u64, f64)> = points.into_iter().collect();
        points.sort_by_key(|(rank, _)| *rank);
        points.dedup_by_key(|(rank, _)| *rank);
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(u64, f64)] {
        &self.points
    }

    /// Exact hit, clamp outside the known range, linear interpolation
    /// between the bracketing ranks otherwise. `None` for an empty curve.
    pub fn percentile(&self, sales_rank: u64) -> Option<f64> {
        let (first, last) = (self.points.first()?, self.points.last()?);

        if sales_rank <= first.0 {
            return Some(first.1);
        }
        if sales_rank >= last.0 {
            return Some(last.1);
        }

        match self.points.binary_search_by_key(&sales_rank, |(rank, _)| *rank) {
            Ok(index) => Some(self.points[index].1),
            Err(index) => {
                let (rank1, perc1) = self.points[index - 1];
                let (rank2, perc2) = self.points[index];
                let fraction = (sales_rank - rank1) as f64 / (rank2 - rank1) as f64;
                Some(perc1 + (perc2 - perc1) * fraction)
            }
        }
    }
}

/// Converts a raw sales rank into a category-relative percentile
/// (lower is better). Holds only immutable lookup data.
#[derive(Debug, Clone)]
pub struct SalesRankModel {
    curves: HashMap<String, PercentileCurve>,
    thresholds: Vec<(String, f64)>,
    default_threshold: f64,
}

impl SalesRankModel {
    pub fn new(curves: HashMap<String, PercentileCurve>) -> Self {
        Self {
            curves,
            thresholds: CATEGORY_RANK_THRESHOLDS
                .iter()
                .map(|(category, threshold)| (category.to_string(), *threshold))
                .collect(),
            default_threshold: DEFAULT_RANK_THRESHOLD,
        }
    }

    pub fn with_default_curves() -> Self {
        Self::new(default_curves())
    }

    pub fn from_config(config: &SalesRankConfig) -> Self {
        let mut curves = if config.use_default_curves {
            default_curves()
        } else {
            HashMap::new()
        };

        for curve in &config.curves {
            let points = curve.points.iter().map(|point| (point.rank, point.percentile));
            curves.insert(curve.category.clone(), PercentileCurve::new(points));
        }

        Self::new(curves).with_default_threshold(config.default_threshold)
    }

    pub fn with_default_threshold(mut self, default_threshold: f64) -> Self {
        self.default_threshold = default_threshold;
        self
    }

    pub fn has_curves(&self) -> bool {
        self.curves.values().any(|curve| !curve.is_empty())
    }

    pub fn curve(&self, category: &str) -> Option<&PercentileCurve> {
        self.curves.get(category)
    }

    /// Percentile in [0, 100] for `sales_rank` within `category`.
    pub fn percentile(&self, sales_rank: i64, category: &str) -> f64 {
        if sales_rank <= 0 {
            return WORST_PERCENTILE;
        }
        let rank = sales_rank as u64;

        if let Some(percentile) = self.curve(category).and_then(|curve| curve.percentile(rank)) {
            return percentile;
        }

        let threshold = self.threshold_for(category);
        let percentile = (rank as f64 / threshold * 100.0).min(WORST_PERCENTILE);
        debug!(
            "Approximated rank {} in '{}' as {:.3} percentile (threshold {})",
            rank, category, percentile, threshold
        );
        percentile
    }

    fn threshold_for(&self, category: &str) -> f64 {
        let category = category.to_lowercase();
        self.thresholds
            .iter()
            .find(|(name, _)| category.contains(&name.to_lowercase()))
            .map(|(_, threshold)| *threshold)
            .unwrap_or(self.default_threshold)
    }
}

impl Default for SalesRankModel {
    fn default() -> Self {
        Self::with_default_curves()
    }
}

/// Built-in curves for the categories resellers scan most.
pub fn default_curves() -> HashMap<String, PercentileCurve> {
    let mut curves = HashMap::new();
    curves.insert(
        "Books".to_string(),
        PercentileCurve::new([
            (100, 0.01),
            (500, 0.05),
            (1_000, 0.1),
            (5_000, 0.5),
            (10_000, 1.0),
            (20_000, 2.0),
            (50_000, 5.0),
            (100_000, 10.0),
            (200_000, 20.0),
            (500_000, 50.0),
            (1_000_000, 80.0),
            (2_000_000, 95.0),
            (5_000_000, 99.0),
        ]),
    );
    curves.insert(
        "Electronics".to_string(),
        PercentileCurve::new([
            (100, 0.01),
            (500, 0.05),
            (1_000, 0.1),
            (2_500, 0.5),
            (5_000, 1.0),
            (10_000, 2.0),
            (25_000, 5.0),
            (50_000, 10.0),
            (100_000, 20.0),
            (250_000, 50.0),
            (500_000, 80.0),
            (1_000_000, 95.0),
            (2_000_000, 99.0),
        ]),
    );
    curves.insert(
        "Toys & Games".to_string(),
        PercentileCurve::new([
            (100, 0.01),
            (250, 0.05),
            (500, 0.1),
            (1_000, 0.5),
            (2_500, 1.0),
            (5_000, 2.0),
            (10_000, 5.0),
            (25_000, 10.0),
            (50_000, 20.0),
            (100_000, 50.0),
            (200_000, 80.0),
            (400_000, 95.0),
            (800_000, 99.0),
        ]),
    );
    curves.insert(
        "Home & Kitchen".to_string(),
        PercentileCurve::new([
            (100, 0.01),
            (250, 0.05),
            (500, 0.1),
            (1_000, 0.5),
            (2_500, 1.0),
            (5_000, 2.0),
            (15_000, 5.0),
            (30_000, 10.0),
            (60_000, 20.0),
            (150_000, 50.0),
            (300_000, 80.0),
            (600_000, 95.0),
            (1_200_000, 99.0),
        ]),
    );
    curves
}
