pub mod fulfillment;
pub mod calculator;
pub mod percentile;
pub mod filter;
pub mod analyzer;

pub use fulfillment::SizeTier;
pub use calculator::ProfitCalculator;
pub use percentile::{PercentileCurve, SalesRankModel};
pub use filter::OpportunityFilter;
pub use analyzer::{OpportunityAnalyzer, OpportunitySummary};
