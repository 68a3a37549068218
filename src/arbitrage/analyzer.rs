use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::types::Opportunity;

const MAX_HISTORY: usize = 1000;

/// Keeps the most recent opportunities across scan cycles and summarizes
/// them.
pub struct OpportunityAnalyzer {
    history: Vec<Opportunity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunitySummary {
    pub total_opportunities: usize,
    pub profitable_opportunities: usize,
    pub total_profit: f64,
    pub average_profit: f64,
    pub average_roi: f64,
    pub best_roi: f64,
    pub best_store: Option<String>,
    pub best_category: Option<String>,
}

impl OpportunityAnalyzer {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
        }
    }

    pub fn add_opportunity(&mut self, opportunity: Opportunity) {
        self.history.push(opportunity);

        // Keep only recent opportunities
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
    }

    pub fn add_opportunities(&mut self, opportunities: impl IntoIterator<Item = Opportunity>) {
        for opportunity in opportunities {
            self.add_opportunity(opportunity);
        }
    }

    pub fn generate_summary(&self) -> OpportunitySummary {
        summarize(&self.history)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        info!("Cleared opportunity analysis history");
    }

    pub fn get_opportunity_count(&self) -> usize {
        self.history.len()
    }
}

impl Default for OpportunityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate statistics for a batch. An empty batch yields zeros.
pub fn summarize(opportunities: &[Opportunity]) -> OpportunitySummary {
    if opportunities.is_empty() {
        return OpportunitySummary::default();
    }

    let count = opportunities.len() as f64;
    let total_profit: f64 = opportunities.iter().map(Opportunity::profit).sum();
    let total_roi: f64 = opportunities.iter().map(Opportunity::roi).sum();
    let best_roi = opportunities
        .iter()
        .map(Opportunity::roi)
        .fold(f64::NEG_INFINITY, f64::max);

    OpportunitySummary {
        total_opportunities: opportunities.len(),
        profitable_opportunities: opportunities.iter().filter(|o| o.is_profitable()).count(),
        total_profit,
        average_profit: total_profit / count,
        average_roi: total_roi / count,
        best_roi,
        best_store: most_profitable_by(opportunities, |o| Some(o.retail.store.as_str())),
        best_category: most_profitable_by(opportunities, |o| {
            o.catalog.category.as_deref().or(o.retail.category.as_deref())
        }),
    }
}

/// Group key with the highest summed profit. Ties go to the key seen first.
fn most_profitable_by<'a, F>(opportunities: &'a [Opportunity], key: F) -> Option<String>
where
    F: Fn(&'a Opportunity) -> Option<&'a str>,
{
    let mut order: Vec<&str> = Vec::new();
    let mut profits: HashMap<&str, f64> = HashMap::new();

    for opportunity in opportunities {
        let Some(group) = key(opportunity).filter(|group| !group.is_empty()) else {
            continue;
        };
        let entry = profits.entry(group).or_insert_with(|| {
            order.push(group);
            0.0
        });
        *entry += opportunity.profit();
    }

    let mut best: Option<(&str, f64)> = None;
    for group in order {
        let profit = profits[group];
        if best.map_or(true, |(_, best_profit)| profit > best_profit) {
            best = Some((group, profit));
        }
    }
    best.map(|(group, _)| group.to_string())
}
