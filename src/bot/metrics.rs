use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::types::Opportunity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMetrics {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub total_cycles_completed: u64,
    pub listings_scanned: u64,
    pub listings_matched: u64,
    pub opportunities_kept: u64,
    pub total_profit: f64,
    pub best_roi: Option<f64>,
    pub store_performance: HashMap<String, StoreMetrics>,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreMetrics {
    pub store: String,
    pub opportunities_kept: u64,
    pub total_profit: f64,
    pub best_roi: f64,
}

impl ScanMetrics {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            total_cycles_completed: 0,
            listings_scanned: 0,
            listings_matched: 0,
            opportunities_kept: 0,
            total_profit: 0.0,
            best_roi: None,
            store_performance: HashMap::new(),
            error_count: 0,
            last_error: None,
            last_updated: now,
        }
    }

    pub fn update_cycle_metrics(&mut self, scanned: usize, matched: usize, kept: &[Opportunity]) {
        self.total_cycles_completed += 1;
        self.listings_scanned += scanned as u64;
        self.listings_matched += matched as u64;
        self.opportunities_kept += kept.len() as u64;

        for opportunity in kept {
            let profit = opportunity.profit();
            let roi = opportunity.roi();
            self.total_profit += profit;
            self.best_roi = Some(self.best_roi.map_or(roi, |best| best.max(roi)));

            let store = self
                .store_performance
                .entry(opportunity.retail.store.clone())
                .or_insert_with(|| StoreMetrics {
                    store: opportunity.retail.store.clone(),
                    ..StoreMetrics::default()
                });
            store.opportunities_kept += 1;
            store.total_profit += profit;
            store.best_roi = store.best_roi.max(roi);
        }

        self.last_updated = Utc::now();
    }

    pub fn record_error(&mut self, error_message: &str) {
        self.error_count += 1;
        self.last_error = Some(error_message.to_string());
        self.last_updated = Utc::now();
    }

    /// Share of attempted cycles that completed.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.total_cycles_completed + self.error_count;
        if attempted == 0 {
            return 0.0;
        }
        self.total_cycles_completed as f64 / attempted as f64
    }

    pub fn match_rate(&self) -> f64 {
        if self.listings_scanned == 0 {
            return 0.0;
        }
        self.listings_matched as f64 / self.listings_scanned as f64
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Scan Metrics Report ===\n");
        report.push_str(&format!("Run: {}\n", self.run_id));
        report.push_str(&format!("Uptime: {} seconds\n", self.uptime_seconds()));
        report.push_str(&format!("Total Cycles: {}\n", self.total_cycles_completed));
        report.push_str(&format!("Listings Scanned: {}\n", self.listings_scanned));
        report.push_str(&format!(
            "Listings Matched: {} ({:.1}%)\n",
            self.listings_matched,
            self.match_rate() * 100.0
        ));
        report.push_str(&format!("Opportunities Kept: {}\n", self.opportunities_kept));
        report.push_str(&format!("Total Potential Profit: ${:.2}\n", self.total_profit));
        match self.best_roi {
            Some(roi) => report.push_str(&format!("Best ROI: {:.1}%\n", roi)),
            None => report.push_str("Best ROI: N/A\n"),
        }
        report.push_str(&format!("Success Rate: {:.2}%\n", self.success_rate() * 100.0));
        report.push_str(&format!("Error Count: {}\n", self.error_count));

        if let Some(ref error) = self.last_error {
            report.push_str(&format!("Last Error: {}\n", error));
        }

        report.push_str("\n=== Store Performance ===\n");
        let mut stores: Vec<&StoreMetrics> = self.store_performance.values().collect();
        stores.sort_by(|a, b| b.total_profit.total_cmp(&a.total_profit));
        for store in stores {
            report.push_str(&format!(
                "{}: {} opportunities, ${:.2} total profit, best ROI {:.1}%\n",
                store.store, store.opportunities_kept, store.total_profit, store.best_roi
            ));
        }

        report.push_str(&format!("\nLast Updated: {}\n", self.last_updated));

        report
    }

    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize metrics: {}", e))
    }

    pub fn reset(&mut self) {
        *self = Self::new();
        info!("Scan metrics reset");
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::opportunity_with_roi;

    #[test]
    fn test_cycle_metrics_accumulate() {
        let mut metrics = ScanMetrics::new();
        metrics.update_cycle_metrics(10, 4, &[opportunity_with_roi("1", 60.0), opportunity_with_roi("2", 45.0)]);
        metrics.update_cycle_metrics(5, 0, &[]);

        assert_eq!(metrics.total_cycles_completed, 2);
        assert_eq!(metrics.listings_scanned, 15);
        assert_eq!(metrics.listings_matched, 4);
        assert_eq!(metrics.opportunities_kept, 2);
        assert!((metrics.total_profit - 10.5).abs() < 1e-9);
        assert!((metrics.best_roi.unwrap() - 60.0).abs() < 1e-9);

        let walmart = &metrics.store_performance["walmart"];
        assert_eq!(walmart.opportunities_kept, 2);
    }

    #[test]
    fn test_success_rate_counts_failed_cycles() {
        let mut metrics = ScanMetrics::new();
        assert_eq!(metrics.success_rate(), 0.0);

        metrics.update_cycle_metrics(1, 1, &[]);
        metrics.update_cycle_metrics(1, 1, &[]);
        metrics.update_cycle_metrics(1, 1, &[]);
        metrics.record_error("feed timed out");

        assert_eq!(metrics.success_rate(), 0.75);
        assert_eq!(metrics.last_error.as_deref(), Some("feed timed out"));
    }

    #[test]
    fn test_report_and_json() {
        let mut metrics = ScanMetrics::new();
        metrics.update_cycle_metrics(2, 1, &[opportunity_with_roi("1", 50.0)]);

        let report = metrics.generate_report();
        assert!(report.contains("Opportunities Kept: 1"));
        assert!(report.contains("Best ROI: 50.0%"));
        assert!(report.contains("walmart: 1 opportunities"));

        let json: serde_json::Value = serde_json::from_str(&metrics.export_json().unwrap()).unwrap();
        assert_eq!(json["listings_scanned"], 2);

        metrics.reset();
        assert_eq!(metrics.total_cycles_completed, 0);
        assert!(metrics.best_roi.is_none());
    }
}
