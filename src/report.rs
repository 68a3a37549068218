use anyhow::{anyhow, Result};
use clap::ValueEnum;
use serde_json::json;
use std::fmt::Write;

use crate::types::Opportunity;

const TITLE_WIDTH: usize = 40;
const EMPTY_REPORT: &str = "No opportunities found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

pub fn render(opportunities: &[Opportunity], format: OutputFormat) -> Result<String> {
    if opportunities.is_empty() {
        return Ok(EMPTY_REPORT.to_string());
    }

    match format {
        OutputFormat::Table => Ok(render_table(opportunities)),
        OutputFormat::Json => render_json(opportunities),
        OutputFormat::Csv => render_csv(opportunities),
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > TITLE_WIDTH {
        let head: String = title.chars().take(TITLE_WIDTH).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

fn or_na(value: Option<i64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

fn render_table(opportunities: &[Opportunity]) -> String {
    let headers = [
        "Title", "Store", "Buy Price", "Amazon Price", "Profit", "ROI", "ASIN", "Reviews", "Sales Rank",
    ];

    let rows: Vec<Vec<String>> = opportunities
        .iter()
        .map(|opp| {
            vec![
                truncate_title(&opp.retail.title),
                opp.retail.store.clone(),
                format!("${:.2}", opp.retail.price),
                format!("${:.2}", opp.catalog.price),
                format!("${:.2}", opp.profit()),
                format!("{:.1}%", opp.roi()),
                opp.catalog.asin.clone(),
                or_na(opp.catalog.review_count),
                or_na(opp.catalog.sales_rank),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let separator = |fill: char| -> String {
        let mut line = String::from("+");
        for width in &widths {
            line.extend(std::iter::repeat(fill).take(width + 2));
            line.push('+');
        }
        line
    };

    let format_row = |cells: &[String]| -> String {
        let mut line = String::from("|");
        for (cell, width) in cells.iter().zip(&widths) {
            let pad = width - cell.chars().count();
            line.push(' ');
            line.push_str(cell);
            line.extend(std::iter::repeat(' ').take(pad + 1));
            line.push('|');
        }
        line
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let mut lines = vec![separator('-'), format_row(&header_cells), separator('=')];
    for row in &rows {
        lines.push(format_row(row));
        lines.push(separator('-'));
    }

    lines.join("\n")
}

fn render_json(opportunities: &[Opportunity]) -> Result<String> {
    let records: Vec<serde_json::Value> = opportunities
        .iter()
        .map(|opp| {
            json!({
                "retail_listing": {
                    "title": opp.retail.title,
                    "store": opp.retail.store,
                    "price": opp.retail.price,
                    "url": opp.retail.url,
                },
                "catalog_listing": {
                    "title": opp.catalog.title,
                    "asin": opp.catalog.asin,
                    "price": opp.catalog.price,
                    "sales_rank": opp.catalog.sales_rank,
                    "review_count": opp.catalog.review_count,
                    "url": opp.catalog.url,
                },
                "profit": opp.profit(),
                "roi": opp.roi(),
                "fulfillment_method": opp.fulfillment_method,
            })
        })
        .collect();

    serde_json::to_string_pretty(&records).map_err(|e| anyhow!("Failed to encode opportunities: {}", e))
}

fn render_csv(opportunities: &[Opportunity]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record([
        "Title", "Store", "Buy Price", "Amazon Price", "Profit", "ROI", "ASIN", "Reviews", "Sales Rank", "URL",
    ])?;

    for opp in opportunities {
        writer.write_record([
            opp.retail.title.clone(),
            opp.retail.store.clone(),
            format!("{:.2}", opp.retail.price),
            format!("{:.2}", opp.catalog.price),
            format!("{:.2}", opp.profit()),
            format!("{:.1}%", opp.roi()),
            opp.catalog.asin.clone(),
            opp.catalog.review_count.unwrap_or(0).to_string(),
            opp.catalog.sales_rank.unwrap_or(0).to_string(),
            opp.retail.url.clone(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV output: {}", e))?;
    let mut out = String::from_utf8(bytes)?;
    if out.ends_with('\n') {
        out.pop();
    }
    Ok(out)
}

/// Multi-section breakdown of a single opportunity.
/// `break_even` is the lowest Amazon price that still covers every cost.
pub fn render_detail(label: &str, opportunity: &Opportunity, break_even: f64) -> String {
    let retail = &opportunity.retail;
    let catalog = &opportunity.catalog;
    let costs = &opportunity.costs;
    let rule = "=".repeat(80);

    let mut out = String::new();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Opportunity {} Details", label);
    let _ = writeln!(out, "{}", rule);

    let _ = writeln!(out, "\nRetail Listing:");
    let _ = writeln!(out, "Title: {}", retail.title);
    let _ = writeln!(out, "Store: {}", retail.store);
    let _ = writeln!(out, "Price: ${:.2}", retail.price);
    if let (Some(original), Some(discount)) = (retail.original_price, retail.discount_percentage()) {
        let _ = writeln!(out, "Original Price: ${:.2} ({:.1}% off)", original, discount);
    }
    if let Some(upc) = &retail.upc {
        let _ = writeln!(out, "UPC: {}", upc);
    }
    if let Some(sku) = &retail.sku {
        let _ = writeln!(out, "SKU: {}", sku);
    }
    let _ = writeln!(out, "URL: {}", retail.url);

    let _ = writeln!(out, "\nAmazon Listing:");
    let _ = writeln!(out, "Title: {}", catalog.title);
    let _ = writeln!(out, "ASIN: {}", catalog.asin);
    let _ = writeln!(out, "Price: ${:.2}", catalog.price);
    if let Some(rank) = catalog.sales_rank {
        match &catalog.category {
            Some(category) => {
                let _ = writeln!(out, "Sales Rank: #{} in {}", rank, category);
            }
            None => {
                let _ = writeln!(out, "Sales Rank: #{}", rank);
            }
        }
    }
    if let Some(reviews) = catalog.review_count {
        match catalog.rating {
            Some(rating) => {
                let _ = writeln!(out, "Reviews: {} ({} stars)", reviews, rating);
            }
            None => {
                let _ = writeln!(out, "Reviews: {}", reviews);
            }
        }
    }
    if let Some(url) = &catalog.url {
        let _ = writeln!(out, "URL: {}", url);
    }

    let _ = writeln!(out, "\nProfit Analysis:");
    let _ = writeln!(out, "Buy Price: ${:.2}", costs.buy_price);
    let _ = writeln!(out, "Sell Price: ${:.2}", catalog.price);
    let _ = writeln!(out, "Referral Fee: ${:.2}", costs.referral_fee);
    let _ = writeln!(
        out,
        "Fulfillment: ${:.2} ({})",
        costs.fulfillment_cost, opportunity.fulfillment_method
    );
    if costs.shipping_to_amazon > 0.0 {
        let _ = writeln!(out, "Shipping to Amazon: ${:.2}", costs.shipping_to_amazon);
    }
    let _ = writeln!(out, "Other Costs: ${:.2}", costs.other_costs);
    let _ = writeln!(out, "Total Cost: ${:.2}", costs.total());
    let _ = writeln!(out, "Profit: ${:.2}", opportunity.profit());
    if break_even.is_finite() {
        let _ = writeln!(out, "Break-even Price: ${:.2}", break_even);
    } else {
        let _ = writeln!(out, "Break-even Price: N/A");
    }
    let _ = write!(out, "ROI: {:.1}%", opportunity.roi());

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::opportunity_with_roi;

    #[test]
    fn test_empty_input_renders_placeholder() {
        for format in [OutputFormat::Table, OutputFormat::Json, OutputFormat::Csv] {
            assert_eq!(render(&[], format).unwrap(), EMPTY_REPORT);
        }
    }

    #[test]
    fn test_table_truncates_long_titles() {
        let mut opp = opportunity_with_roi("1", 50.0);
        opp.retail.title = "x".repeat(45);

        let table = render(&[opp], OutputFormat::Table).unwrap();
        assert!(table.contains(&format!("{}...", "x".repeat(40))));
        assert!(!table.contains(&"x".repeat(41)));
        assert!(table.contains("50.0%"));
        assert!(table.contains("N/A"));
    }

    #[test]
    fn test_csv_header_and_quoting() {
        let mut opp = opportunity_with_roi("1", 50.0);
        opp.retail.title = "Lamp, brass".to_string();
        opp.catalog.sales_rank = Some(1500);

        let csv_output = render(&[opp], OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv_output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Title,Store,Buy Price,Amazon Price,Profit,ROI,ASIN,Reviews,Sales Rank,URL");
        assert!(lines[1].starts_with("\"Lamp, brass\",walmart,10.00,15.00,5.00,50.0%,B1,0,1500,"));
    }

    #[test]
    fn test_json_fields() {
        let opp = opportunity_with_roi("7", 25.0);
        let output = render(&[opp], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        let record = &value[0];
        assert_eq!(record["catalog_listing"]["asin"], "B7");
        assert_eq!(record["retail_listing"]["store"], "walmart");
        assert_eq!(record["fulfillment_method"], "FBA");
        assert!((record["roi"].as_f64().unwrap() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_detail_lists_costs() {
        let opp = opportunity_with_roi("3", 40.0);
        let detail = render_detail("#3", &opp, 8.5);
        assert!(detail.contains("Opportunity #3 Details"));
        assert!(detail.contains("Total Cost: $10.00"));
        assert!(detail.contains("Break-even Price: $8.50"));
        assert!(detail.ends_with("ROI: 40.0%"));
        assert!(!detail.contains("Shipping to Amazon"));
    }

    #[test]
    fn test_detail_without_break_even() {
        let opp = opportunity_with_roi("4", 40.0);
        let detail = render_detail("#4", &opp, f64::INFINITY);
        assert!(detail.contains("Break-even Price: N/A"));
    }
}
