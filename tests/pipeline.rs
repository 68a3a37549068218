use retail_arbitrage_scanner::{
    bot::{ScanPipeline, ScanRequest},
    config::{Config, FeedConfig},
    report::{self, OutputFormat},
    FulfillmentMethod,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_json(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn feed() -> NamedTempFile {
    write_json(
        r#"[
            {"product_id": "BK-1", "title": "Field Guide to Birds", "price": 10.0,
             "original_price": 25.0, "url": "https://store.example/bk-1",
             "category": "Books", "upc": "9780679451204"},
            {"product_id": "KT-2", "title": "Pour-over kettle", "price": 19.5,
             "original_price": 39.0, "url": "https://store.example/kt-2",
             "category": "Home & Kitchen", "upc": "0845226012345"},
            {"product_id": "NO-3", "title": "Unlisted lamp", "price": 4.0,
             "url": "https://store.example/no-3"}
        ]"#,
    )
}

fn catalog() -> NamedTempFile {
    write_json(
        r#"{
            "listings": [
                {"asin": "0679451242", "title": "Field Guide to North American Birds",
                 "price": 30.0, "sales_rank": 1000, "category": "Books", "review_count": 12},
                {"asin": "B07KETTLE1", "title": "Gooseneck kettle", "price": 45.0,
                 "sales_rank": 2000, "category": "Home & Kitchen", "review_count": 340}
            ],
            "index": {"9780679451204": "0679451242", "0845226012345": "B07KETTLE1"}
        }"#,
    )
}

async fn pipeline(feed: &NamedTempFile, catalog: &NamedTempFile) -> ScanPipeline {
    let mut config = Config::default();
    config.database = None;
    config.sources.feeds = vec![FeedConfig {
        store: "walmart".to_string(),
        location: feed.path().to_str().unwrap().to_string(),
    }];
    config.sources.catalog_path = Some(catalog.path().to_str().unwrap().to_string());

    ScanPipeline::from_config(config).await.unwrap()
}

fn request() -> ScanRequest {
    ScanRequest {
        limit: 50,
        method: FulfillmentMethod::Fba,
        ..ScanRequest::default()
    }
}

#[tokio::test]
async fn test_scan_finds_the_profitable_book() {
    let (feed, catalog) = (feed(), catalog());
    let mut pipeline = pipeline(&feed, &catalog).await;

    let kept = pipeline.run_once(&request()).await.unwrap();

    // The kettle matches but has too many reviews; the lamp has no match.
    assert_eq!(kept.len(), 1);
    let book = &kept[0];
    assert_eq!(book.catalog.asin, "0679451242");
    assert_eq!(book.retail.store, "walmart");
    assert!((book.costs.total() - 19.13).abs() < 1e-9);
    assert!((book.profit() - 10.87).abs() < 1e-9);
    assert!((book.roi() - 56.83).abs() < 0.01);

    let metrics = pipeline.metrics();
    assert_eq!(metrics.listings_scanned, 3);
    assert_eq!(metrics.listings_matched, 2);
    assert_eq!(metrics.opportunities_kept, 1);
}

#[tokio::test]
async fn test_repeated_scans_are_identical() {
    let (feed, catalog) = (feed(), catalog());
    let mut pipeline = pipeline(&feed, &catalog).await;

    let first = pipeline.run_once(&request()).await.unwrap();
    let second = pipeline.run_once(&request()).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_discount_and_category_narrow_the_scan() {
    let (feed, catalog) = (feed(), catalog());
    let mut pipeline = pipeline(&feed, &catalog).await;

    let kitchen_only = ScanRequest {
        category: Some("kitchen".to_string()),
        ..request()
    };
    assert!(pipeline.run_once(&kitchen_only).await.unwrap().is_empty());

    let deep_discount = ScanRequest {
        min_discount: 55.0,
        ..request()
    };
    assert_eq!(pipeline.run_once(&deep_discount).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_csv_report_of_a_scan() {
    let (feed, catalog) = (feed(), catalog());
    let mut pipeline = pipeline(&feed, &catalog).await;

    let kept = pipeline.run_once(&request()).await.unwrap();
    let csv = report::render(&kept, OutputFormat::Csv).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines[0], "Title,Store,Buy Price,Amazon Price,Profit,ROI,ASIN,Reviews,Sales Rank,URL");
    assert_eq!(
        lines[1],
        "Field Guide to Birds,walmart,10.00,30.00,10.87,56.8%,0679451242,12,1000,https://store.example/bk-1"
    );
}
