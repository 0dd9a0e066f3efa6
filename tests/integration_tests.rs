// Integration tests for kgprice-watcher
//
// These drive the refresher end to end with a scripted browser and an
// in-memory or mocked spreadsheet.

mod integration;

use integration::*;
use kgprice_watcher::{AppConfig, PriceExtractor, UnitPrice};

#[tokio::test]
async fn test_single_product_probe() -> anyhow::Result<()> {
    let (refresher, log) = fake_refresher(&[(
        "https://shop.example/lomo",
        FakePage::Label("$1.990 (x kg $4.975)"),
    )]);

    assert_eq!(refresher.scrape_one("https://shop.example/lomo").await, UnitPrice::Found(4975));
    assert_eq!(refresher.scrape_one("https://shop.example/missing").await, UnitPrice::NotFound);
    assert_eq!(log.launches(), 2);
    assert_eq!(log.closes(), 2);

    Ok(())
}

#[test]
fn test_extraction_examples() {
    let extractor = PriceExtractor::new();

    assert_eq!(extractor.extract("$500 (x kg $2.500)"), UnitPrice::Found(2500));
    assert_eq!(extractor.extract("(x kg $4.975)"), UnitPrice::Found(4975));
    assert_eq!(extractor.extract("x kg 100"), UnitPrice::NotFound);
    assert_eq!(extractor.extract("(x kg)"), UnitPrice::NotFound);
}

#[test]
fn test_default_configuration() {
    let config = AppConfig::default();
    tokio_test::assert_ok!(config.check());

    assert_eq!(config.browser.element_timeout_secs, 20);
    assert_eq!(config.refresh.delay_ms, 2000);
    assert_eq!(config.sheet.worksheet, "Jumbo-info");
    assert_eq!(config.sheet.url_column, "URL");
}

#[test]
fn test_release_profile_unwinds_on_panic() {
    // A panicking render must unwind so the browser guard closes Chrome and
    // the batch carries on.
    let manifest = include_str!("../Cargo.toml");
    let release = manifest
        .split("[profile.release]")
        .nth(1)
        .and_then(|section| section.split("\n[").next())
        .unwrap();

    assert!(release.contains("panic = \"unwind\""));
    assert!(!release.contains("panic = \"abort\""));
}
