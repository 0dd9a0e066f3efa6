use super::*;
use kgprice_watcher::sheets::MemorySheet;
use kgprice_watcher::{SheetTable, UnitPrice};

#[tokio::test]
async fn test_batch_keeps_order_and_length() -> anyhow::Result<()> {
    let (refresher, log) = fake_refresher(&[
        ("https://shop.example/lomo", FakePage::Label("$1.990 (x kg $4.975)")),
        ("https://shop.example/pollo", FakePage::NeverShowsPrice),
        ("https://shop.example/cerdo", FakePage::Label("$500 (x kg $2.500)")),
        ("https://shop.example/pavo", FakePage::Unreachable),
        ("https://shop.example/queso", FakePage::Label("$3.200 (x kg)")),
    ]);

    let urls = strings(&[
        "https://shop.example/lomo",
        "https://shop.example/pollo",
        "https://shop.example/cerdo",
        "https://shop.example/pavo",
        "https://shop.example/queso",
        "https://shop.example/lomo",
    ]);
    let records = refresher.scrape_all(&urls).await;

    assert_eq!(records.len(), urls.len());
    for (record, url) in records.iter().zip(&urls) {
        assert_eq!(&record.url, url);
    }
    let prices: Vec<UnitPrice> = records.iter().map(|r| r.price).collect();
    assert_eq!(
        prices,
        vec![
            UnitPrice::Found(4975),
            UnitPrice::NotFound,
            UnitPrice::Found(2500),
            UnitPrice::NotFound,
            UnitPrice::NotFound,
            UnitPrice::Found(4975),
        ]
    );

    assert_eq!(log.visited(), urls);
    assert_eq!(log.launches(), 6);
    assert_eq!(log.closes(), 6);

    Ok(())
}

#[tokio::test]
async fn test_timeout_does_not_abort_batch() -> anyhow::Result<()> {
    let (refresher, log) = fake_refresher(&[
        ("https://shop.example/1", FakePage::NeverShowsPrice),
        ("https://shop.example/2", FakePage::Label("(x kg $7.490)")),
    ]);

    let records = refresher
        .scrape_all(&strings(&["https://shop.example/1", "https://shop.example/2"]))
        .await;

    assert_eq!(records[0].price.to_string(), "ERROR");
    assert_eq!(records[1].price, UnitPrice::Found(7490));
    assert_eq!(log.closes(), 2);

    Ok(())
}

#[tokio::test]
async fn test_full_sheet_refresh() -> anyhow::Result<()> {
    let (refresher, log) = fake_refresher(&[
        ("https://shop.example/lomo", FakePage::Label("$1.990 (x kg $4.975)")),
        ("https://shop.example/pollo", FakePage::Unreachable),
    ]);

    let sheet = MemorySheet::new(SheetTable::new(
        strings(&["Producto", "URL", "Precio x KG", "Ultima Actualizacion"]),
        vec![
            strings(&["Lomo vetado", "https://shop.example/lomo", "4800", "2026-10-01 09:00:00"]),
            strings(&["Sin enlace", "", "", ""]),
            strings(&["Pollo entero", "  https://shop.example/pollo  ", "2100", "2026-10-01 09:00:02"]),
        ],
    ));

    let summary = refresher.refresh_sheet(&sheet).await?;
    assert_eq!((summary.attempted, summary.found, summary.failed, summary.skipped), (2, 1, 1, 1));

    let table = sheet.snapshot().await;
    assert_eq!(table.header, strings(&["Producto", "URL", "Precio x KG", "Ultima Actualizacion"]));
    assert_eq!(table.rows.len(), 3);

    assert_eq!(table.cell(0, 0), "Lomo vetado");
    assert_eq!(table.cell(0, 2), "4975");
    assert_ne!(table.cell(0, 3), "2026-10-01 09:00:00");

    assert_eq!(table.rows[1], strings(&["Sin enlace", "", "", ""]));

    assert_eq!(table.cell(2, 1), "  https://shop.example/pollo  ");
    assert_eq!(table.cell(2, 2), "ERROR");
    assert!(chrono::NaiveDateTime::parse_from_str(table.cell(2, 3), "%Y-%m-%d %H:%M:%S").is_ok());

    assert_eq!(sheet.write_count().await, 1);
    assert_eq!(log.launches(), log.closes());

    Ok(())
}

#[tokio::test]
async fn test_sheet_without_url_column_is_left_alone() -> anyhow::Result<()> {
    let (refresher, log) = fake_refresher(&[]);
    let original = SheetTable::new(strings(&["Producto"]), vec![strings(&["Lomo"])]);
    let sheet = MemorySheet::new(original.clone());

    let result = refresher.refresh_sheet(&sheet).await;

    assert!(result.is_err());
    assert_eq!(sheet.snapshot().await, original);
    assert_eq!(sheet.write_count().await, 0);
    assert_eq!(log.launches(), 0);

    Ok(())
}
