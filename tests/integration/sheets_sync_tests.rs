use super::*;
use kgprice_watcher::auth::StaticToken;
use kgprice_watcher::sheets::GoogleSheetsStore;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RANGE_PATH: &str = "/v4/spreadsheets/precios-gm/values/'Jumbo-info'";

#[tokio::test]
async fn test_refresh_against_sheets_api() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(RANGE_PATH))
        .and(header("authorization", "Bearer sheet-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "range": "'Jumbo-info'!A1:D3",
            "majorDimension": "ROWS",
            "values": [
                ["Producto", "URL", "Precio x KG"],
                ["Lomo", "https://shop.example/lomo", "4800"],
                ["Pollo", "https://shop.example/pollo"]
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("{}:clear", RANGE_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "spreadsheetId": "precios-gm",
            "clearedRange": "'Jumbo-info'!A1:D3"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(RANGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "spreadsheetId": "precios-gm",
            "updatedRows": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = GoogleSheetsStore::new(
        reqwest::Client::new(),
        &format!("{}/v4", server.uri()),
        "precios-gm",
        "Jumbo-info",
        Arc::new(StaticToken::new("sheet-token")),
    )?;

    let (refresher, _log) = fake_refresher(&[
        ("https://shop.example/lomo", FakePage::Label("$1.990 (x kg $4.975)")),
        ("https://shop.example/pollo", FakePage::NeverShowsPrice),
    ]);

    let summary = refresher.refresh_sheet(&store).await?;
    assert_eq!(summary.found, 1);
    assert_eq!(summary.failed, 1);

    let requests = server.received_requests().await.unwrap();
    let methods: Vec<String> = requests.iter().map(|r| r.method.to_string()).collect();
    assert_eq!(methods, vec!["GET", "POST", "PUT"]);

    let written: serde_json::Value = serde_json::from_slice(&requests[2].body)?;
    let values = written["values"].as_array().unwrap();
    assert_eq!(values.len(), 3);
    assert_eq!(
        values[0],
        serde_json::json!(["Producto", "URL", "Precio x KG", "Ultima Actualizacion"])
    );
    assert_eq!(values[1][0], "Lomo");
    assert_eq!(values[1][2], "4975");
    assert_eq!(values[2][0], "Pollo");
    assert_eq!(values[2][2], "ERROR");

    Ok(())
}

#[tokio::test]
async fn test_clear_failure_propagates() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "values": [["URL"], ["https://shop.example/lomo"]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("RATE_LIMIT_EXCEEDED"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = GoogleSheetsStore::new(
        reqwest::Client::new(),
        &server.uri(),
        "precios-gm",
        "Jumbo-info",
        Arc::new(StaticToken::new("sheet-token")),
    )?;
    let (refresher, _log) = fake_refresher(&[(
        "https://shop.example/lomo",
        FakePage::Label("(x kg $4.975)"),
    )]);

    let err = refresher.refresh_sheet(&store).await.unwrap_err();
    assert!(err.to_string().contains("429"));

    Ok(())
}
