//! Integration tests for `FuelFinderClient` using wiremock HTTP mocks.

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use fuelfinder_client::{ClientError, Credentials, FuelFinderClient, ResourceKind};
use fuelfinder_core::{Station, StationPrices};
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> FuelFinderClient {
    FuelFinderClient::with_base_url(
        Credentials::new("test-id", "test-secret"),
        30,
        "fuelfinder-test",
        base_url,
    )
    .expect("client construction should not fail")
}

fn token_body(access: &str, expires_in: i64) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "message": "ok",
        "data": {
            "access_token": access,
            "token_type": "Bearer",
            "expires_in": expires_in,
            "refresh_token": "refresh-1"
        }
    })
}

async fn mount_auth(server: &MockServer, access: &str, expires_in: i64) {
    Mock::given(method("POST"))
        .and(path("/oauth/generate_access_token"))
        .and(body_json(serde_json::json!({
            "client_id": "test-id",
            "client_secret": "test-secret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access, expires_in)))
        .mount(server)
        .await;
}

fn station(node_id: &str) -> serde_json::Value {
    serde_json::json!({
        "node_id": node_id,
        "trading_name": "TEST STATION",
        "brand_name": "SHELL",
        "location": {
            "address_line_1": "1 High Street",
            "city": "Testville",
            "country": "England",
            "postcode": "AB1 2CD",
            "latitude": 51.5,
            "longitude": -0.1
        }
    })
}

fn price_group(node_id: &str, price: f64) -> serde_json::Value {
    serde_json::json!({
        "node_id": node_id,
        "trading_name": "TEST STATION",
        "fuel_prices": [
            {"fuel_type": "E10", "price": price, "price_last_updated": "2025-01-01T10:00:00Z"}
        ]
    })
}

fn envelope(data: Vec<serde_json::Value>, batch: u32, total: u32) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "message": "ok",
        "data": data,
        "metadata": {
            "batch_number": batch,
            "batch_size": 500,
            "total_batches": total,
            "cached": false
        }
    })
}

/// Sink that records batch sizes and reports every record as processed.
fn counting_sink<T>(
    seen: &Arc<Mutex<Vec<usize>>>,
) -> impl FnMut(Vec<T>) -> std::future::Ready<Result<usize, std::io::Error>> {
    let seen = Arc::clone(seen);
    move |batch: Vec<T>| {
        seen.lock().expect("lock").push(batch.len());
        std::future::ready(Ok(batch.len()))
    }
}

#[tokio::test]
async fn authenticate_succeeds_and_records_expiry() {
    let server = MockServer::start().await;
    mount_auth(&server, "token-1", 3600).await;

    let client = test_client(&server.uri());
    client.authenticate().await.expect("auth should succeed");

    let expires_at = client.token_expires_at().await.expect("token held");
    assert!(expires_at > Utc::now() + Duration::minutes(55));
}

#[tokio::test]
async fn authenticate_rejected_by_success_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/generate_access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "message": "invalid client credentials"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.authenticate().await.expect_err("auth should fail");
    assert!(
        matches!(err, ClientError::Authentication(ref m) if m == "invalid client credentials"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn authenticate_rejected_by_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/generate_access_token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.authenticate().await.expect_err("auth should fail");
    assert!(matches!(err, ClientError::Authentication(_)), "got {err:?}");
}

#[tokio::test]
async fn stations_stop_on_empty_batch() {
    let server = MockServer::start().await;
    mount_auth(&server, "token-1", 3600).await;

    Mock::given(method("GET"))
        .and(path("/pfs"))
        .and(query_param("batch-number", "1"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![station("a"), station("b")]),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pfs"))
        .and(query_param("batch-number", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let summary = client
        .fetch_stations(counting_sink::<Station>(&seen))
        .await
        .expect("fetch should succeed");

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.processed, 2);
    assert_eq!(*seen.lock().expect("lock"), vec![2, 0]);
    assert_eq!(
        client.watermark(ResourceKind::Stations).await,
        Some(summary.started_at)
    );
}

#[tokio::test]
async fn stations_stop_on_http_400() {
    let server = MockServer::start().await;
    mount_auth(&server, "token-1", 3600).await;

    Mock::given(method("GET"))
        .and(path("/pfs"))
        .and(query_param("batch-number", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![station("a")]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pfs"))
        .and(query_param("batch-number", "2"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let summary = client
        .fetch_stations(counting_sink::<Station>(&seen))
        .await
        .expect("400 ends pagination without error");

    assert_eq!(summary.batches, 1);
    assert_eq!(summary.processed, 1);
}

#[tokio::test]
async fn non_400_error_status_is_fatal_and_keeps_watermark() {
    let server = MockServer::start().await;
    mount_auth(&server, "token-1", 3600).await;

    Mock::given(method("GET"))
        .and(path("/pfs/fuel-prices"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let previous = Utc::now() - Duration::hours(1);
    client.seed_watermark(ResourceKind::Prices, previous).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let err = client
        .fetch_prices(counting_sink::<StationPrices>(&seen))
        .await
        .expect_err("503 should fail the cycle");

    assert!(
        matches!(err, ClientError::UnexpectedStatus { status: 503, .. }),
        "got {err:?}"
    );
    assert_eq!(client.last_updated().await, Some(previous));
}

#[tokio::test]
async fn prices_stop_after_declared_total() {
    let server = MockServer::start().await;
    mount_auth(&server, "token-1", 3600).await;

    for batch in 1..=2u32 {
        Mock::given(method("GET"))
            .and(path("/pfs/fuel-prices"))
            .and(query_param("batch-number", batch.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(envelope(vec![price_group("a", 139.9)], batch, 2)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/pfs/fuel-prices"))
        .and(query_param("batch-number", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![], 3, 2)))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let summary = client
        .fetch_prices(counting_sink::<StationPrices>(&seen))
        .await
        .expect("fetch should succeed");

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.processed, 2);
}

#[tokio::test]
async fn bare_price_array_keeps_paginating_until_empty() {
    let server = MockServer::start().await;
    mount_auth(&server, "token-1", 3600).await;

    Mock::given(method("GET"))
        .and(path("/pfs/fuel-prices"))
        .and(query_param("batch-number", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(vec![price_group("a", 139.9), price_group("b", 1.419)]),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pfs/fuel-prices"))
        .and(query_param("batch-number", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![price_group("c", 140.9)]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pfs/fuel-prices"))
        .and(query_param("batch-number", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let summary = client
        .fetch_prices(counting_sink::<StationPrices>(&seen))
        .await
        .expect("fetch should succeed");

    assert_eq!(*seen.lock().expect("lock"), vec![2, 1, 0]);
    assert_eq!(summary.processed, 3);
}

#[tokio::test]
async fn malformed_records_are_skipped_not_fatal() {
    let server = MockServer::start().await;
    mount_auth(&server, "token-1", 3600).await;

    let broken = serde_json::json!({"trading_name": "NO NODE ID", "fuel_prices": []});
    Mock::given(method("GET"))
        .and(path("/pfs/fuel-prices"))
        .and(query_param("batch-number", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(vec![price_group("a", 139.9), broken], 1, 1)),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let summary = client
        .fetch_prices(counting_sink::<StationPrices>(&seen))
        .await
        .expect("fetch should succeed");

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn fully_malformed_batch_does_not_end_the_cycle() {
    let server = MockServer::start().await;
    mount_auth(&server, "token-1", 3600).await;

    let broken = serde_json::json!({"trading_name": "NO NODE ID", "fuel_prices": []});
    Mock::given(method("GET"))
        .and(path("/pfs/fuel-prices"))
        .and(query_param("batch-number", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![broken], 1, 3)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pfs/fuel-prices"))
        .and(query_param("batch-number", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(vec![price_group("a", 139.9)], 2, 3)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pfs/fuel-prices"))
        .and(query_param("batch-number", "3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(vec![price_group("b", 141.9)], 3, 3)),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let summary = client
        .fetch_prices(counting_sink::<StationPrices>(&seen))
        .await
        .expect("fetch should succeed");

    assert_eq!(*seen.lock().expect("lock"), vec![0, 1, 1]);
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(
        client.watermark(ResourceKind::Prices).await,
        Some(summary.started_at)
    );
}

#[tokio::test]
async fn envelope_without_declared_total_paginates_until_400() {
    let server = MockServer::start().await;
    mount_auth(&server, "token-1", 3600).await;

    for batch in 1..=2u32 {
        Mock::given(method("GET"))
            .and(path("/pfs/fuel-prices"))
            .and(query_param("batch-number", batch.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": [price_group(&format!("node-{batch}"), 139.9)],
                "metadata": {"batch_number": batch, "batch_size": 500}
            })))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/pfs/fuel-prices"))
        .and(query_param("batch-number", "3"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let summary = client
        .fetch_prices(counting_sink::<StationPrices>(&seen))
        .await
        .expect("fetch should succeed");

    assert_eq!(*seen.lock().expect("lock"), vec![1, 1]);
    assert_eq!(summary.batches, 2);
}

#[tokio::test]
async fn second_cycle_sends_watermark_from_first_cycle_start() {
    let server = MockServer::start().await;
    mount_auth(&server, "token-1", 3600).await;

    Mock::given(method("GET"))
        .and(path("/pfs/fuel-prices"))
        .and(query_param("batch-number", "1"))
        .and(query_param_is_missing("effective-start-timestamp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![], 1, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let first = client
        .fetch_prices(counting_sink::<StationPrices>(&seen))
        .await
        .expect("first cycle succeeds");

    let expected = first.started_at.format("%Y-%m-%d %H:%M:%S").to_string();
    Mock::given(method("GET"))
        .and(path("/pfs/fuel-prices"))
        .and(query_param("batch-number", "1"))
        .and(query_param("effective-start-timestamp", expected.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![], 1, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let second = client
        .fetch_prices(counting_sink::<StationPrices>(&seen))
        .await
        .expect("second cycle succeeds");
    assert!(second.started_at >= first.started_at);
    assert_eq!(client.last_updated().await, Some(second.started_at));
}

#[tokio::test]
async fn sink_error_aborts_fetch_and_keeps_watermark() {
    let server = MockServer::start().await;
    mount_auth(&server, "token-1", 3600).await;

    Mock::given(method("GET"))
        .and(path("/pfs"))
        .and(query_param("batch-number", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![station("a")]))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .fetch_stations(|_batch: Vec<Station>| async {
            Err::<usize, _>(std::io::Error::other("database unavailable"))
        })
        .await
        .expect_err("sink failure should abort");

    assert!(
        matches!(err, ClientError::Sink { batch: 1, .. }),
        "got {err:?}"
    );
    assert!(client.watermark(ResourceKind::Stations).await.is_none());
}

#[tokio::test]
async fn short_lived_token_is_refreshed_before_request() {
    let server = MockServer::start().await;
    // 60 seconds is already inside the five-minute refresh margin.
    mount_auth(&server, "token-short", 60).await;

    Mock::given(method("POST"))
        .and(path("/oauth/regenerate_access_token"))
        .and(body_json(serde_json::json!({
            "client_id": "test-id",
            "refresh_token": "refresh-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("token-fresh", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/pfs"))
        .and(header("authorization", "Bearer token-fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    client.authenticate().await.expect("auth should succeed");

    let seen = Arc::new(Mutex::new(Vec::new()));
    client
        .fetch_stations(counting_sink::<Station>(&seen))
        .await
        .expect("fetch should succeed with refreshed token");
}

#[tokio::test]
async fn first_request_authenticates_lazily() {
    let server = MockServer::start().await;
    mount_auth(&server, "token-lazy", 3600).await;

    Mock::given(method("GET"))
        .and(path("/pfs"))
        .and(header("authorization", "Bearer token-lazy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let seen = Arc::new(Mutex::new(Vec::new()));
    client
        .fetch_stations(counting_sink::<Station>(&seen))
        .await
        .expect("fetch should authenticate on demand");
}
