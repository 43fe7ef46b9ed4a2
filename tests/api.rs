use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use tally::api::{create_router, App, RateLimiter};
use tally::store::MemoryStore;

fn server() -> TestServer {
    // budget 0 = throttle disabled
    server_with_budget(0)
}

fn server_with_budget(max_requests: usize) -> TestServer {
    let app = App::new(
        Arc::new(MemoryStore::new()),
        Arc::new(RateLimiter::new(max_requests, Duration::from_secs(60))),
    );

    TestServer::new(create_router(app)).expect("router should become a test server")
}

#[tokio::test]
async fn health_reports_ok() {
    let server = server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "ok" }));
}

#[tokio::test]
async fn fresh_counter_reads_zero() {
    let server = server();

    let response = server.get("/count/never-touched").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "key": "never-touched", "value": 0 }));
}

#[tokio::test]
async fn three_increments_show_up_in_the_snapshot() {
    let server = server();

    for expected in 1..=3 {
        let response = server.post("/count/home/increment").await;
        response.assert_status_ok();
        response.assert_json(&json!({ "key": "home", "value": expected }));
    }

    server
        .get("/count/home")
        .await
        .assert_json(&json!({ "key": "home", "value": 3 }));

    let counts: Value = server.get("/counts").await.json();
    assert_eq!(counts["home"], json!(3));
}

#[tokio::test]
async fn set_overwrites_the_counter() {
    let server = server();

    let response = server.put("/count/x").json(&json!({ "value": 7 })).await;
    response.assert_status_ok();
    response.assert_json(&json!({ "key": "x", "value": 7 }));

    server
        .get("/count/x")
        .await
        .assert_json(&json!({ "key": "x", "value": 7 }));
}

#[tokio::test]
async fn set_rejects_a_negative_value_and_keeps_the_previous_one() {
    let server = server();

    server.put("/count/x").json(&json!({ "value": 7 })).await;

    let response = server.put("/count/x").json(&json!({ "value": -1 })).await;
    response.assert_status_bad_request();

    server
        .get("/count/x")
        .await
        .assert_json(&json!({ "key": "x", "value": 7 }));
}

#[tokio::test]
async fn set_rejects_non_integer_values() {
    let server = server();

    server.put("/count/x").json(&json!({ "value": 7 })).await;

    for body in [
        json!({ "value": 1.5 }),
        json!({ "value": "three" }),
        json!({ "value": u64::MAX }),
        json!({}),
    ] {
        let response = server.put("/count/x").json(&body).await;
        response.assert_status_bad_request();

        let error: Value = response.json();
        assert!(error["error"].is_string(), "rejected body: {body}");
    }

    server
        .get("/count/x")
        .await
        .assert_json(&json!({ "key": "x", "value": 7 }));
}

#[tokio::test]
async fn reset_zeroes_the_counter() {
    let server = server();

    server.put("/count/x").json(&json!({ "value": 5 })).await;

    let response = server.delete("/count/x").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "key": "x", "value": 0 }));

    server
        .get("/count/x")
        .await
        .assert_json(&json!({ "key": "x", "value": 0 }));
}

#[tokio::test]
async fn clicks_feed_the_leaderboard() {
    let server = server();

    for _ in 0..2 {
        let response = server
            .post("/log-click")
            .json(&json!({ "cardTitle": "Ace" }))
            .await;
        response.assert_status(StatusCode::CREATED);
    }

    let board: Value = server.get("/leaderboard?minClicks=1").await.json();
    let entries = board.as_array().expect("leaderboard is an array");

    assert!(entries
        .iter()
        .any(|entry| entry["subject"] == json!("Ace") && entry["clicks"] == json!(2)));
}

#[tokio::test]
async fn leaderboard_filters_by_min_clicks() {
    let server = server();

    for _ in 0..2 {
        server
            .post("/log-click")
            .json(&json!({ "subject": "Ace" }))
            .await;
    }
    server
        .post("/log-click")
        .json(&json!({ "subject": "Jack" }))
        .await;

    let board: Value = server.get("/leaderboard?minClicks=2").await.json();
    let entries = board.as_array().expect("leaderboard is an array");

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["subject"], json!("Ace"));
}

#[tokio::test]
async fn log_click_returns_the_created_record() {
    let server = server();

    let response = server
        .post("/log-click")
        .json(&json!({ "subject": "  Ace  " }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let event: Value = response.json();
    assert_eq!(event["subject"], json!("Ace"), "subject is trimmed");
    assert!(event["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(event["timestamp"].is_string());
}

#[tokio::test]
async fn log_click_rejects_a_blank_subject() {
    let server = server();

    let response = server
        .post("/log-click")
        .json(&json!({ "subject": "   " }))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn log_click_rejects_a_malformed_body() {
    let server = server();

    for body in [json!({}), json!({ "subject": 5 })] {
        let response = server.post("/log-click").json(&body).await;
        response.assert_status_bad_request();
    }
}

#[tokio::test]
async fn log_click_rejects_an_oversized_subject() {
    let server = server();

    let response = server
        .post("/log-click")
        .json(&json!({ "subject": "x".repeat(256) }))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn analytics_reports_totals_and_range() {
    let server = server();

    for _ in 0..2 {
        server
            .post("/log-click")
            .json(&json!({ "subject": "Ace" }))
            .await;
    }

    let analytics: Value = server.get("/analytics/Ace").await.json();
    assert_eq!(analytics["subject"], json!("Ace"));
    assert_eq!(analytics["total"], json!(2));
    assert_eq!(analytics["recent"].as_array().map(Vec::len), Some(2));
    assert!(analytics["first"].is_string());
    assert!(analytics["last"].is_string());
}

#[tokio::test]
async fn analytics_of_an_unknown_subject_is_empty() {
    let server = server();

    let analytics: Value = server.get("/analytics/ghost").await.json();
    assert_eq!(analytics["total"], json!(0));
    assert_eq!(analytics["first"], Value::Null);
}

#[tokio::test]
async fn unmatched_routes_get_a_json_404() {
    let server = server();

    let response = server.get("/no-such-route").await;
    response.assert_status_not_found();

    let body: Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn requests_beyond_the_budget_are_throttled() {
    let server = server_with_budget(2);

    server.get("/health").await.assert_status_ok();
    server.get("/health").await.assert_status_ok();

    let response = server.get("/health").await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);

    let body: Value = response.json();
    assert!(body["error"].is_string());
}
