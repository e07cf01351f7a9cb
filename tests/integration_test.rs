// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Integration tests for the block checker HTTP surface.

mod common;

use axum::http::StatusCode;
use common::{app, app_with, domains, get_json, post_check, post_raw, test_config, FlakyStore, ScriptedLookup};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_check_preserves_order_and_input() {
    let app = app(1000).await;

    let (status, body) = post_check(
        &app,
        Some("198.51.100.1"),
        json!({ "domains": ["good.com", "bad.com", "Good.com", "good.com", "missing.org"] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 5);

    let urls: Vec<&str> = results.iter().map(|r| r["originalUrl"].as_str().unwrap()).collect();
    assert_eq!(urls, vec!["good.com", "bad.com", "Good.com", "good.com", "missing.org"]);

    assert_eq!(results[0], json!({ "originalUrl": "good.com", "status": "Not Blocked", "blocked": false, "error": false }));
    assert_eq!(results[1], json!({ "originalUrl": "bad.com", "status": "Blocked", "blocked": true, "error": false }));
    assert_eq!(results[4]["status"], "Error: Invalid response");
    assert_eq!(results[4]["error"], true);

    assert_eq!(body["remaining"], 995);
    assert!(body["resetTime"].is_i64());
}

#[tokio::test]
async fn test_validation_errors() {
    let app = app(1000).await;

    let (status, body) = post_check(&app, None, json!({ "domains": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No domains provided" }));

    let (status, body) = post_check(&app, None, json!({ "domains": domains(101) })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Maximum 100 domains per request" }));

    let (status, body) = post_check(&app, None, json!({ "domains": "a.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Domains must be an array" }));

    let (status, body) = post_raw(&app, "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid JSON body" }));

    // Rejected requests leave no trace in the statistics.
    let (_, stats) = get_json(&app, "/stats/data").await;
    assert_eq!(stats["totalRequests"], 0);
    assert_eq!(stats["uniqueUsers"], 0);
}

#[tokio::test]
async fn test_rate_limit_rejects_without_checking() {
    let app = app(5).await;
    let client = Some("203.0.113.9");

    let (status, body) = post_check(&app, client, json!({ "domains": domains(3) })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remaining"], 2);
    let reset_time = body["resetTime"].as_i64().unwrap();

    let (status, body) = post_check(&app, client, json!({ "domains": domains(3) })).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["remaining"], 2);
    assert_eq!(body["resetTime"].as_i64().unwrap(), reset_time);
    assert_eq!(
        body["error"],
        "Rate limit exceeded. You can check up to 5 domains every 10 minutes."
    );
    assert!(body.get("results").is_none());

    let (status, body) = post_check(&app, client, json!({ "domains": domains(2) })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remaining"], 0);
    assert_eq!(body["resetTime"].as_i64().unwrap(), reset_time);

    // Another client has its own window.
    let (status, _) = post_check(&app, Some("203.0.113.10"), json!({ "domains": domains(5) })).await;
    assert_eq!(status, StatusCode::OK);

    let (_, stats) = get_json(&app, "/stats/data").await;
    assert_eq!(stats["totalRequests"], 4);
    assert_eq!(stats["totalDomainsChecked"], 10);
    assert_eq!(stats["uniqueUsers"], 2);
}

#[tokio::test]
async fn test_full_quota_in_one_request() {
    let mut config = test_config(1000);
    config.checker.max_domains_per_request = 1000;
    let app = app_with(
        config,
        Arc::new(blockcheck::SurrealStore::memory().await.unwrap()),
        ScriptedLookup { failing: false },
    );

    let (status, body) = post_check(&app, Some("192.0.2.1"), json!({ "domains": domains(1000) })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remaining"], 0);
    assert_eq!(body["results"].as_array().unwrap().len(), 1000);

    let (status, body) = post_check(&app, Some("192.0.2.1"), json!({ "domains": ["one-more.com"] })).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["remaining"], 0);
}

#[tokio::test]
async fn test_missing_header_uses_unknown_client() {
    let app = app(4).await;

    let (status, _) = post_check(&app, None, json!({ "domains": domains(3) })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post_check(&app, None, json!({ "domains": domains(3) })).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (_, stats) = get_json(&app, "/stats/data").await;
    assert_eq!(stats["uniqueUsers"], 1);
}

#[tokio::test]
async fn test_api_failure_is_reported_per_domain() {
    let app = app_with(
        test_config(1000),
        Arc::new(blockcheck::SurrealStore::memory().await.unwrap()),
        ScriptedLookup { failing: true },
    );

    let (status, body) = post_check(&app, Some("192.0.2.2"), json!({ "domains": ["a.com", "b.com", "c.com"] })).await;
    assert_eq!(status, StatusCode::OK);
    for result in body["results"].as_array().unwrap() {
        assert_eq!(result["status"], "Error: API request failed");
        assert_eq!(result["error"], true);
        assert_eq!(result["blocked"], false);
    }

    let (_, stats) = get_json(&app, "/stats/data").await;
    assert_eq!(stats["errorDomains"], 3);
    assert_eq!(stats["blockedDomains"], 0);
}

#[tokio::test]
async fn test_stats_data_shape() {
    let app = app(1000).await;

    post_check(&app, Some("10.1.0.1"), json!({ "domains": ["bad.com", "good.com", "missing.net"] })).await;
    post_check(&app, Some("10.1.0.2"), json!({ "domains": ["bad.org"] })).await;
    post_check(&app, Some("10.1.0.1"), json!({ "domains": ["good.org"] })).await;

    let (status, stats) = get_json(&app, "/stats/data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalRequests"], 3);
    assert_eq!(stats["totalDomainsChecked"], 5);
    assert_eq!(stats["blockedDomains"], 2);
    assert_eq!(stats["notBlockedDomains"], 2);
    assert_eq!(stats["errorDomains"], 1);
    assert_eq!(stats["uniqueUsers"], 2);
    assert!(stats["lastReset"].is_string());
}

#[tokio::test]
async fn test_concurrent_checks_lose_no_updates() {
    let app = app(1000).await;

    let tasks: Vec<_> = (0..12)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let client = format!("172.16.0.{}", i % 4);
                post_check(
                    &app,
                    Some(&client),
                    json!({ "domains": ["bad.com", "good.com", "missing.io"] }),
                )
                .await
            })
        })
        .collect();
    for task in tasks {
        let (status, _) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    let (_, stats) = get_json(&app, "/stats/data").await;
    assert_eq!(stats["totalRequests"], 12);
    assert_eq!(stats["totalDomainsChecked"], 36);
    assert_eq!(stats["blockedDomains"], 12);
    assert_eq!(stats["notBlockedDomains"], 12);
    assert_eq!(stats["errorDomains"], 12);
    assert_eq!(stats["uniqueUsers"], 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checks_from_one_client_share_quota() {
    let app = app(1000).await;

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                post_check(&app, Some("172.16.1.1"), json!({ "domains": domains(100) })).await
            })
        })
        .collect();
    for task in tasks {
        let (status, _) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = post_check(&app, Some("172.16.1.1"), json!({ "domains": ["one.com"] })).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["remaining"], 0);
}

#[tokio::test]
async fn test_soft_store_failures_fail_open() {
    let store = Arc::new(FlakyStore::new(false, true).await);
    let app = app_with(test_config(10), store, ScriptedLookup { failing: false });

    for _ in 0..3 {
        let (status, body) = post_check(&app, Some("192.0.2.3"), json!({ "domains": domains(4) })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["remaining"], 6);
        assert_eq!(body["results"].as_array().unwrap().len(), 4);
    }
}

#[tokio::test]
async fn test_hard_store_failures_are_internal_errors() {
    let store = Arc::new(FlakyStore::new(true, false).await);
    let app = app_with(test_config(1000), store, ScriptedLookup { failing: false });

    let expected = json!({ "message": "Internal Server Error", "status": 500 });

    let (status, body) = get_json(&app, "/stats/data").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, expected);

    let (status, body) = post_check(&app, Some("192.0.2.4"), json!({ "domains": ["a.com"] })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, expected);
}

#[tokio::test]
async fn test_unmatched_route() {
    let app = app(1000).await;

    let (status, body) = get_json(&app, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "Not Found", "status": 404 }));
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = app(1000).await;

    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    post_check(&app, Some("10.2.0.1"), json!({ "domains": ["bad.com"] })).await;

    let response = tower::ServiceExt::oneshot(
        app.clone(),
        axum::http::Request::builder()
            .uri("/metrics")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains("blockcheck_check_requests_total{outcome=\"allowed\"} 1"));
    assert!(text.contains("blockcheck_domains_checked_total{result=\"blocked\"} 1"));
}
