use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use faultline_core::backend::ReportStore;
use faultline_core::models::{AggregationUpdate, ErrorAggregation, StatsDimension, StoredError};
use faultline_core::{FaultlineError, SqliteStateStore};

use super::harness::{TestHarness, bearer_token, decode_json, read_request, report_request};

/// Store that accepts writes but cannot answer aggregate queries.
struct StatsOutage {
    inner: SqliteStateStore,
}

impl ReportStore for StatsOutage {
    fn insert_report(&self, record: &StoredError) -> faultline_core::Result<()> {
        self.inner.insert_error_report(record)
    }

    fn upsert_aggregation(&self, update: &AggregationUpdate) -> faultline_core::Result<()> {
        self.inner.upsert_error_aggregation(update)
    }

    fn find_report(&self, id: &str) -> faultline_core::Result<Option<StoredError>> {
        self.inner.get_error_report(id)
    }

    fn find_aggregation(
        &self,
        fingerprint: &str,
    ) -> faultline_core::Result<Option<ErrorAggregation>> {
        self.inner.get_error_aggregation(fingerprint)
    }

    fn count_since(&self, _cutoff: DateTime<Utc>) -> faultline_core::Result<u64> {
        Err(FaultlineError::Persistence(
            "disk I/O error at /var/lib/faultline".to_string(),
        ))
    }

    fn count_by(
        &self,
        dimension: StatsDimension,
        cutoff: DateTime<Utc>,
    ) -> faultline_core::Result<BTreeMap<String, u64>> {
        self.inner.count_reports_by(dimension, cutoff)
    }

    fn top_errors(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> faultline_core::Result<Vec<ErrorAggregation>> {
        self.inner.top_error_groups(cutoff, limit)
    }

    fn ping(&self) -> faultline_core::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn reads_require_credentials() {
    let harness = TestHarness::setup();

    let missing = harness
        .send(read_request("198.51.100.7", "/error-reports", None))
        .await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    let body: Value = decode_json(missing).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let invalid = harness
        .send(read_request("198.51.100.7", "/error-reports", Some("not-a-jwt")))
        .await;
    assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);

    let token = bearer_token(&["write:reports"]);
    let forbidden = harness
        .send(read_request("198.51.100.7", "/error-reports", Some(&token)))
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    let body: Value = decode_json(forbidden).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn stats_are_returned_and_access_is_audited() {
    let harness = TestHarness::setup();
    for _ in 0..3 {
        let response = harness
            .send(report_request(
                "203.0.113.9",
                json!({ "message": "Timeout after 3000ms", "module": "search" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let token = bearer_token(&["read:error-stats"]);
    let response = harness
        .send(read_request(
            "198.51.100.7",
            "/error-reports?timeRange=7d",
            Some(&token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = decode_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["totalErrors"], 3);
    assert_eq!(body["data"]["recentErrorRate"], 3);
    assert_eq!(body["data"]["errorsByModule"]["search"], 3);
    assert_eq!(body["data"]["topErrors"][0]["count"], 3);

    let audit = harness.store.list_audit_records(1).expect("audit");
    assert_eq!(audit[0].event_type, "error_stats_accessed");
    assert_eq!(audit[0].actor_id.as_deref(), Some("dashboard"));
    assert_eq!(audit[0].actor_ip.as_deref(), Some("198.51.100.7"));
}

#[tokio::test]
async fn single_report_lookup_and_not_found() {
    let harness = TestHarness::setup();
    let created = harness
        .send(report_request(
            "203.0.113.9",
            json!({ "message": "boom", "module": "core" }),
        ))
        .await;
    let created: Value = decode_json(created).await;
    let error_id = created["data"]["errorId"].as_str().expect("id").to_string();
    let token = bearer_token(&["admin"]);

    let found = harness
        .send(read_request(
            "198.51.100.7",
            &format!("/error-reports?errorId={error_id}"),
            Some(&token),
        ))
        .await;
    assert_eq!(found.status(), StatusCode::OK);
    let body: Value = decode_json(found).await;
    assert_eq!(body["data"]["id"], error_id.as_str());
    assert_eq!(body["data"]["environment"], "production");

    let missing = harness
        .send(read_request(
            "198.51.100.7",
            "/error-reports?errorId=00000000-0000-4000-8000-000000000000",
            Some(&token),
        ))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = decode_json(missing).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn api_key_grants_read_access() {
    let harness = TestHarness::setup();
    let issued = harness
        .store
        .create_api_key("ops", &["read:error-stats".to_string()], None, Utc::now())
        .expect("api key");

    let mut request = read_request("198.51.100.7", "/error-reports", None);
    request.headers_mut().insert(
        "x-api-key",
        axum::http::HeaderValue::from_str(&issued.api_key).expect("header"),
    );
    let response = harness.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = decode_json(response).await;
    assert_eq!(body["data"]["totalErrors"], 0);
    assert_eq!(body["data"]["topErrors"], json!([]));
}

#[tokio::test]
async fn storage_failure_on_stats_is_a_generic_500() {
    let harness = TestHarness::setup_with_report_store(|store| {
        Arc::new(StatsOutage {
            inner: store.clone(),
        })
    });
    let token = bearer_token(&["read:error-stats"]);

    let response = harness
        .send(read_request("198.51.100.7", "/error-reports", Some(&token)))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = decode_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "PERSISTENCE_ERROR");
    assert_eq!(body["error"]["message"], "storage operation failed");
    assert!(!body.to_string().contains("/var/lib/faultline"));
    assert!(harness.store.list_audit_records(10).expect("audit").is_empty());
}
