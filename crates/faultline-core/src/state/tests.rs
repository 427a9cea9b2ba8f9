use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use tempfile::tempdir;

use crate::models::{Category, Environment, ErrorReport, Severity};

use super::*;

fn open_store() -> (tempfile::TempDir, SqliteStateStore) {
    let temp = tempdir().expect("tempdir");
    let store = SqliteStateStore::open(temp.path().join("faultline.sqlite3")).expect("open failed");
    (temp, store)
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, hour, minute, 0)
        .single()
        .expect("timestamp")
}

fn stored(id: &str, fingerprint: &str, report: &ErrorReport, now: DateTime<Utc>) -> StoredError {
    StoredError::from_report(
        id.to_string(),
        report,
        fingerprint.to_string(),
        Some("203.0.113.9".to_string()),
        None,
        now,
    )
}

fn update(fingerprint: &str, seen_at: DateTime<Utc>) -> AggregationUpdate {
    AggregationUpdate {
        fingerprint: fingerprint.to_string(),
        message: "db timeout".to_string(),
        module: "billing".to_string(),
        severity: Severity::High,
        category: Category::Database,
        seen_at,
    }
}

#[test]
fn report_round_trips_through_storage() {
    let (_temp, store) = open_store();
    let mut report = ErrorReport::new("db timeout", "billing")
        .with_severity(Severity::High)
        .with_category(Category::Database)
        .with_function("charge");
    report.tags = vec!["payments".to_string()];
    report
        .additional_data
        .insert("attempt".to_string(), serde_json::json!(3));
    let record = stored("r-1", "abc123", &report, at(10, 0));

    store.insert_error_report(&record).expect("insert");
    let loaded = store
        .get_error_report("r-1")
        .expect("get")
        .expect("present");

    assert_eq!(loaded, record);
    assert_eq!(loaded.environment, Environment::Production);
    assert!(store.get_error_report("missing").expect("get").is_none());
}

#[test]
fn aggregation_upsert_increments_and_widens_seen_bounds() {
    let (_temp, store) = open_store();
    store.upsert_error_aggregation(&update("fp", at(10, 5))).expect("first");
    store.upsert_error_aggregation(&update("fp", at(10, 0))).expect("older");
    store.upsert_error_aggregation(&update("fp", at(10, 9))).expect("newer");

    let aggregation = store
        .get_error_aggregation("fp")
        .expect("get")
        .expect("present");
    assert_eq!(aggregation.count, 3);
    assert_eq!(aggregation.first_seen, at(10, 0));
    assert_eq!(aggregation.last_seen, at(10, 9));
}

#[test]
fn concurrent_upserts_do_not_lose_updates() {
    let (_temp, store) = open_store();
    std::thread::scope(|scope| {
        for worker in 0..8 {
            let store = store.clone();
            scope.spawn(move || {
                for step in 0..5 {
                    store
                        .upsert_error_aggregation(&update("shared", at(11, worker * 5 + step)))
                        .expect("upsert");
                }
            });
        }
    });

    let aggregation = store
        .get_error_aggregation("shared")
        .expect("get")
        .expect("present");
    assert_eq!(aggregation.count, 40);
    assert!(aggregation.last_seen >= aggregation.first_seen);
}

#[test]
fn grouped_counts_respect_the_cutoff() {
    let (_temp, store) = open_store();
    let api = ErrorReport::new("bad gateway", "edge").with_category(Category::Api);
    let db = ErrorReport::new("deadlock", "ledger")
        .with_category(Category::Database)
        .with_severity(Severity::Critical);

    store
        .insert_error_report(&stored("old", "f-api", &api, at(1, 0)))
        .expect("old");
    store
        .insert_error_report(&stored("a-1", "f-api", &api, at(9, 0)))
        .expect("a-1");
    store
        .insert_error_report(&stored("d-1", "f-db", &db, at(9, 30)))
        .expect("d-1");

    let cutoff = at(8, 0);
    assert_eq!(store.count_reports_since(cutoff).expect("count"), 2);

    let by_category = store
        .count_reports_by(StatsDimension::Category, cutoff)
        .expect("category");
    assert_eq!(by_category.get("api"), Some(&1));
    assert_eq!(by_category.get("database"), Some(&1));

    let by_severity = store
        .count_reports_by(StatsDimension::Severity, cutoff)
        .expect("severity");
    assert_eq!(by_severity.get("critical"), Some(&1));
    assert_eq!(by_severity.get("medium"), Some(&1));

    let empty = store
        .count_reports_by(StatsDimension::Module, at(12, 0))
        .expect("module");
    assert!(empty.is_empty());
}

#[test]
fn top_error_groups_order_by_count() {
    let (_temp, store) = open_store();
    let rare = ErrorReport::new("rare", "a");
    let common = ErrorReport::new("common", "b");
    store
        .insert_error_report(&stored("r-1", "f-rare", &rare, at(9, 0)))
        .expect("rare");
    for minute in 0..3 {
        store
            .insert_error_report(&stored(
                &format!("c-{minute}"),
                "f-common",
                &common,
                at(9, 10 + minute),
            ))
            .expect("common");
    }

    let top = store.top_error_groups(at(8, 0), 10).expect("top");
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].fingerprint, "f-common");
    assert_eq!(top[0].count, 3);
    assert_eq!(top[0].first_seen, at(9, 10));
    assert_eq!(top[0].last_seen, at(9, 12));
    assert_eq!(top[1].fingerprint, "f-rare");

    let limited = store.top_error_groups(at(8, 0), 1).expect("limited");
    assert_eq!(limited.len(), 1);
}

#[test]
fn rate_limit_allows_budget_then_rejects_until_window_resets() {
    let (_temp, store) = open_store();
    let window = StdDuration::from_secs(60);
    let start = 1_000_000;

    for request in 1..=30 {
        let decision = store
            .check_and_increment_at("error-reporting:203.0.113.9", 30, window, start + request)
            .expect("check");
        assert!(decision.allowed, "request {request}");
        assert_eq!(decision.remaining, 30 - u32::try_from(request).expect("small"));
    }

    let rejected = store
        .check_and_increment_at("error-reporting:203.0.113.9", 30, window, start + 31)
        .expect("check");
    assert!(!rejected.allowed);
    assert_eq!(rejected.remaining, 0);
    assert!(rejected.reset_after <= window);

    let other = store
        .check_and_increment_at("error-reporting:198.51.100.1", 30, window, start + 31)
        .expect("check");
    assert!(other.allowed);

    let reopened = store
        .check_and_increment_at("error-reporting:203.0.113.9", 30, window, start + 60_001)
        .expect("check");
    assert!(reopened.allowed);
    assert_eq!(reopened.remaining, 29);
}

#[test]
fn audit_records_are_listed_newest_first() {
    let (_temp, store) = open_store();
    let report = ErrorReport::new("boom", "core");
    store
        .append_audit_record(&AuditRecord::error_reported(
            "r-1",
            "fp",
            &report,
            Some("user-7"),
            Some("203.0.113.9"),
            at(9, 0),
        ))
        .expect("append");
    store
        .append_audit_record(&AuditRecord::stats_accessed(
            "svc",
            None,
            None,
            Some("24h"),
            at(9, 5),
        ))
        .expect("append");

    let records = store.list_audit_records(10).expect("list");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].event_type, "error_stats_accessed");
    assert_eq!(records[1].event_type, "error_reported");
    assert_eq!(records[1].actor_type, "user");
    assert_eq!(records[1].event_data["fingerprint"], "fp");
}

#[test]
fn api_keys_verify_by_hash_and_expire() {
    let (_temp, store) = open_store();
    let now = at(9, 0);
    let issued = store
        .create_api_key("ci", &["read:error-stats".to_string()], Some(1), now)
        .expect("create");

    assert_eq!(issued.api_key.len(), 64);
    assert!(issued.api_key.starts_with(&issued.key_prefix));
    assert_eq!(issued.expires_at, Some(now + Duration::days(1)));

    let principal = store
        .lookup_api_key(&issued.api_key, now)
        .expect("lookup")
        .expect("valid");
    assert_eq!(principal.name, "ci");
    assert_eq!(principal.permissions, vec!["read:error-stats".to_string()]);

    assert!(store.lookup_api_key("not-a-key", now).expect("lookup").is_none());
    assert!(
        store
            .lookup_api_key(&issued.api_key, now + Duration::days(2))
            .expect("lookup")
            .is_none()
    );
}

#[test]
fn api_key_creation_rejects_blank_names() {
    let (_temp, store) = open_store();
    let err = store
        .create_api_key("  ", &[], None, at(9, 0))
        .expect_err("blank name");
    assert!(matches!(err, FaultlineError::Validation(_)));
}

#[test]
fn ping_succeeds_on_open_store() {
    let (_temp, store) = open_store();
    store.ping().expect("ping");
}

#[cfg(unix)]
#[test]
fn open_hardens_state_db_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("faultline.sqlite3");
    let _store = SqliteStateStore::open(&db_path).expect("open failed");

    let mode = std::fs::metadata(&db_path)
        .expect("metadata")
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o600);
}
