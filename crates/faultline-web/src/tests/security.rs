use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use serde_json::json;

use super::harness::{TestHarness, header_value, method_request, read_request, report_request};

fn assert_security_headers(response: &Response) {
    let headers = response.headers();
    assert_eq!(header_value(headers, "x-content-type-options"), Some("nosniff"));
    assert_eq!(header_value(headers, "x-frame-options"), Some("DENY"));
    assert_eq!(
        header_value(headers, "strict-transport-security"),
        Some("max-age=63072000; includeSubDomains; preload")
    );
    assert_eq!(header_value(headers, "x-xss-protection"), Some("1; mode=block"));
    assert_eq!(header_value(headers, "referrer-policy"), Some("no-referrer"));
    let csp = header_value(headers, "content-security-policy").expect("csp header");
    assert!(csp.contains("default-src 'none'"));
    assert!(csp.contains("frame-ancestors 'none'"));
}

#[tokio::test]
async fn every_outcome_carries_security_headers() {
    let harness = TestHarness::setup();

    let created = harness
        .send(report_request(
            "203.0.113.9",
            json!({ "message": "boom", "module": "core" }),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_security_headers(&created);

    let invalid = harness
        .send(report_request("203.0.113.9", json!({ "module": "core" })))
        .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    assert_security_headers(&invalid);

    let unauthorized = harness
        .send(read_request("203.0.113.9", "/error-reports", None))
        .await;
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
    assert_security_headers(&unauthorized);

    let options = harness.send(method_request("203.0.113.9", "OPTIONS")).await;
    assert_security_headers(&options);

    let not_allowed = harness.send(method_request("203.0.113.9", "PUT")).await;
    assert_security_headers(&not_allowed);
}

#[tokio::test]
async fn unknown_routes_carry_security_headers() {
    let harness = TestHarness::setup();
    let response = harness
        .send(
            Request::builder()
                .uri("/does-not-exist")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_security_headers(&response);
}
