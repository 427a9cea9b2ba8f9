use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request},
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::json;
use tower::util::ServiceExt;

use faultline_core::backend::{Escalator, ReportStore};
use faultline_core::config::JwtConfig;
use faultline_core::effects::{EffectTargets, InlineDispatcher};
use faultline_core::models::CriticalAlert;
use faultline_core::{ServiceConfig, SqliteStateStore};

use crate::{WebState, app_router};

pub(super) const JWT_SECRET: &str = "gateway-test-secret";

#[derive(Default)]
pub(super) struct RecordingEscalator {
    pub(super) alerts: Mutex<Vec<CriticalAlert>>,
}

impl Escalator for RecordingEscalator {
    fn escalate(&self, alert: &CriticalAlert) -> faultline_core::Result<()> {
        self.alerts.lock().expect("lock").push(alert.clone());
        Ok(())
    }
}

pub(super) struct TestHarness {
    _temp: tempfile::TempDir,
    pub(super) store: SqliteStateStore,
    pub(super) escalator: Arc<RecordingEscalator>,
    pub(super) router: Router,
}

impl TestHarness {
    pub(super) fn setup() -> Self {
        Self::setup_with_report_store(|store| Arc::new(store.clone()))
    }

    /// Same wiring as `setup`, but statistics and ingestion go through the
    /// store returned by `report_store`.
    pub(super) fn setup_with_report_store(
        report_store: impl FnOnce(&SqliteStateStore) -> Arc<dyn ReportStore>,
    ) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let store =
            SqliteStateStore::open(temp.path().join("faultline.sqlite3")).expect("open store");
        let escalator = Arc::new(RecordingEscalator::default());
        let dispatcher = InlineDispatcher::new(EffectTargets::new(
            Arc::new(store.clone()),
            escalator.clone(),
        ));
        let config = ServiceConfig {
            jwt: Some(JwtConfig {
                secret: JWT_SECRET.to_string(),
                issuer: None,
                audience: None,
            }),
            ..ServiceConfig::default()
        };
        let mut state = WebState::new(store.clone(), Arc::new(dispatcher), &config);
        state.store = report_store(&store);
        Self {
            _temp: temp,
            store,
            escalator,
            router: app_router(state),
        }
    }

    pub(super) async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    pub(super) fn escalation_count(&self) -> usize {
        self.escalator.alerts.lock().expect("lock").len()
    }
}

pub(super) async fn decode_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body bytes");
    serde_json::from_slice(&bytes).expect("decode json")
}

pub(super) fn header_value<'a>(headers: &'a HeaderMap, key: &str) -> Option<&'a str> {
    headers.get(key).and_then(|value| value.to_str().ok())
}

pub(super) fn bearer_token(permissions: &[&str]) -> String {
    let exp = Utc::now().timestamp() + 3600;
    encode(
        &Header::new(Algorithm::HS256),
        &json!({ "sub": "dashboard", "exp": exp, "permissions": permissions }),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode token")
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "tests usually pass temporary `json!` values directly"
)]
pub(super) fn report_request(ip: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/error-reports")
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(
            serde_json::to_vec(&body).expect("json request body"),
        ))
        .expect("json request")
}

pub(super) fn read_request(ip: &str, path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(path)
        .header("x-forwarded-for", ip);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("read request")
}

pub(super) fn method_request(ip: &str, method: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/error-reports")
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .expect("request")
}
