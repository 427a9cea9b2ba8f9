use std::time::Instant;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};

use faultline_core::backend::{RateLimiter, ReportStore};
use faultline_core::effects::{EffectDispatcher, SideEffect};
use faultline_core::models::{AuditRecord, RawErrorReport};
use faultline_core::time_range::DEFAULT_TIME_RANGE;
use faultline_core::{FaultlineError, IngestContext, IngestPipeline, Result, StatsEngine};

use crate::WebState;
use crate::auth::{Authenticator, READ_ERROR_STATS};
use crate::dto::{
    ErrorReportsQuery, HealthResponse, HealthServices, ServiceHealth, SubmitResponse,
    SuccessEnvelope,
};
use crate::error::{ALLOWED_METHODS, faultline_error_response, method_not_allowed_response};
use crate::gateway::{UNKNOWN_CLIENT, client_ip, header_str, rate_limit_key};

const OPERATION_DISPATCH: &str = "error_reports.dispatch";
const OPERATION_SUBMIT: &str = "error_reports.submit";
const OPERATION_READ: &str = "error_reports.read";
const SUBMITTED_MESSAGE: &str = "Error report submitted successfully";

/// Single endpoint for every verb: the rate check runs first, then the method
/// picks the ingestion or statistics path.
pub async fn error_reports(
    State(state): State<WebState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ip = client_ip(&headers);
    if let Err(err) = check_rate_limit(&state, &ip) {
        return faultline_error_response(err, OPERATION_DISPATCH);
    }

    match method {
        Method::POST => submit_report(&state, &headers, &ip, &body),
        Method::GET => read_reports(&state, &headers, &ip, &uri),
        Method::OPTIONS => (StatusCode::OK, [(header::ALLOW, ALLOWED_METHODS)]).into_response(),
        other => method_not_allowed_response(&other, OPERATION_DISPATCH),
    }
}

pub async fn health(State(state): State<WebState>) -> Response {
    let started = Instant::now();
    let ping = state.store.ping();
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (status_code, status, database) = match ping {
        Ok(()) => (
            StatusCode::OK,
            "ok",
            ServiceHealth {
                status: "ok",
                latency_ms,
                error: None,
            },
        ),
        Err(err) => {
            tracing::error!(error = %err, "health check database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "error",
                ServiceHealth {
                    status: "error",
                    latency_ms,
                    error: Some(err.public_message()),
                },
            )
        }
    };

    let body = HealthResponse {
        status,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        version: env!("CARGO_PKG_VERSION"),
        environment: state.environment.as_str(),
        services: HealthServices { database },
    };
    (status_code, Json(body)).into_response()
}

fn check_rate_limit(state: &WebState, ip: &str) -> Result<()> {
    let key = rate_limit_key(ip);
    let decision = state.rate_limiter.check_and_increment(
        &key,
        state.rate_limit.requests,
        state.rate_limit.window,
    )?;
    if decision.allowed {
        return Ok(());
    }

    let reset_after = decision.reset_after;
    let retry_after_secs =
        (reset_after.as_secs() + u64::from(reset_after.subsec_nanos() > 0)).max(1);
    tracing::warn!(
        client_ip = ip,
        limit = decision.limit,
        retry_after_secs,
        "rate limit exceeded"
    );
    Err(FaultlineError::RateLimited {
        key,
        retry_after_secs,
    })
}

fn submit_report(state: &WebState, headers: &HeaderMap, ip: &str, body: &[u8]) -> Response {
    let raw = match RawErrorReport::from_json_slice(body) {
        Ok(raw) => raw,
        Err(err) => {
            return faultline_error_response(
                FaultlineError::Validation(format!("malformed JSON body: {err}")),
                OPERATION_SUBMIT,
            );
        }
    };

    let context = IngestContext {
        ip_address: known_client(ip),
        user_agent: header_str(headers, header::USER_AGENT.as_str()).map(ToString::to_string),
    };
    let pipeline = IngestPipeline::new(state.store.as_ref(), state.effects.as_ref());
    match pipeline.ingest(raw, &context) {
        Ok(receipt) => (
            StatusCode::CREATED,
            Json(SuccessEnvelope::new(SubmitResponse {
                error_id: receipt.error_id,
                message: SUBMITTED_MESSAGE,
            })),
        )
            .into_response(),
        Err(err) => faultline_error_response(err, OPERATION_SUBMIT),
    }
}

fn read_reports(state: &WebState, headers: &HeaderMap, ip: &str, uri: &Uri) -> Response {
    let now = Utc::now();
    let authenticator = Authenticator::new(state.jwt.as_deref(), state.api_keys.as_ref());
    let principal = match authenticator.require(headers, READ_ERROR_STATS, now) {
        Ok(principal) => principal,
        Err(err) => return faultline_error_response(err, OPERATION_READ),
    };

    let query = match Query::<ErrorReportsQuery>::try_from_uri(uri) {
        Ok(Query(query)) => query,
        Err(err) => {
            return faultline_error_response(
                FaultlineError::Validation(format!("invalid query string: {err}")),
                OPERATION_READ,
            );
        }
    };
    let engine = StatsEngine::new(state.store.as_ref(), state.cache.as_ref())
        .with_ttl(state.stats_cache_ttl);

    let error_id = query.error_id.as_deref().filter(|id| !id.is_empty());
    let time_range = query
        .time_range
        .as_deref()
        .filter(|range| !range.is_empty())
        .unwrap_or(DEFAULT_TIME_RANGE);

    let response = match error_id {
        Some(id) => engine
            .get_error_by_id(id)
            .map(|record| Json(SuccessEnvelope::new(record)).into_response()),
        None => engine
            .get_stats(time_range)
            .map(|stats| Json(SuccessEnvelope::new(stats)).into_response()),
    };

    match response {
        Ok(response) => {
            let ip_address = known_client(ip);
            state
                .effects
                .dispatch(SideEffect::Audit(AuditRecord::stats_accessed(
                    &principal.subject,
                    ip_address.as_deref(),
                    error_id,
                    error_id.is_none().then_some(time_range),
                    now,
                )));
            response
        }
        Err(err) => faultline_error_response(err, OPERATION_READ),
    }
}

fn known_client(ip: &str) -> Option<String> {
    (ip != UNKNOWN_CLIENT).then(|| ip.to_string())
}
