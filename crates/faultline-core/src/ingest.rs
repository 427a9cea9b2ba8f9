use std::time::Instant;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::backend::ReportStore;
use crate::effects::{EffectDispatcher, SideEffect};
use crate::error::{ErrorKind, FaultlineError, Result};
use crate::fingerprint::fingerprint;
use crate::models::{
    AggregationUpdate, AuditRecord, CriticalAlert, ErrorReport, RawErrorReport, Severity,
    StoredError,
};
use crate::validate::validate_report;

/// Request-derived facts that are not part of the report body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub error_id: String,
    pub fingerprint: String,
}

/// Write path: validate, fingerprint, persist, aggregate, then hand off the
/// best-effort effects.
///
/// The occurrence insert and the aggregate upsert are two independent writes.
/// If the upsert fails after the insert succeeded, the occurrence stays stored
/// without a matching aggregate bump and the call still fails; statistics are
/// computed from occurrences, so they remain correct.
pub struct IngestPipeline<'a> {
    store: &'a dyn ReportStore,
    effects: &'a dyn EffectDispatcher,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(store: &'a dyn ReportStore, effects: &'a dyn EffectDispatcher) -> Self {
        Self { store, effects }
    }

    pub fn ingest(&self, raw: RawErrorReport, context: &IngestContext) -> Result<IngestReceipt> {
        self.ingest_at(raw, context, Utc::now())
    }

    pub fn ingest_at(
        &self,
        raw: RawErrorReport,
        context: &IngestContext,
        now: DateTime<Utc>,
    ) -> Result<IngestReceipt> {
        let report = validate_report(raw).map_err(FaultlineError::InvalidReport)?;
        self.ingest_report_at(&report, context, now)
    }

    pub fn ingest_report_at(
        &self,
        report: &ErrorReport,
        context: &IngestContext,
        now: DateTime<Utc>,
    ) -> Result<IngestReceipt> {
        let started = Instant::now();
        let now = now.trunc_subsecs(3);
        let fingerprint = fingerprint(report);
        let error_id = Uuid::new_v4().to_string();

        let mut record = StoredError::from_report(
            error_id.clone(),
            report,
            fingerprint.clone(),
            context.ip_address.clone(),
            context.user_agent.as_deref(),
            now,
        );
        record.reported_at = record.reported_at.trunc_subsecs(3);

        self.store
            .insert_report(&record)
            .map_err(|err| log_persistence_failure("store error report", &fingerprint, err))?;

        self.store
            .upsert_aggregation(&AggregationUpdate {
                fingerprint: fingerprint.clone(),
                message: report.message.clone(),
                module: report.module.clone(),
                severity: report.severity,
                category: report.category,
                seen_at: now,
            })
            .map_err(|err| log_persistence_failure("update error aggregation", &fingerprint, err))?;

        self.effects.dispatch(SideEffect::Audit(AuditRecord::error_reported(
            &error_id,
            &fingerprint,
            report,
            report.user_id.as_deref(),
            context.ip_address.as_deref(),
            now,
        )));

        if report.severity == Severity::Critical {
            self.effects.dispatch(SideEffect::Escalate(CriticalAlert {
                error_id: error_id.clone(),
                fingerprint: fingerprint.clone(),
                message: report.message.clone(),
                module: report.module.clone(),
                category: report.category.as_str().to_string(),
                reported_at: record.reported_at,
            }));
        }

        tracing::info!(
            error_id = %error_id,
            fingerprint = %fingerprint,
            severity = report.severity.as_str(),
            category = report.category.as_str(),
            module = %report.module,
            duration_ms = started.elapsed().as_millis(),
            "error report ingested"
        );

        Ok(IngestReceipt {
            error_id,
            fingerprint,
        })
    }
}

fn log_persistence_failure(step: &str, fingerprint: &str, err: FaultlineError) -> FaultlineError {
    tracing::error!(step, fingerprint, error = %err, "error report ingestion failed");
    if err.kind() == ErrorKind::Persistence {
        err
    } else {
        FaultlineError::persistence(step, err)
    }
}
