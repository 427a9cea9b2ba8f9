//! Best-effort side effects of ingestion and reads.
//!
//! Audit appends and critical escalations never decide the outcome of the
//! request that produced them. Dispatchers accept an effect and return
//! immediately from the caller's point of view; failures are logged here.

use std::sync::Arc;

use crate::backend::{AuditSink, Escalator};
use crate::error::Result;
use crate::models::{AuditRecord, CriticalAlert};

#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    Audit(AuditRecord),
    Escalate(CriticalAlert),
}

impl SideEffect {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Audit(_) => "audit",
            Self::Escalate(_) => "escalate",
        }
    }
}

pub trait EffectDispatcher: Send + Sync {
    fn dispatch(&self, effect: SideEffect);
}

/// Targets a dispatcher delivers effects to.
#[derive(Clone)]
pub struct EffectTargets {
    pub audit: Arc<dyn AuditSink>,
    pub escalator: Arc<dyn Escalator>,
}

impl std::fmt::Debug for EffectTargets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectTargets").finish_non_exhaustive()
    }
}

impl EffectTargets {
    pub fn new(audit: Arc<dyn AuditSink>, escalator: Arc<dyn Escalator>) -> Self {
        Self { audit, escalator }
    }

    /// Deliver one effect, logging and swallowing any failure.
    pub fn apply(&self, effect: &SideEffect) {
        let outcome = match effect {
            SideEffect::Audit(record) => self.audit.append(record),
            SideEffect::Escalate(alert) => self.escalator.escalate(alert),
        };
        if let Err(err) = outcome {
            tracing::warn!(effect = effect.label(), error = %err, "side effect failed");
        }
    }
}

/// Applies effects on the calling thread, for callers that need every effect
/// delivered before they continue, such as tests asserting on audit rows.
#[derive(Debug, Clone)]
pub struct InlineDispatcher {
    targets: EffectTargets,
}

impl InlineDispatcher {
    pub fn new(targets: EffectTargets) -> Self {
        Self { targets }
    }
}

impl EffectDispatcher for InlineDispatcher {
    fn dispatch(&self, effect: SideEffect) {
        self.targets.apply(&effect);
    }
}

/// Default escalation target: a structured `error` event that log shipping
/// can route to whoever is on call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEscalator;

impl Escalator for LogEscalator {
    fn escalate(&self, alert: &CriticalAlert) -> Result<()> {
        tracing::error!(
            error_id = %alert.error_id,
            fingerprint = %alert.fingerprint,
            module = %alert.module,
            category = %alert.category,
            reported_at = %alert.reported_at.to_rfc3339(),
            message = %alert.message,
            "critical error reported"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::error::FaultlineError;
    use crate::models::ErrorReport;

    #[derive(Default)]
    struct RecordingAudit {
        records: Mutex<Vec<AuditRecord>>,
    }

    impl AuditSink for RecordingAudit {
        fn append(&self, record: &AuditRecord) -> Result<()> {
            self.records.lock().expect("lock").push(record.clone());
            Ok(())
        }
    }

    struct FailingEscalator;

    impl Escalator for FailingEscalator {
        fn escalate(&self, _alert: &CriticalAlert) -> Result<()> {
            Err(FaultlineError::Internal("pager offline".to_string()))
        }
    }

    #[test]
    fn inline_dispatcher_delivers_and_swallows_failures() {
        let audit = Arc::new(RecordingAudit::default());
        let dispatcher =
            InlineDispatcher::new(EffectTargets::new(audit.clone(), Arc::new(FailingEscalator)));

        let report = ErrorReport::new("boom", "core");
        dispatcher.dispatch(SideEffect::Audit(AuditRecord::error_reported(
            "id-1",
            "abc",
            &report,
            None,
            None,
            Utc::now(),
        )));
        dispatcher.dispatch(SideEffect::Escalate(CriticalAlert {
            error_id: "id-1".to_string(),
            fingerprint: "abc".to_string(),
            message: "boom".to_string(),
            module: "core".to_string(),
            category: "backend".to_string(),
            reported_at: Utc::now(),
        }));

        let records = audit.records.lock().expect("lock");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].actor_type, "system");
        assert_eq!(records[0].event_message, "Error reported: boom");
    }
}
