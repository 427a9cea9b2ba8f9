use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use faultline_core::effects::{EffectDispatcher, EffectTargets, SideEffect};

/// Hands side effects to a blocking worker so audit and escalation writes
/// never sit on the response path.
///
/// The queue is bounded. When the worker falls behind, new effects are dropped
/// with a warning instead of growing memory. The worker drains the queue and
/// exits once every sender is dropped.
#[derive(Debug, Clone)]
pub struct BackgroundDispatcher {
    sender: mpsc::Sender<SideEffect>,
}

impl BackgroundDispatcher {
    /// Must be called from inside a tokio runtime.
    pub fn spawn(targets: EffectTargets, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<SideEffect>(capacity.max(1));
        let worker = tokio::task::spawn_blocking(move || {
            while let Some(effect) = receiver.blocking_recv() {
                targets.apply(&effect);
            }
            tracing::debug!("side effect worker drained");
        });
        (Self { sender }, worker)
    }
}

impl EffectDispatcher for BackgroundDispatcher {
    fn dispatch(&self, effect: SideEffect) {
        let label = effect.label();
        match self.sender.try_send(effect) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    effect = label,
                    capacity = self.sender.max_capacity(),
                    "side effect queue full; dropping effect"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(effect = label, "side effect worker stopped; dropping effect");
            }
        }
    }
}
