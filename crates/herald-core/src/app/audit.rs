//! AuditorSet - auditor への通知（fan-out）
//!
//! auditor の失敗（`Err` または panic）は呼び出し単位で隔離します。
//! 1 つの auditor が壊れていても、他の auditor やメッセージ処理には影響しません。

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::task::JoinHandle;

use super::config::AuditDelivery;
use crate::domain::{FailureRecord, HandlingId, HandlingRecord, MessageInformation};
use crate::ports::MessageAuditor;

/// A concluded attempt, ready for auditors.
///
/// `Succeeded` and `Failed` are the two terminal states of an attempt; the
/// event is consumed by [`AuditorSet::notify`], so it reaches auditors once.
#[derive(Debug, Clone)]
pub enum AuditEvent {
    Succeeded(HandlingRecord),
    Failed(FailureRecord),
}

impl AuditEvent {
    pub fn id(&self) -> HandlingId {
        match self {
            AuditEvent::Succeeded(record) => record.id(),
            AuditEvent::Failed(record) => record.id(),
        }
    }
}

#[derive(Clone, Default)]
pub struct AuditorSet {
    auditors: Vec<Arc<dyn MessageAuditor>>,
    delivery: AuditDelivery,
}

impl AuditorSet {
    pub fn new(delivery: AuditDelivery) -> Self {
        Self {
            auditors: Vec::new(),
            delivery,
        }
    }

    pub fn push(&mut self, auditor: Arc<dyn MessageAuditor>) {
        self.auditors.push(auditor);
    }

    pub fn delivery(&self) -> AuditDelivery {
        self.delivery
    }

    pub fn len(&self) -> usize {
        self.auditors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.auditors.is_empty()
    }

    /// Hand `event` to every auditor.
    ///
    /// Returns the spawned task in background mode. Without a tokio runtime
    /// background delivery degrades to synchronous delivery.
    pub fn notify(&self, event: AuditEvent) -> Option<JoinHandle<()>> {
        if self.auditors.is_empty() {
            return None;
        }

        if self.delivery == AuditDelivery::Background {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let auditors = self.auditors.clone();
                    return Some(handle.spawn(async move {
                        deliver_all(&auditors, &event);
                    }));
                }
                Err(_) => {
                    tracing::debug!(
                        handling_id = %event.id(),
                        "no tokio runtime, delivering audit event synchronously"
                    );
                }
            }
        }

        deliver_all(&self.auditors, &event);
        None
    }
}

fn deliver_all(auditors: &[Arc<dyn MessageAuditor>], event: &AuditEvent) {
    for auditor in auditors {
        deliver(auditor.as_ref(), event);
    }
}

fn deliver(auditor: &dyn MessageAuditor, event: &AuditEvent) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| match event {
        AuditEvent::Succeeded(record) => auditor.on_success(record),
        AuditEvent::Failed(record) => auditor.on_failure(record),
    }));

    match result {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::warn!(
                auditor = auditor.name(),
                handling_id = %event.id(),
                %error,
                "auditor returned an error"
            );
        }
        Err(_) => {
            tracing::warn!(
                auditor = auditor.name(),
                handling_id = %event.id(),
                "auditor panicked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::record::fixtures::{record, t0};
    use crate::domain::{FailedMessageQueueAction, FailedMessageReason};
    use crate::impls::RecordingAuditor;
    use crate::ports::AuditorError;

    struct FailingAuditor;

    impl MessageAuditor for FailingAuditor {
        fn on_success(&self, _record: &HandlingRecord) -> Result<(), AuditorError> {
            Err(AuditorError("metrics backend down".to_string()))
        }

        fn on_failure(&self, _record: &FailureRecord) -> Result<(), AuditorError> {
            Err(AuditorError("metrics backend down".to_string()))
        }
    }

    struct PanickingAuditor {
        calls: AtomicUsize,
    }

    impl MessageAuditor for PanickingAuditor {
        fn on_success(&self, _record: &HandlingRecord) -> Result<(), AuditorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("auditor bug");
        }

        fn on_failure(&self, _record: &FailureRecord) -> Result<(), AuditorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("auditor bug");
        }
    }

    fn failed_event() -> AuditEvent {
        AuditEvent::Failed(FailureRecord::new(
            record("orders", "email", t0()),
            FailedMessageQueueAction::Requeued,
            FailedMessageReason::HandlerException,
            None,
        ))
    }

    #[test]
    fn faulty_auditors_do_not_stop_the_others() {
        let recorder = Arc::new(RecordingAuditor::new());
        let panicking = Arc::new(PanickingAuditor {
            calls: AtomicUsize::new(0),
        });
        let mut set = AuditorSet::new(AuditDelivery::Synchronous);
        set.push(Arc::new(FailingAuditor));
        set.push(panicking.clone());
        set.push(recorder.clone());

        let handle = set.notify(AuditEvent::Succeeded(record("orders", "email", t0())));
        set.notify(failed_event());

        assert!(handle.is_none());
        assert_eq!(panicking.calls.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.successes().len(), 1);
        assert_eq!(recorder.failures().len(), 1);
    }

    #[test]
    fn empty_set_is_a_no_op() {
        let set = AuditorSet::default();
        assert!(set.notify(failed_event()).is_none());
    }

    #[tokio::test]
    async fn background_delivery_runs_on_a_task() {
        let recorder = Arc::new(RecordingAuditor::new());
        let mut set = AuditorSet::new(AuditDelivery::Background);
        set.push(Arc::new(PanickingAuditor {
            calls: AtomicUsize::new(0),
        }));
        set.push(recorder.clone());

        let handle = set.notify(failed_event()).unwrap();
        handle.await.unwrap();

        assert_eq!(recorder.failures().len(), 1);
        assert!(recorder.successes().is_empty());
    }

    #[test]
    fn background_without_runtime_delivers_inline() {
        let recorder = Arc::new(RecordingAuditor::new());
        let mut set = AuditorSet::new(AuditDelivery::Background);
        set.push(recorder.clone());

        assert!(set.notify(failed_event()).is_none());
        assert_eq!(recorder.failures().len(), 1);
    }
}
