//! RecordingAuditor - 開発・テスト用の auditor
//!
//! 受け取ったレコードをメモリに保持します。本番用の auditor
//! （メトリクス、ログ転送など）は別クレートで実装してください。

use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::domain::{FailureRecord, HandlingRecord};
use crate::ports::{AuditorError, MessageAuditor};

#[derive(Default)]
pub struct RecordingAuditor {
    successes: Mutex<Vec<HandlingRecord>>,
    failures: Mutex<Vec<FailureRecord>>,
    notify: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingAuditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> Vec<HandlingRecord> {
        lock(&self.successes).clone()
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        lock(&self.failures).clone()
    }

    /// Number of records received so far, successes and failures combined.
    pub fn len(&self) -> usize {
        lock(&self.successes).len() + lock(&self.failures).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` records have arrived.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

impl MessageAuditor for RecordingAuditor {
    fn on_success(&self, record: &HandlingRecord) -> Result<(), AuditorError> {
        lock(&self.successes).push(record.clone());
        self.notify.notify_waiters();
        Ok(())
    }

    fn on_failure(&self, record: &FailureRecord) -> Result<(), AuditorError> {
        lock(&self.failures).push(record.clone());
        self.notify.notify_waiters();
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditor;

impl MessageAuditor for NoopAuditor {
    fn on_success(&self, _record: &HandlingRecord) -> Result<(), AuditorError> {
        Ok(())
    }

    fn on_failure(&self, _record: &FailureRecord) -> Result<(), AuditorError> {
        Ok(())
    }
}
