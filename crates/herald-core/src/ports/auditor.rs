//! MessageAuditor port - ハンドリング結果の通知先
//!
//! auditor は監視・メトリクス・ログなどの外部シンクです。
//! 各試行の終了時に、成功なら `on_success`、失敗なら `on_failure` が
//! ちょうど 1 回呼ばれます。

use crate::domain::{FailureRecord, HandlingRecord};

/// Error raised by an auditor. Logged by the fan-out and otherwise ignored.
#[derive(Debug, thiserror::Error)]
#[error("auditor failed: {0}")]
pub struct AuditorError(pub String);

/// Receives the outcome of every handling attempt.
///
/// Records are handed over by shared reference and must be treated as
/// read-only. An `Err` (or a panic) only affects the call that raised it.
pub trait MessageAuditor: Send + Sync {
    /// Name used in logs when this auditor misbehaves.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn on_success(&self, record: &HandlingRecord) -> Result<(), AuditorError>;

    fn on_failure(&self, record: &FailureRecord) -> Result<(), AuditorError>;
}
