//! DispatcherConfig - ディスパッチャの設定
//!
//! JSON から読み込めます。省略したフィールドはデフォルト値になります。
//!
//! ```json
//! { "max_attempts": 5, "handler_timeout_ms": 30000, "audit_delivery": "background" }
//! ```
//!
//! `RequeuePolicy` は接続層向けのデフォルト方針です。監査モデル
//! （HandlingRecord / FailureRecord / auditor）の一部ではありません。
//! ディスパッチャは遅延を計算して記録するだけで、requeue は接続層が行います。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HeraldError;

/// How auditors are notified once an attempt concludes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDelivery {
    /// Every auditor runs before `dispatch` returns.
    #[default]
    Synchronous,
    /// Auditors run on a spawned task; `dispatch` does not wait.
    Background,
}

/// Delay computation for requeued messages.
///
/// The dispatcher only computes and records the delay; the connection layer
/// performs the actual requeue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequeuePolicy {
    /// Delay after the first failed attempt.
    pub base_delay_ms: u64,

    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay_ms: u64,

    /// Whether a requeue should also push the consumer into backoff.
    pub backoff_on_failure: bool,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 2_000,
            multiplier: 2.0,
            max_delay_ms: 120_000,
            backoff_on_failure: true,
        }
    }
}

impl RequeuePolicy {
    /// Delay before redelivery: `base_delay * multiplier^(attempts - 1)`, capped at `max_delay`.
    ///
    /// `attempts` is the broker's delivery count (1 on first delivery); 0 is treated as 1.
    pub fn next_delay(&self, attempts: u16) -> Duration {
        let exponent = i32::from(attempts.saturating_sub(1));
        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let max_ms = self.max_delay_ms as f64;
        if !delay_ms.is_finite() || delay_ms >= max_ms {
            return Duration::from_millis(self.max_delay_ms);
        }
        Duration::from_millis(delay_ms as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Deliveries beyond this count are given up without invoking the handler.
    pub max_attempts: u16,

    pub handler_timeout_ms: Option<u64>,

    pub requeue: RequeuePolicy,

    pub audit_delivery: AuditDelivery,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            handler_timeout_ms: None,
            requeue: RequeuePolicy::default(),
            audit_delivery: AuditDelivery::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn from_json_str(s: &str) -> Result<Self, HeraldError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HeraldError> {
        if self.max_attempts == 0 {
            return Err(HeraldError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.requeue.multiplier.is_nan() || self.requeue.multiplier < 1.0 {
            return Err(HeraldError::InvalidConfig(format!(
                "requeue.multiplier must be >= 1.0, got {}",
                self.requeue.multiplier
            )));
        }
        if self.handler_timeout_ms == Some(0) {
            return Err(HeraldError::InvalidConfig(
                "handler_timeout_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }
}
