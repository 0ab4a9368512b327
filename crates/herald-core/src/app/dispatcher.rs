//! Dispatcher - 1 件の delivery に対するハンドリング試行
//!
//! # フロー
//! 1. Route から Handler を引く
//! 2. HandlingRecord を作る（id, started）
//! 3. 試行回数の上限チェック
//! 4. 本文をデコード → Handler 実行（timeout 付き）
//! 5. finished を記録し、成功なら HandlingRecord、失敗なら FailureRecord を auditor へ
//! 6. 接続層が実行すべきキュー操作を `DispatchOutcome` で返す
//!
//! Dispatcher 自身はキューを操作しません（requeue/backoff は記録するだけ）。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::audit::{AuditEvent, AuditorSet};
use super::config::DispatcherConfig;
use crate::domain::{
    Delivery, ErrorKind, FailedMessageQueueAction, FailedMessageReason, FailureRecord,
    HandlerError, HandlingRecord, MessageInformation,
};
use crate::error::HeraldError;
use crate::ports::{Clock, IdGenerator};
use crate::typed::HandlerRegistry;

/// The queue action the connection layer should carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Acknowledge the message; it will not be redelivered.
    Finish,
    /// Requeue the message after `delay`.
    ///
    /// `until` and `backoff` are the values recorded on the attempt's
    /// `HandlingRecord`.
    Requeue {
        delay: Duration,
        until: Option<DateTime<Utc>>,
        backoff: bool,
    },
}

pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    auditors: AuditorSet,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub(crate) fn new(
        registry: Arc<HandlerRegistry>,
        auditors: AuditorSet,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            auditors,
            clock,
            ids,
            config,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Run one handling attempt for `delivery`.
    ///
    /// # Errors
    /// [`HeraldError::HandlerNotFound`] when no handler is registered for the
    /// delivery's route. Nothing is audited in that case.
    pub async fn dispatch(&self, delivery: Delivery) -> Result<DispatchOutcome, HeraldError> {
        let Delivery { route, message } = delivery;
        let handler = self
            .registry
            .get(&route)
            .ok_or_else(|| HeraldError::HandlerNotFound(route.clone()))?;

        let attempts = message.attempts;
        let mut record = HandlingRecord::new(
            self.ids.generate_handling_id(),
            route,
            handler.handler_kind(),
            handler.message_kind(),
            message,
            self.clock.now(),
        );
        tracing::debug!(
            handling_id = %record.id(),
            topic = record.topic(),
            channel = record.channel(),
            attempts,
            "handling message"
        );

        if attempts > self.config.max_attempts {
            self.conclude_failure(
                record,
                FailedMessageQueueAction::GaveUp,
                FailedMessageReason::MaxAttemptsExceeded,
                None,
            );
            return Ok(DispatchOutcome::Finish);
        }

        let body = match handler.decode(&record.message().body) {
            Ok(body) => body,
            Err(error) => {
                self.conclude_failure(
                    record,
                    FailedMessageQueueAction::Finished,
                    FailedMessageReason::MessageDeserializationFailure,
                    Some(error),
                );
                return Ok(DispatchOutcome::Finish);
            }
        };
        record.set_deserialized_body(body.clone());

        // None means the handler timed out.
        let result: Result<(), Option<HandlerError>> = match self.config.handler_timeout() {
            Some(limit) => match tokio::time::timeout(limit, handler.invoke(&body)).await {
                Ok(result) => result.map_err(Some),
                Err(_elapsed) => Err(None),
            },
            None => handler.invoke(&body).await.map_err(Some),
        };

        let error = match result {
            Ok(()) => {
                record.finish(self.clock.now());
                tracing::debug!(handling_id = %record.id(), "message handled");
                self.auditors.notify(AuditEvent::Succeeded(record));
                return Ok(DispatchOutcome::Finish);
            }
            Err(error) => error,
        };

        let reason = match &error {
            None => FailedMessageReason::Timeout,
            Some(e) if e.kind() == ErrorKind::Construction => {
                FailedMessageReason::HandlerConstructionFailure
            }
            Some(_) => FailedMessageReason::HandlerException,
        };

        if attempts >= self.config.max_attempts {
            self.conclude_failure(record, FailedMessageQueueAction::GaveUp, reason, error);
            return Ok(DispatchOutcome::Finish);
        }

        let delay = self.config.requeue.next_delay(attempts);
        let until = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| self.clock.now().checked_add_signed(d));
        record.set_requeued_until(until);
        record.set_backoff_triggered(self.config.requeue.backoff_on_failure);
        let outcome = DispatchOutcome::Requeue {
            delay,
            until: record.requeued_until(),
            backoff: record.backoff_triggered(),
        };
        self.conclude_failure(record, FailedMessageQueueAction::Requeued, reason, error);

        Ok(outcome)
    }

    fn conclude_failure(
        &self,
        mut record: HandlingRecord,
        disposition: FailedMessageQueueAction,
        reason: FailedMessageReason,
        error: Option<HandlerError>,
    ) {
        record.finish(self.clock.now());
        let failure = FailureRecord::new(record, disposition, reason, error);
        tracing::warn!(
            handling_id = %failure.id(),
            topic = failure.topic(),
            channel = failure.channel(),
            ?disposition,
            ?reason,
            error = failure.root_cause().map(tracing::field::display),
            "message handling failed"
        );
        self.auditors.notify(AuditEvent::Failed(failure));
    }
}
