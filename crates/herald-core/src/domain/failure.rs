//! FailureRecord - 失敗した試行の不変な記録
//!
//! `HandlingRecord` を所有（snapshot）し、失敗分類（disposition / reason）と
//! 正規化済みの root cause を追加します。構築後は一切変更されません。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::HandlerError;
use super::ids::HandlingId;
use super::kind::{DeserializedBody, TypeTag};
use super::message::Message;
use super::record::{HandlingRecord, MessageInformation};
use crate::error::HeraldError;

/// What happened to the message on the queue after the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailedMessageQueueAction {
    /// Put back on the queue, possibly with a delay.
    Requeued,
    /// Acknowledged and dropped; redelivery would not help.
    Finished,
    /// Acknowledged and dropped after the attempt budget ran out.
    GaveUp,
}

/// Why the attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailedMessageReason {
    HandlerException,
    MaxAttemptsExceeded,
    Timeout,
    MessageDeserializationFailure,
    HandlerConstructionFailure,
}

/// Immutable failure view over a handling attempt.
///
/// Exposes the attempt's fields through [`MessageInformation`]; the
/// dispatcher-only `backoff_triggered` / `requeued_until` are not reachable
/// from here.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    record: HandlingRecord,
    disposition: FailedMessageQueueAction,
    reason: FailedMessageReason,
    root_cause: Option<HandlerError>,
}

impl FailureRecord {
    /// Build the failure view, normalizing `error` to its root cause.
    pub fn new(
        record: HandlingRecord,
        disposition: FailedMessageQueueAction,
        reason: FailedMessageReason,
        error: Option<HandlerError>,
    ) -> Self {
        Self {
            record,
            disposition,
            reason,
            root_cause: error.map(HandlerError::into_root_cause),
        }
    }

    /// Like [`new`](Self::new) for callers that may not hold a record.
    ///
    /// # Errors
    /// [`HeraldError::InvalidArgument`] when `record` is `None`.
    pub fn try_new(
        record: Option<HandlingRecord>,
        disposition: FailedMessageQueueAction,
        reason: FailedMessageReason,
        error: Option<HandlerError>,
    ) -> Result<Self, HeraldError> {
        let record = record.ok_or(HeraldError::InvalidArgument("record"))?;
        Ok(Self::new(record, disposition, reason, error))
    }

    pub fn disposition(&self) -> FailedMessageQueueAction {
        self.disposition
    }

    pub fn reason(&self) -> FailedMessageReason {
        self.reason
    }

    /// The normalized error, never an invocation wrapper that has an inner error.
    pub fn root_cause(&self) -> Option<&HandlerError> {
        self.root_cause.as_ref()
    }
}

impl MessageInformation for FailureRecord {
    fn id(&self) -> HandlingId {
        self.record.id()
    }

    fn topic(&self) -> &str {
        self.record.topic()
    }

    fn channel(&self) -> &str {
        self.record.channel()
    }

    fn handler_kind(&self) -> TypeTag {
        self.record.handler_kind()
    }

    fn message_kind(&self) -> TypeTag {
        self.record.message_kind()
    }

    fn message(&self) -> &Message {
        self.record.message()
    }

    fn deserialized_body(&self) -> Option<&DeserializedBody> {
        self.record.deserialized_body()
    }

    fn started(&self) -> DateTime<Utc> {
        self.record.started()
    }

    fn finished(&self) -> Option<DateTime<Utc>> {
        self.record.finished()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rstest::rstest;

    use super::*;
    use crate::domain::errors::ErrorKind;
    use crate::domain::record::fixtures::{record, t0};

    fn wrap(depth: usize, leaf: HandlerError) -> HandlerError {
        (0..depth).fold(leaf, |err, i| HandlerError::invocation(format!("layer-{i}"), err))
    }

    #[test]
    fn delegates_every_field_of_the_record() {
        let mut r = record("orders", "email", t0());
        r.set_deserialized_body(DeserializedBody::new(String::from("payload")));
        r.finish(t0() + Duration::seconds(1));
        let snapshot = r.clone();

        let f = FailureRecord::new(
            r,
            FailedMessageQueueAction::Finished,
            FailedMessageReason::HandlerException,
            None,
        );

        assert_eq!(f.id(), snapshot.id());
        assert_eq!(f.topic(), snapshot.topic());
        assert_eq!(f.channel(), snapshot.channel());
        assert_eq!(f.started(), snapshot.started());
        assert_eq!(f.finished(), snapshot.finished());
        assert_eq!(f.handler_kind(), snapshot.handler_kind());
        assert_eq!(f.message_kind(), snapshot.message_kind());
        assert_eq!(f.message(), snapshot.message());
        assert!(
            f.deserialized_body()
                .unwrap()
                .ptr_eq(snapshot.deserialized_body().unwrap())
        );
    }

    #[test]
    fn later_mutation_of_the_source_does_not_leak_in() {
        let mut r = record("orders", "email", t0());
        let f = FailureRecord::new(
            r.clone(),
            FailedMessageQueueAction::Requeued,
            FailedMessageReason::Timeout,
            None,
        );

        r.finish(t0() + Duration::seconds(3));
        r.set_deserialized_body(DeserializedBody::new(1_u8));

        assert_eq!(f.finished(), None);
        assert!(f.deserialized_body().is_none());
    }

    #[rstest]
    fn missing_record_is_an_invalid_argument(
        #[values(
            FailedMessageQueueAction::Requeued,
            FailedMessageQueueAction::Finished,
            FailedMessageQueueAction::GaveUp
        )]
        action: FailedMessageQueueAction,
        #[values(
            FailedMessageReason::HandlerException,
            FailedMessageReason::MaxAttemptsExceeded,
            FailedMessageReason::Timeout,
            FailedMessageReason::MessageDeserializationFailure,
            FailedMessageReason::HandlerConstructionFailure
        )]
        reason: FailedMessageReason,
        #[values(None, Some(HandlerError::new("boom")), Some(wrap(2, HandlerError::new("boom"))))]
        error: Option<HandlerError>,
    ) {
        let result = FailureRecord::try_new(None, action, reason, error);
        assert!(matches!(result, Err(HeraldError::InvalidArgument("record"))));
    }

    #[test]
    fn try_new_with_record_succeeds() {
        let f = FailureRecord::try_new(
            Some(record("orders", "email", t0())),
            FailedMessageQueueAction::GaveUp,
            FailedMessageReason::MaxAttemptsExceeded,
            None,
        )
        .unwrap();

        assert_eq!(f.topic(), "orders");
    }

    #[test]
    fn non_wrapper_error_is_kept_as_is() {
        let err = HandlerError::with_kind(ErrorKind::Deserialization, "bad json");
        let f = FailureRecord::new(
            record("orders", "email", t0()),
            FailedMessageQueueAction::Finished,
            FailedMessageReason::MessageDeserializationFailure,
            Some(err.clone()),
        );

        assert_eq!(f.root_cause(), Some(&err));
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(3)]
    #[case(10)]
    fn nested_wrappers_unwrap_to_the_innermost_error(#[case] depth: usize) {
        let leaf = HandlerError::new("card declined");
        let f = FailureRecord::new(
            record("orders", "email", t0()),
            FailedMessageQueueAction::Requeued,
            FailedMessageReason::HandlerException,
            Some(wrap(depth, leaf.clone())),
        );

        assert_eq!(f.root_cause(), Some(&leaf));
        assert!(!f.root_cause().unwrap().is_invocation_wrapper());
    }

    #[test]
    fn wrapper_chain_ending_without_inner_stops_at_that_wrapper() {
        let dangling = HandlerError::empty_invocation("proxy");
        let f = FailureRecord::new(
            record("orders", "email", t0()),
            FailedMessageQueueAction::Requeued,
            FailedMessageReason::HandlerException,
            Some(wrap(2, dangling.clone())),
        );

        assert_eq!(f.root_cause(), Some(&dangling));
    }

    #[test]
    fn absent_error_gives_absent_root_cause() {
        let f = FailureRecord::new(
            record("orders", "email", t0()),
            FailedMessageQueueAction::Requeued,
            FailedMessageReason::Timeout,
            None,
        );

        assert!(f.root_cause().is_none());
    }

    #[rstest]
    #[case(FailedMessageQueueAction::Requeued, FailedMessageReason::Timeout)]
    #[case(FailedMessageQueueAction::Finished, FailedMessageReason::MessageDeserializationFailure)]
    #[case(FailedMessageQueueAction::GaveUp, FailedMessageReason::MaxAttemptsExceeded)]
    #[case(FailedMessageQueueAction::Finished, FailedMessageReason::HandlerConstructionFailure)]
    fn disposition_and_reason_pass_through(
        #[case] action: FailedMessageQueueAction,
        #[case] reason: FailedMessageReason,
    ) {
        let f = FailureRecord::new(record("orders", "email", t0()), action, reason, None);

        assert_eq!(f.disposition(), action);
        assert_eq!(f.reason(), reason);
    }

    #[test]
    fn orders_email_failure_scenario() {
        let mut r = record("orders", "email", t0());
        let t1 = t0() + Duration::milliseconds(40);
        r.finish(t1);
        let e = HandlerError::new("smtp unavailable");
        let err = HandlerError::invocation("outer", HandlerError::invocation("inner", e.clone()));

        let f = FailureRecord::new(
            r,
            FailedMessageQueueAction::Requeued,
            FailedMessageReason::HandlerException,
            Some(err),
        );

        assert_eq!(f.topic(), "orders");
        assert_eq!(f.channel(), "email");
        assert_eq!(f.finished(), Some(t1));
        assert_eq!(f.root_cause(), Some(&e));
        assert_eq!(f.disposition(), FailedMessageQueueAction::Requeued);
    }

    #[test]
    fn enums_serialize_as_screaming_snake_case() {
        let s = serde_json::to_string(&FailedMessageQueueAction::GaveUp).unwrap();
        assert_eq!(s, "\"GAVE_UP\"");

        let s = serde_json::to_string(&FailedMessageReason::MessageDeserializationFailure).unwrap();
        assert_eq!(s, "\"MESSAGE_DESERIALIZATION_FAILURE\"");
    }
}
