//! HandlingRecord - 1 回のハンドリング試行の記録
//!
//! ディスパッチャは試行の開始時に `HandlingRecord` を作り、進行に合わせて
//! `&mut` で更新します。auditor には `&HandlingRecord`（または
//! `MessageInformation` trait）としてしか渡らないため、handoff 後は読み取り専用です。

use chrono::{DateTime, Utc};

use super::ids::HandlingId;
use super::kind::{DeserializedBody, TypeTag};
use super::message::{Message, Route};

/// Read-only view of a handling attempt.
///
/// Implemented by both [`HandlingRecord`] and
/// [`FailureRecord`](super::failure::FailureRecord), so auditors can treat
/// successes and failures uniformly.
pub trait MessageInformation {
    /// Unique identifier of this handling attempt.
    fn id(&self) -> HandlingId;

    /// The topic the message was delivered on.
    fn topic(&self) -> &str;

    /// The channel the message was delivered on.
    fn channel(&self) -> &str;

    fn handler_kind(&self) -> TypeTag;

    fn message_kind(&self) -> TypeTag;

    /// The raw message as received.
    fn message(&self) -> &Message;

    /// The decoded body, absent when decoding failed or never ran.
    fn deserialized_body(&self) -> Option<&DeserializedBody>;

    /// When the handler started processing this message.
    fn started(&self) -> DateTime<Utc>;

    /// When the handler finished processing this message.
    fn finished(&self) -> Option<DateTime<Utc>>;
}

/// Mutable record of a single handling attempt.
#[derive(Debug, Clone)]
pub struct HandlingRecord {
    id: HandlingId,
    route: Route,
    handler_kind: TypeTag,
    message_kind: TypeTag,
    message: Message,
    deserialized_body: Option<DeserializedBody>,
    started: DateTime<Utc>,
    finished: Option<DateTime<Utc>>,
    backoff_triggered: bool,
    requeued_until: Option<DateTime<Utc>>,
}

impl HandlingRecord {
    /// Start recording an attempt. The record is in flight until [`finish`](Self::finish).
    pub fn new(
        id: HandlingId,
        route: Route,
        handler_kind: TypeTag,
        message_kind: TypeTag,
        message: Message,
        started: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            route,
            handler_kind,
            message_kind,
            message,
            deserialized_body: None,
            started,
            finished: None,
            backoff_triggered: false,
            requeued_until: None,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn is_in_flight(&self) -> bool {
        self.finished.is_none()
    }

    /// True if this attempt pushed the consumer into backoff.
    pub fn backoff_triggered(&self) -> bool {
        self.backoff_triggered
    }

    /// Set when the message was requeued with a delay.
    pub fn requeued_until(&self) -> Option<DateTime<Utc>> {
        self.requeued_until
    }

    pub fn set_deserialized_body(&mut self, body: DeserializedBody) {
        self.deserialized_body = Some(body);
    }

    /// Mark the attempt as concluded.
    ///
    /// `finished` never precedes `started`; an earlier instant is clamped.
    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished = Some(at.max(self.started));
    }

    pub fn set_backoff_triggered(&mut self, triggered: bool) {
        self.backoff_triggered = triggered;
    }

    pub fn set_requeued_until(&mut self, until: Option<DateTime<Utc>>) {
        self.requeued_until = until;
    }
}

impl MessageInformation for HandlingRecord {
    fn id(&self) -> HandlingId {
        self.id
    }

    fn topic(&self) -> &str {
        &self.route.topic
    }

    fn channel(&self) -> &str {
        &self.route.channel
    }

    fn handler_kind(&self) -> TypeTag {
        self.handler_kind
    }

    fn message_kind(&self) -> TypeTag {
        self.message_kind
    }

    fn message(&self) -> &Message {
        &self.message
    }

    fn deserialized_body(&self) -> Option<&DeserializedBody> {
        self.deserialized_body.as_ref()
    }

    fn started(&self) -> DateTime<Utc> {
        self.started
    }

    fn finished(&self) -> Option<DateTime<Utc>> {
        self.finished
    }
}
