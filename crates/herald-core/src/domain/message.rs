//! Message - ブローカーから届いた未解析のメッセージ
//!
//! このクレートは wire protocol を扱いません。`Message` は接続層が
//! 組み立てたものをそのまま運ぶだけの不透明な envelope です。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broker-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The raw, unparsed message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,

    /// Delivery count reported by the broker (1 on first delivery).
    pub attempts: u16,

    /// When the broker accepted the message.
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(id: MessageId, attempts: u16, timestamp: DateTime<Utc>, body: Vec<u8>) -> Self {
        Self {
            id,
            attempts,
            timestamp,
            body,
        }
    }
}

/// Topic/channel pair a message was delivered on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Route {
    pub topic: String,
    pub channel: String,
}

impl Route {
    pub fn new(topic: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.channel)
    }
}

/// One delivery handed to the dispatcher by the connection layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    #[serde(flatten)]
    pub route: Route,
    pub message: Message,
}

impl Delivery {
    pub fn new(route: Route, message: Message) -> Self {
        Self { route, message }
    }
}
