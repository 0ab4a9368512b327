//! herald-core
//!
//! Message-handling audit model for a message-bus consumer.
//!
//! For every handling attempt the dispatcher keeps a [`HandlingRecord`]; when
//! the attempt fails it is wrapped in an immutable [`FailureRecord`] that
//! carries the queue disposition, the failure reason and the normalized root
//! cause. Both are handed to every registered [`MessageAuditor`].
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, message, record, failure, errors）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, MessageCodec, MessageAuditor）
//! - **typed**: 型付き Handler API（Handler, DynHandler, HandlerRegistry）
//! - **app**: DispatcherBuilder, Dispatcher, AuditorSet, DispatcherConfig
//! - **impls**: 開発用の実装（RecordingAuditor, NoopAuditor）

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{DispatchOutcome, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use domain::{
    FailedMessageQueueAction, FailedMessageReason, FailureRecord, HandlerError, HandlingRecord,
    MessageInformation,
};
pub use error::HeraldError;
pub use ports::MessageAuditor;
pub use typed::Handler;
