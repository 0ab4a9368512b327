//! App - アプリケーション層
//!
//! ports と typed を組み合わせて、1 回のハンドリング試行を実行します。
//!
//! # 主要コンポーネント
//! - **DispatcherBuilder**: 構築とワイヤリング（起動時検証）
//! - **Dispatcher**: delivery → handler → audit
//! - **AuditorSet**: auditor への通知と失敗の隔離
//! - **DispatcherConfig**: 試行回数、timeout、requeue 遅延、通知モード

pub mod audit;
pub mod builder;
pub mod config;
pub mod dispatcher;

pub use self::audit::{AuditEvent, AuditorSet};
pub use self::builder::DispatcherBuilder;
pub use self::config::{AuditDelivery, DispatcherConfig, RequeuePolicy};
pub use self::dispatcher::{DispatchOutcome, Dispatcher};
