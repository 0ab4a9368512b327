//! Impls - 開発用・テスト用の実装
//!
//! - **RecordingAuditor**: 受け取ったレコードをメモリに保持
//! - **NoopAuditor**: 何もしない

pub mod recording;

pub use self::recording::{NoopAuditor, RecordingAuditor};
