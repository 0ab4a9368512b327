//! MessageCodec port - メッセージ本文のデコード
//!
//! # 実装
//! - **JsonCodec**: serde_json によるデコード（デフォルト）

use serde::de::DeserializeOwned;

use crate::domain::errors::{ErrorKind, HandlerError};

/// Decodes raw message bodies into typed messages.
pub trait MessageCodec: Send + Sync + 'static {
    fn decode<M: DeserializeOwned>(&self, body: &[u8]) -> Result<M, HandlerError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn decode<M: DeserializeOwned>(&self, body: &[u8]) -> Result<M, HandlerError> {
        serde_json::from_slice(body).map_err(|e| HandlerError::from_error(ErrorKind::Deserialization, e))
    }
}
