//! Handler trait - メッセージを処理する Handler の定義
//!
//! # 二層構造
//! - **表層（Typed）**: `Handler<M>` - メッセージ型ごとに型安全
//! - **内部（Dyn）**: `DynHandler` - object-safe, type erasure
//!
//! `TypedHandler` は trampoline です。ハンドラが返したエラーはすべて
//! invocation wrapper で包まれて出てきます。auditor に渡る前に
//! `FailureRecord` がこれを剥がします。

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::domain::errors::{ErrorKind, HandlerError};
use crate::domain::kind::{DeserializedBody, TypeTag};
use crate::ports::MessageCodec;

/// Handles one decoded message of type `M`.
///
/// ```ignore
/// struct SendReceipt;
///
/// #[async_trait]
/// impl Handler<OrderPlaced> for SendReceipt {
///     async fn handle(&self, message: &OrderPlaced) -> Result<(), HandlerError> {
///         mailer::send(message.order_id).await.map_err(|e| HandlerError::from_error(ErrorKind::Handler, e))
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<M>: Send + Sync
where
    M: Send + Sync + 'static,
{
    async fn handle(&self, message: &M) -> Result<(), HandlerError>;
}

/// DynHandler は object-safe な Handler の抽象化
#[async_trait]
pub trait DynHandler: Send + Sync {
    fn handler_kind(&self) -> TypeTag;

    fn message_kind(&self) -> TypeTag;

    /// Decode a raw body into the handler's message type.
    fn decode(&self, body: &[u8]) -> Result<DeserializedBody, HandlerError>;

    /// Build the handler for this attempt and run it against `body`.
    ///
    /// Construction failures come back with [`ErrorKind::Construction`];
    /// handler failures come back inside an invocation wrapper.
    async fn invoke(&self, body: &DeserializedBody) -> Result<(), HandlerError>;
}

type Factory<H> = Box<dyn Fn() -> Result<Arc<H>, HandlerError> + Send + Sync>;

pub struct TypedHandler<M, H, C> {
    factory: Factory<H>,
    codec: C,
    _marker: PhantomData<fn() -> M>,
}

impl<M, H, C> TypedHandler<M, H, C>
where
    H: Handler<M> + 'static,
    M: DeserializeOwned + Send + Sync + 'static,
    C: MessageCodec,
{
    /// One handler instance shared by every attempt.
    pub fn new(handler: H, codec: C) -> Self {
        let handler = Arc::new(handler);
        Self::from_factory(move || Ok(Arc::clone(&handler)), codec)
    }

    /// A fresh handler per attempt, built by `factory`.
    pub fn from_factory<F>(factory: F, codec: C) -> Self
    where
        F: Fn() -> Result<Arc<H>, HandlerError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            codec,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<M, H, C> DynHandler for TypedHandler<M, H, C>
where
    H: Handler<M> + 'static,
    M: DeserializeOwned + Send + Sync + 'static,
    C: MessageCodec,
{
    fn handler_kind(&self) -> TypeTag {
        TypeTag::of::<H>()
    }

    fn message_kind(&self) -> TypeTag {
        TypeTag::of::<M>()
    }

    fn decode(&self, body: &[u8]) -> Result<DeserializedBody, HandlerError> {
        self.codec.decode::<M>(body).map(DeserializedBody::new)
    }

    async fn invoke(&self, body: &DeserializedBody) -> Result<(), HandlerError> {
        let message = body.downcast_ref::<M>().ok_or_else(|| {
            HandlerError::with_kind(
                ErrorKind::Deserialization,
                format!("decoded body is {}, expected {}", body.kind(), type_name::<M>()),
            )
        })?;

        let handler = (self.factory)().map_err(|e| match e.kind() {
            ErrorKind::Construction => e,
            _ => HandlerError::from_error(ErrorKind::Construction, e),
        })?;

        handler
            .handle(message)
            .await
            .map_err(|e| HandlerError::invocation(type_name::<H>(), e))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::ports::JsonCodec;

    #[tokio::test]
    async fn decodes_and_invokes() {
        let typed = TypedHandler::<OrderPlaced, _, _>::new(FlakyHandler::failing(0), JsonCodec);

        let body = typed.decode(br#"{"order_id": 7}"#).unwrap();
        assert_eq!(body.downcast_ref::<OrderPlaced>(), Some(&OrderPlaced { order_id: 7 }));

        typed.invoke(&body).await.unwrap();
        assert!(typed.handler_kind().is::<FlakyHandler>());
        assert!(typed.message_kind().is::<OrderPlaced>());
    }

    #[tokio::test]
    async fn handler_errors_come_back_wrapped() {
        let typed = TypedHandler::<OrderPlaced, _, _>::new(FlakyHandler::failing(1), JsonCodec);
        let body = typed.decode(br#"{"order_id": 7}"#).unwrap();

        let err = typed.invoke(&body).await.unwrap_err();

        assert!(err.is_invocation_wrapper());
        assert_eq!(err.inner().unwrap().message(), "order 7 rejected");
    }

    #[tokio::test]
    async fn factory_errors_are_construction_errors() {
        let typed = TypedHandler::<OrderPlaced, FlakyHandler, _>::from_factory(
            || Err(HandlerError::new("db pool exhausted")),
            JsonCodec,
        );
        let body = typed.decode(br#"{"order_id": 1}"#).unwrap();

        let err = typed.invoke(&body).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Construction);
        assert_eq!(err.message(), "db pool exhausted");
    }

    #[tokio::test]
    async fn foreign_body_is_rejected() {
        let typed = TypedHandler::<OrderPlaced, _, _>::new(FlakyHandler::failing(0), JsonCodec);

        let err = typed.invoke(&DeserializedBody::new(5_u8)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Deserialization);
    }

    #[test]
    fn bad_body_fails_to_decode() {
        let typed = TypedHandler::<OrderPlaced, _, _>::new(FlakyHandler::failing(0), JsonCodec);

        let err = typed.decode(b"{").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Deserialization);
    }
}
