//! HandlerRegistry - Route ごとの Handler の登録と管理
//!
//! - 初期化時に構築（mutable）
//! - 実行時は共有（immutable, `Arc` 越しに読むだけ）
//!
//! 内部的には `TypedHandler` でラップして `Arc<dyn DynHandler>` として保持します。

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::handler::{DynHandler, Handler, TypedHandler};
use crate::domain::errors::HandlerError;
use crate::domain::message::Route;
use crate::error::HeraldError;
use crate::ports::{JsonCodec, MessageCodec};

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Route, Arc<dyn DynHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a JSON-decoding handler for `route`.
    pub fn register<M, H>(&mut self, route: Route, handler: H) -> Result<(), HeraldError>
    where
        M: DeserializeOwned + Send + Sync + 'static,
        H: Handler<M> + 'static,
    {
        self.register_with_codec::<M, H, _>(route, handler, JsonCodec)
    }

    pub fn register_with_codec<M, H, C>(
        &mut self,
        route: Route,
        handler: H,
        codec: C,
    ) -> Result<(), HeraldError>
    where
        M: DeserializeOwned + Send + Sync + 'static,
        H: Handler<M> + 'static,
        C: MessageCodec,
    {
        self.register_dyn(route, Arc::new(TypedHandler::<M, H, C>::new(handler, codec)))
    }

    /// Register a handler built anew for every attempt.
    pub fn register_factory<M, H, F>(&mut self, route: Route, factory: F) -> Result<(), HeraldError>
    where
        M: DeserializeOwned + Send + Sync + 'static,
        H: Handler<M> + 'static,
        F: Fn() -> Result<Arc<H>, HandlerError> + Send + Sync + 'static,
    {
        self.register_dyn(
            route,
            Arc::new(TypedHandler::<M, H, _>::from_factory(factory, JsonCodec)),
        )
    }

    pub fn register_dyn(
        &mut self,
        route: Route,
        handler: Arc<dyn DynHandler>,
    ) -> Result<(), HeraldError> {
        if self.handlers.contains_key(&route) {
            return Err(HeraldError::DuplicateHandler(route));
        }
        self.handlers.insert(route, handler);
        Ok(())
    }

    pub fn get(&self, route: &Route) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(route).cloned()
    }

    /// Registered routes, sorted.
    pub fn routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.handlers.keys().cloned().collect();
        routes.sort();
        routes
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::handler::fixtures::{FlakyHandler, OrderPlaced};

    #[test]
    fn register_and_get() {
        let mut registry = HandlerRegistry::new();
        registry
            .register::<OrderPlaced, _>(Route::new("orders", "email"), FlakyHandler::default())
            .unwrap();

        let handler = registry.get(&Route::new("orders", "email")).unwrap();
        assert!(handler.message_kind().is::<OrderPlaced>());
        assert!(registry.get(&Route::new("orders", "sms")).is_none());
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = HandlerRegistry::new();
        let route = Route::new("orders", "email");
        registry
            .register::<OrderPlaced, _>(route.clone(), FlakyHandler::default())
            .unwrap();

        let result = registry.register::<OrderPlaced, _>(route.clone(), FlakyHandler::default());
        assert!(matches!(result, Err(HeraldError::DuplicateHandler(r)) if r == route));
    }

    #[test]
    fn same_topic_different_channels_are_distinct() {
        let mut registry = HandlerRegistry::new();
        registry
            .register::<OrderPlaced, _>(Route::new("orders", "sms"), FlakyHandler::default())
            .unwrap();
        registry
            .register_factory::<OrderPlaced, FlakyHandler, _>(Route::new("orders", "email"), || {
                Ok(Arc::new(FlakyHandler::default()))
            })
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.routes(),
            vec![Route::new("orders", "email"), Route::new("orders", "sms")]
        );
    }
}
