//! DispatcherBuilder - ディスパッチャの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - `expect_routes()` で期待される Route を登録
//! - `build()` 時に設定の検証と「期待集合 ⊆ 登録済み集合」をチェック
//! - 不足があれば `HeraldError` を返す

use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::audit::AuditorSet;
use super::config::DispatcherConfig;
use super::dispatcher::Dispatcher;
use crate::domain::{HandlerError, Route};
use crate::error::HeraldError;
use crate::ports::{Clock, IdGenerator, MessageAuditor, SystemClock, UlidGenerator};
use crate::typed::{Handler, HandlerRegistry};

/// ```ignore
/// let dispatcher = DispatcherBuilder::new()
///     .register::<OrderPlaced, _>(Route::new("orders", "email"), SendReceipt)?
///     .auditor(Arc::new(MetricsAuditor::default()))
///     .expect_routes(&[Route::new("orders", "email")])
///     .build()?;
/// ```
pub struct DispatcherBuilder {
    registry: HandlerRegistry,
    auditors: Vec<Arc<dyn MessageAuditor>>,
    config: DispatcherConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    expected_routes: Option<Vec<Route>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            auditors: Vec::new(),
            config: DispatcherConfig::default(),
            clock: None,
            ids: None,
            expected_routes: None,
        }
    }

    pub fn register<M, H>(mut self, route: Route, handler: H) -> Result<Self, HeraldError>
    where
        M: DeserializeOwned + Send + Sync + 'static,
        H: Handler<M> + 'static,
    {
        self.registry.register::<M, H>(route, handler)?;
        Ok(self)
    }

    pub fn register_factory<M, H, F>(mut self, route: Route, factory: F) -> Result<Self, HeraldError>
    where
        M: DeserializeOwned + Send + Sync + 'static,
        H: Handler<M> + 'static,
        F: Fn() -> Result<Arc<H>, HandlerError> + Send + Sync + 'static,
    {
        self.registry.register_factory::<M, H, F>(route, factory)?;
        Ok(self)
    }

    /// Auditors are notified in the order they were added.
    pub fn auditor(mut self, auditor: Arc<dyn MessageAuditor>) -> Self {
        self.auditors.push(auditor);
        self
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn expect_routes(mut self, routes: &[Route]) -> Self {
        self.expected_routes = Some(routes.to_vec());
        self
    }

    pub fn build(self) -> Result<Dispatcher, HeraldError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_routes {
            let registered = self.registry.routes();
            let missing: Vec<Route> = expected
                .iter()
                .filter(|route| !registered.contains(route))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(HeraldError::MissingRoutes(missing));
            }
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        let mut auditors = AuditorSet::new(self.config.audit_delivery);
        for auditor in self.auditors {
            auditors.push(auditor);
        }

        Ok(Dispatcher::new(
            Arc::new(self.registry),
            auditors,
            clock,
            ids,
            self.config,
        ))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
