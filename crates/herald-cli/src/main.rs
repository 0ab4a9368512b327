use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::{Duration, sleep};

use herald_core::domain::{Delivery, Message, MessageId, Route};
use herald_core::ports::AuditorError;
use herald_core::{
    DispatchOutcome, DispatcherBuilder, DispatcherConfig, FailureRecord, Handler, HandlerError,
    HandlingRecord, MessageAuditor, MessageInformation,
};

#[derive(Debug, Deserialize)]
struct HelloPayload {
    name: String,
}

struct HelloHandler {
    remaining_failures: AtomicU32,
}

impl HelloHandler {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl Handler<HelloPayload> for HelloHandler {
    async fn handle(&self, message: &HelloPayload) -> Result<(), HandlerError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(HandlerError::new(format!("intentional failure (left={left})")));
        }

        println!("Hello, {}!", message.name);
        Ok(())
    }
}

/// auditor：結果をログに流すだけ
struct LogAuditor;

impl MessageAuditor for LogAuditor {
    fn on_success(&self, record: &HandlingRecord) -> Result<(), AuditorError> {
        let elapsed = record.finished().map(|f| f - record.started());
        tracing::info!(
            handling_id = %record.id(),
            topic = record.topic(),
            channel = record.channel(),
            handler = %record.handler_kind(),
            elapsed_ms = elapsed.map(|d| d.num_milliseconds()),
            "succeeded"
        );
        Ok(())
    }

    fn on_failure(&self, record: &FailureRecord) -> Result<(), AuditorError> {
        tracing::info!(
            handling_id = %record.id(),
            topic = record.topic(),
            channel = record.channel(),
            disposition = ?record.disposition(),
            reason = ?record.reason(),
            cause = record.root_cause().map(tracing::field::display),
            "failed"
        );
        Ok(())
    }
}

fn load_config() -> DispatcherConfig {
    let Ok(path) = std::env::var("HERALD_CONFIG") else {
        return DispatcherConfig::default();
    };
    tracing::info!(config = %path, "loading configuration");
    let loaded = std::fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|s| DispatcherConfig::from_json_str(&s).map_err(|e| e.to_string()));
    match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    }
}

fn delivery(id: &str, body: serde_json::Value) -> Delivery {
    let body = serde_json::to_vec(&body).unwrap_or_default();
    Delivery::new(
        Route::new("greetings", "hello"),
        Message::new(MessageId::new(id), 1, Utc::now(), body),
    )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // (A) Dispatcher を用意（handler と auditor を登録）
    let route = Route::new("greetings", "hello");
    let dispatcher = match DispatcherBuilder::new()
        .register::<HelloPayload, _>(route.clone(), HelloHandler::new(2))
        .and_then(|b| {
            b.auditor(Arc::new(LogAuditor))
                .config(load_config())
                .expect_routes(&[route])
                .build()
        }) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(error = %e, "failed to build dispatcher");
            std::process::exit(1);
        }
    };

    // (B) 接続層の代わりに、メモリ上のキューで配送を再現する
    let mut queue: VecDeque<Delivery> = VecDeque::from(vec![
        delivery("0000000000000001", serde_json::json!({ "name": "herald" })),
        delivery("0000000000000002", serde_json::json!({ "nom": "broken" })),
    ]);

    // (C) requeue は attempts を増やしてキューに戻す（遅延はデモ用に短縮）
    while let Some(d) = queue.pop_front() {
        match dispatcher.dispatch(d.clone()).await {
            Ok(DispatchOutcome::Finish) => {}
            Ok(DispatchOutcome::Requeue {
                delay,
                until,
                backoff,
            }) => {
                tracing::info!(?delay, ?until, backoff, "requeue requested");
                sleep(delay.min(Duration::from_millis(50))).await;
                let mut next = d;
                next.message.attempts += 1;
                queue.push_back(next);
            }
            Err(e) => tracing::error!(error = %e, "dispatch failed"),
        }
    }
}
