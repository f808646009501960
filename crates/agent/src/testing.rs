use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use ordermate_core::domain::menu::{Menu, MenuItem};
use ordermate_core::domain::order::{OrderId, OrderProjection};
use ordermate_core::domain::tenant::TenantId;
use ordermate_core::ports::{OrderSink, PortError};

use crate::llm::{CompletionRequest, LlmClient, LlmError};

pub enum Scripted {
    Reply(String),
    Fail(LlmError),
    Stall(Duration),
}

/// Replays a fixed script and records every request it receives.
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self { script: Mutex::new(script.into()), requests: Mutex::new(Vec::new()) }
    }

    pub fn replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|reply| Scripted::Reply(reply.to_string())).collect())
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self.script.lock().ok().and_then(|mut script| script.pop_front());
        match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(error)) => Err(error),
            Some(Scripted::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Err(LlmError::Transport("stalled".to_string()))
            }
            None => Err(LlmError::Transport("script exhausted".to_string())),
        }
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub fail_always: bool,
    pub calls: AtomicU32,
    pub orders: Mutex<Vec<OrderProjection>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self { fail_always: true, ..Self::default() }
    }

    pub fn placed(&self) -> Vec<OrderProjection> {
        self.orders.lock().map(|orders| orders.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OrderSink for RecordingSink {
    async fn submit(&self, order: &OrderProjection) -> Result<OrderId, PortError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_always {
            return Err(PortError::Unavailable("kitchen offline".to_string()));
        }
        if let Ok(mut orders) = self.orders.lock() {
            orders.push(order.clone());
        }
        Ok(OrderId(format!("order-{call}")))
    }
}

pub fn burger_menu() -> Menu {
    Menu::new(
        TenantId("bistro".to_string()),
        vec![
            MenuItem::new("burger", "Burger", Decimal::new(100, 0)).with_tags(&["burgers"]),
            MenuItem::new("fries", "Fries", Decimal::new(50, 0)).with_tags(&["sides"]),
        ],
    )
}
