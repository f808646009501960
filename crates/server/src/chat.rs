//! HTTP surface for the conversation pipeline.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use ordermate_agent::runtime::ConversationRuntime;
use ordermate_core::domain::cart::CartSnapshot;
use ordermate_core::domain::message::{InboundMessage, OutboundReply};
use ordermate_core::domain::session::SessionKey;
use ordermate_core::errors::InterfaceError;
use ordermate_core::ports::SessionStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<ConversationRuntime>,
    sessions: Arc<dyn SessionStore>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub user_id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ChatError {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_key: String,
    pub dialogue_state: &'static str,
    pub awaiting_confirmation: bool,
    pub cart: CartSnapshot,
    pub cart_total: String,
    pub history_messages: usize,
}

pub fn router(runtime: Arc<ConversationRuntime>, sessions: Arc<dyn SessionStore>) -> Router {
    Router::new()
        .route("/v1/tenants/{tenant_id}/messages", post(post_message))
        .route("/v1/tenants/{tenant_id}/sessions/{user_id}", get(get_session))
        .with_state(ChatState { runtime, sessions })
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn error_response(error: InterfaceError) -> (StatusCode, Json<ChatError>) {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ChatError {
            error: error.user_message(),
            detail: error.to_string(),
            correlation_id: error.correlation_id().to_string(),
        }),
    )
}

async fn post_message(
    Path(tenant_id): Path<String>,
    State(state): State<ChatState>,
    headers: HeaderMap,
    Json(body): Json<MessageRequest>,
) -> Result<Json<OutboundReply>, (StatusCode, Json<ChatError>)> {
    let correlation_id = correlation_id(&headers);
    let inbound = InboundMessage::new(tenant_id, body.user_id, body.text);

    match state.runtime.handle_message(inbound).await {
        Ok(reply) => {
            info!(
                event_name = "chat.message.replied",
                correlation_id = %correlation_id,
                session_key = %reply.session_key,
                intent = reply.intent.as_str(),
                cart_items = reply.cart_snapshot.item_count,
                "reply sent"
            );
            Ok(Json(reply))
        }
        Err(error) => {
            let mapped = error.into_interface(correlation_id);
            warn!(
                event_name = "chat.message.rejected",
                correlation_id = %mapped.correlation_id(),
                error = %mapped,
                "message rejected"
            );
            Err(error_response(mapped))
        }
    }
}

async fn get_session(
    Path((tenant_id, user_id)): Path<(String, String)>,
    State(state): State<ChatState>,
) -> Json<SessionView> {
    let session = state.sessions.load(&SessionKey::new(tenant_id, user_id)).await;
    Json(SessionView {
        session_key: session.key.to_string(),
        dialogue_state: session.dialogue_state.as_str(),
        awaiting_confirmation: session.awaiting_confirmation,
        cart: session.cart.snapshot(),
        cart_total: session.cart.total().to_string(),
        history_messages: session.history.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chrono::Duration;
    use ordermate_agent::runtime::{ConversationRuntime, RuntimeDeps};
    use ordermate_core::domain::menu::{Menu, MenuItem};
    use ordermate_core::domain::tenant::{AssistantMode, TenantConfig, TenantId};
    use ordermate_core::ports::SessionStore;
    use ordermate_db::repositories::{InMemoryCatalog, InMemoryOrderSink};
    use ordermate_db::VersionedSessionStore;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, CORRELATION_HEADER};

    fn app() -> (Router, Arc<InMemoryOrderSink>) {
        let mut tenant = TenantConfig::new("bistro", "Bistro");
        tenant.assistant_mode = AssistantMode::DeterministicOnly;
        let menu = Menu::new(
            TenantId("bistro".to_string()),
            vec![
                MenuItem::new("burger", "Burger", Decimal::new(100, 0)),
                MenuItem::new("fries", "Fries", Decimal::new(50, 0)),
            ],
        );
        let catalog = Arc::new(InMemoryCatalog::new(vec![(tenant, menu)]));
        let sessions: Arc<dyn SessionStore> =
            Arc::new(VersionedSessionStore::in_memory(Duration::minutes(10)));
        let orders = Arc::new(InMemoryOrderSink::default());
        let runtime = ConversationRuntime::builder(RuntimeDeps {
            tenants: catalog.clone(),
            menus: catalog,
            sessions: sessions.clone(),
            orders: orders.clone(),
        })
        .build()
        .expect("runtime");
        (router(Arc::new(runtime), sessions), orders)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&body).expect("json body"))
    }

    fn message(tenant: &str, user: &str, text: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/v1/tenants/{tenant}/messages"))
            .header("content-type", "application/json")
            .header(CORRELATION_HEADER, "corr-42")
            .body(Body::from(json!({ "user_id": user, "text": text }).to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn order_flow_over_http() {
        let (app, orders) = app();

        let (status, added) = send(&app, message("bistro", "u1", "2 burgers and 1 fries")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(added["intent"], "add_to_cart");
        assert_eq!(added["cart_snapshot"]["item_count"], 3);
        assert_eq!(added["session_key"], "bistro:u1");

        let (_, placed) = send(&app, message("bistro", "u1", "checkout")).await;
        assert_eq!(placed["intent"], "confirm");
        assert_eq!(placed["cart_snapshot"]["item_count"], 0);
        assert_eq!(orders.orders().await.len(), 1);

        let request = Request::builder()
            .uri("/v1/tenants/bistro/sessions/u1")
            .body(Body::empty())
            .expect("request");
        let (status, view) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["dialogue_state"], "order_confirmed");
        assert_eq!(view["history_messages"], 4);
    }

    #[tokio::test]
    async fn unknown_tenants_are_not_found_with_correlation_id() {
        let (app, _) = app();

        let (status, body) = send(&app, message("nowhere", "u1", "hi")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["correlation_id"], "corr-42");
        assert_eq!(body["error"], "This restaurant is not available right now.");
    }

    #[tokio::test]
    async fn missing_user_is_a_bad_request() {
        let (app, _) = app();

        let (status, _) = send(&app, message("bistro", "  ", "hi")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
