//! Language model seam and the tagged parse of what comes back from it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use ordermate_core::cart::ProposedItem;
use ordermate_core::domain::message::ReplyIntent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm transport failure: {0}")]
    Transport(String),
    #[error("llm call timed out after {0} ms")]
    Timeout(u64),
    #[error("llm provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm provider rejected credentials: {0}")]
    Auth(String),
    #[error("llm response could not be read: {0}")]
    InvalidResponse(String),
    #[error("llm provider is not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::Auth(body.to_string()),
            _ => Self::Status { status, body: body.to_string() },
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::InvalidResponse(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Auth(_) | Self::NotConfigured(_) => false,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    fn model_id(&self) -> &str;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftIntent {
    Info,
    AddToCart,
    Upsell,
    Confirm,
    #[default]
    Unknown,
}

impl DraftIntent {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "info" => Self::Info,
            "add_to_cart" => Self::AddToCart,
            "upsell" => Self::Upsell,
            "confirm" => Self::Confirm,
            _ => Self::Unknown,
        }
    }

    pub fn reply_intent(self) -> ReplyIntent {
        match self {
            Self::Info => ReplyIntent::Info,
            Self::AddToCart => ReplyIntent::AddToCart,
            Self::Upsell => ReplyIntent::Upsell,
            Self::Confirm => ReplyIntent::Confirm,
            Self::Unknown => ReplyIntent::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DraftFields {
    pub reply_text: String,
    pub intent: DraftIntent,
    pub order_items: Vec<ProposedItem>,
    pub total_estimate: Option<Decimal>,
}

/// Either the JSON contract the prompt asks for, or anything else the model
/// produced. Never an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmOutput {
    Structured(DraftFields),
    PlainText(String),
}

#[derive(Deserialize)]
struct RawDraft {
    #[serde(default)]
    reply_text: Option<String>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default, rename = "orderItems", alias = "order_items")]
    order_items: Vec<RawItem>,
    #[serde(default, rename = "totalEstimate", alias = "total_estimate")]
    total_estimate: Option<Value>,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(default, alias = "name")]
    title: String,
    #[serde(default, alias = "quantity")]
    qty: Option<Value>,
}

impl LlmOutput {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let structured = json_candidates(trimmed)
            .into_iter()
            .filter_map(|candidate| serde_json::from_str::<RawDraft>(candidate).ok())
            .find_map(into_fields);

        match structured {
            Some(fields) => Self::Structured(fields),
            None => Self::PlainText(trimmed.to_string()),
        }
    }

    pub fn into_fields(self) -> DraftFields {
        match self {
            Self::Structured(fields) => fields,
            Self::PlainText(text) => DraftFields {
                reply_text: text,
                intent: DraftIntent::Unknown,
                order_items: Vec::new(),
                total_estimate: None,
            },
        }
    }
}

/// Whole text, then a fenced block, then the trailing `{...}` span.
fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = vec![text];

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let body_start = after.find('\n').map(|index| index + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            candidates.push(body[..end].trim());
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            candidates.push(&text[start..=end]);
        }
    }

    candidates
}

fn into_fields(raw: RawDraft) -> Option<DraftFields> {
    let reply_text = raw.reply_text.map(|text| text.trim().to_string())?;
    if reply_text.is_empty() {
        return None;
    }

    let order_items = raw
        .order_items
        .into_iter()
        .filter(|item| !item.title.trim().is_empty())
        .map(|item| ProposedItem {
            title: item.title.trim().to_string(),
            qty: item.qty.as_ref().map(quantity_value).unwrap_or(1),
        })
        .collect();

    Some(DraftFields {
        reply_text,
        intent: raw.intent.as_deref().map(DraftIntent::parse).unwrap_or_default(),
        order_items,
        total_estimate: raw.total_estimate.as_ref().and_then(decimal_value),
    })
}

fn quantity_value(value: &Value) -> u32 {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|v| *v >= 0.0).map(|v| v.trunc() as u64))
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .unwrap_or(0),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => number.to_string().parse().ok(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
