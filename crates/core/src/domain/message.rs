use serde::{Deserialize, Serialize};

use crate::domain::cart::CartSnapshot;
use crate::domain::session::SessionKey;
use crate::errors::ValidationError;

pub const MAX_MESSAGE_CHARS: usize = 2_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub tenant_id: String,
    pub user_id: String,
    #[serde(default)]
    pub text: String,
}

impl InboundMessage {
    pub fn new(
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self { tenant_id: tenant_id.into(), user_id: user_id.into(), text: text.into() }
    }

    /// Empty text is valid here; the router decides to ignore it.
    pub fn validate(&self) -> Result<SessionKey, ValidationError> {
        let tenant_id = self.tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(ValidationError::MissingTenant);
        }
        let user_id = self.user_id.trim();
        if user_id.is_empty() {
            return Err(ValidationError::MissingUser);
        }
        if tenant_id.contains(':') {
            return Err(ValidationError::InvalidTenant(tenant_id.to_string()));
        }
        let length = self.text.chars().count();
        if length > MAX_MESSAGE_CHARS {
            return Err(ValidationError::MessageTooLong { length, max: MAX_MESSAGE_CHARS });
        }
        Ok(SessionKey::new(tenant_id, user_id))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyIntent {
    Greeting,
    Info,
    Menu,
    AddToCart,
    Upsell,
    CartSummary,
    Confirm,
    Checkout,
    Clarify,
    Unknown,
    Error,
    Ignored,
}

impl ReplyIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Info => "info",
            Self::Menu => "menu",
            Self::AddToCart => "add_to_cart",
            Self::Upsell => "upsell",
            Self::CartSummary => "cart_summary",
            Self::Confirm => "confirm",
            Self::Checkout => "checkout",
            Self::Clarify => "clarify",
            Self::Unknown => "unknown",
            Self::Error => "error",
            Self::Ignored => "ignored",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundReply {
    pub reply_text: String,
    pub intent: ReplyIntent,
    pub cart_snapshot: CartSnapshot,
    pub session_key: String,
}

#[cfg(test)]
mod tests {
    use super::{InboundMessage, MAX_MESSAGE_CHARS};
    use crate::errors::ValidationError;

    #[test]
    fn validation_rejects_missing_identity() {
        assert_eq!(
            InboundMessage::new(" ", "u1", "hi").validate(),
            Err(ValidationError::MissingTenant)
        );
        assert_eq!(
            InboundMessage::new("bistro", "", "hi").validate(),
            Err(ValidationError::MissingUser)
        );
    }

    #[test]
    fn validation_allows_empty_text_and_trims_ids() {
        let key = InboundMessage::new(" bistro ", " u1", "").validate().expect("valid");
        assert_eq!(key.to_string(), "bistro:u1");
    }

    #[test]
    fn validation_rejects_oversized_text() {
        let text = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            InboundMessage::new("bistro", "u1", text).validate(),
            Err(ValidationError::MessageTooLong { .. })
        ));
    }
}
