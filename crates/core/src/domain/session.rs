use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::dialogue::DialogueState;
use crate::domain::cart::{Addition, Cart, Removal};
use crate::domain::menu::MenuItemId;
use crate::domain::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Tenant + user composite. All conversation state is partitioned by it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

impl SessionKey {
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self { tenant_id: TenantId(tenant_id.into()), user_id: UserId(user_id.into()) }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tenant_id.0, self.user_id.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Set on user turns whose items already landed in the cart.
    #[serde(default)]
    pub applied_to_cart: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into(), applied_to_cart: false }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into(), applied_to_cart: false }
    }

    pub fn applied(mut self, applied: bool) -> Self {
        self.applied_to_cart = applied;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    #[serde(default)]
    pub cart: Cart,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub dialogue_state: DialogueState,
    #[serde(default)]
    pub last_suggested: Vec<MenuItemId>,
    #[serde(default)]
    pub awaiting_confirmation: bool,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(key: SessionKey, now: DateTime<Utc>) -> Self {
        Self {
            key,
            cart: Cart::default(),
            history: Vec::new(),
            dialogue_state: DialogueState::default(),
            last_suggested: Vec::new(),
            awaiting_confirmation: false,
            last_active: now,
        }
    }

    pub fn previous_assistant_message(&self) -> Option<&Message> {
        self.history.iter().rev().find(|message| message.role == MessageRole::Assistant)
    }

    /// User turns, most recent first.
    pub fn user_messages_newest_first(&self) -> impl Iterator<Item = &Message> {
        self.history.iter().rev().filter(|message| message.role == MessageRole::User)
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_active > ttl
    }
}

/// Every effect of one conversational turn, applied in a single save.
///
/// The update is replayable: after an optimistic-version conflict the store
/// re-applies it to the fresher record, so cart effects are expressed as
/// quantity deltas rather than whole-cart overwrites.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub removals: Vec<Removal>,
    pub additions: Vec<Addition>,
    pub messages: Vec<Message>,
    pub dialogue_state: Option<DialogueState>,
    pub last_suggested: Option<Vec<MenuItemId>>,
    pub awaiting_confirmation: Option<bool>,
}

impl SessionUpdate {
    pub fn apply(&self, session: &mut Session, max_messages: usize) {
        for removal in &self.removals {
            session.cart.remove_quantity(removal);
        }
        for addition in &self.additions {
            session.cart.add(addition);
        }

        session.history.extend(self.messages.iter().cloned());
        if session.history.len() > max_messages {
            let overflow = session.history.len() - max_messages;
            session.history.drain(..overflow);
        }

        if let Some(state) = self.dialogue_state {
            session.dialogue_state = state;
        }
        if let Some(suggested) = &self.last_suggested {
            session.last_suggested = suggested.clone();
        }
        if let Some(awaiting) = self.awaiting_confirmation {
            session.awaiting_confirmation = awaiting;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{Message, Session, SessionKey, SessionUpdate};
    use crate::dialogue::DialogueState;
    use crate::domain::cart::{Addition, Removal};
    use crate::domain::menu::{MenuItem, MenuItemId};

    #[test]
    fn session_key_renders_tenant_and_user() {
        assert_eq!(SessionKey::new("bistro", "+9230000").to_string(), "bistro:+9230000");
    }

    #[test]
    fn update_applies_removals_before_additions_and_trims_history() {
        let now = Utc::now();
        let mut session = Session::new(SessionKey::new("bistro", "u1"), now);
        let burger = MenuItem::new("burger", "Burger", Decimal::new(100, 0));
        session.cart.add(&Addition::from_item(&burger, 2));
        for index in 0..4 {
            session.history.push(Message::user(format!("m{index}")));
        }

        let update = SessionUpdate {
            removals: vec![Removal { item_id: MenuItemId("burger".to_string()), qty: 2 }],
            additions: vec![Addition::from_item(&burger, 1)],
            messages: vec![Message::user("next"), Message::assistant("ok")],
            dialogue_state: Some(DialogueState::ItemSelection),
            last_suggested: Some(vec![MenuItemId("burger".to_string())]),
            awaiting_confirmation: Some(true),
        };
        update.apply(&mut session, 4);

        assert_eq!(session.cart.item_count(), 1);
        assert_eq!(session.history.len(), 4);
        assert_eq!(session.history[0].content, "m2");
        assert_eq!(session.history[3].content, "ok");
        assert_eq!(session.dialogue_state, DialogueState::ItemSelection);
        assert!(session.awaiting_confirmation);
    }

    #[test]
    fn expiry_uses_inactivity_since_last_active() {
        let now = Utc::now();
        let session = Session::new(SessionKey::new("bistro", "u1"), now - Duration::minutes(11));

        assert!(session.is_expired(now, Duration::minutes(10)));
        assert!(!session.is_expired(now, Duration::minutes(15)));
    }

    #[test]
    fn legacy_records_without_applied_flag_still_decode() {
        let raw = r#"{"role":"user","content":"2 fries"}"#;
        let message: Message = serde_json::from_str(raw).expect("decode");
        assert!(!message.applied_to_cart);
    }
}
